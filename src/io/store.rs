//! JSON artifacts in a single output directory.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

pub const PIPELINE_STATE_FILE: &str = "pipeline_state.json";
pub const LABEL_ENCODERS_FILE: &str = "label_encoders.json";
pub const FEATURE_NAMES_FILE: &str = "feature_names.json";
pub const ENSEMBLE_WEIGHTS_FILE: &str = "ensemble_weights.json";
pub const METADATA_FILE: &str = "model_metadata.json";

/// `{id}_model.json`.
pub fn model_file(id: &str) -> String {
    format!("{id}_model.json")
}

/// A directory of named JSON artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open an existing directory without checking it.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the directory (and parents) if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::artifact(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Pretty-print `value` into `name`, replacing any previous file.
    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(name);
        let file = File::create(&path).map_err(|e| Error::artifact(&path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value).map_err(|e| Error::artifact(&path, e))?;
        writer.flush().map_err(|e| Error::artifact(&path, e))?;
        tracing::debug!(path = %path.display(), "wrote artifact");
        Ok(path)
    }

    /// # Errors
    ///
    /// [`Error::Artifact`] if the file is missing, unreadable or malformed.
    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path(name);
        if !path.is_file() {
            return Err(Error::artifact(&path, "file not found"));
        }
        let file = File::open(&path).map_err(|e| Error::artifact(&path, e))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::artifact(&path, format!("malformed JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::create(dir.path().join("nested/out")).unwrap();
        let value: BTreeMap<String, f64> = [("a".to_string(), 0.5)].into_iter().collect();
        store.write_json("weights.json", &value).unwrap();
        assert!(store.exists("weights.json"));
        let back: BTreeMap<String, f64> = store.read_json("weights.json").unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_missing_and_malformed_are_artifact_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        let err = store.read_json::<Vec<f64>>("nope.json").unwrap_err();
        assert!(matches!(err, Error::Artifact { .. }));

        fs::write(store.path("bad.json"), "{not json").unwrap();
        let err = store.read_json::<Vec<f64>>("bad.json").unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn test_model_file_name() {
        assert_eq!(model_file("xgboost"), "xgboost_model.json");
    }
}
