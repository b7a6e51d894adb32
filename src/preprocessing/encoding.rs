//! Categorical label encoding.
//!
//! Each categorical field gets a [`CategoryEncoding`]: the distinct training
//! values sorted lexicographically, with a value's code being its index.
//! Values never seen at fit time are aliased to code 0 (the first class).
//! Every aliasing is counted and logged so silent information loss stays visible.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::data::{Column, Frame};
use crate::error::{ConfigError, Error, Result};

// =============================================================================
// CategoryEncoding
// =============================================================================

/// Sorted vocabulary of one categorical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    classes: Vec<String>,
}

impl CategoryEncoding {
    /// Learn the vocabulary from the non-missing values of a column.
    ///
    /// Returns `None` if the column holds no value at all.
    pub fn fit<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut classes: Vec<String> = values.into_iter().flatten().map(str::to_string).collect();
        classes.sort_unstable();
        classes.dedup();
        if classes.is_empty() {
            None
        } else {
            Some(Self { classes })
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Exact code of `value`, `None` if it is not in the vocabulary.
    pub fn code(&self, value: &str) -> Option<u32> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
            .map(|i| i as u32)
    }

    /// Code of `value`, falling back to the first class.
    ///
    /// The boolean is `true` when the fallback was used.
    #[inline]
    pub fn code_or_fallback(&self, value: Option<&str>) -> (u32, bool) {
        match value.and_then(|v| self.code(v)) {
            Some(code) => (code, false),
            None => (0, true),
        }
    }

    /// Encode a whole column, returning the codes and the alias count.
    pub fn apply(&self, values: &[Option<String>]) -> (Vec<u32>, u64) {
        let mut aliased = 0u64;
        let codes = values
            .iter()
            .map(|v| {
                let (code, fallback) = self.code_or_fallback(v.as_deref());
                aliased += u64::from(fallback);
                code
            })
            .collect();
        (codes, aliased)
    }
}

// =============================================================================
// CategoricalEncoder
// =============================================================================

/// One encoding per categorical field; fit exactly once.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    encodings: BTreeMap<String, CategoryEncoding>,
    /// Set by `fit`, even for an empty column list.
    #[serde(default = "persisted_is_fitted")]
    fitted: bool,
    #[serde(skip)]
    aliased: AtomicU64,
}

impl Clone for CategoricalEncoder {
    fn clone(&self) -> Self {
        Self {
            encodings: self.encodings.clone(),
            fitted: self.fitted,
            aliased: AtomicU64::new(self.aliased_count()),
        }
    }
}

impl PartialEq for CategoricalEncoder {
    fn eq(&self, other: &Self) -> bool {
        self.encodings == other.encodings && self.fitted == other.fitted
    }
}

fn persisted_is_fitted() -> bool {
    true
}

impl CategoricalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn encodings(&self) -> &BTreeMap<String, CategoryEncoding> {
        &self.encodings
    }

    pub fn encoding(&self, column: &str) -> Option<&CategoryEncoding> {
        self.encodings.get(column)
    }

    /// Total number of values aliased to a fallback code since load.
    pub fn aliased_count(&self) -> u64 {
        self.aliased.load(Ordering::Relaxed)
    }

    /// Learn encodings for `columns`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::AlreadyFitted`] on a second call
    /// - [`Error::Schema`] if a column is absent, not categorical, or empty
    pub fn fit(&mut self, frame: &Frame, columns: &[&str]) -> Result<()> {
        if self.is_fitted() {
            return Err(ConfigError::AlreadyFitted("categorical encoder").into());
        }

        let mut encodings = BTreeMap::new();
        for &name in columns {
            let values = categorical_column(frame, name)?;
            let encoding = CategoryEncoding::fit(values.iter().map(Option::as_deref))
                .ok_or_else(|| Error::schema(format!("column '{name}' has no values to encode")))?;
            tracing::debug!(column = name, classes = encoding.len(), "fitted encoding");
            encodings.insert(name.to_string(), encoding);
        }
        self.encodings = encodings;
        self.fitted = true;
        Ok(())
    }

    /// Replace every encoded column with its numeric codes.
    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        if !self.is_fitted() {
            return Err(Error::NotFitted("categorical encoder"));
        }

        let mut out = frame.clone();
        for (name, encoding) in &self.encodings {
            let values = categorical_column(frame, name)?;
            let (codes, aliased) = encoding.apply(values);
            if aliased > 0 {
                self.aliased.fetch_add(aliased, Ordering::Relaxed);
                tracing::warn!(
                    column = %name,
                    aliased,
                    fallback = %encoding.classes()[0],
                    "unseen categories mapped to fallback class"
                );
            }
            out.set_column(name, Column::Numeric(codes.into_iter().map(f64::from).collect()));
        }
        Ok(out)
    }
}

fn categorical_column<'a>(frame: &'a Frame, name: &str) -> Result<&'a [Option<String>]> {
    match frame.column(name) {
        Some(Column::Categorical(values)) => Ok(values),
        Some(Column::Numeric(_)) => Err(Error::schema(format!(
            "column '{name}' must be categorical, found numeric"
        ))),
        None => Err(Error::schema(format!("missing categorical column '{name}'"))),
    }
}
