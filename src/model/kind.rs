//! Regressor families.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::BoostingConfig;
use crate::error::ConfigError;
use crate::training::GrowthStrategy;

/// The regressor family behind one ensemble member.
///
/// The three tree families differ only in how trees are grown. Parsing
/// accepts both the library-style name and the strategy name:
///
/// ```
/// use flatprice::model::ModelKind;
///
/// assert_eq!("lightgbm".parse::<ModelKind>().unwrap(), ModelKind::LeafWise);
/// assert_eq!("Oblivious".parse::<ModelKind>().unwrap(), ModelKind::Oblivious);
/// assert!("randomforest".parse::<ModelKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelKind {
    /// Level-by-level trees (`xgboost`).
    DepthWise,
    /// Best-first trees under a leaf budget (`lightgbm`).
    LeafWise,
    /// Symmetric trees (`catboost`).
    Oblivious,
    /// Elastic-net linear fallback.
    Linear,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::DepthWise,
        ModelKind::LeafWise,
        ModelKind::Oblivious,
        ModelKind::Linear,
    ];

    /// Member id used for artifact file names and weight keys.
    pub fn id(self) -> &'static str {
        match self {
            ModelKind::DepthWise => "xgboost",
            ModelKind::LeafWise => "lightgbm",
            ModelKind::Oblivious => "catboost",
            ModelKind::Linear => "linear",
        }
    }

    pub fn is_tree(self) -> bool {
        !matches!(self, ModelKind::Linear)
    }

    /// Growth strategy for tree families, `None` for the linear family.
    pub fn growth(self, config: &BoostingConfig) -> Option<GrowthStrategy> {
        match self {
            ModelKind::DepthWise => Some(GrowthStrategy::DepthWise {
                max_depth: config.max_depth,
            }),
            ModelKind::LeafWise => Some(GrowthStrategy::LeafWise {
                max_leaves: config.max_leaves,
                max_depth: config.max_depth,
            }),
            ModelKind::Oblivious => Some(GrowthStrategy::Oblivious {
                depth: config.oblivious_depth,
            }),
            ModelKind::Linear => None,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xgboost" | "depthwise" => Ok(ModelKind::DepthWise),
            "lightgbm" | "leafwise" => Ok(ModelKind::LeafWise),
            "catboost" | "oblivious" => Ok(ModelKind::Oblivious),
            "linear" => Ok(ModelKind::Linear),
            _ => Err(ConfigError::UnknownModel(s.to_string())),
        }
    }
}

impl Serialize for ModelKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

impl<'de> Deserialize<'de> for ModelKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("xgboost", ModelKind::DepthWise)]
    #[case("DepthWise", ModelKind::DepthWise)]
    #[case(" lightgbm ", ModelKind::LeafWise)]
    #[case("leafwise", ModelKind::LeafWise)]
    #[case("catboost", ModelKind::Oblivious)]
    #[case("linear", ModelKind::Linear)]
    fn test_parse_aliases(#[case] input: &str, #[case] expected: ModelKind) {
        assert_eq!(input.parse::<ModelKind>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_model_is_config_error() {
        assert_eq!(
            "svm".parse::<ModelKind>(),
            Err(ConfigError::UnknownModel("svm".into()))
        );
    }

    #[test]
    fn test_ids_round_trip_through_serde() {
        for kind in ModelKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.id()));
            let back: ModelKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn test_growth_reads_family_limits() {
        let config = BoostingConfig::default();
        assert_eq!(
            ModelKind::LeafWise.growth(&config),
            Some(GrowthStrategy::LeafWise {
                max_leaves: 31,
                max_depth: 7
            })
        );
        assert_eq!(
            ModelKind::Oblivious.growth(&config),
            Some(GrowthStrategy::Oblivious { depth: 6 })
        );
        assert_eq!(ModelKind::Linear.growth(&config), None);
    }
}
