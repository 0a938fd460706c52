//! Invocation request parsing and validation.
//!
//! A [`DatasetRequest`] is the raw JSON object handed to the builder. Numeric
//! fields accept either JSON numbers or numeric strings. [`DatasetRequest::plan`]
//! validates every field and produces a [`DatasetPlan`] before any store access.

use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use crate::attributes::{parse_repo_attribute, RepoAttribute};
use crate::features::FeatureWindows;
use crate::partition::{parse_dataset_split, parse_partition_ratios, DatasetSplit, PartitionRatios};
use crate::target::TargetMode;

pub const DEFAULT_N: u64 = 100;
pub const DEFAULT_MAX_COMMITS: u64 = 100;
pub const DEFAULT_WINDOWS: &str = "3_15_100";
pub const DEFAULT_PARTITION: &str = "100_0_0";
/// Upper bound on `maxCommits * row width`, the values in one feature vector.
pub const MAX_VECTOR_LEN: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown dataset `{0}`; expected train, validate or test")]
    UnknownDataset(String),
    #[error("unknown target column `{0}`")]
    UnknownTargetColumn(String),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRequest {
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub n: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub o: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub hard_limit: Option<u64>,
    #[serde(default)]
    pub target_column: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub use_stars: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub use_forks: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub use_watchers: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub use_subscribers: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub target_threshold: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub max_commits: Option<u64>,
    #[serde(default)]
    pub author_history: Option<String>,
    #[serde(default)]
    pub committer_history: Option<String>,
    #[serde(default)]
    pub dataset_partition: Option<String>,
    #[serde(default)]
    pub which_dataset: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub forced_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub refresh_stats: Option<bool>,
    /// Fingerprint of the layout the consumer was trained on.
    #[serde(default)]
    pub expected_schema_fingerprint: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetPlan {
    pub n: u64,
    pub o: u64,
    pub hard_limit: Option<u64>,
    pub target_column: RepoAttribute,
    pub target_mode: TargetMode,
    pub max_commits: usize,
    pub windows: FeatureWindows,
    pub partition: PartitionRatios,
    pub split: DatasetSplit,
    pub forced_id: Option<i64>,
    pub refresh_stats: bool,
    pub expected_schema_fingerprint: Option<String>,
}

impl DatasetPlan {
    pub fn row_width(&self) -> usize {
        self.windows.row_width()
    }

    pub fn vector_len(&self) -> usize {
        self.max_commits * self.row_width()
    }
}

impl DatasetRequest {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn plan(&self) -> Result<DatasetPlan, ConfigError> {
        let split = parse_dataset_split(self.which_dataset.as_deref().unwrap_or("train"))?;
        let partition =
            parse_partition_ratios(self.dataset_partition.as_deref().unwrap_or(DEFAULT_PARTITION))?;
        let target_column = self.resolve_target_column()?;

        let threshold = self.target_threshold.unwrap_or(0.0);
        if !threshold.is_finite() {
            return Err(ConfigError::InvalidField {
                field: "targetThreshold",
                reason: "must be a finite number".to_string(),
            });
        }

        let max_commits = self.max_commits.unwrap_or(DEFAULT_MAX_COMMITS);
        if max_commits == 0 {
            return Err(ConfigError::InvalidField {
                field: "maxCommits",
                reason: "must be > 0".to_string(),
            });
        }
        let max_commits = usize::try_from(max_commits).map_err(|_| ConfigError::InvalidField {
            field: "maxCommits",
            reason: format!("{max_commits} is too large"),
        })?;

        let windows = FeatureWindows {
            author: parse_window_depths(
                "authorHistory",
                self.author_history.as_deref().unwrap_or(DEFAULT_WINDOWS),
            )?,
            committer: parse_window_depths(
                "committerHistory",
                self.committer_history.as_deref().unwrap_or(DEFAULT_WINDOWS),
            )?,
        };
        let within_cap = max_commits
            .checked_mul(windows.row_width())
            .is_some_and(|len| len <= MAX_VECTOR_LEN);
        if !within_cap {
            return Err(ConfigError::InvalidField {
                field: "maxCommits",
                reason: format!(
                    "{max_commits} commits of {} features exceeds {MAX_VECTOR_LEN} values per vector",
                    windows.row_width()
                ),
            });
        }

        let expected_schema_fingerprint = self
            .expected_schema_fingerprint
            .as_deref()
            .map(str::trim)
            .filter(|fingerprint| !fingerprint.is_empty())
            .map(str::to_string);

        Ok(DatasetPlan {
            n: self.n.unwrap_or(DEFAULT_N),
            o: self.o.unwrap_or(0),
            hard_limit: self.hard_limit,
            target_column,
            target_mode: TargetMode::from_threshold(threshold),
            max_commits,
            windows,
            partition,
            split,
            forced_id: self.forced_id,
            refresh_stats: self.refresh_stats.unwrap_or(false),
            expected_schema_fingerprint,
        })
    }

    fn resolve_target_column(&self) -> Result<RepoAttribute, ConfigError> {
        if let Some(raw) = &self.target_column {
            return parse_repo_attribute(raw)
                .ok_or_else(|| ConfigError::UnknownTargetColumn(raw.clone()));
        }

        let flags = [
            (self.use_stars, RepoAttribute::Stargazers),
            (self.use_forks, RepoAttribute::Forks),
            (self.use_watchers, RepoAttribute::Watchers),
            (self.use_subscribers, RepoAttribute::Subscribers),
        ];
        Ok(flags
            .into_iter()
            .find(|(flag, _)| *flag == Some(true))
            .map(|(_, attr)| attr)
            .unwrap_or(RepoAttribute::Stargazers))
    }
}

/// Parses `"3_15_100"`-style window lists. An empty string means no windows.
pub fn parse_window_depths(field: &'static str, input: &str) -> Result<Vec<usize>, ConfigError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let mut depths = Vec::new();
    for part in trimmed.split('_') {
        let depth = part
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidField {
                field,
                reason: format!("`{part}` is not a window depth"),
            })?;
        if depth == 0 {
            return Err(ConfigError::InvalidField {
                field,
                reason: "window depths must be > 0".to_string(),
            });
        }
        if !seen.insert(depth) {
            return Err(ConfigError::InvalidField {
                field,
                reason: format!("window depth {depth} is repeated"),
            });
        }
        depths.push(depth);
    }
    Ok(depths)
}

mod lenient {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Float(f64),
        Text(String),
    }

    fn raw<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Raw>, D::Error> {
        Option::<Raw>::deserialize(d)
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match raw(d)? {
            None => Ok(None),
            Some(Raw::Int(v)) => Ok(Some(v)),
            Some(Raw::Float(v)) if v.fract() == 0.0 && v.is_finite() => Ok(Some(v as i64)),
            Some(Raw::Text(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("`{s}` is not an integer"))),
            Some(_) => Err(D::Error::custom("expected an integer")),
        }
    }

    pub fn opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        match opt_i64(d)? {
            None => Ok(None),
            Some(v) => u64::try_from(v)
                .map(Some)
                .map_err(|_| D::Error::custom(format!("{v} must not be negative"))),
        }
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match raw(d)? {
            None => Ok(None),
            Some(Raw::Int(v)) => Ok(Some(v as f64)),
            Some(Raw::Float(v)) => Ok(Some(v)),
            Some(Raw::Text(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("`{s}` is not a number"))),
            Some(Raw::Bool(_)) => Err(D::Error::custom("expected a number")),
        }
    }

    pub fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        match raw(d)? {
            None => Ok(None),
            Some(Raw::Bool(v)) => Ok(Some(v)),
            Some(Raw::Int(v)) => Ok(Some(v != 0)),
            Some(Raw::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
                _ => Err(D::Error::custom(format!("`{s}` is not a boolean"))),
            },
            Some(Raw::Float(_)) => Err(D::Error::custom("expected a boolean")),
        }
    }
}
