//! Train/validate/test partitioning of the id-ordered repository population.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetSplit {
    Train,
    Validate,
    Test,
}

impl DatasetSplit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Validate => "validate",
            Self::Test => "test",
        }
    }
}

pub fn parse_dataset_split(input: &str) -> Result<DatasetSplit, ConfigError> {
    match input {
        "train" => Ok(DatasetSplit::Train),
        "validate" => Ok(DatasetSplit::Validate),
        "test" => Ok(DatasetSplit::Test),
        other => Err(ConfigError::UnknownDataset(other.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRatios {
    pub train: u64,
    pub validate: u64,
    pub test: u64,
}

/// Parses `"50_25_25"`-style strings: three non-negative integers, positive sum.
pub fn parse_partition_ratios(input: &str) -> Result<PartitionRatios, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidField {
        field: "datasetPartition",
        reason,
    };

    let parts = input
        .trim()
        .split('_')
        .map(|part| {
            part.trim()
                .parse::<u64>()
                .map_err(|_| invalid(format!("`{part}` is not a non-negative integer")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let [train, validate, test] = parts[..] else {
        return Err(invalid(format!(
            "expected 3 ratios, got {} in `{input}`",
            parts.len()
        )));
    };

    let sum = train as u128 + validate as u128 + test as u128;
    if sum == 0 {
        return Err(invalid("ratios must not all be zero".to_string()));
    }

    Ok(PartitionRatios {
        train,
        validate,
        test,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRange {
    pub start: u64,
    pub end_exclusive: u64,
}

impl PartitionRange {
    pub fn len(&self) -> u64 {
        self.end_exclusive - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRanges {
    pub train: PartitionRange,
    pub validate: PartitionRange,
    pub test: PartitionRange,
}

impl PartitionRanges {
    pub fn get(&self, split: DatasetSplit) -> PartitionRange {
        match split {
            DatasetSplit::Train => self.train,
            DatasetSplit::Validate => self.validate,
            DatasetSplit::Test => self.test,
        }
    }
}

impl PartitionRatios {
    /// Floors train and validate sizes; test takes the remainder.
    pub fn ranges(&self, total: u64) -> PartitionRanges {
        let sum = self.train as u128 + self.validate as u128 + self.test as u128;
        let share = |ratio: u64| (total as u128 * ratio as u128 / sum) as u64;

        let train_end = share(self.train);
        let validate_end = train_end + share(self.validate);

        PartitionRanges {
            train: PartitionRange {
                start: 0,
                end_exclusive: train_end,
            },
            validate: PartitionRange {
                start: train_end,
                end_exclusive: validate_end,
            },
            test: PartitionRange {
                start: validate_end,
                end_exclusive: total,
            },
        }
    }
}

/// Count and absolute population offset of a resolved selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub count: u64,
    pub offset: u64,
}

pub fn clamp_page(n: u64, o: u64, limit: u64) -> PageWindow {
    if o >= limit {
        PageWindow { count: 0, offset: o }
    } else if o.saturating_add(n) > limit {
        PageWindow {
            count: limit - o,
            offset: o,
        }
    } else {
        PageWindow { count: n, offset: o }
    }
}

/// Resolves a partition-relative `(n, o)` request to an absolute window.
///
/// The request is capped at the smaller of the partition length and the
/// hard limit (when one is configured).
pub fn resolve_page(
    ratios: &PartitionRatios,
    split: DatasetSplit,
    n: u64,
    o: u64,
    total_repo_count: u64,
    hard_limit: Option<u64>,
) -> PageWindow {
    let range = ratios.ranges(total_repo_count).get(split);
    let limit = match hard_limit {
        Some(hard_limit) => hard_limit.min(range.len()),
        None => range.len(),
    };
    let page = clamp_page(n, o, limit);
    PageWindow {
        count: page.count,
        offset: range.start.saturating_add(page.offset),
    }
}
