//! Fixed-length feature vectors joined with their labels.

use std::collections::HashMap;

use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};

use crate::features::FeatureRow;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledTarget {
    pub repo_id: i64,
    pub label: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingPair {
    pub repo_id: i64,
    pub features: Vec<f64>,
    pub label: f64,
}

/// Serializes as `[features, [label]]`, the shape the trainer reads.
impl Serialize for TrainingPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.features)?;
        tuple.serialize_element(&[self.label])?;
        tuple.end()
    }
}

/// Flattens each selected repository's rows, in selection order.
///
/// Repositories without rows get an all-zero vector. Every vector is forced
/// to exactly `max_commits * row_width` values.
pub fn assemble(
    targets: &[LabeledTarget],
    features: &HashMap<i64, Vec<FeatureRow>>,
    max_commits: usize,
    row_width: usize,
) -> Vec<TrainingPair> {
    let vector_len = max_commits * row_width;

    targets
        .iter()
        .map(|target| {
            let mut vector = Vec::with_capacity(vector_len);
            if let Some(rows) = features.get(&target.repo_id) {
                for row in rows {
                    vector.extend_from_slice(&row.values);
                }
            }
            vector.resize(vector_len, 0.0);

            TrainingPair {
                repo_id: target.repo_id,
                features: vector,
                label: target.label,
            }
        })
        .collect()
}
