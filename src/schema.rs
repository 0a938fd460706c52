//! Column layout and fingerprint of the produced feature vectors.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::attributes::ALL_COMMIT_ATTRIBUTES;
use crate::features::FeatureWindows;

pub const FEATURE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub fingerprint: String,
    pub max_commits: usize,
    /// Columns of one commit row; the vector repeats them `max_commits` times.
    pub row_columns: Vec<String>,
    pub vector_len: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },
    #[error("schema fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch { expected: String, actual: String },
}

pub fn build_feature_schema(windows: &FeatureWindows, max_commits: usize) -> FeatureSchema {
    let mut row_columns = Vec::with_capacity(windows.row_width());
    for depth in &windows.author {
        row_columns.push(format!("author_distinct_{depth}"));
    }
    for depth in &windows.committer {
        row_columns.push(format!("committer_distinct_{depth}"));
    }
    for attr in ALL_COMMIT_ATTRIBUTES {
        row_columns.push(attr.column().to_string());
    }

    let fingerprint = schema_fingerprint(max_commits, &row_columns);
    let vector_len = max_commits * row_columns.len();

    info!(
        component = "schema",
        event = "schema.built",
        version = FEATURE_SCHEMA_VERSION,
        max_commits,
        row_width = row_columns.len(),
        vector_len,
        fingerprint = %fingerprint
    );

    FeatureSchema {
        version: FEATURE_SCHEMA_VERSION,
        fingerprint,
        max_commits,
        row_columns,
        vector_len,
    }
}

impl FeatureSchema {
    /// Name of flat vector position `idx`, e.g. `c002_additions`.
    pub fn column_name(&self, idx: usize) -> Option<String> {
        if idx >= self.vector_len || self.row_columns.is_empty() {
            return None;
        }
        let width = self.row_columns.len();
        Some(format!(
            "c{:03}_{}",
            idx / width,
            self.row_columns[idx % width]
        ))
    }
}

pub fn assert_schema_compatible(
    expected_version: u32,
    expected_fingerprint: &str,
    actual: &FeatureSchema,
) -> Result<(), SchemaError> {
    if expected_version != actual.version {
        return Err(SchemaError::VersionMismatch {
            expected: expected_version,
            actual: actual.version,
        });
    }

    if expected_fingerprint != actual.fingerprint {
        return Err(SchemaError::FingerprintMismatch {
            expected: expected_fingerprint.to_string(),
            actual: actual.fingerprint.clone(),
        });
    }

    Ok(())
}

fn schema_fingerprint(max_commits: usize, row_columns: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("version:{FEATURE_SCHEMA_VERSION};"));
    hasher.update(format!("max_commits:{max_commits};"));
    hasher.update("columns:");
    for column in row_columns {
        hasher.update(column.as_bytes());
        hasher.update(":f64;");
    }
    hex::encode(hasher.finalize())
}
