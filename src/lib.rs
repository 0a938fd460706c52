//! Repository commit-history feature datasets.
//!
//! Turns repositories and their commits stored in SQLite into fixed-length
//! feature vectors and target labels for a model trainer:
//! - cached population-wide normalization bounds
//! - train/validate/test partitioning of the id-ordered population
//! - sliding-window distinct-contributor features per commit
//! - regression or threshold target encoding

mod assemble;
mod attributes;
mod config;
mod dataset;
mod features;
mod normalize;
mod observability;
mod partition;
mod schema;
mod stats;
mod store;
mod target;

pub use assemble::{assemble, LabeledTarget, TrainingPair};
pub use attributes::{
    parse_repo_attribute, Bounds, CommitAttribute, RepoAttribute, ALL_COMMIT_ATTRIBUTES,
    ALL_REPO_ATTRIBUTES,
};
pub use config::{
    parse_window_depths, ConfigError, DatasetPlan, DatasetRequest, DEFAULT_MAX_COMMITS,
    DEFAULT_N, DEFAULT_PARTITION, DEFAULT_WINDOWS, MAX_VECTOR_LEN,
};
pub use dataset::{
    build_dataset, build_dataset_from_path, build_dataset_with_plan, DatasetError, DatasetOutput,
};
pub use features::{
    contributor_feature, distinct_contributor_counts, extract_commit_features, ContributorRole,
    FeatureRow, FeatureWindows, SCALAR_FEATURES_PER_COMMIT,
};
pub use normalize::{normalize, DEGENERATE_RANGE_VALUE};
pub use observability::{
    init_logging, log_app_start, log_store_selected, logging_config_from_env,
    logging_config_from_lookup, LogFormat, LoggingConfig, LoggingInitError,
};
pub use partition::{
    clamp_page, parse_dataset_split, parse_partition_ratios, resolve_page, DatasetSplit,
    PageWindow, PartitionRange, PartitionRanges, PartitionRatios,
};
pub use schema::{
    assert_schema_compatible, build_feature_schema, FeatureSchema, SchemaError,
    FEATURE_SCHEMA_VERSION,
};
pub use stats::{GlobalStats, GlobalStatsCache, StatsSnapshot, StatsSource};
pub use store::{
    CommitEvent, RepoStore, RepoTarget, SqliteRepoStore, StoreError, COMMIT_FETCH_CHUNK,
    STATS_ROW_ID,
};
pub use target::{encode_target, TargetMode};
