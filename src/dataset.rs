//! End-to-end dataset build for one request.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::assemble::{assemble, LabeledTarget, TrainingPair};
use crate::config::{ConfigError, DatasetPlan, DatasetRequest};
use crate::features::extract_commit_features;
use crate::partition::{resolve_page, DatasetSplit, PageWindow};
use crate::schema::{
    assert_schema_compatible, build_feature_schema, FeatureSchema, SchemaError,
    FEATURE_SCHEMA_VERSION,
};
use crate::stats::GlobalStatsCache;
use crate::store::{CommitEvent, RepoStore, SqliteRepoStore, StoreError};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOutput {
    pub schema: FeatureSchema,
    pub split: DatasetSplit,
    /// `None` when a forced id bypassed partitioning.
    pub window: Option<PageWindow>,
    pub pairs: Vec<TrainingPair>,
}

pub fn build_dataset<S: RepoStore + ?Sized>(
    store: &S,
    request: &DatasetRequest,
) -> Result<DatasetOutput, DatasetError> {
    let plan = request.plan().map_err(|err| {
        error!(
            component = "dataset",
            event = "dataset.build.error",
            stage = "plan",
            error = %err
        );
        err
    })?;

    build_dataset_with_plan(store, &plan).map_err(|err| {
        error!(
            component = "dataset",
            event = "dataset.build.error",
            stage = "build",
            error = %err
        );
        err
    })
}

/// Opens the SQLite store at `store_path` for the duration of one build.
pub fn build_dataset_from_path(
    store_path: &Path,
    request: &DatasetRequest,
) -> Result<DatasetOutput, DatasetError> {
    // Validate before touching the store.
    request.plan()?;
    let store = SqliteRepoStore::open(store_path)?;
    build_dataset(&store, request)
}

pub fn build_dataset_with_plan<S: RepoStore + ?Sized>(
    store: &S,
    plan: &DatasetPlan,
) -> Result<DatasetOutput, DatasetError> {
    info!(
        component = "dataset",
        event = "dataset.build.start",
        split = plan.split.as_str(),
        n = plan.n,
        o = plan.o,
        hard_limit = ?plan.hard_limit,
        forced_id = ?plan.forced_id,
        target_column = plan.target_column.column(),
        target_mode = ?plan.target_mode,
        max_commits = plan.max_commits,
        author_windows = ?plan.windows.author,
        committer_windows = ?plan.windows.committer
    );

    let schema = build_feature_schema(&plan.windows, plan.max_commits);
    if let Some(expected) = &plan.expected_schema_fingerprint {
        assert_schema_compatible(FEATURE_SCHEMA_VERSION, expected, &schema)?;
    }
    let snapshot = GlobalStatsCache::new(store).get(plan.refresh_stats)?;
    let stats = &snapshot.stats;

    let (targets, window) = match plan.forced_id {
        Some(repo_id) => {
            let target = store.fetch_target_by_id(plan.target_column, repo_id)?;
            (target.into_iter().collect::<Vec<_>>(), None)
        }
        None => {
            let page = resolve_page(
                &plan.partition,
                plan.split,
                plan.n,
                plan.o,
                stats.repo_count,
                plan.hard_limit,
            );
            let targets = store.fetch_targets(plan.target_column, page.offset, page.count)?;
            (targets, Some(page))
        }
    };

    info!(
        component = "dataset",
        event = "dataset.selection.resolved",
        split = plan.split.as_str(),
        total_repos = stats.repo_count,
        window_offset = ?window.map(|w| w.offset),
        window_count = ?window.map(|w| w.count),
        selected = targets.len()
    );

    let column_bounds = stats.repo(plan.target_column);
    let labeled: Vec<LabeledTarget> = targets
        .iter()
        .map(|target| LabeledTarget {
            repo_id: target.repo_id,
            label: plan.target_mode.encode(target.raw_value, column_bounds),
        })
        .collect();

    let repo_ids: Vec<i64> = labeled.iter().map(|target| target.repo_id).collect();
    let commits = store.fetch_commits(&repo_ids)?;
    let commit_count = commits.len();

    let features: HashMap<i64, _> = group_by_repo(commits)
        .into_iter()
        .map(|(repo_id, repo_commits)| {
            let rows = extract_commit_features(
                repo_id,
                &repo_commits,
                stats,
                plan.max_commits,
                &plan.windows,
            );
            (repo_id, rows)
        })
        .collect();

    let pairs = assemble(&labeled, &features, plan.max_commits, plan.row_width());

    info!(
        component = "dataset",
        event = "dataset.build.finish",
        split = plan.split.as_str(),
        pairs = pairs.len(),
        commits = commit_count,
        vector_len = schema.vector_len,
        stats_refreshed = snapshot.source.was_refreshed()
    );

    Ok(DatasetOutput {
        schema,
        split: plan.split,
        window,
        pairs,
    })
}

fn group_by_repo(commits: Vec<CommitEvent>) -> BTreeMap<i64, Vec<CommitEvent>> {
    let mut grouped: BTreeMap<i64, Vec<CommitEvent>> = BTreeMap::new();
    for commit in commits {
        grouped.entry(commit.repo_id).or_default().push(commit);
    }
    grouped
}
