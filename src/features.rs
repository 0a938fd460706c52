//! Per-commit windowed features.
//!
//! Each retained commit yields one row:
//! - one distinct-author feature per author window depth
//! - one distinct-committer feature per committer window depth
//! - six normalized scalars (see [`ALL_COMMIT_ATTRIBUTES`])
//!
//! A window of depth `w` covers the current commit and the `w - 1` commits
//! before it. Its raw value is the smaller of the distinct-name and
//! distinct-email counts in that slice, so it always lies in `[1, min(w, i + 1)]`.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attributes::ALL_COMMIT_ATTRIBUTES;
use crate::normalize::normalize;
use crate::stats::GlobalStats;
use crate::store::CommitEvent;

pub const SCALAR_FEATURES_PER_COMMIT: usize = ALL_COMMIT_ATTRIBUTES.len();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureWindows {
    pub author: Vec<usize>,
    pub committer: Vec<usize>,
}

impl FeatureWindows {
    pub fn row_width(&self) -> usize {
        self.author.len() + self.committer.len() + SCALAR_FEATURES_PER_COMMIT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContributorRole {
    Author,
    Committer,
}

impl ContributorRole {
    fn identity(self, commit: &CommitEvent) -> (&str, &str) {
        match self {
            Self::Author => (&commit.author_name, &commit.author_email),
            Self::Committer => (&commit.committer_name, &commit.committer_email),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub values: Vec<f64>,
}

impl FeatureRow {
    pub fn zeros(width: usize) -> Self {
        Self {
            values: vec![0.0; width],
        }
    }
}

/// Distinct values among the last `depth` pushed keys.
#[derive(Debug)]
struct RollingDistinct<'a> {
    window: VecDeque<&'a str>,
    counts: HashMap<&'a str, usize>,
    depth: usize,
}

impl<'a> RollingDistinct<'a> {
    /// `expected_len` bounds the allocation; `depth` may far exceed the history.
    fn new(depth: usize, expected_len: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(depth.min(expected_len).saturating_add(1)),
            counts: HashMap::new(),
            depth,
        }
    }

    fn push(&mut self, key: &'a str) -> usize {
        self.window.push_back(key);
        *self.counts.entry(key).or_insert(0) += 1;

        while self.window.len() > self.depth {
            if let Some(evicted) = self.window.pop_front() {
                if let Some(count) = self.counts.get_mut(evicted) {
                    *count -= 1;
                    if *count == 0 {
                        self.counts.remove(evicted);
                    }
                }
            }
        }

        self.counts.len()
    }
}

/// Raw distinct-contributor count for every commit, in the given order.
pub fn distinct_contributor_counts(
    commits: &[&CommitEvent],
    depth: usize,
    role: ContributorRole,
) -> Vec<usize> {
    let mut names = RollingDistinct::new(depth, commits.len());
    let mut emails = RollingDistinct::new(depth, commits.len());

    commits
        .iter()
        .map(|commit| {
            let (name, email) = role.identity(commit);
            let distinct_names = names.push(name);
            let distinct_emails = emails.push(email);
            distinct_names.min(distinct_emails)
        })
        .collect()
}

/// Scales a distinct count into `[-1, 1]` against `[1, depth]`.
pub fn contributor_feature(count: usize, depth: usize) -> f64 {
    normalize(count as f64, 1.0, depth as f64).min(1.0)
}

/// Sorts, truncates and featurizes one repository's commits.
///
/// Always returns exactly `max_commits` rows of width
/// [`FeatureWindows::row_width`]; positions past the last commit are zero rows.
pub fn extract_commit_features(
    repo_id: i64,
    commits: &[CommitEvent],
    stats: &GlobalStats,
    max_commits: usize,
    windows: &FeatureWindows,
) -> Vec<FeatureRow> {
    let mut ordered: Vec<&CommitEvent> = commits.iter().collect();
    // Stable: equal author dates keep store order.
    ordered.sort_by_key(|commit| commit.author_date);
    ordered.truncate(max_commits);

    let author_counts: Vec<(usize, Vec<usize>)> = windows
        .author
        .iter()
        .map(|&depth| {
            (
                depth,
                distinct_contributor_counts(&ordered, depth, ContributorRole::Author),
            )
        })
        .collect();
    let committer_counts: Vec<(usize, Vec<usize>)> = windows
        .committer
        .iter()
        .map(|&depth| {
            (
                depth,
                distinct_contributor_counts(&ordered, depth, ContributorRole::Committer),
            )
        })
        .collect();

    let width = windows.row_width();
    let mut rows = Vec::with_capacity(max_commits);
    for (idx, commit) in ordered.iter().enumerate() {
        let mut values = Vec::with_capacity(width);
        for (depth, counts) in author_counts.iter().chain(committer_counts.iter()) {
            values.push(contributor_feature(counts[idx], *depth));
        }
        for attr in ALL_COMMIT_ATTRIBUTES {
            values.push(stats.commit(attr).normalize(commit.scalar(attr)));
        }
        rows.push(FeatureRow { values });
    }

    let real_rows = rows.len();
    rows.resize_with(max_commits, || FeatureRow::zeros(width));

    debug!(
        component = "features",
        event = "features.repo.extracted",
        repo_id,
        input_commits = commits.len(),
        real_rows,
        padded_rows = max_commits - real_rows,
        row_width = width
    );

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Bounds;

    fn commit(author: &str, email: &str, date: i64) -> CommitEvent {
        CommitEvent {
            repo_id: 1,
            author_name: author.to_string(),
            author_email: email.to_string(),
            committer_name: "ci".to_string(),
            committer_email: "ci@example.com".to_string(),
            author_date: date,
            committer_date: date + 10,
            additions: 10,
            deletions: 2,
            test_additions: 4,
            test_deletions: 0,
        }
    }

    fn stats() -> GlobalStats {
        GlobalStats {
            repo_bounds: [Bounds::new(0.0, 100.0); 4],
            commit_bounds: [
                Bounds::new(0.0, 1_000.0),
                Bounds::new(0.0, 1_000.0),
                Bounds::new(0.0, 20.0),
                Bounds::new(0.0, 4.0),
                Bounds::new(0.0, 8.0),
                Bounds::new(0.0, 0.0),
            ],
            repo_count: 1,
            commit_count: 3,
            computed_at_ms: 0,
        }
    }

    #[test]
    fn counts_stay_within_window_bounds() {
        let authors = ["a", "b", "c", "a", "d", "e", "e", "f", "b", "g"];
        let commits: Vec<CommitEvent> = authors
            .iter()
            .enumerate()
            .map(|(i, a)| commit(a, &format!("{a}@x"), i as i64))
            .collect();
        let refs: Vec<&CommitEvent> = commits.iter().collect();

        for depth in [1, 2, 3, 5, 15] {
            let counts = distinct_contributor_counts(&refs, depth, ContributorRole::Author);
            for (i, count) in counts.iter().enumerate() {
                assert!(*count >= 1);
                assert!(*count <= depth.min(i + 1), "depth={depth} i={i} count={count}");
            }
        }
    }

    #[test]
    fn window_includes_current_commit_and_evicts_old_ones() {
        let commits = vec![
            commit("a", "a@x", 1),
            commit("b", "b@x", 2),
            commit("a", "a@x", 3),
            commit("c", "c@x", 4),
        ];
        let refs: Vec<&CommitEvent> = commits.iter().collect();

        assert_eq!(
            distinct_contributor_counts(&refs, 2, ContributorRole::Author),
            vec![1, 2, 2, 2]
        );
        assert_eq!(
            distinct_contributor_counts(&refs, 3, ContributorRole::Author),
            vec![1, 2, 2, 3]
        );
        assert_eq!(
            distinct_contributor_counts(&refs, 3, ContributorRole::Committer),
            vec![1, 1, 1, 1]
        );
    }

    #[test]
    fn minimum_of_name_and_email_counts_is_used() {
        // Same person, two email addresses.
        let commits = vec![
            commit("alice", "alice@home", 1),
            commit("alice", "alice@work", 2),
            // Two people sharing one email.
            commit("bob", "team@x", 3),
            commit("carol", "team@x", 4),
        ];
        let refs: Vec<&CommitEvent> = commits.iter().collect();

        assert_eq!(
            distinct_contributor_counts(&refs, 2, ContributorRole::Author),
            vec![1, 1, 2, 1]
        );
    }

    #[test]
    fn depth_beyond_history_counts_every_commit_so_far() {
        let commits = vec![
            commit("a", "a@x", 1),
            commit("b", "b@x", 2),
            commit("a", "a@x", 3),
            commit("c", "c@x", 4),
        ];
        let refs: Vec<&CommitEvent> = commits.iter().collect();

        for depth in [4, 1_000_000_000_000, usize::MAX] {
            assert_eq!(
                distinct_contributor_counts(&refs, depth, ContributorRole::Author),
                vec![1, 2, 2, 3],
                "depth={depth}"
            );
        }
        assert_eq!(contributor_feature(3, usize::MAX), normalize(3.0, 1.0, usize::MAX as f64));
    }

    #[test]
    fn contributor_feature_scales_and_clamps() {
        assert_eq!(contributor_feature(1, 3), -1.0);
        assert_eq!(contributor_feature(2, 3), 0.0);
        assert_eq!(contributor_feature(3, 3), 1.0);
        assert_eq!(contributor_feature(5, 3), 1.0);
        assert_eq!(contributor_feature(1, 1), 0.0);
    }

    #[test]
    fn rows_are_sorted_truncated_and_padded() {
        let commits = vec![
            commit("c", "c@x", 300),
            commit("a", "a@x", 100),
            commit("b", "b@x", 200),
        ];
        let windows = FeatureWindows {
            author: vec![2],
            committer: vec![3],
        };

        let rows = extract_commit_features(1, &commits, &stats(), 2, &windows);
        assert_eq!(rows.len(), 2);
        // Earliest two commits survive: dates 100 and 200.
        assert_eq!(rows[0].values[2], normalize(100.0, 0.0, 1_000.0));
        assert_eq!(rows[1].values[2], normalize(200.0, 0.0, 1_000.0));

        let rows = extract_commit_features(1, &commits, &stats(), 5, &windows);
        assert_eq!(rows.len(), 5);
        for row in &rows {
            assert_eq!(row.values.len(), windows.row_width());
        }
        for row in &rows[3..] {
            assert!(row.values.iter().all(|v| *v == 0.0));
        }
    }

    #[test]
    fn row_layout_matches_feature_order() {
        let commits = vec![commit("a", "a@x", 500)];
        let windows = FeatureWindows {
            author: vec![3],
            committer: vec![2],
        };

        let rows = extract_commit_features(1, &commits, &stats(), 1, &windows);
        let values = &rows[0].values;
        assert_eq!(values.len(), 8);
        assert_eq!(values[0], -1.0);
        assert_eq!(values[1], -1.0);
        assert_eq!(values[2], 0.0);
        assert_eq!(values[3], normalize(510.0, 0.0, 1_000.0));
        assert_eq!(values[4], 0.0);
        assert_eq!(values[5], 0.0);
        assert_eq!(values[6], 0.0);
        // Degenerate test_deletions bounds.
        assert_eq!(values[7], 0.0);
    }

    #[test]
    fn equal_author_dates_keep_input_order() {
        let mut commits = vec![
            commit("first", "first@x", 7),
            commit("second", "second@x", 7),
        ];
        commits[1].additions = 20;
        let windows = FeatureWindows {
            author: vec![],
            committer: vec![],
        };

        let rows = extract_commit_features(1, &commits, &stats(), 2, &windows);
        assert_eq!(rows[0].values[2], 0.0);
        assert_eq!(rows[1].values[2], 1.0);
    }
}
