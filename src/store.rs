//! Store access for repositories, commits and the cached global statistics row.

use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::attributes::{Bounds, CommitAttribute, RepoAttribute};
use crate::stats::GlobalStats;

pub const STATS_ROW_ID: i64 = 1;

/// Repository ids bound per commit query; stays under SQLite's host parameter limit.
pub const COMMIT_FETCH_CHUNK: usize = 10_000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEvent {
    pub repo_id: i64,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub committer_email: String,
    pub author_date: i64,
    pub committer_date: i64,
    pub additions: i64,
    pub deletions: i64,
    pub test_additions: i64,
    pub test_deletions: i64,
}

impl CommitEvent {
    pub fn scalar(&self, attr: CommitAttribute) -> f64 {
        match attr {
            CommitAttribute::AuthorDate => self.author_date as f64,
            CommitAttribute::CommitterDate => self.committer_date as f64,
            CommitAttribute::Additions => self.additions as f64,
            CommitAttribute::Deletions => self.deletions as f64,
            CommitAttribute::TestAdditions => self.test_additions as f64,
            CommitAttribute::TestDeletions => self.test_deletions as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepoTarget {
    pub repo_id: i64,
    pub raw_value: f64,
}

/// Read/write surface the dataset pipeline needs from the relational store.
pub trait RepoStore {
    fn count_commits(&self) -> Result<u64, StoreError>;

    /// Full min/max/count aggregation over `repos` and `commits`.
    /// `computed_at_ms` is left at zero for the caller to stamp.
    fn aggregate_stats(&self) -> Result<GlobalStats, StoreError>;

    fn load_stats(&self) -> Result<Option<GlobalStats>, StoreError>;

    fn save_stats(&self, stats: &GlobalStats) -> Result<(), StoreError>;

    /// Target values ordered by repository id ascending.
    fn fetch_targets(
        &self,
        column: RepoAttribute,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<RepoTarget>, StoreError>;

    fn fetch_target_by_id(
        &self,
        column: RepoAttribute,
        repo_id: i64,
    ) -> Result<Option<RepoTarget>, StoreError>;

    /// Commits for the given repositories in store-native order.
    fn fetch_commits(&self, repo_ids: &[i64]) -> Result<Vec<CommitEvent>, StoreError>;
}

pub struct SqliteRepoStore {
    conn: Connection,
}

impl SqliteRepoStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        ensure_stats_table(&conn)?;
        Ok(Self { conn })
    }
}

impl RepoStore for SqliteRepoStore {
    fn count_commits(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM commits", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn aggregate_stats(&self) -> Result<GlobalStats, StoreError> {
        let (repo_count, repo_bounds) = self.conn.query_row(
            "
            SELECT
                COUNT(*),
                MIN(stargazers_count), MAX(stargazers_count),
                MIN(forks_count), MAX(forks_count),
                MIN(watchers_count), MAX(watchers_count),
                MIN(subscribers_count), MAX(subscribers_count)
            FROM repos
            ",
            [],
            |row| Ok((row.get::<_, i64>(0)?, read_bounds::<4>(row, 1)?)),
        )?;

        let (commit_count, commit_bounds) = self.conn.query_row(
            "
            SELECT
                COUNT(*),
                MIN(author_date), MAX(author_date),
                MIN(committer_date), MAX(committer_date),
                MIN(additions), MAX(additions),
                MIN(deletions), MAX(deletions),
                MIN(test_additions), MAX(test_additions),
                MIN(test_deletions), MAX(test_deletions)
            FROM commits
            ",
            [],
            |row| Ok((row.get::<_, i64>(0)?, read_bounds::<6>(row, 1)?)),
        )?;

        debug!(
            component = "store",
            event = "store.stats.aggregated",
            repo_count,
            commit_count
        );

        Ok(GlobalStats {
            repo_bounds,
            commit_bounds,
            repo_count: repo_count.max(0) as u64,
            commit_count: commit_count.max(0) as u64,
            computed_at_ms: 0,
        })
    }

    fn load_stats(&self) -> Result<Option<GlobalStats>, StoreError> {
        let stats = self
            .conn
            .query_row(
                "
                SELECT
                    stargazers_count_min, stargazers_count_max,
                    forks_count_min, forks_count_max,
                    watchers_count_min, watchers_count_max,
                    subscribers_count_min, subscribers_count_max,
                    author_date_min, author_date_max,
                    committer_date_min, committer_date_max,
                    additions_min, additions_max,
                    deletions_min, deletions_max,
                    test_additions_min, test_additions_max,
                    test_deletions_min, test_deletions_max,
                    repo_count,
                    commit_count,
                    computed_at_ms
                FROM github_stats
                WHERE id = ?1
                ",
                params![STATS_ROW_ID],
                |row| {
                    Ok(GlobalStats {
                        repo_bounds: read_bounds::<4>(row, 0)?,
                        commit_bounds: read_bounds::<6>(row, 8)?,
                        repo_count: row.get::<_, i64>(20)?.max(0) as u64,
                        commit_count: row.get::<_, i64>(21)?.max(0) as u64,
                        computed_at_ms: row.get(22)?,
                    })
                },
            )
            .optional()?;
        Ok(stats)
    }

    fn save_stats(&self, stats: &GlobalStats) -> Result<(), StoreError> {
        let r = &stats.repo_bounds;
        let c = &stats.commit_bounds;
        self.conn.execute(
            "
            INSERT INTO github_stats (
                id,
                stargazers_count_min, stargazers_count_max,
                forks_count_min, forks_count_max,
                watchers_count_min, watchers_count_max,
                subscribers_count_min, subscribers_count_max,
                author_date_min, author_date_max,
                committer_date_min, committer_date_max,
                additions_min, additions_max,
                deletions_min, deletions_max,
                test_additions_min, test_additions_max,
                test_deletions_min, test_deletions_max,
                repo_count,
                commit_count,
                computed_at_ms
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24
            )
            ON CONFLICT(id) DO UPDATE SET
                stargazers_count_min = excluded.stargazers_count_min,
                stargazers_count_max = excluded.stargazers_count_max,
                forks_count_min = excluded.forks_count_min,
                forks_count_max = excluded.forks_count_max,
                watchers_count_min = excluded.watchers_count_min,
                watchers_count_max = excluded.watchers_count_max,
                subscribers_count_min = excluded.subscribers_count_min,
                subscribers_count_max = excluded.subscribers_count_max,
                author_date_min = excluded.author_date_min,
                author_date_max = excluded.author_date_max,
                committer_date_min = excluded.committer_date_min,
                committer_date_max = excluded.committer_date_max,
                additions_min = excluded.additions_min,
                additions_max = excluded.additions_max,
                deletions_min = excluded.deletions_min,
                deletions_max = excluded.deletions_max,
                test_additions_min = excluded.test_additions_min,
                test_additions_max = excluded.test_additions_max,
                test_deletions_min = excluded.test_deletions_min,
                test_deletions_max = excluded.test_deletions_max,
                repo_count = excluded.repo_count,
                commit_count = excluded.commit_count,
                computed_at_ms = excluded.computed_at_ms
            ",
            params![
                STATS_ROW_ID,
                r[0].min,
                r[0].max,
                r[1].min,
                r[1].max,
                r[2].min,
                r[2].max,
                r[3].min,
                r[3].max,
                c[0].min,
                c[0].max,
                c[1].min,
                c[1].max,
                c[2].min,
                c[2].max,
                c[3].min,
                c[3].max,
                c[4].min,
                c[4].max,
                c[5].min,
                c[5].max,
                stats.repo_count as i64,
                stats.commit_count as i64,
                stats.computed_at_ms,
            ],
        )?;
        Ok(())
    }

    fn fetch_targets(
        &self,
        column: RepoAttribute,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<RepoTarget>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, COALESCE({}, 0) FROM repos ORDER BY id ASC LIMIT ?1 OFFSET ?2",
            column.column()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], read_target)?;
        let targets = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    fn fetch_target_by_id(
        &self,
        column: RepoAttribute,
        repo_id: i64,
    ) -> Result<Option<RepoTarget>, StoreError> {
        let sql = format!(
            "SELECT id, COALESCE({}, 0) FROM repos WHERE id = ?1",
            column.column()
        );
        let target = self
            .conn
            .query_row(&sql, params![repo_id], read_target)
            .optional()?;
        Ok(target)
    }

    fn fetch_commits(&self, repo_ids: &[i64]) -> Result<Vec<CommitEvent>, StoreError> {
        let mut commits = Vec::new();
        for chunk in repo_ids.chunks(COMMIT_FETCH_CHUNK) {
            commits.extend(self.fetch_commit_chunk(chunk)?);
        }
        Ok(commits)
    }
}

impl SqliteRepoStore {
    fn fetch_commit_chunk(&self, repo_ids: &[i64]) -> Result<Vec<CommitEvent>, StoreError> {
        let placeholders = (1..=repo_ids.len())
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "
            SELECT
                repo_id,
                COALESCE(author_name, ''),
                COALESCE(author_email, ''),
                COALESCE(committer_name, ''),
                COALESCE(committer_email, ''),
                CAST(COALESCE(author_date, 0) AS INTEGER),
                CAST(COALESCE(committer_date, 0) AS INTEGER),
                CAST(COALESCE(additions, 0) AS INTEGER),
                CAST(COALESCE(deletions, 0) AS INTEGER),
                CAST(COALESCE(test_additions, 0) AS INTEGER),
                CAST(COALESCE(test_deletions, 0) AS INTEGER)
            FROM commits
            WHERE repo_id IN ({placeholders})
            ORDER BY repo_id ASC, rowid ASC
            "
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(repo_ids.iter()), |row| {
            Ok(CommitEvent {
                repo_id: row.get(0)?,
                author_name: row.get(1)?,
                author_email: row.get(2)?,
                committer_name: row.get(3)?,
                committer_email: row.get(4)?,
                author_date: row.get(5)?,
                committer_date: row.get(6)?,
                additions: row.get(7)?,
                deletions: row.get(8)?,
                test_additions: row.get(9)?,
                test_deletions: row.get(10)?,
            })
        })?;
        let commits = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(commits)
    }
}

fn ensure_stats_table(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS github_stats (
            id INTEGER PRIMARY KEY,
            stargazers_count_min REAL NOT NULL,
            stargazers_count_max REAL NOT NULL,
            forks_count_min REAL NOT NULL,
            forks_count_max REAL NOT NULL,
            watchers_count_min REAL NOT NULL,
            watchers_count_max REAL NOT NULL,
            subscribers_count_min REAL NOT NULL,
            subscribers_count_max REAL NOT NULL,
            author_date_min REAL NOT NULL,
            author_date_max REAL NOT NULL,
            committer_date_min REAL NOT NULL,
            committer_date_max REAL NOT NULL,
            additions_min REAL NOT NULL,
            additions_max REAL NOT NULL,
            deletions_min REAL NOT NULL,
            deletions_max REAL NOT NULL,
            test_additions_min REAL NOT NULL,
            test_additions_max REAL NOT NULL,
            test_deletions_min REAL NOT NULL,
            test_deletions_max REAL NOT NULL,
            repo_count INTEGER NOT NULL,
            commit_count INTEGER NOT NULL,
            computed_at_ms INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}

// NULL aggregates (empty tables) read as a zero-width range.
fn read_bounds<const N: usize>(row: &Row<'_>, first: usize) -> rusqlite::Result<[Bounds; N]> {
    let mut bounds = [Bounds::default(); N];
    for (idx, slot) in bounds.iter_mut().enumerate() {
        let min: Option<f64> = row.get(first + idx * 2)?;
        let max: Option<f64> = row.get(first + idx * 2 + 1)?;
        *slot = Bounds::new(min.unwrap_or(0.0), max.unwrap_or(0.0));
    }
    Ok(bounds)
}

fn read_target(row: &Row<'_>) -> rusqlite::Result<RepoTarget> {
    Ok(RepoTarget {
        repo_id: row.get(0)?,
        raw_value: row.get(1)?,
    })
}
