//! Closed sets of normalizable repository and commit attributes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepoAttribute {
    Stargazers,
    Forks,
    Watchers,
    Subscribers,
}

pub const ALL_REPO_ATTRIBUTES: [RepoAttribute; 4] = [
    RepoAttribute::Stargazers,
    RepoAttribute::Forks,
    RepoAttribute::Watchers,
    RepoAttribute::Subscribers,
];

impl RepoAttribute {
    pub fn column(self) -> &'static str {
        match self {
            Self::Stargazers => "stargazers_count",
            Self::Forks => "forks_count",
            Self::Watchers => "watchers_count",
            Self::Subscribers => "subscribers_count",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Stargazers => 0,
            Self::Forks => 1,
            Self::Watchers => 2,
            Self::Subscribers => 3,
        }
    }
}

/// Accepts the full column name or its short alias (`stars`, `forks`, ...).
pub fn parse_repo_attribute(input: &str) -> Option<RepoAttribute> {
    match input.trim().to_ascii_lowercase().as_str() {
        "stargazers_count" | "stargazers" | "stars" => Some(RepoAttribute::Stargazers),
        "forks_count" | "forks" => Some(RepoAttribute::Forks),
        "watchers_count" | "watchers" => Some(RepoAttribute::Watchers),
        "subscribers_count" | "subscribers" => Some(RepoAttribute::Subscribers),
        _ => None,
    }
}

/// Commit scalars in feature-row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitAttribute {
    AuthorDate,
    CommitterDate,
    Additions,
    Deletions,
    TestAdditions,
    TestDeletions,
}

pub const ALL_COMMIT_ATTRIBUTES: [CommitAttribute; 6] = [
    CommitAttribute::AuthorDate,
    CommitAttribute::CommitterDate,
    CommitAttribute::Additions,
    CommitAttribute::Deletions,
    CommitAttribute::TestAdditions,
    CommitAttribute::TestDeletions,
];

impl CommitAttribute {
    pub fn column(self) -> &'static str {
        match self {
            Self::AuthorDate => "author_date",
            Self::CommitterDate => "committer_date",
            Self::Additions => "additions",
            Self::Deletions => "deletions",
            Self::TestAdditions => "test_additions",
            Self::TestDeletions => "test_deletions",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::AuthorDate => 0,
            Self::CommitterDate => 1,
            Self::Additions => 2,
            Self::Deletions => 3,
            Self::TestAdditions => 4,
            Self::TestDeletions => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn normalize(&self, value: f64) -> f64 {
        crate::normalize::normalize(value, self.min, self.max)
    }
}
