//! Search types and options.

use super::Metadata;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default number of results returned by a search.
pub const DEFAULT_TOP_K: usize = 10;

/// Options for a similarity search.
///
/// # Example
///
/// ```rust
/// use vecstore::SearchOptions;
///
/// let options = SearchOptions::new()
///     .with_top_k(5)
///     .with_threshold(0.7)
///     .excluding("self-id");
/// assert!(options.is_excluded("self-id"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Maximum number of hits.
    pub top_k: usize,
    /// Minimum score a hit must reach.
    pub threshold: f32,
    /// Ids never returned.
    pub exclude: HashSet<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchOptions {
    /// Creates options with `top_k = 10`, `threshold = 0.0` and no exclusions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            threshold: 0.0,
            exclude: HashSet::new(),
        }
    }

    /// Sets the maximum number of hits.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Sets the minimum score.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Excludes one id from the results.
    #[must_use]
    pub fn excluding(mut self, id: impl Into<String>) -> Self {
        self.exclude.insert(id.into());
        self
    }

    /// Excludes several ids from the results.
    #[must_use]
    pub fn excluding_all<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Returns true if the id is excluded.
    #[must_use]
    pub fn is_excluded(&self, id: &str) -> bool {
        self.exclude.contains(id)
    }
}

/// A single ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// External record id.
    pub id: String,
    /// Similarity score (larger is closer).
    pub score: f32,
    /// Metadata stored with the record, empty if none.
    pub metadata: Metadata,
}
