use crate::models::{MovieDetails, NeighborRating, RatingEdge};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Error surfaced by store implementations.
///
/// A user or movie that does not exist is never an error: lookups resolve to
/// empty collections (or `None`), keeping "no history" distinguishable from
/// "store down" for the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable during {op}: {message}")]
    Unavailable { op: &'static str, message: String },
}

impl StoreError {
    pub fn unavailable(op: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            op,
            message: err.to_string(),
        }
    }
}

/// Read-side query surface over the rating graph.
/// Both `Neo4jStore` (production) and `MemoryStore` (tests, embedding)
/// implement this.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Every rating edge owned by `user_id`, ordered by rating descending
    /// then movie id ascending. Empty when the user has no history.
    async fn ratings_of(&self, user_id: &str) -> Result<Vec<RatingEdge>, StoreError>;

    /// Users sharing at least `min_common` movies rated `>= min_rating` by
    /// both themselves and `user_id`, ordered by user id ascending. Never
    /// contains `user_id` itself.
    async fn co_raters(
        &self,
        user_id: &str,
        min_rating: f64,
        min_common: u32,
    ) -> Result<Vec<String>, StoreError>;

    /// Every rating edge owned by any of `user_ids`, ordered by
    /// (user id, movie id) ascending.
    async fn ratings_of_users(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<NeighborRating>, StoreError>;
}

/// Read-side query surface over movie metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn movie_by_id(&self, movie_id: &str) -> Result<Option<MovieDetails>, StoreError>;

    /// Batched lookup. Unknown ids are absent from the result map rather
    /// than being an error.
    async fn movies_by_ids(
        &self,
        movie_ids: &[String],
    ) -> Result<HashMap<String, MovieDetails>, StoreError>;
}
