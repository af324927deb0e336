use super::valid_rating;
use crate::models::{NeighborRating, RatingEdge};
use std::collections::HashSet;
use tracing::warn;

/// Per-call snapshot of the target user's co-rating neighborhood.
///
/// Built once per `recommend` call and handed by reference to both candidate
/// generators, so the collaborative and content paths never see divergent
/// neighbor sets.
#[derive(Debug, Clone, Default)]
pub(crate) struct Neighborhood {
    /// Users sharing enough highly-rated movies with the target.
    pub neighbors: Vec<String>,
    /// Every rating edge owned by a neighbor, in (user, movie) order.
    /// Malformed edges are dropped at construction.
    pub neighbor_ratings: Vec<NeighborRating>,
    /// Movie ids the target user has already rated, regardless of rating
    /// value: a movie stays excluded from candidates even when its own edge
    /// is malformed.
    pub seen: HashSet<String>,
}

impl Neighborhood {
    pub fn new(
        neighbors: Vec<String>,
        neighbor_ratings: Vec<NeighborRating>,
        own_edges: &[RatingEdge],
    ) -> Self {
        let seen = own_edges.iter().map(|e| e.movie_id.clone()).collect();

        let neighbor_ratings = neighbor_ratings
            .into_iter()
            .filter(|edge| {
                if valid_rating(edge.rating) {
                    return true;
                }
                warn!(
                    user_id = %edge.user_id,
                    movie_id = %edge.movie_id,
                    rating = edge.rating,
                    "skipping malformed neighbor rating edge"
                );
                false
            })
            .collect();

        Self {
            neighbors,
            neighbor_ratings,
            seen,
        }
    }
}
