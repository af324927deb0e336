use super::{MetadataStore, RatingStore, StoreError};
use crate::models::{MovieDetails, NeighborRating, RatingEdge};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Deterministic in-memory rating + metadata store.
///
/// Ratings upsert by (user, movie) pair, matching the ingestion invariant of
/// the production graph. Every query result comes back sorted so map
/// iteration order never leaks into engine output.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    /// user -> movie -> (rating, timestamp)
    ratings: BTreeMap<String, BTreeMap<String, (f64, i64)>>,
    movies: BTreeMap<String, MovieDetails>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_movie(mut self, movie_id: &str, title: &str, genres: &[&str]) -> Self {
        self.insert_movie(movie_id, title, genres);
        self
    }

    pub fn with_rating(mut self, user_id: &str, movie_id: &str, rating: f64) -> Self {
        self.insert_rating(user_id, movie_id, rating, 0);
        self
    }

    pub fn insert_movie(&mut self, movie_id: &str, title: &str, genres: &[&str]) {
        self.movies.insert(
            movie_id.to_string(),
            MovieDetails {
                title: title.to_string(),
                genres: genres.iter().map(|g| g.to_string()).collect(),
            },
        );
    }

    /// Upserts the (user, movie) edge; a re-rating replaces the old value.
    pub fn insert_rating(&mut self, user_id: &str, movie_id: &str, rating: f64, timestamp: i64) {
        self.ratings
            .entry(user_id.to_string())
            .or_default()
            .insert(movie_id.to_string(), (rating, timestamp));
    }
}

#[async_trait]
impl RatingStore for MemoryStore {
    async fn ratings_of(&self, user_id: &str) -> Result<Vec<RatingEdge>, StoreError> {
        let Some(edges) = self.ratings.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut out: Vec<RatingEdge> = edges
            .iter()
            .map(|(movie_id, &(rating, timestamp))| RatingEdge {
                movie_id: movie_id.clone(),
                rating,
                timestamp,
            })
            .collect();

        out.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.movie_id.cmp(&b.movie_id))
        });

        Ok(out)
    }

    async fn co_raters(
        &self,
        user_id: &str,
        min_rating: f64,
        min_common: u32,
    ) -> Result<Vec<String>, StoreError> {
        // Inverted index: movie -> users who rated it >= min_rating.
        let mut high_raters: HashMap<&str, Vec<&str>> = HashMap::new();
        for (user, edges) in &self.ratings {
            for (movie, &(rating, _)) in edges {
                if rating >= min_rating {
                    high_raters
                        .entry(movie.as_str())
                        .or_default()
                        .push(user.as_str());
                }
            }
        }

        let Some(own) = self.ratings.get(user_id) else {
            return Ok(Vec::new());
        };

        // Intersect rater sets across the target's own highly-rated movies.
        let mut shared: BTreeMap<&str, u32> = BTreeMap::new();
        for (movie, &(rating, _)) in own {
            if rating < min_rating {
                continue;
            }
            for &other in high_raters.get(movie.as_str()).into_iter().flatten() {
                if other != user_id {
                    *shared.entry(other).or_insert(0) += 1;
                }
            }
        }

        Ok(shared
            .into_iter()
            .filter(|&(_, count)| count >= min_common)
            .map(|(user, _)| user.to_string())
            .collect())
    }

    async fn ratings_of_users(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<NeighborRating>, StoreError> {
        let wanted: HashSet<&str> = user_ids.iter().map(String::as_str).collect();

        // BTreeMap iteration already yields (user, movie) ascending order.
        let mut out = Vec::new();
        for (user, edges) in &self.ratings {
            if !wanted.contains(user.as_str()) {
                continue;
            }
            for (movie, &(rating, _)) in edges {
                out.push(NeighborRating {
                    user_id: user.clone(),
                    movie_id: movie.clone(),
                    rating,
                });
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn movie_by_id(&self, movie_id: &str) -> Result<Option<MovieDetails>, StoreError> {
        Ok(self.movies.get(movie_id).cloned())
    }

    async fn movies_by_ids(
        &self,
        movie_ids: &[String],
    ) -> Result<HashMap<String, MovieDetails>, StoreError> {
        Ok(movie_ids
            .iter()
            .filter_map(|id| self.movies.get(id).map(|details| (id.clone(), details.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_user_store() -> MemoryStore {
        // a and b share three movies rated >= 4 by both; c shares only two.
        MemoryStore::new()
            .with_rating("a", "m1", 5.0)
            .with_rating("a", "m2", 4.0)
            .with_rating("a", "m3", 4.5)
            .with_rating("b", "m1", 4.0)
            .with_rating("b", "m2", 5.0)
            .with_rating("b", "m3", 4.0)
            .with_rating("c", "m1", 5.0)
            .with_rating("c", "m2", 4.5)
            .with_rating("c", "m3", 3.5)
    }

    #[tokio::test]
    async fn test_co_raters_threshold() {
        let store = three_user_store();

        let neighbors = store.co_raters("a", 4.0, 3).await.unwrap();
        assert_eq!(neighbors, vec!["b".to_string()]);

        // Lowering the common-movie bar admits c as well.
        let neighbors = store.co_raters("a", 4.0, 2).await.unwrap();
        assert_eq!(neighbors, vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_co_raters_unknown_user_is_empty() {
        let store = three_user_store();
        let neighbors = store.co_raters("nobody", 4.0, 3).await.unwrap();
        assert!(neighbors.is_empty());
    }

    #[test]
    fn test_ratings_of_orders_by_rating_then_movie() {
        let store = MemoryStore::new()
            .with_rating("a", "m2", 4.0)
            .with_rating("a", "m1", 4.0)
            .with_rating("a", "m3", 5.0);

        let edges = tokio_test::block_on(store.ratings_of("a")).unwrap();
        let ids: Vec<&str> = edges.iter().map(|e| e.movie_id.as_str()).collect();
        assert_eq!(ids, vec!["m3", "m1", "m2"]);
    }

    #[tokio::test]
    async fn test_rating_upsert_replaces_edge() {
        let mut store = MemoryStore::new();
        store.insert_rating("a", "m1", 2.0, 100);
        store.insert_rating("a", "m1", 4.5, 200);

        let edges = store.ratings_of("a").await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].rating, 4.5);
        assert_eq!(edges[0].timestamp, 200);
    }

    #[tokio::test]
    async fn test_movies_by_ids_skips_unknown() {
        let store = MemoryStore::new().with_movie("m1", "Heat", &["Action", "Crime"]);

        let found = store
            .movies_by_ids(&["m1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["m1"].title, "Heat");

        assert!(store.movie_by_id("missing").await.unwrap().is_none());
    }
}
