mod collaborative;
mod content;
mod neighbors;

use crate::config::{EngineConfig, TitleOrder};
use crate::models::{CandidateSource, MovieDetails, RatedMovie, Recommendation};
use crate::store::{MetadataStore, RatingStore, StoreError};
use neighbors::Neighborhood;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};

/// Shared highly-rated movie count required to treat two users as neighbors.
const MIN_SHARED_HIGH_RATINGS: u32 = 3;
/// Rating floor for an edge to count toward neighbor qualification.
const HIGH_RATING_FLOOR: f64 = 4.0;
/// Output size for every operation unless the caller asks for less.
pub const DEFAULT_LIMIT: usize = 10;
/// Number of preferred genres inferred from the neighborhood.
const TOP_GENRE_COUNT: usize = 3;
/// Collaborative result size below which the content path joins the merge.
const CONTENT_FALLBACK_THRESHOLD: usize = 3;
/// Valid rating bounds; edges outside are skipped as malformed.
const RATING_MIN: f64 = 0.0;
const RATING_MAX: f64 = 5.0;

pub(crate) fn valid_rating(rating: f64) -> bool {
    (RATING_MIN..=RATING_MAX).contains(&rating)
}

/// Error surfaced by engine operations.
///
/// "No recommendations" is never an error; this only reports a store that
/// stayed unreachable through the bounded retry.
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("recommendation aborted: {source}")]
    StoreUnavailable {
        #[from]
        source: StoreError,
    },
}

/// Recommendation engine over a rating graph and a movie catalog.
///
/// Combines collaborative filtering over co-rating neighborhoods with
/// content-based filtering over genre overlap. Both stores are injected
/// capabilities; the engine holds no other state, so independent calls are
/// freely concurrent.
pub struct RecommendationEngine {
    ratings: Arc<dyn RatingStore>,
    metadata: Arc<dyn MetadataStore>,
    config: EngineConfig,
}

impl RecommendationEngine {
    pub fn new(
        ratings: Arc<dyn RatingStore>,
        metadata: Arc<dyn MetadataStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ratings,
            metadata,
            config,
        }
    }

    /// Every movie the user has rated, best-rated first (title ascending on
    /// equal ratings). Empty for an unknown user.
    pub async fn rated_movies(&self, user_id: &str) -> Result<Vec<RatedMovie>, RecommendError> {
        let edges = self
            .guarded("ratings_of", Vec::new(), || self.ratings.ratings_of(user_id))
            .await?;

        let edges: Vec<_> = edges
            .into_iter()
            .filter(|edge| {
                if valid_rating(edge.rating) {
                    return true;
                }
                warn!(
                    user_id,
                    movie_id = %edge.movie_id,
                    rating = edge.rating,
                    "skipping malformed rating edge"
                );
                false
            })
            .collect();

        if edges.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = edges.iter().map(|e| e.movie_id.clone()).collect();
        let details = self
            .guarded("movies_by_ids", HashMap::new(), || {
                self.metadata.movies_by_ids(&ids)
            })
            .await?;

        let mut rated: Vec<RatedMovie> = edges
            .iter()
            .filter_map(|edge| {
                details.get(&edge.movie_id).map(|movie| RatedMovie {
                    title: movie.title.clone(),
                    rating: edge.rating,
                })
            })
            .collect();

        rated.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.title.cmp(&b.title))
        });

        Ok(rated)
    }

    /// Movies rated by the user's neighbors that the user has not rated,
    /// title ascending.
    pub async fn collaborative_candidates(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let neighborhood = self.discover_neighborhood(user_id).await?;
        let catalog = self.neighborhood_catalog(&neighborhood).await?;

        let picks = collaborative::candidates(&neighborhood, &catalog, limit);
        info!(
            user_id,
            source = CandidateSource::Collaborative.as_str(),
            neighbors = neighborhood.neighbors.len(),
            count = picks.len(),
            "candidate generation complete"
        );
        Ok(picks)
    }

    /// Neighbor-rated movies matching the user's inferred top genre
    /// preferences, by neighborhood average rating.
    pub async fn content_candidates(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let neighborhood = self.discover_neighborhood(user_id).await?;
        let catalog = self.neighborhood_catalog(&neighborhood).await?;

        let picks = content::candidates(&neighborhood, &catalog, limit);
        info!(
            user_id,
            source = CandidateSource::Content.as_str(),
            neighbors = neighborhood.neighbors.len(),
            count = picks.len(),
            "candidate generation complete"
        );
        Ok(picks)
    }

    /// Ranked, deduplicated recommendations for the user.
    ///
    /// Collaborative candidates lead; when they number fewer than
    /// `CONTENT_FALLBACK_THRESHOLD`, content candidates join through an
    /// ordered title-keyed merge in which the content entry wins a collision
    /// (it carries the neighborhood average). Both generators read one shared
    /// neighborhood snapshot.
    pub async fn recommend(&self, user_id: &str) -> Result<Vec<Recommendation>, RecommendError> {
        let neighborhood = self.discover_neighborhood(user_id).await?;
        let catalog = self.neighborhood_catalog(&neighborhood).await?;

        let collaborative = collaborative::candidates(&neighborhood, &catalog, DEFAULT_LIMIT);

        let merged = if collaborative.len() < CONTENT_FALLBACK_THRESHOLD {
            let content = content::candidates(&neighborhood, &catalog, DEFAULT_LIMIT);
            info!(
                user_id,
                collaborative = collaborative.len(),
                content = content.len(),
                "collaborative yield below fallback threshold, merging content candidates"
            );
            merge_by_title(collaborative, content)
        } else {
            collaborative
        };

        let ranked = finalize(merged, self.config.title_order, DEFAULT_LIMIT);
        info!(
            user_id,
            neighbors = neighborhood.neighbors.len(),
            count = ranked.len(),
            "recommendation complete"
        );
        Ok(ranked)
    }

    /// Builds the co-rating neighborhood substrate shared by both candidate
    /// generators. The target's own edges and the co-rater lookup are
    /// independent reads of the same snapshot and run concurrently.
    async fn discover_neighborhood(&self, user_id: &str) -> Result<Neighborhood, RecommendError> {
        let (own_edges, neighbors) = tokio::join!(
            self.guarded("ratings_of", Vec::new(), || self.ratings.ratings_of(user_id)),
            self.guarded("co_raters", Vec::new(), || {
                self.ratings
                    .co_raters(user_id, HIGH_RATING_FLOOR, MIN_SHARED_HIGH_RATINGS)
            }),
        );
        let own_edges = own_edges?;
        let neighbors = neighbors?;

        if neighbors.is_empty() {
            return Ok(Neighborhood::new(Vec::new(), Vec::new(), &own_edges));
        }

        let neighbor_ratings = self
            .guarded("ratings_of_users", Vec::new(), || {
                self.ratings.ratings_of_users(&neighbors)
            })
            .await?;

        Ok(Neighborhood::new(neighbors, neighbor_ratings, &own_edges))
    }

    /// Metadata for every movie the neighborhood rated, fetched once and
    /// shared by both generators.
    async fn neighborhood_catalog(
        &self,
        neighborhood: &Neighborhood,
    ) -> Result<HashMap<String, MovieDetails>, RecommendError> {
        if neighborhood.neighbor_ratings.is_empty() {
            return Ok(HashMap::new());
        }

        let mut ids: Vec<String> = neighborhood
            .neighbor_ratings
            .iter()
            .map(|e| e.movie_id.clone())
            .collect();
        ids.sort();
        ids.dedup();

        self.guarded("movies_by_ids", HashMap::new(), || {
            self.metadata.movies_by_ids(&ids)
        })
        .await
    }

    /// Runs one store query under the per-query timeout with a single retry
    /// on store failure. A timeout degrades the stage to `fallback`; a second
    /// store failure surfaces to the caller.
    async fn guarded<T, F, Fut>(
        &self,
        op: &'static str,
        fallback: T,
        query: F,
    ) -> Result<T, RecommendError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match timeout(self.config.store_timeout, query()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(op, error = %err, "store query failed, retrying once");
                match timeout(self.config.store_timeout, query()).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(RecommendError::from(err)),
                    Err(_) => {
                        warn!(op, "store query timed out on retry, degrading to empty");
                        Ok(fallback)
                    }
                }
            }
            Err(_) => {
                warn!(
                    op,
                    timeout_ms = self.config.store_timeout.as_millis() as u64,
                    "store query timed out, degrading to empty"
                );
                Ok(fallback)
            }
        }
    }
}

/// Ordered merge keyed by title. Content entries are inserted after
/// collaborative ones and overwrite on collision, so the record carrying the
/// neighborhood average wins.
fn merge_by_title(
    collaborative: Vec<Recommendation>,
    content: Vec<Recommendation>,
) -> Vec<Recommendation> {
    let mut order: Vec<String> = Vec::new();
    let mut by_title: HashMap<String, Recommendation> = HashMap::new();

    for record in collaborative.into_iter().chain(content) {
        if !by_title.contains_key(&record.title) {
            order.push(record.title.clone());
        }
        by_title.insert(record.title.clone(), record);
    }

    order
        .into_iter()
        .filter_map(|title| by_title.remove(&title))
        .collect()
}

/// Final ranking: average rating descending (absent averages sort as 0),
/// then title per the configured tie-break policy.
fn finalize(
    mut records: Vec<Recommendation>,
    title_order: TitleOrder,
    limit: usize,
) -> Vec<Recommendation> {
    records.sort_by(|a, b| {
        let avg_a = a.avg_rating.unwrap_or(0.0);
        let avg_b = b.avg_rating.unwrap_or(0.0);
        avg_b
            .partial_cmp(&avg_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| match title_order {
                TitleOrder::Ascending => a.title.cmp(&b.title),
                TitleOrder::Descending => b.title.cmp(&a.title),
            })
    });
    records.truncate(limit);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NeighborRating, RatingEdge};
    use crate::store::{MemoryStore, MockMetadataStore, MockRatingStore};
    use async_trait::async_trait;
    use mockall::predicate;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn engine_on(store: MemoryStore) -> RecommendationEngine {
        let store = Arc::new(store);
        RecommendationEngine::new(store.clone(), store, EngineConfig::default())
    }

    fn rec(title: &str, avg: Option<f64>) -> Recommendation {
        Recommendation {
            title: title.to_string(),
            genres: vec!["Drama".to_string()],
            avg_rating: avg,
        }
    }

    #[tokio::test]
    async fn test_unknown_user_yields_empty_everywhere() {
        let engine = engine_on(MemoryStore::new());

        assert!(engine.rated_movies("ghost").await.unwrap().is_empty());
        assert!(engine
            .collaborative_candidates("ghost", DEFAULT_LIMIT)
            .await
            .unwrap()
            .is_empty());
        assert!(engine
            .content_candidates("ghost", DEFAULT_LIMIT)
            .await
            .unwrap()
            .is_empty());
        assert!(engine.recommend("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rated_movies_skips_malformed_edges() {
        let mut store = MemoryStore::new();
        store.insert_movie("m1", "Heat", &["Action"]);
        store.insert_movie("m2", "Ran", &["Drama"]);
        store.insert_rating("a", "m1", 4.5, 0);
        store.insert_rating("a", "m2", 7.3, 0);

        let engine = engine_on(store);
        let rated = engine.rated_movies("a").await.unwrap();
        assert_eq!(rated.len(), 1);
        assert_eq!(rated[0].title, "Heat");
    }

    #[test]
    fn test_merge_by_title_content_wins_collisions() {
        let collaborative = vec![rec("W", None), rec("V", None)];
        let content = vec![rec("W", Some(4.5)), rec("U", Some(3.0))];

        let merged = merge_by_title(collaborative, content);
        assert_eq!(merged.len(), 3);

        let w = merged.iter().find(|r| r.title == "W").unwrap();
        assert_eq!(w.avg_rating, Some(4.5));
        assert!(merged.iter().any(|r| r.title == "V"));
        assert!(merged.iter().any(|r| r.title == "U"));
    }

    #[test]
    fn test_finalize_orders_by_avg_then_title_policy() {
        let records = vec![
            rec("Alpha", None),
            rec("Beta", Some(4.0)),
            rec("Gamma", Some(4.0)),
            rec("Delta", Some(5.0)),
        ];

        let ranked = finalize(records.clone(), TitleOrder::Descending, DEFAULT_LIMIT);
        let titles: Vec<&str> = ranked.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Delta", "Gamma", "Beta", "Alpha"]);

        let ranked = finalize(records, TitleOrder::Ascending, DEFAULT_LIMIT);
        let titles: Vec<&str> = ranked.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Delta", "Beta", "Gamma", "Alpha"]);
    }

    #[test]
    fn test_finalize_truncates() {
        let records = (0..15).map(|i| rec(&format!("T{i:02}"), None)).collect();
        let ranked = finalize(records, TitleOrder::Ascending, DEFAULT_LIMIT);
        assert_eq!(ranked.len(), DEFAULT_LIMIT);
    }

    /// One `recommend` call performs neighbor discovery exactly once: the
    /// collaborative and content paths share the same substrate.
    #[tokio::test]
    async fn test_recommend_discovers_neighbors_once() {
        let mut ratings = MockRatingStore::new();
        let mut metadata = MockMetadataStore::new();

        ratings
            .expect_ratings_of()
            .with(predicate::eq("a"))
            .times(1)
            .returning(|_| {
                Ok(vec![RatingEdge {
                    movie_id: "x".to_string(),
                    rating: 5.0,
                    timestamp: 0,
                }])
            });
        ratings
            .expect_co_raters()
            .withf(|user, min_rating, min_common| {
                user == "a" && *min_rating == HIGH_RATING_FLOOR && *min_common == MIN_SHARED_HIGH_RATINGS
            })
            .times(1)
            .returning(|_, _, _| Ok(vec!["b".to_string()]));
        ratings
            .expect_ratings_of_users()
            .times(1)
            .returning(|_| {
                Ok(vec![
                    NeighborRating {
                        user_id: "b".to_string(),
                        movie_id: "x".to_string(),
                        rating: 5.0,
                    },
                    NeighborRating {
                        user_id: "b".to_string(),
                        movie_id: "w".to_string(),
                        rating: 4.0,
                    },
                ])
            });
        metadata.expect_movies_by_ids().times(1).returning(|ids| {
            Ok(ids
                .iter()
                .map(|id| {
                    (
                        id.clone(),
                        MovieDetails {
                            title: id.to_uppercase(),
                            genres: vec!["Action".to_string()],
                        },
                    )
                })
                .collect())
        });

        let engine = RecommendationEngine::new(
            Arc::new(ratings),
            Arc::new(metadata),
            EngineConfig::default(),
        );

        let recommendations = engine.recommend("a").await.unwrap();
        // Single collaborative candidate W, upgraded by the content path
        // with the neighborhood average.
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].title, "W");
        assert_eq!(recommendations[0].avg_rating, Some(4.0));
    }

    struct SlowRatingStore;

    #[async_trait]
    impl RatingStore for SlowRatingStore {
        async fn ratings_of(&self, _user_id: &str) -> Result<Vec<RatingEdge>, StoreError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Vec::new())
        }

        async fn co_raters(
            &self,
            _user_id: &str,
            _min_rating: f64,
            _min_common: u32,
        ) -> Result<Vec<String>, StoreError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Vec::new())
        }

        async fn ratings_of_users(
            &self,
            _user_ids: &[String],
        ) -> Result<Vec<NeighborRating>, StoreError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_store_timeout_degrades_to_empty() {
        let config = EngineConfig {
            store_timeout: Duration::from_millis(5),
            ..EngineConfig::default()
        };
        let engine = RecommendationEngine::new(
            Arc::new(SlowRatingStore),
            Arc::new(MemoryStore::new()),
            config,
        );

        let recommendations = engine.recommend("a").await.unwrap();
        assert!(recommendations.is_empty());
    }

    struct FailingRatingStore {
        calls: AtomicU32,
    }

    #[async_trait]
    impl RatingStore for FailingRatingStore {
        async fn ratings_of(&self, _user_id: &str) -> Result<Vec<RatingEdge>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::unavailable("ratings_of", "connection refused"))
        }

        async fn co_raters(
            &self,
            _user_id: &str,
            _min_rating: f64,
            _min_common: u32,
        ) -> Result<Vec<String>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::unavailable("co_raters", "connection refused"))
        }

        async fn ratings_of_users(
            &self,
            _user_ids: &[String],
        ) -> Result<Vec<NeighborRating>, StoreError> {
            Err(StoreError::unavailable(
                "ratings_of_users",
                "connection refused",
            ))
        }
    }

    #[tokio::test]
    async fn test_persistent_store_failure_surfaces_after_one_retry() {
        let store = Arc::new(FailingRatingStore {
            calls: AtomicU32::new(0),
        });
        let engine = RecommendationEngine::new(
            store.clone(),
            Arc::new(MemoryStore::new()),
            EngineConfig::default(),
        );

        let result = engine.recommend("a").await;
        assert!(matches!(
            result,
            Err(RecommendError::StoreUnavailable { .. })
        ));
        // Both joined discovery queries ran an initial attempt plus exactly
        // one retry.
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
    }
}
