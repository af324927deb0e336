use super::{MetadataStore, RatingStore, StoreError};
use crate::config::Neo4jConfig;
use crate::models::{MovieDetails, NeighborRating, RatingEdge};
use async_trait::async_trait;
use neo4rs::{query, Graph};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Rating + metadata store backed by the Neo4j movie graph.
///
/// Schema:
/// `(:User {userId})-[:RATED {rating, timestamp}]->(:Movie {movieId, title, genres})`
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Arc<Graph>,
}

impl Neo4jStore {
    pub fn connect(config: &Neo4jConfig) -> Result<Self, StoreError> {
        let graph = Graph::new(&config.uri, &config.user, &config.password)
            .map_err(|e| StoreError::unavailable("connect", e))?;

        Ok(Self {
            graph: Arc::new(graph),
        })
    }

    /// Health check - verify the Neo4j connection
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        let mut result = self
            .graph
            .execute(query("RETURN 1 AS health"))
            .await
            .map_err(|e| StoreError::unavailable("health_check", e))?;

        if let Some(row) = result
            .next()
            .await
            .map_err(|e| StoreError::unavailable("health_check", e))?
        {
            let health: i64 = row.get("health").unwrap_or(0);
            Ok(health == 1)
        } else {
            Ok(false)
        }
    }
}

#[async_trait]
impl RatingStore for Neo4jStore {
    async fn ratings_of(&self, user_id: &str) -> Result<Vec<RatingEdge>, StoreError> {
        let cypher = r#"
            MATCH (u:User {userId: $user_id})-[r:RATED]->(m:Movie)
            RETURN m.movieId AS movie_id, r.rating AS rating, r.timestamp AS timestamp
            ORDER BY r.rating DESC, m.movieId ASC
        "#;

        let mut result = self
            .graph
            .execute(query(cypher).param("user_id", user_id))
            .await
            .map_err(|e| StoreError::unavailable("ratings_of", e))?;

        let mut edges = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| StoreError::unavailable("ratings_of", e))?
        {
            let Ok(movie_id) = row.get::<String>("movie_id") else {
                continue;
            };
            edges.push(RatingEdge {
                movie_id,
                // NaN is outside the valid rating range, so a missing or
                // non-numeric value falls out downstream as malformed.
                rating: row.get::<f64>("rating").unwrap_or(f64::NAN),
                timestamp: row.get::<i64>("timestamp").unwrap_or(0),
            });
        }

        debug!("Fetched {} rating edges for user {}", edges.len(), user_id);
        Ok(edges)
    }

    async fn co_raters(
        &self,
        user_id: &str,
        min_rating: f64,
        min_common: u32,
    ) -> Result<Vec<String>, StoreError> {
        let cypher = r#"
            MATCH (u1:User {userId: $user_id})-[r1:RATED]->(m:Movie)<-[r2:RATED]-(u2:User)
            WHERE r1.rating >= $min_rating AND r2.rating >= $min_rating
            WITH u2, count(DISTINCT m) AS shared
            WHERE shared >= $min_common
            RETURN u2.userId AS user_id
            ORDER BY user_id ASC
        "#;

        let mut result = self
            .graph
            .execute(
                query(cypher)
                    .param("user_id", user_id)
                    .param("min_rating", min_rating)
                    .param("min_common", min_common as i64),
            )
            .await
            .map_err(|e| StoreError::unavailable("co_raters", e))?;

        let mut users = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| StoreError::unavailable("co_raters", e))?
        {
            if let Ok(user) = row.get::<String>("user_id") {
                users.push(user);
            }
        }

        debug!("Found {} co-raters for user {}", users.len(), user_id);
        Ok(users)
    }

    async fn ratings_of_users(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<NeighborRating>, StoreError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let cypher = r#"
            MATCH (u:User)-[r:RATED]->(m:Movie)
            WHERE u.userId IN $user_ids
            RETURN u.userId AS user_id, m.movieId AS movie_id, r.rating AS rating
            ORDER BY user_id ASC, movie_id ASC
        "#;

        let mut result = self
            .graph
            .execute(query(cypher).param("user_ids", user_ids.to_vec()))
            .await
            .map_err(|e| StoreError::unavailable("ratings_of_users", e))?;

        let mut edges = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| StoreError::unavailable("ratings_of_users", e))?
        {
            let (Ok(user_id), Ok(movie_id)) =
                (row.get::<String>("user_id"), row.get::<String>("movie_id"))
            else {
                continue;
            };
            edges.push(NeighborRating {
                user_id,
                movie_id,
                rating: row.get::<f64>("rating").unwrap_or(f64::NAN),
            });
        }

        Ok(edges)
    }
}

#[async_trait]
impl MetadataStore for Neo4jStore {
    async fn movie_by_id(&self, movie_id: &str) -> Result<Option<MovieDetails>, StoreError> {
        let cypher = r#"
            MATCH (m:Movie {movieId: $movie_id})
            RETURN m.title AS title, m.genres AS genres
        "#;

        let mut result = self
            .graph
            .execute(query(cypher).param("movie_id", movie_id))
            .await
            .map_err(|e| StoreError::unavailable("movie_by_id", e))?;

        if let Some(row) = result
            .next()
            .await
            .map_err(|e| StoreError::unavailable("movie_by_id", e))?
        {
            Ok(Some(MovieDetails {
                title: row.get::<String>("title").unwrap_or_default(),
                genres: row.get::<Vec<String>>("genres").unwrap_or_default(),
            }))
        } else {
            Ok(None)
        }
    }

    async fn movies_by_ids(
        &self,
        movie_ids: &[String],
    ) -> Result<HashMap<String, MovieDetails>, StoreError> {
        if movie_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let cypher = r#"
            MATCH (m:Movie)
            WHERE m.movieId IN $movie_ids
            RETURN m.movieId AS movie_id, m.title AS title, m.genres AS genres
        "#;

        let mut result = self
            .graph
            .execute(query(cypher).param("movie_ids", movie_ids.to_vec()))
            .await
            .map_err(|e| StoreError::unavailable("movies_by_ids", e))?;

        let mut movies = HashMap::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| StoreError::unavailable("movies_by_ids", e))?
        {
            let Ok(movie_id) = row.get::<String>("movie_id") else {
                continue;
            };
            movies.insert(
                movie_id,
                MovieDetails {
                    title: row.get::<String>("title").unwrap_or_default(),
                    genres: row.get::<Vec<String>>("genres").unwrap_or_default(),
                },
            );
        }

        debug!("Resolved {}/{} movie ids", movies.len(), movie_ids.len());
        Ok(movies)
    }
}
