use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Neo4j connection configuration, from NEO4J_* env vars
    pub neo4j: Neo4jConfig,
    /// Engine policy knobs
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jConfig {
    /// Neo4j bolt URI, e.g. bolt://neo4j:7687
    pub uri: String,
    /// Neo4j username from secret
    pub user: String,
    /// Neo4j password from secret
    pub password: String,
}

/// Tie-break applied to equal-average-rating titles in the final merge.
///
/// The upstream system coupled both final sort keys under one reverse flag,
/// so its observable order was title-descending; `Descending` keeps that
/// behavior, `Ascending` is available for callers who want alphabetical ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TitleOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Bound on every store query; a stage that exceeds it degrades to an
    /// empty result instead of hanging the call.
    pub store_timeout: Duration,
    /// Final-ranking title tie-break policy.
    pub title_order: TitleOrder,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            title_order: TitleOrder::Descending,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        // NEO4J_* variables: use env when present, otherwise sensible defaults
        // so the engine can still construct (and fail health checks) instead
        // of refusing to start.
        let uri = env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".to_string());
        let user = env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string());
        let password = env::var("NEO4J_PASSWORD").unwrap_or_else(|_| "CHANGE_ME".to_string());

        let store_timeout = env::var("STORE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_secs(5));

        let title_order = match env::var("TITLE_ORDER").as_deref() {
            Ok("ascending") => TitleOrder::Ascending,
            _ => TitleOrder::Descending,
        };

        Ok(Self {
            neo4j: Neo4jConfig {
                uri,
                user,
                password,
            },
            engine: EngineConfig {
                store_timeout,
                title_order,
            },
        })
    }
}
