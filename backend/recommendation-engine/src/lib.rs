pub mod config;
pub mod models;
pub mod services;
pub mod store;

pub use config::{Config, EngineConfig, Neo4jConfig, TitleOrder};
pub use models::{MovieDetails, RatedMovie, Recommendation};
pub use services::{RecommendError, RecommendationEngine, DEFAULT_LIMIT};
pub use store::{MemoryStore, MetadataStore, Neo4jStore, RatingStore, StoreError};
