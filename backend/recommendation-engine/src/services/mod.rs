pub mod recommendation;

pub use recommendation::{RecommendError, RecommendationEngine, DEFAULT_LIMIT};
