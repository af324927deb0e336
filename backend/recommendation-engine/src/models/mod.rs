use serde::{Deserialize, Serialize};

/// A movie the target user has already rated, best-rated first in
/// `RecommendationEngine::rated_movies` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedMovie {
    pub title: String,
    pub rating: f64,
}

/// One RATED edge owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEdge {
    pub movie_id: String,
    pub rating: f64,
    /// Unix seconds, as stored on the edge at ingestion time.
    pub timestamp: i64,
}

/// One RATED edge with its owner, as returned by batched neighbor lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborRating {
    pub user_id: String,
    pub movie_id: String,
    pub rating: f64,
}

/// Per-movie attributes served by the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub title: String,
    pub genres: Vec<String>,
}

/// A single recommendation record.
///
/// `avg_rating` is carried only by content-based candidates: the mean of the
/// ratings the neighborhood gave that movie. Collaborative candidates have no
/// aggregate and serialize without the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_rating: Option<f64>,
}

/// Which generator produced a candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateSource {
    Collaborative,
    Content,
}

impl CandidateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::Collaborative => "collaborative",
            CandidateSource::Content => "content",
        }
    }
}
