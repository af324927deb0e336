use super::neighbors::Neighborhood;
use crate::models::{MovieDetails, Recommendation};
use std::collections::{HashMap, HashSet};

/// Collaborative candidate generation.
///
/// Algorithm:
/// 1. Walk every neighbor rating edge; the neighbor's rating value is
///    irrelevant here - the co-rating threshold already qualified the
///    neighbor.
/// 2. Drop movies the target user has rated and deduplicate by movie id.
/// 3. Resolve titles/genres from the pre-fetched catalog, sort title
///    ascending (movie id as the reproducibility tie-break) and truncate.
pub(super) fn candidates(
    neighborhood: &Neighborhood,
    catalog: &HashMap<String, MovieDetails>,
    limit: usize,
) -> Vec<Recommendation> {
    let mut picked: HashSet<&str> = HashSet::new();
    let mut found: Vec<(&str, &MovieDetails)> = Vec::new();

    for edge in &neighborhood.neighbor_ratings {
        if neighborhood.seen.contains(&edge.movie_id) {
            continue;
        }
        if !picked.insert(edge.movie_id.as_str()) {
            continue;
        }
        // A movie without metadata cannot be presented; leave it out.
        let Some(details) = catalog.get(&edge.movie_id) else {
            continue;
        };
        found.push((edge.movie_id.as_str(), details));
    }

    found.sort_by(|a, b| a.1.title.cmp(&b.1.title).then_with(|| a.0.cmp(b.0)));
    found.truncate(limit);

    found
        .into_iter()
        .map(|(_, details)| Recommendation {
            title: details.title.clone(),
            genres: details.genres.clone(),
            avg_rating: None,
        })
        .collect()
}
