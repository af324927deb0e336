use super::neighbors::Neighborhood;
use super::TOP_GENRE_COUNT;
use crate::models::{MovieDetails, Recommendation};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Content-based candidate generation.
///
/// Algorithm:
/// 1. Aggregate genre frequency across every neighbor rating edge - each
///    occurrence counts, including duplicates across neighbors and across a
///    movie's multiple genres. Frequency ties resolve by first-seen order
///    over that scan.
/// 2. Keep the top `TOP_GENRE_COUNT` genres as the inferred preference set.
/// 3. For every unseen neighbor-rated movie whose genre list intersects the
///    preference set, average the ratings the neighbors (and only the
///    neighbors) gave it.
/// 4. Sort by average rating descending, title ascending, and truncate.
pub(super) fn candidates(
    neighborhood: &Neighborhood,
    catalog: &HashMap<String, MovieDetails>,
    limit: usize,
) -> Vec<Recommendation> {
    let top = top_genres(neighborhood, catalog);
    if top.is_empty() {
        return Vec::new();
    }

    // movie id -> (rating sum, rating count) across the neighborhood
    let mut aggregates: HashMap<&str, (f64, u32)> = HashMap::new();
    for edge in &neighborhood.neighbor_ratings {
        if neighborhood.seen.contains(&edge.movie_id) {
            continue;
        }
        let Some(details) = catalog.get(&edge.movie_id) else {
            continue;
        };
        if !details.genres.iter().any(|g| top.contains(g.as_str())) {
            continue;
        }
        let entry = aggregates.entry(edge.movie_id.as_str()).or_insert((0.0, 0));
        entry.0 += edge.rating;
        entry.1 += 1;
    }

    let mut found: Vec<(&str, &MovieDetails, f64)> = aggregates
        .into_iter()
        .filter_map(|(movie_id, (sum, count))| {
            catalog
                .get(movie_id)
                .map(|details| (movie_id, details, sum / f64::from(count)))
        })
        .collect();

    found.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.title.cmp(&b.1.title))
            .then_with(|| a.0.cmp(b.0))
    });
    found.truncate(limit);

    found
        .into_iter()
        .map(|(_, details, avg)| Recommendation {
            title: details.title.clone(),
            genres: details.genres.clone(),
            avg_rating: Some(avg),
        })
        .collect()
}

/// Top genres by occurrence count over the neighborhood's rating edges.
fn top_genres<'a>(
    neighborhood: &Neighborhood,
    catalog: &'a HashMap<String, MovieDetails>,
) -> HashSet<&'a str> {
    // genre -> (count, first-seen sequence number)
    let mut frequency: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut sequence = 0usize;

    for edge in &neighborhood.neighbor_ratings {
        let Some(details) = catalog.get(&edge.movie_id) else {
            continue;
        };
        for genre in &details.genres {
            let entry = frequency.entry(genre.as_str()).or_insert((0, sequence));
            entry.0 += 1;
            sequence += 1;
        }
    }

    let mut ranked: Vec<(&str, (usize, usize))> = frequency.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.1 .1.cmp(&b.1 .1)));

    let top: HashSet<&str> = ranked
        .iter()
        .take(TOP_GENRE_COUNT)
        .map(|(genre, _)| *genre)
        .collect();

    debug!(?top, "inferred genre preferences from neighborhood");
    top
}
