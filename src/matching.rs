//! Fuzzy lookup of attribute names.

use rapidfuzz::distance::jaro_winkler;

/// Minimum Jaro-Winkler similarity for two names to be considered the same.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Find the candidate most similar to `query`, if it clears [`SIMILARITY_THRESHOLD`].
///
/// Exact matches win immediately; otherwise ties keep the first candidate.
pub fn closest_match<'a, I>(query: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, f64)> = None;
    for candidate in candidates {
        if candidate == query {
            return Some(candidate);
        }
        let score = jaro_winkler::similarity(query.chars(), candidate.chars());
        if score >= SIMILARITY_THRESHOLD && best.is_none_or(|(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best.map(|(name, _)| name)
}
