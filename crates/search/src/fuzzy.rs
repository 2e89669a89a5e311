//! Fuzzy scoring for (query, candidate) pairs using nucleo-matcher.
//!
//! Providers rank their items with this primitive and compose the raw score
//! with their own policy: config thresholds, usage bonuses from history,
//! field-position penalties. None of that policy lives here; identical
//! inputs always yield identical outputs.

use std::cell::RefCell;

use nucleo_matcher::{Config, Matcher, Utf32String};

/// Result of scoring a candidate against a query.
///
/// `positions` are the byte indices of the candidate that matched, strictly
/// increasing; `start` is the first of them. Both are zero/empty when the
/// query is empty or nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    pub score: i32,
    pub positions: Vec<u32>,
    pub start: i32,
}

thread_local! {
    // The matcher reuses internal scratch buffers across calls, which is
    // why its API takes `&mut self`. Keeping one per thread preserves the
    // pure-function signature without locking.
    static MATCHER: RefCell<Matcher> = RefCell::new(Matcher::new(scoring_config()));
}

fn scoring_config() -> Config {
    let mut config = Config::DEFAULT;
    config.ignore_case = true;
    // Matches closer to the start of the candidate score higher.
    config.prefer_prefix = true;
    config
}

/// Score `candidate` against `query`.
///
/// With `exact` set, the candidate must contain the query as a contiguous
/// case-insensitive substring; otherwise a case-insensitive subsequence
/// match is enough. Contiguous runs, word-boundary hits, and early match
/// starts all raise the score. No match returns the zero [`Match`].
pub fn score(query: &str, candidate: &str, exact: bool) -> Match {
    if query.is_empty() {
        return Match::default();
    }

    let haystack = Utf32String::from(candidate);
    let needle = Utf32String::from(query);

    let mut char_positions = Vec::new();
    let scored = MATCHER.with(|matcher| {
        let mut matcher = matcher.borrow_mut();
        if exact {
            matcher.substring_indices(haystack.slice(..), needle.slice(..), &mut char_positions)
        } else {
            matcher.fuzzy_indices(haystack.slice(..), needle.slice(..), &mut char_positions)
        }
    });

    let Some(scored) = scored else {
        return Match::default();
    };

    // The matcher does not promise ordered, distinct indices.
    char_positions.sort_unstable();
    char_positions.dedup();

    let positions = byte_positions(candidate, &char_positions);
    let start = positions.first().copied().unwrap_or(0) as i32;

    Match {
        score: i32::from(scored),
        positions,
        start,
    }
}

// The matcher reports character offsets; the wire contract wants byte
// indices into the candidate.
fn byte_positions(candidate: &str, chars: &[u32]) -> Vec<u32> {
    let offsets: Vec<u32> = candidate.char_indices().map(|(b, _)| b as u32).collect();
    chars
        .iter()
        .filter_map(|&c| offsets.get(c as usize).copied())
        .collect()
}
