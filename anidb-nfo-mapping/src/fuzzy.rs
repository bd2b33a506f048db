//! Title similarity matching.
//!
//! Matching runs in two passes over a pool of `(key, title)` pairs:
//!
//! 1. **Exact**: the first title equal to the query wins immediately.
//! 2. **Threshold**: otherwise the candidate with the smallest Levenshtein
//!    distance wins, provided the distance is within the threshold. Ties keep
//!    the candidate seen first.
//!
//! Pool order is therefore significant and must be stable.

use anidb_nfo_core::Script;
use serde::{Deserialize, Serialize};

/// U+2044 FRACTION SLASH, which shows up in catalog data where `/` was meant.
pub const FRACTION_SLASH: char = '\u{2044}';

/// Rewrite known Unicode artifacts before any comparison.
pub fn normalize(text: &str) -> String {
    text.replace(FRACTION_SLASH, "/")
}

/// Whether letter case matters when comparing titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    /// Direct lookups against the primary title catalog.
    Sensitive,
    /// Comparisons against secondary catalogs, whose capitalization differs.
    Folded,
}

/// Tunable thresholds for fuzzy matching.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Maximum edit distance for a fuzzy match.
    pub threshold: usize,
    /// Threshold multiplier for year-qualified native-script comparisons.
    pub native_multiplier: f64,
    /// Threshold multiplier for year-qualified romanized/translated comparisons.
    pub romanized_multiplier: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            native_multiplier: 1.5,
            romanized_multiplier: 4.0,
        }
    }
}

impl MatchPolicy {
    /// Effective threshold for a query.
    ///
    /// Only year-qualified queries get the script-dependent relaxation; the
    /// candidate pool for those has already been narrowed to the same year.
    pub fn threshold_for(&self, year_qualified: bool, script: Script) -> usize {
        if !year_qualified {
            return self.threshold;
        }
        let multiplier = match script {
            Script::Native => self.native_multiplier,
            Script::Romanized => self.romanized_multiplier,
        };
        (self.threshold as f64 * multiplier.max(1.0)).floor() as usize
    }

    pub fn matcher(&self, case: CaseMode, year_qualified: bool, script: Script) -> FuzzyMatcher {
        FuzzyMatcher::new(case, self.threshold_for(year_qualified, script))
    }
}

/// A candidate is only eligible for a year-qualified query if its year matches.
pub fn year_eligible(query_year: Option<i32>, candidate_year: Option<i32>) -> bool {
    match query_year {
        Some(year) => candidate_year == Some(year),
        None => true,
    }
}

/// How a match was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Fuzzy { distance: usize },
}

/// The winning candidate of a [`FuzzyMatcher::best_match`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<K> {
    pub key: K,
    pub kind: MatchKind,
}

impl<K> Match<K> {
    pub fn is_exact(&self) -> bool {
        self.kind == MatchKind::Exact
    }

    pub fn distance(&self) -> usize {
        match self.kind {
            MatchKind::Exact => 0,
            MatchKind::Fuzzy { distance } => distance,
        }
    }
}

/// Scores a query against a pool of titles.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    case: CaseMode,
    threshold: usize,
}

impl FuzzyMatcher {
    pub fn new(case: CaseMode, threshold: usize) -> Self {
        Self { case, threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    fn prepare(&self, text: &str) -> String {
        let text = normalize(text);
        match self.case {
            CaseMode::Sensitive => text,
            CaseMode::Folded => text.to_lowercase(),
        }
    }

    /// Edit distance between two titles under this matcher's normalization.
    pub fn distance(&self, a: &str, b: &str) -> usize {
        strsim::levenshtein(&self.prepare(a), &self.prepare(b))
    }

    /// Find the best candidate for `query` in `pool`.
    pub fn best_match<K, I, S>(&self, query: &str, pool: I) -> Option<Match<K>>
    where
        I: IntoIterator<Item = (K, S)>,
        S: AsRef<str>,
    {
        let query = self.prepare(query);
        let query_len = query.chars().count();
        let mut best: Option<(K, usize)> = None;

        for (key, candidate) in pool {
            let candidate = self.prepare(candidate.as_ref());
            if candidate == query {
                return Some(Match {
                    key,
                    kind: MatchKind::Exact,
                });
            }

            // Distance is at least the length difference; skip hopeless candidates cheaply.
            if query_len.abs_diff(candidate.chars().count()) > self.threshold {
                continue;
            }

            let distance = strsim::levenshtein(&query, &candidate);
            if distance > self.threshold {
                continue;
            }
            if best.as_ref().is_none_or(|(_, d)| distance < *d) {
                best = Some((key, distance));
            }
        }

        best.map(|(key, distance)| Match {
            key,
            kind: MatchKind::Fuzzy { distance },
        })
    }
}
