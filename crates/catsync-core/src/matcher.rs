use indexmap::IndexMap;

/// Keys shorter than this never take part in containment matching.
pub const DEFAULT_MIN_FUZZY_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match<'a, T> {
    pub key: &'a str,
    pub value: &'a T,
    pub kind: MatchKind,
}

/// Exact-then-containment lookup of normalized keys.
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    min_len: usize,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_FUZZY_LEN,
        }
    }
}

impl FuzzyMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len.max(1);
        self
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Find `key` in `index`.
    ///
    /// Exact lookup first. Failing that, and only when `key` is at least
    /// `min_len` characters, the first candidate in insertion order that is
    /// also at least `min_len` long and contains `key` (or is contained by
    /// it) wins. An empty key never matches.
    pub fn find<'a, T>(&self, key: &str, index: &'a IndexMap<String, T>) -> Option<Match<'a, T>> {
        if key.is_empty() {
            return None;
        }

        if let Some((found, value)) = index.get_key_value(key) {
            return Some(Match {
                key: found,
                value,
                kind: MatchKind::Exact,
            });
        }

        if key.chars().count() < self.min_len {
            return None;
        }

        index
            .iter()
            .find(|(candidate, _)| {
                candidate.chars().count() >= self.min_len
                    && (candidate.contains(key) || key.contains(candidate.as_str()))
            })
            .map(|(found, value)| Match {
                key: found,
                value,
                kind: MatchKind::Contains,
            })
    }
}

/// [`FuzzyMatcher::find`] with the default length guard.
pub fn fuzzy_match<'a, T>(key: &str, index: &'a IndexMap<String, T>) -> Option<&'a T> {
    FuzzyMatcher::default().find(key, index).map(|m| m.value)
}
