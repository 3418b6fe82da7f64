//! Edit-distance gate for near-duplicate sayings.
//!
//! Fingerprint equality only catches verbatim repeats. Generators also like to
//! emit minor rewordings of an earlier line; those land within a few edits of
//! an accepted canonical form and are rejected here.

use std::collections::HashMap;

/// Threshold used by the pipeline unless configured otherwise.
pub const DEFAULT_SIMILARITY_THRESHOLD: usize = 3;

/// Levenshtein distance over Unicode scalar values, unit cost per
/// insert/delete/substitute.
///
/// Uses two rows of working memory sized by the shorter operand.
pub fn edit_distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let (short, long) = if a_chars.len() <= b_chars.len() {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };

    let mut prev_row: Vec<usize> = (0..=short.len()).collect();
    let mut curr_row: Vec<usize> = vec![0; short.len() + 1];

    for (i, ch_long) in long.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, ch_short) in short.iter().enumerate() {
            let substitution = prev_row[j] + usize::from(ch_short != ch_long);
            let insertion = curr_row[j] + 1;
            let deletion = prev_row[j + 1] + 1;
            curr_row[j + 1] = substitution.min(insertion).min(deletion);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[short.len()]
}

/// True if `candidate` is within `threshold` edits of any accepted form.
pub fn is_near_duplicate<'a, I>(candidate: &str, accepted: I, threshold: usize) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    accepted
        .into_iter()
        .any(|other| edit_distance(candidate, other) <= threshold)
}

/// Near-duplicate check with a distance memo keyed by unordered pair.
///
/// Scoped to one accumulation run: the accepted set only grows during a run,
/// so a candidate re-offered by a later batch is not re-measured against forms
/// it was already compared with.
#[derive(Debug, Default)]
pub struct SimilarityGate {
    threshold: usize,
    memo: HashMap<(String, String), usize>,
}

impl SimilarityGate {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            memo: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Memoized distance; symmetric in its arguments.
    pub fn distance(&mut self, a: &str, b: &str) -> usize {
        if a == b {
            return 0;
        }
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        *self
            .memo
            .entry(key)
            .or_insert_with_key(|(x, y)| edit_distance(x, y))
    }

    /// True if `candidate` is within the threshold of any accepted form.
    pub fn is_near_duplicate<'a, I>(&mut self, candidate: &str, accepted: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let threshold = self.threshold;
        accepted
            .into_iter()
            .any(|other| self.distance(candidate, other) <= threshold)
    }

    /// Number of memoized pairs.
    pub fn cached_pairs(&self) -> usize {
        self.memo.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance_scenarios() {
        assert_eq!(edit_distance("abc", "abc"), 0);
        assert_eq!(edit_distance("abc", "abd"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("sunday", "saturday"), 3);
    }

    #[test]
    fn test_edit_distance_counts_chars_not_bytes() {
        assert_eq!(edit_distance("志を磨け", "志を磨け"), 0);
        assert_eq!(edit_distance("志を磨け", "心を磨け"), 1);
        assert_eq!(edit_distance("努力を惜しまない", "努力は惜しまない"), 1);
    }

    #[test]
    fn test_edit_distance_is_symmetric() {
        let pairs = [("flaw", "lawn"), ("gumbo", "gambol"), ("志を磨け", "志")];
        for (a, b) in pairs {
            assert_eq!(edit_distance(a, b), edit_distance(b, a));
        }
    }

    #[test]
    fn test_is_near_duplicate_threshold() {
        assert!(is_near_duplicate("志を磨け", ["志を磨け"], 0));
        assert!(!is_near_duplicate("志を磨け", ["心を磨け"], 0));
        assert!(is_near_duplicate("志を磨け", ["心を磨け"], 1));
        assert!(!is_near_duplicate("anything", std::iter::empty::<&str>(), 3));
    }

    #[test]
    fn test_gate_memoizes_unordered_pairs() {
        let mut gate = SimilarityGate::new(DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(gate.distance("kitten", "sitting"), 3);
        assert_eq!(gate.distance("sitting", "kitten"), 3);
        assert_eq!(gate.cached_pairs(), 1);

        // Equal strings short-circuit without touching the memo.
        assert_eq!(gate.distance("same", "same"), 0);
        assert_eq!(gate.cached_pairs(), 1);
    }

    #[test]
    fn test_gate_rejects_within_threshold() {
        let mut gate = SimilarityGate::new(3);
        let accepted = vec!["継続は力なり".to_string(), "志を磨け".to_string()];
        assert!(gate.is_near_duplicate("継続こそ力なり", accepted.iter().map(String::as_str)));
        assert!(!gate.is_near_duplicate(
            "失敗を恐れず挑み続けることが成長の鍵",
            accepted.iter().map(String::as_str)
        ));
    }
}
