//! Dish-name similarity scoring.
//!
//! Two strategies behind one trait. The Levenshtein strategy is the
//! authoritative one used on the resolution path; the overlap strategy is
//! the cheap variant for interactive corpus lookups. Call sites pick the
//! strategy and threshold, the algorithm lives here once.

use crate::normalize::normalize;

/// A pluggable dish-name similarity measure. Scores are in [0, 1].
pub trait SimilarityStrategy: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

// ============================================================================
// Levenshtein strategy
// ============================================================================

/// Edit-distance similarity with word-level rescue.
///
/// Direct similarity alone fails for multi-word names where word order or
/// padding differs ("Grilled Salmon with Lemon" vs "Lemon Grilled Salmon");
/// the word-level pass rescues these, while a short-string guard keeps
/// unrelated three-letter words ("dal" vs "dan") at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinStrategy;

impl SimilarityStrategy for LevenshteinStrategy {
    fn score(&self, a: &str, b: &str) -> f64 {
        let na = normalize(a);
        let nb = normalize(b);
        if na == nb {
            return 1.0;
        }

        let direct = direct_similarity(&na, &nb);

        let words_a: Vec<&str> = na.split_whitespace().collect();
        let words_b: Vec<&str> = nb.split_whitespace().collect();
        // Scored in both directions so the measure stays symmetric even
        // when one name repeats a word.
        let word_level = word_level_directed(&words_a, &words_b)
            .max(word_level_directed(&words_b, &words_a));

        direct.max(word_level)
    }
}

/// Character-level Levenshtein distance, space-optimized two-row DP.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (m, n) = (a_chars.len(), b_chars.len());
    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// `(max_len - distance) / max_len`, with the short-string guard applied.
fn direct_similarity(na: &str, nb: &str) -> f64 {
    let la = na.chars().count();
    let lb = nb.chars().count();
    let max_len = la.max(lb);
    if max_len == 0 {
        return 1.0;
    }

    let d = levenshtein(na, nb);
    let sim = (max_len - d) as f64 / max_len as f64;

    // Very short strings over-match on a single shared edit; force zero
    // unless they are nearly identical.
    if max_len <= 3 && sim < 0.8 {
        return 0.0;
    }
    sim
}

/// Single-word pairwise similarity: normalized equality, then guarded
/// edit-distance similarity.
fn word_similarity(wa: &str, wb: &str) -> f64 {
    if wa == wb {
        1.0
    } else {
        direct_similarity(wa, wb)
    }
}

/// Gate above which a word counts as matched at all.
const WORD_MATCH_GATE: f64 = 0.7;

/// Average matched-word score scaled by the fraction of words that matched.
fn word_level_directed(from: &[&str], into: &[&str]) -> f64 {
    if from.is_empty() || into.is_empty() {
        return 0.0;
    }

    let mut matched = 0usize;
    let mut matched_sum = 0.0f64;
    for wa in from {
        let best = into
            .iter()
            .map(|wb| word_similarity(wa, wb))
            .fold(0.0f64, f64::max);
        if best > WORD_MATCH_GATE {
            matched += 1;
            matched_sum += best;
        }
    }

    if matched == 0 {
        return 0.0;
    }

    let max_words = from.len().max(into.len()) as f64;
    (matched_sum / matched as f64) * (matched as f64 / max_words)
}

// ============================================================================
// Overlap strategy
// ============================================================================

/// Cheap containment/word-overlap variant for interactive lookups.
///
/// Exact normalized match scores 1.0, containment either direction 0.8,
/// anything else falls back to Jaccard word overlap.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapStrategy;

impl SimilarityStrategy for OverlapStrategy {
    fn score(&self, a: &str, b: &str) -> f64 {
        let na = normalize(a);
        let nb = normalize(b);
        if na == nb {
            return 1.0;
        }
        if na.is_empty() || nb.is_empty() {
            return 0.0;
        }
        if na.contains(&nb) || nb.contains(&na) {
            return 0.8;
        }

        let set_a: std::collections::HashSet<&str> = na.split_whitespace().collect();
        let set_b: std::collections::HashSet<&str> = nb.split_whitespace().collect();
        let intersection = set_a.intersection(&set_b).count();
        let union = set_a.union(&set_b).count();
        if union == 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }
}
