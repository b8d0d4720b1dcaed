//! Corpus matching.
//!
//! Scans a per-language corpus slice, scores every candidate, and applies
//! the same-restaurant bonus. The best score is reported even when it falls
//! below the threshold, because the resolver logs it and reuses it for
//! dedup decisions.

use menu_common::similarity::SimilarityStrategy;
use menu_common::DishRecord;

/// Result of scanning one corpus slice.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Best candidate at or above the threshold, with its score.
    pub best: Option<(DishRecord, f64)>,
    /// Highest score seen, threshold or not. 0.0 for an empty slice.
    pub best_score: f64,
}

impl MatchOutcome {
    pub fn is_hit(&self) -> bool {
        self.best.is_some()
    }
}

pub struct CorpusMatcher {
    strategy: Box<dyn SimilarityStrategy>,
    threshold: f64,
    restaurant_bonus: f64,
}

impl CorpusMatcher {
    pub fn new(
        strategy: Box<dyn SimilarityStrategy>,
        threshold: f64,
        restaurant_bonus: f64,
    ) -> Self {
        Self {
            strategy,
            threshold,
            restaurant_bonus,
        }
    }

    /// Score one candidate, bonus included, capped at 1.0.
    fn score_candidate(
        &self,
        dish_name: &str,
        candidate: &DishRecord,
        restaurant_id: Option<i64>,
    ) -> f64 {
        let mut score = self.strategy.score(dish_name, &candidate.name);
        if restaurant_id.is_some() && restaurant_id == candidate.restaurant_id {
            score = (score + self.restaurant_bonus).min(1.0);
        }
        score
    }

    /// Best match in the slice. Ties break toward the first-seen candidate.
    pub fn find_best_match(
        &self,
        dish_name: &str,
        candidates: &[DishRecord],
        restaurant_id: Option<i64>,
    ) -> MatchOutcome {
        let mut best_idx: Option<usize> = None;
        let mut best_score = 0.0f64;

        for (idx, candidate) in candidates.iter().enumerate() {
            let score = self.score_candidate(dish_name, candidate, restaurant_id);
            if score > best_score {
                best_score = score;
                best_idx = Some(idx);
            }
        }

        let best = match best_idx {
            Some(idx) if best_score >= self.threshold => {
                Some((candidates[idx].clone(), best_score))
            }
            _ => None,
        };

        MatchOutcome { best, best_score }
    }

    /// All candidates at or above the threshold, best first. Used by the
    /// interactive lookup path.
    pub fn rank(
        &self,
        dish_name: &str,
        candidates: &[DishRecord],
        limit: usize,
    ) -> Vec<(DishRecord, f64)> {
        let mut scored: Vec<(DishRecord, f64)> = candidates
            .iter()
            .filter_map(|candidate| {
                let score = self.strategy.score(dish_name, &candidate.name);
                (score >= self.threshold).then(|| (candidate.clone(), score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use menu_common::similarity::{LevenshteinStrategy, OverlapStrategy};
    use menu_common::DisplayLanguage;

    fn record(name: &str, restaurant_id: Option<i64>) -> DishRecord {
        DishRecord {
            id: None,
            name: name.to_string(),
            display_language: DisplayLanguage::En,
            menu_language: "en".to_string(),
            explanation: String::new(),
            tags: Vec::new(),
            allergens: Vec::new(),
            cuisine: "Italian".to_string(),
            restaurant_id,
            restaurant_name: None,
            created_at: Utc::now(),
        }
    }

    fn matcher() -> CorpusMatcher {
        CorpusMatcher::new(Box::new(LevenshteinStrategy), 0.80, 0.10)
    }

    #[test]
    fn empty_slice_is_a_miss() {
        let outcome = matcher().find_best_match("Carbonara", &[], None);
        assert!(!outcome.is_hit());
        assert_eq!(outcome.best_score, 0.0);
    }

    #[test]
    fn exact_match_hits_at_one() {
        let corpus = vec![record("Spaghetti Carbonara", None)];
        let outcome = matcher().find_best_match("Spaghetti  carbonara!", &corpus, None);
        let (found, score) = outcome.best.unwrap();
        assert_eq!(found.name, "Spaghetti Carbonara");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn sub_threshold_best_score_is_exposed() {
        let corpus = vec![record("Miso Soup", None)];
        let outcome = matcher().find_best_match("Spaghetti Carbonara", &corpus, None);
        assert!(!outcome.is_hit());
        assert!(outcome.best_score > 0.0);
        assert!(outcome.best_score < 0.80);
    }

    #[test]
    fn restaurant_bonus_is_a_flat_add() {
        let corpus = vec![record("Margherita Pizza", Some(3))];
        let m = matcher();

        let base = m.find_best_match("Margarita Pizzas", &corpus, None).best_score;
        let boosted = m.find_best_match("Margarita Pizzas", &corpus, Some(3)).best_score;
        assert!((boosted - base - 0.10).abs() < 1e-9);
    }

    #[test]
    fn restaurant_bonus_never_exceeds_one() {
        let corpus = vec![record("Spaghetti Carbonara", Some(3))];
        let outcome = matcher().find_best_match("Spaghetti Carbonara", &corpus, Some(3));
        assert_eq!(outcome.best.unwrap().1, 1.0);
    }

    #[test]
    fn bonus_requires_matching_restaurant() {
        let corpus = vec![record("Margherita Pizza", Some(3))];
        let m = matcher();
        let other = m.find_best_match("Margarita Pizzas", &corpus, Some(9)).best_score;
        let none = m.find_best_match("Margarita Pizzas", &corpus, None).best_score;
        assert_eq!(other, none);
    }

    #[test]
    fn ties_break_toward_first_seen() {
        let corpus = vec![record("Pad Thai", None), record("Pad  Thai", None)];
        let outcome = matcher().find_best_match("pad thai", &corpus, None);
        assert_eq!(outcome.best.unwrap().0.name, "Pad Thai");
    }

    #[test]
    fn threshold_gates_hits() {
        let corpus = vec![record("Chicken Tikka Masala", None)];
        let m = matcher();
        assert!(m.find_best_match("Chicken Tika Masala", &corpus, None).is_hit());
        assert!(!m.find_best_match("Lamb Vindaloo", &corpus, None).is_hit());
    }

    #[test]
    fn rank_sorts_and_limits() {
        let m = CorpusMatcher::new(Box::new(OverlapStrategy), 0.6, 0.0);
        let corpus = vec![
            record("Pad Thai", None),
            record("Chicken Pad Thai", None),
            record("Green Curry", None),
        ];
        let ranked = m.rank("pad thai", &corpus, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0.name, "Pad Thai");
        assert_eq!(ranked[0].1, 1.0);
        assert_eq!(ranked[1].1, 0.8);
    }
}
