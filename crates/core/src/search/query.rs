//! Query expansion and hit scoring for vector queries.
//!
//! Short alphabetic queries (at most [`config::SHORT_QUERY_MAX_TOKENS`] tokens)
//! are also embedded lowercased, uppercased and capitalized, because embedding
//! models are case sensitive on short proper-noun-like input. Token counts are
//! taken once, from the original query, by whitespace splitting.
//!
//! | tokens | threshold                      | length bonus |
//! |--------|--------------------------------|--------------|
//! | ≤ 2    | `min(base, 0.05)`              | 1.2          |
//! | ≤ 4    | `min(base, 0.08)`              | 1.1          |
//! | ≤ 6    | base                           | 1.05         |
//! | > 6    | base                           | 1.0          |
//!
//! A hit survives when `1 - distance >= threshold` and its quality score is at
//! least [`config::MIN_QUALITY_SCORE`].

use crate::config;
use ordered_float::OrderedFloat;
use std::collections::HashMap;

/// Number of whitespace-separated tokens in `query`.
pub fn token_count(query: &str) -> usize {
    query.split_whitespace().count()
}

/// Whether every non-whitespace character is alphabetic (and there is at least one).
fn is_alphabetic(query: &str) -> bool {
    let mut chars = query.chars().filter(|c| !c.is_whitespace()).peekable();
    chars.peek().is_some() && chars.all(char::is_alphabetic)
}

/// First character uppercased, the rest lowercased.
fn capitalize(query: &str) -> String {
    let mut chars = query.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// The strings to embed for `query`, original first, without duplicates.
pub fn query_variants(query: &str) -> Vec<String> {
    let mut variants = vec![query.to_string()];
    if token_count(query) <= config::SHORT_QUERY_MAX_TOKENS && is_alphabetic(query) {
        for candidate in [query.to_lowercase(), query.to_uppercase(), capitalize(query)] {
            if !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
    }
    variants
}

/// Similarity threshold for a query of `tokens` tokens, never stricter than `base`.
pub fn adaptive_threshold(base: f32, tokens: usize) -> f32 {
    if tokens <= 2 {
        base.min(config::ADAPTIVE_FLOOR_TWO_TOKENS)
    } else if tokens <= 4 {
        base.min(config::ADAPTIVE_FLOOR_FOUR_TOKENS)
    } else {
        base
    }
}

/// Score multiplier rewarding short, specific queries.
pub fn length_bonus(tokens: usize) -> f32 {
    if tokens <= 2 {
        config::LENGTH_BONUS_TWO_TOKENS
    } else if tokens <= 4 {
        config::LENGTH_BONUS_FOUR_TOKENS
    } else if tokens <= 6 {
        config::LENGTH_BONUS_SIX_TOKENS
    } else {
        1.0
    }
}

/// `max(0, 1 - distance) * bonus`
pub fn quality_score(distance: f32, bonus: f32) -> f32 {
    (1.0 - distance).max(0.0) * bonus
}

/// An index hit before gating, tagged with the variant that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub id: String,
    pub distance: f32,
    pub variant: String,
}

/// A hit that passed both gates.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    pub id: String,
    pub distance: f32,
    pub quality_score: f32,
    pub variant: String,
}

/// Everything derived from the raw query string before touching the index.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub variants: Vec<String>,
    pub token_count: usize,
    pub threshold: f32,
    pub length_bonus: f32,
}

impl QueryPlan {
    /// Plan for `query` against a collection whose configured threshold is `base_threshold`.
    pub fn new(query: &str, base_threshold: f32) -> Self {
        let tokens = token_count(query);
        Self {
            variants: query_variants(query),
            token_count: tokens,
            threshold: adaptive_threshold(base_threshold, tokens),
            length_bonus: length_bonus(tokens),
        }
    }

    /// Plan for a caller-supplied embedding: only the literal query is searched.
    pub fn literal(query: &str, base_threshold: f32) -> Self {
        let mut plan = Self::new(query, base_threshold);
        plan.variants.truncate(1);
        plan
    }

    /// Largest cosine distance the threshold admits.
    pub fn max_distance(&self) -> f32 {
        1.0 - self.threshold
    }

    /// Quality of a hit at `distance`, or `None` if either gate rejects it.
    pub fn score(&self, distance: f32) -> Option<f32> {
        if 1.0 - distance < self.threshold {
            return None;
        }
        let quality = quality_score(distance, self.length_bonus);
        (quality >= config::MIN_QUALITY_SCORE).then_some(quality)
    }

    /// Gate every hit, keep the best one per id, and return at most `top_k`
    /// sorted by quality descending then distance ascending.
    pub fn rank(&self, hits: Vec<RawHit>, top_k: usize) -> Vec<RankedHit> {
        let mut best: HashMap<String, RankedHit> = HashMap::with_capacity(hits.len());
        for hit in hits {
            let Some(quality) = self.score(hit.distance) else {
                continue;
            };
            let replace = best
                .get(&hit.id)
                .map_or(true, |prev| quality > prev.quality_score);
            if replace {
                best.insert(
                    hit.id.clone(),
                    RankedHit {
                        id: hit.id,
                        distance: hit.distance,
                        quality_score: quality,
                        variant: hit.variant,
                    },
                );
            }
        }

        let mut ranked: Vec<RankedHit> = best.into_values().collect();
        ranked.sort_by(|a, b| {
            OrderedFloat(b.quality_score)
                .cmp(&OrderedFloat(a.quality_score))
                .then(OrderedFloat(a.distance).cmp(&OrderedFloat(b.distance)))
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(top_k);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, distance: f32, variant: &str) -> RawHit {
        RawHit {
            id: id.to_string(),
            distance,
            variant: variant.to_string(),
        }
    }

    // ── Variants ───────────────────────────────────────────────────────

    #[test]
    fn test_short_alphabetic_query_gets_case_variants() {
        let v = query_variants("new York");
        assert_eq!(v, vec!["new York", "new york", "NEW YORK", "New york"]);
    }

    #[test]
    fn test_variants_skip_duplicates() {
        assert_eq!(query_variants("apple"), vec!["apple", "APPLE", "Apple"]);
    }

    #[test]
    fn test_long_query_single_variant() {
        assert_eq!(
            query_variants("one two three four"),
            vec!["one two three four"]
        );
    }

    #[test]
    fn test_non_alphabetic_query_single_variant() {
        assert_eq!(query_variants("gpt4 model"), vec!["gpt4 model"]);
        assert_eq!(query_variants("c++"), vec!["c++"]);
    }

    #[test]
    fn test_blank_query_single_variant() {
        assert_eq!(query_variants("   "), vec!["   "]);
    }

    #[test]
    fn test_literal_plan_has_one_variant() {
        let plan = QueryPlan::literal("apple", 0.2);
        assert_eq!(plan.variants, vec!["apple"]);
        assert_eq!(plan.threshold, 0.05);
    }

    // ── Threshold and bonus breakpoints ────────────────────────────────

    #[test]
    fn test_threshold_breakpoints() {
        assert_eq!(adaptive_threshold(0.2, 1), 0.05);
        assert_eq!(adaptive_threshold(0.2, 2), 0.05);
        assert_eq!(adaptive_threshold(0.2, 3), 0.08);
        assert_eq!(adaptive_threshold(0.2, 4), 0.08);
        assert_eq!(adaptive_threshold(0.2, 5), 0.2);
        assert_eq!(adaptive_threshold(0.2, 7), 0.2);
    }

    #[test]
    fn test_threshold_never_stricter_than_base() {
        assert_eq!(adaptive_threshold(0.01, 1), 0.01);
        assert_eq!(adaptive_threshold(0.06, 4), 0.06);
    }

    #[test]
    fn test_length_bonus_breakpoints() {
        assert_eq!(length_bonus(1), 1.2);
        assert_eq!(length_bonus(2), 1.2);
        assert_eq!(length_bonus(4), 1.1);
        assert_eq!(length_bonus(6), 1.05);
        assert_eq!(length_bonus(7), 1.0);
    }

    #[test]
    fn test_plan_from_query() {
        let plan = QueryPlan::new("a b c d e f g", 0.2);
        assert_eq!(plan.token_count, 7);
        assert_eq!(plan.threshold, 0.2);
        assert_eq!(plan.length_bonus, 1.0);
    }

    // ── Gates ──────────────────────────────────────────────────────────

    #[test]
    fn test_quality_gate_rejects_low_quality_even_with_bonus() {
        let plan = QueryPlan::new("apple", 0.0);
        // 0.2 * 1.2 = 0.24 < 0.3
        assert_eq!(plan.score(0.8), None);
    }

    #[test]
    fn test_quality_clamped_at_zero() {
        assert_eq!(quality_score(1.5, 1.2), 0.0);
    }

    #[test]
    fn test_threshold_gate() {
        let plan = QueryPlan::new("one two three four five six seven", 0.5);
        assert!(plan.score(0.4).is_some());
        assert!(plan.score(0.6).is_none());
    }

    #[test]
    fn test_exact_hit_scores_with_bonus() {
        let plan = QueryPlan::new("apple pie", 0.2);
        let q = plan.score(0.0).unwrap();
        assert!((q - 1.2).abs() < 1e-6);
    }

    // ── Ranking ────────────────────────────────────────────────────────

    #[test]
    fn test_rank_dedupes_keeping_best_variant() {
        let plan = QueryPlan::new("apple", 0.2);
        let ranked = plan.rank(
            vec![
                hit("x1", 0.3, "apple"),
                hit("x1", 0.1, "Apple"),
                hit("x2", 0.2, "apple"),
            ],
            10,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "x1");
        assert_eq!(ranked[0].variant, "Apple");
        assert_eq!(ranked[1].id, "x2");
    }

    #[test]
    fn test_rank_truncates_and_drops_gated() {
        let plan = QueryPlan::new("apple", 0.2);
        let ranked = plan.rank(
            vec![
                hit("a", 0.1, "apple"),
                hit("b", 0.2, "apple"),
                hit("c", 0.3, "apple"),
                hit("bad", 0.9, "apple"),
            ],
            2,
        );
        let ids: Vec<&str> = ranked.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
