//! Confidence Scorer
//!
//! Scores a synthesis trace on a 0-100 scale:
//! - Base: the specificity weight of the rule that fired
//! - Bonus per bound entity, by how it was matched
//! - Penalty when a token matched two entities equally well
//!
//! The score is a pure function of the trace.

use crate::synthesizer::{MatchKind, SynthesisTrace};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Weights applied on top of the rule's specificity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    /// Bonus for an exact name match (default: 5)
    pub exact: i32,
    /// Bonus for a synonym match (default: 2)
    pub synonym: i32,
    /// Bonus for a substring column match (default: 2)
    pub substring: i32,
    /// Bonus for a fuzzy name match (default: 2)
    pub fuzzy: i32,
    /// Bonus for an entity inferred from vocabulary or relationships (default: 1)
    pub inferred: i32,
    /// Bonus for an entity chosen by default (default: 0)
    pub default: i32,
    /// Penalty for an ambiguous match (default: 10)
    pub ambiguity_penalty: i32,
    /// Highest score a synthesized query can reach (default: 95)
    pub ceiling: i32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            exact: 5,
            synonym: 2,
            substring: 2,
            fuzzy: 2,
            inferred: 1,
            default: 0,
            ambiguity_penalty: 10,
            ceiling: 95,
        }
    }
}

impl ConfidenceWeights {
    fn bonus(&self, kind: MatchKind) -> i32 {
        match kind {
            MatchKind::Exact => self.exact,
            MatchKind::Synonym => self.synonym,
            MatchKind::Substring => self.substring,
            MatchKind::Fuzzy => self.fuzzy,
            MatchKind::Inferred => self.inferred,
            MatchKind::Default => self.default,
        }
    }
}

/// Confidence band reported alongside the numeric score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    /// 80 and above
    High,
    /// 60 to 79
    Good,
    /// Below 60
    Low,
}

impl ConfidenceBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => ConfidenceBand::High,
            60..=79 => ConfidenceBand::Good,
            _ => ConfidenceBand::Low,
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Good => "good",
            ConfidenceBand::Low => "low",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    weights: ConfidenceWeights,
}

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: ConfidenceWeights) -> Self {
        Self { weights }
    }

    /// Score a trace, clamped to 0..=100 and capped at the ceiling
    pub fn score(&self, trace: &SynthesisTrace) -> u8 {
        let bonus: i32 = trace
            .bindings
            .iter()
            .map(|b| self.weights.bonus(b.matched))
            .sum();
        let penalty = if trace.ambiguous {
            self.weights.ambiguity_penalty
        } else {
            0
        };
        let raw = i32::from(trace.specificity) + bonus - penalty;
        raw.min(self.weights.ceiling).clamp(0, 100) as u8
    }

    pub fn band(&self, score: u8) -> ConfidenceBand {
        ConfidenceBand::from_score(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RuleId;
    use crate::synthesizer::{EntityBinding, EntityKind, Operations};

    fn trace(rule: RuleId, specificity: u8, kinds: &[MatchKind], ambiguous: bool) -> SynthesisTrace {
        SynthesisTrace {
            rule,
            specificity,
            fallback: rule == RuleId::Fallback,
            tables: vec!["customers".to_string()],
            bindings: kinds
                .iter()
                .map(|kind| EntityBinding {
                    slot: "table",
                    kind: EntityKind::Table,
                    table: "customers".to_string(),
                    column: None,
                    matched: *kind,
                })
                .collect(),
            limit: None,
            operations: Operations::default(),
            ambiguous,
        }
    }

    #[test]
    fn test_exact_count_scores_high() {
        let scorer = ConfidenceScorer::new();
        let score = scorer.score(&trace(RuleId::CountRows, 80, &[MatchKind::Exact], false));
        assert_eq!(score, 85);
        assert_eq!(scorer.band(score), ConfidenceBand::High);
    }

    #[test]
    fn test_fallback_stays_below_upper_band() {
        let scorer = ConfidenceScorer::new();
        let score = scorer.score(&trace(RuleId::Fallback, 60, &[MatchKind::Exact], false));
        assert_eq!(score, 65);
        assert_eq!(scorer.band(score), ConfidenceBand::Good);

        let unmatched = scorer.score(&trace(RuleId::Fallback, 60, &[MatchKind::Default], false));
        assert_eq!(unmatched, 60);
    }

    #[test]
    fn test_ambiguity_and_ceiling() {
        let scorer = ConfidenceScorer::new();
        let clear = scorer.score(&trace(RuleId::ListRows, 68, &[MatchKind::Fuzzy], false));
        let ambiguous = scorer.score(&trace(RuleId::ListRows, 68, &[MatchKind::Fuzzy], true));
        assert_eq!(clear - ambiguous, 10);

        let many = [MatchKind::Exact; 6];
        assert_eq!(scorer.score(&trace(RuleId::TopByRelatedAggregate, 82, &many, false)), 95);
    }

    #[test]
    fn test_clamped_at_zero() {
        let scorer = ConfidenceScorer::with_weights(ConfidenceWeights {
            ambiguity_penalty: 200,
            ..ConfidenceWeights::default()
        });
        assert_eq!(scorer.score(&trace(RuleId::ListRows, 68, &[], true)), 0);
        assert_eq!(ConfidenceBand::from_score(0), ConfidenceBand::Low);
    }
}
