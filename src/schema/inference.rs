//! Relationship Inference
//!
//! Fallback used when a column carries no introspectable foreign-key
//! constraint. The heuristic is lossy on irregular naming, so it lives behind
//! a trait and can be replaced wholesale.

use super::{Column, Relationship, Table};
use crate::fuzzy_matcher::{singularize, FuzzyMatcher, NameSimilarity};
use std::sync::Arc;

/// Strategy for inferring a foreign-key relationship from a single column.
pub trait RelationshipInference: Send + Sync {
    /// `tables` is the full table set of the snapshot being built, `table`
    /// the owner of `column`.
    fn infer(&self, table: &Table, column: &Column, tables: &[Table]) -> Option<Relationship>;
}

/// `<singular target table><identifier suffix>` naming convention,
/// e.g. `customer_id` -> `customers.customer_id`.
pub struct NamingConventionInference {
    similarity: Arc<dyn NameSimilarity>,
    threshold: f64,
}

impl Default for NamingConventionInference {
    fn default() -> Self {
        let matcher = FuzzyMatcher::default();
        let threshold = matcher.similarity_threshold;
        Self::new(Arc::new(matcher), threshold)
    }
}

impl NamingConventionInference {
    pub fn new(similarity: Arc<dyn NameSimilarity>, threshold: f64) -> Self {
        Self { similarity, threshold }
    }

    /// Score how well an identifier prefix names a table (0.0 = no match).
    fn score_prefix(&self, prefix: &str, table: &Table) -> f64 {
        let name = table.name.to_lowercase();
        let singular = singularize(&name);
        if prefix == singular || prefix == name {
            return 1.0;
        }
        if is_qualified(prefix, table) {
            return 0.95;
        }
        let score = self.similarity.similarity(prefix, &singular);
        if score >= self.threshold {
            score
        } else {
            0.0
        }
    }
}

impl RelationshipInference for NamingConventionInference {
    fn infer(&self, table: &Table, column: &Column, tables: &[Table]) -> Option<Relationship> {
        let own_key = table.primary_key().map(|pk| pk.name == column.name).unwrap_or(false);
        if own_key {
            return None;
        }
        let prefix = strip_identifier_suffix(&column.name)?;

        let mut best: Option<(&Table, String, f64)> = None;
        for candidate in tables {
            let score = self.score_prefix(&prefix, candidate);
            if score <= 0.0 {
                continue;
            }
            // products.product_id names the table itself, not a parent row
            if candidate.name == table.name && !is_qualified(&prefix, candidate) {
                continue;
            }
            let target_column = match candidate.primary_key() {
                Some(pk) => pk.name.clone(),
                None if candidate.name != table.name => match candidate.column(&column.name) {
                    Some(c) => c.name.clone(),
                    None => continue,
                },
                None => continue,
            };
            if candidate.name == table.name && target_column == column.name {
                continue;
            }
            let better = match &best {
                None => true,
                Some((current, _, best_score)) => {
                    score > *best_score || (score == *best_score && candidate.name < current.name)
                }
            };
            if better {
                best = Some((candidate, target_column, score));
            }
        }

        best.map(|(target, target_column, _)| {
            Relationship::inferred(&table.name, &column.name, &target.name, target_column)
        })
    }
}

/// Qualified references such as parent_category_id or billing_customer_id
fn is_qualified(prefix: &str, table: &Table) -> bool {
    prefix.ends_with(&format!("_{}", singularize(&table.name.to_lowercase())))
}

/// Strip an identifier-like suffix, returning the remaining prefix.
fn strip_identifier_suffix(name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    for suffix in ["_id", "_key", "_fk"] {
        if let Some(prefix) = lower.strip_suffix(suffix) {
            let prefix = prefix.trim_end_matches('_');
            return (!prefix.is_empty()).then(|| prefix.to_string());
        }
    }
    if lower.len() > 4 {
        if let Some(prefix) = lower.strip_suffix("id") {
            return Some(prefix.to_string());
        }
    }
    None
}
