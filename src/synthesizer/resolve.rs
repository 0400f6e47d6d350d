//! Entity resolution - binds question tokens to tables and columns
//!
//! Tables are matched bigrams first (`order items` -> `order_items`), then
//! single tokens by exact name or singular, synonym, and fuzzy similarity.
//! Columns within a table are matched exact, then substring, then through
//! measure vocabulary, then by type default.

use super::question::Question;
use super::trace::MatchKind;
use crate::catalog::vocabulary::{is_stopword, synonym_for, MEASURE_HINTS};
use crate::fuzzy_matcher::{singularize, FuzzyMatcher, NameSimilarity};
use crate::schema::{Column, SchemaModel, Table};
use itertools::Itertools;
use std::sync::Arc;
use tracing::debug;

/// A table referenced by the question
#[derive(Debug, Clone, PartialEq)]
pub struct TableMatch {
    pub table: String,
    pub matched: MatchKind,
    /// 1.0 for exact matches, the similarity score for fuzzy ones
    pub score: f64,
    /// Token index where the reference starts
    pub position: usize,
    /// The same token matched another table equally well
    pub ambiguous: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMatch {
    pub column: String,
    pub matched: MatchKind,
    /// Hint priority for vocabulary matches, 0 otherwise
    rank: usize,
}

impl ColumnMatch {
    pub fn new(column: impl Into<String>, matched: MatchKind) -> Self {
        Self {
            column: column.into(),
            matched,
            rank: 0,
        }
    }

    pub(crate) fn sort_key(&self) -> (u8, usize) {
        (priority(self.matched), self.rank)
    }
}

/// Tables referenced by a question, in question order
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub tables: Vec<TableMatch>,
}

impl Resolution {
    pub fn get(&self, table: &str) -> Option<&TableMatch> {
        self.tables.iter().find(|m| m.table == table)
    }

    /// Table that most closely matches any token; equal scores go to the
    /// lexicographically smaller name.
    pub fn best(&self) -> Option<&TableMatch> {
        self.tables.iter().min_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.table.cmp(&b.table))
        })
    }
}

pub struct EntityResolver {
    similarity: Arc<dyn NameSimilarity>,
    threshold: f64,
}

impl Default for EntityResolver {
    fn default() -> Self {
        let matcher = FuzzyMatcher::default();
        let threshold = matcher.similarity_threshold;
        Self::new(Arc::new(matcher), threshold)
    }
}

impl EntityResolver {
    pub fn new(similarity: Arc<dyn NameSimilarity>, threshold: f64) -> Self {
        Self { similarity, threshold }
    }

    pub fn resolve_tables(&self, question: &Question, model: &SchemaModel) -> Resolution {
        let tokens = question.tokens();
        let names: Vec<(&str, String)> = model
            .table_names()
            .map(|n| (n, singularize(&n.to_lowercase().replace(' ', "_"))))
            .collect();
        let mut consumed = vec![false; tokens.len()];
        let mut found = Vec::new();

        for i in 0..tokens.len().saturating_sub(1) {
            let joined = format!("{}_{}", tokens[i], tokens[i + 1]);
            let singular = singularize(&joined);
            let hits: Vec<&str> = names
                .iter()
                .filter(|(name, s)| name.eq_ignore_ascii_case(&joined) || *s == singular)
                .map(|(name, _)| *name)
                .collect();
            if let Some(first) = hits.first() {
                found.push(table_match(first, MatchKind::Exact, 1.0, i, hits.len() > 1));
                consumed[i] = true;
                consumed[i + 1] = true;
            }
        }

        for (i, token) in tokens.iter().enumerate() {
            if consumed[i] || token.len() < 3 || is_stopword(token) || token.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let singular = singularize(token);

            // names are lexicographic, so the first hit is the tie-break winner
            let exact: Vec<&str> = names
                .iter()
                .filter(|(name, s)| name.eq_ignore_ascii_case(token) || *s == singular)
                .map(|(name, _)| *name)
                .collect();
            if let Some(first) = exact.first() {
                found.push(table_match(first, MatchKind::Exact, 1.0, i, exact.len() > 1));
                continue;
            }

            if let Some(canonical) = synonym_for(&singular) {
                let hits: Vec<&str> = names
                    .iter()
                    .filter(|(_, s)| s == canonical)
                    .map(|(name, _)| *name)
                    .collect();
                if let Some(first) = hits.first() {
                    found.push(table_match(first, MatchKind::Synonym, 0.95, i, hits.len() > 1));
                    continue;
                }
            }

            let mut best: Option<(&str, f64)> = None;
            let mut tied = false;
            for (name, s) in &names {
                let score = self.similarity.similarity(&singular, s);
                if score < self.threshold {
                    continue;
                }
                match best {
                    Some((_, top)) if score < top => {}
                    Some((_, top)) if score == top => tied = true,
                    _ => {
                        best = Some((*name, score));
                        tied = false;
                    }
                }
            }
            if let Some((name, score)) = best {
                debug!("Fuzzy table match '{}' -> {} ({:.2})", token, name, score);
                found.push(table_match(name, MatchKind::Fuzzy, score, i, tied));
            }
        }

        let tables = found
            .into_iter()
            .sorted_by_key(|m| m.position)
            .unique_by(|m| m.table.clone())
            .collect();
        Resolution { tables }
    }

    /// Best column of `table` accepted by `accept`.
    pub fn resolve_column<F>(
        &self,
        question: &Question,
        table: &Table,
        accept: F,
        hints: &[&str],
        allow_default: bool,
    ) -> Option<ColumnMatch>
    where
        F: Fn(&Column) -> bool,
    {
        let candidates: Vec<&Column> = table.columns.iter().filter(|c| accept(*c)).collect();
        let tokens = question.tokens();
        let bigrams: Vec<String> = tokens.windows(2).map(|w| format!("{}_{}", w[0], w[1])).collect();

        for column in &candidates {
            let name = column.name.to_lowercase();
            let named = tokens.iter().any(|t| *t == name || singularize(t) == name)
                || bigrams.iter().any(|b| *b == name);
            if named {
                return Some(column_match(column, MatchKind::Exact, 0));
            }
        }

        for column in &candidates {
            let name = column.name.to_lowercase();
            let contained = tokens
                .iter()
                .filter(|t| t.len() >= 4 && !is_stopword(t))
                .any(|t| name.contains(t.as_str()));
            if contained {
                return Some(column_match(column, MatchKind::Substring, 0));
            }
        }

        for (rank, hint) in hints.iter().enumerate() {
            if let Some(column) = candidates.iter().find(|c| c.name.to_lowercase().contains(hint)) {
                return Some(column_match(column, MatchKind::Inferred, rank));
            }
        }

        if allow_default {
            return candidates.first().map(|c| column_match(c, MatchKind::Default, 0));
        }
        None
    }

    /// Find a table through its columns when the question names no table.
    /// Ties go to the lexicographically smaller table.
    pub fn table_for_column<F>(
        &self,
        question: &Question,
        model: &SchemaModel,
        accept: F,
        hints: &[&str],
    ) -> Option<(TableMatch, ColumnMatch)>
    where
        F: Fn(&Column) -> bool,
    {
        let mut best: Option<(&Table, ColumnMatch)> = None;
        for table in model.tables() {
            let Some(column) = self.resolve_column(question, table, &accept, hints, false) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((_, current)) => column.sort_key() < current.sort_key(),
            };
            if better {
                best = Some((table, column));
            }
        }
        best.map(|(table, column)| (table_match(&table.name, MatchKind::Inferred, 0.0, 0, false), column))
    }
}

/// Column-name fragments suggested by the question's vocabulary
pub fn measure_hints(question: &Question) -> Vec<&'static str> {
    MEASURE_HINTS
        .iter()
        .filter(|(words, _)| question.has_any(words))
        .flat_map(|(_, fragments)| fragments.iter().copied())
        .unique()
        .collect()
}

/// Lower is better
pub fn priority(kind: MatchKind) -> u8 {
    match kind {
        MatchKind::Exact => 0,
        MatchKind::Synonym => 1,
        MatchKind::Substring => 2,
        MatchKind::Fuzzy => 3,
        MatchKind::Inferred => 4,
        MatchKind::Default => 5,
    }
}

fn table_match(
    table: &str,
    matched: MatchKind,
    score: f64,
    position: usize,
    ambiguous: bool,
) -> TableMatch {
    TableMatch {
        table: table.to_string(),
        matched,
        score,
        position,
        ambiguous,
    }
}

fn column_match(column: &Column, matched: MatchKind, rank: usize) -> ColumnMatch {
    ColumnMatch {
        column: column.name.clone(),
        matched,
        rank,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::ecommerce_model;
    use crate::schema::Relationship;

    fn tables(question: &str) -> Resolution {
        EntityResolver::default().resolve_tables(&Question::parse(question), &ecommerce_model())
    }

    fn names(resolution: &Resolution) -> Vec<&str> {
        resolution.tables.iter().map(|m| m.table.as_str()).collect()
    }

    #[test]
    fn test_exact_and_plural_matches() {
        let r = tables("How many customers do we have?");
        assert_eq!(names(&r), vec!["customers"]);
        assert_eq!(r.tables[0].matched, MatchKind::Exact);

        let r = tables("show every order for each customer");
        assert_eq!(names(&r), vec!["orders", "customers"]);
        assert!(r.tables.iter().all(|m| !m.ambiguous));
    }

    #[test]
    fn test_bigram_before_single_tokens() {
        let r = tables("list order items");
        assert_eq!(names(&r), vec!["order_items"]);
    }

    #[test]
    fn test_synonym_and_fuzzy() {
        let r = tables("list all clients");
        assert_eq!(names(&r), vec!["customers"]);
        assert_eq!(r.tables[0].matched, MatchKind::Synonym);

        let r = tables("show custmers");
        assert_eq!(names(&r), vec!["customers"]);
        assert_eq!(r.tables[0].matched, MatchKind::Fuzzy);
    }

    #[test]
    fn test_ambiguous_names_pick_lexicographic_first() {
        let model = SchemaModel::new(
            vec![
                Table::new("order", vec![Column::new("id", "INTEGER").primary_key()]),
                Table::new("orders", vec![Column::new("id", "INTEGER").primary_key()]),
            ],
            Vec::<Relationship>::new(),
        );
        let r = EntityResolver::default().resolve_tables(&Question::parse("show orders"), &model);
        assert_eq!(names(&r), vec!["order"]);
        assert!(r.tables[0].ambiguous);
    }

    #[test]
    fn test_ambiguity_is_tracked_per_table() {
        let model = SchemaModel::new(
            vec![
                Table::new("order", vec![Column::new("id", "INTEGER").primary_key()]),
                Table::new("orders", vec![Column::new("id", "INTEGER").primary_key()]),
                Table::new("products", vec![Column::new("id", "INTEGER").primary_key()]),
            ],
            Vec::<Relationship>::new(),
        );
        let r = EntityResolver::default().resolve_tables(&Question::parse("show products and orders"), &model);
        assert_eq!(names(&r), vec!["products", "order"]);
        assert!(!r.tables[0].ambiguous);
        assert!(r.tables[1].ambiguous);
    }

    #[test]
    fn test_names_with_spaces_match_bigrams() {
        let model = SchemaModel::new(
            vec![Table::new("Order Details", vec![Column::new("id", "INTEGER").primary_key()])],
            Vec::<Relationship>::new(),
        );
        let r = EntityResolver::default().resolve_tables(&Question::parse("list order details"), &model);
        assert_eq!(names(&r), vec!["Order Details"]);
        assert_eq!(r.tables[0].matched, MatchKind::Exact);
    }

    #[test]
    fn test_unknown_tokens_resolve_nothing() {
        let r = tables("asdkjhaskjdh");
        assert!(r.tables.is_empty());
        assert!(r.best().is_none());
    }

    #[test]
    fn test_column_resolution_order() {
        let model = ecommerce_model();
        let resolver = EntityResolver::default();
        let products = model.table("products").expect("products");

        let q = Question::parse("top 5 products by price");
        let m = resolver
            .resolve_column(&q, products, Column::is_numeric, &[], true)
            .expect("price");
        assert_eq!((m.column.as_str(), m.matched), ("price", MatchKind::Exact));

        let q = Question::parse("which products are most expensive");
        let hints = measure_hints(&q);
        let m = resolver
            .resolve_column(&q, products, |c| c.is_numeric() && !c.is_identifier(), &hints, true)
            .expect("hinted");
        assert_eq!((m.column.as_str(), m.matched), ("price", MatchKind::Inferred));

        let q = Question::parse("average of products");
        let m = resolver
            .resolve_column(&q, products, |c| c.is_numeric() && !c.is_identifier(), &[], true)
            .expect("default");
        assert_eq!((m.column.as_str(), m.matched), ("price", MatchKind::Default));
    }

    #[test]
    fn test_table_found_through_measure_vocabulary() {
        let model = ecommerce_model();
        let q = Question::parse("What is the total revenue?");
        let hints = measure_hints(&q);
        let (table, column) = EntityResolver::default()
            .table_for_column(&q, &model, |c| c.is_numeric() && !c.is_identifier(), &hints)
            .expect("measure");
        assert_eq!(table.table, "orders");
        assert_eq!(column.column, "total_amount");
    }
}
