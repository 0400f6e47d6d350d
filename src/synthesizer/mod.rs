//! Query Synthesizer
//!
//! Turns a question and a schema snapshot into SQL by walking the pattern
//! catalog in priority order. The first rule whose keywords are present and
//! whose slots bind against the schema wins; if none does, a fallback query
//! over the best-matching table is produced.
//!
//! Synthesis is a pure function of (question, schema): the same inputs yield
//! the same SQL and trace.

pub mod question;
pub mod resolve;
mod rules;
pub mod trace;

pub use question::{DateRange, Question};
pub use resolve::{EntityResolver, Resolution, TableMatch};
pub use trace::{
    Aggregate, AggregateFunction, EntityBinding, EntityKind, Filter, Join, LimitBinding, MatchKind,
    Operations, OrderBy, SynthesisTrace,
};

use crate::catalog::{render_template, RuleId, FALLBACK_SPECIFICITY, FALLBACK_TEMPLATE, PATTERN_CATALOG};
use crate::error::{QueryCraftError, Result};
use crate::schema::SchemaModel;
use rules::{Binding, Context};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Row limits applied when the question gives no quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisLimits {
    pub top_default: u64,
    pub fallback: u64,
    pub list: u64,
    pub recent: u64,
}

impl Default for SynthesisLimits {
    fn default() -> Self {
        Self {
            top_default: 10,
            fallback: 10,
            list: 100,
            recent: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Synthesis {
    pub sql: String,
    pub trace: SynthesisTrace,
}

pub struct QuerySynthesizer {
    resolver: EntityResolver,
    limits: SynthesisLimits,
}

impl Default for QuerySynthesizer {
    fn default() -> Self {
        Self::new(EntityResolver::default(), SynthesisLimits::default())
    }
}

impl QuerySynthesizer {
    pub fn new(resolver: EntityResolver, limits: SynthesisLimits) -> Self {
        Self { resolver, limits }
    }

    pub fn limits(&self) -> &SynthesisLimits {
        &self.limits
    }

    /// Synthesize SQL for `question` against `model`.
    ///
    /// Never fails on an unrecognised question; the only error is a schema
    /// with no tables.
    pub fn synthesize(&self, question: &str, model: &SchemaModel) -> Result<Synthesis> {
        if model.is_empty() {
            return Err(QueryCraftError::EmptySchema);
        }
        let question = Question::parse(question);
        let resolution = self.resolver.resolve_tables(&question, model);
        let ctx = Context {
            question: &question,
            model,
            resolver: &self.resolver,
            resolution: &resolution,
            limits: &self.limits,
        };

        for rule in PATTERN_CATALOG.iter() {
            if let Some(binding) = rules::bind(rule, &ctx) {
                debug!("Question '{}' matched rule {}", question.normalized(), rule.id);
                return Ok(finish(
                    rule.id,
                    rule.template,
                    rule.specificity,
                    false,
                    binding,
                ));
            }
        }

        debug!("No rule matched '{}', using fallback", question.normalized());
        let binding = rules::fallback(&ctx).ok_or(QueryCraftError::EmptySchema)?;
        Ok(finish(
            RuleId::Fallback,
            FALLBACK_TEMPLATE,
            FALLBACK_SPECIFICITY,
            true,
            binding,
        ))
    }
}

fn finish(
    rule: RuleId,
    template: &str,
    specificity: u8,
    fallback: bool,
    binding: Binding,
) -> Synthesis {
    let sql = render_template(template, &binding.slots);
    Synthesis {
        sql,
        trace: SynthesisTrace {
            rule,
            specificity,
            fallback,
            tables: binding.tables,
            bindings: binding.bindings,
            limit: binding.limit,
            operations: binding.operations,
            ambiguous: binding.ambiguous,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::ecommerce_model;
    use crate::schema::{Column, Relationship, Table};

    fn synth(question: &str) -> Synthesis {
        QuerySynthesizer::default()
            .synthesize(question, &ecommerce_model())
            .expect("synthesis")
    }

    /// Names that are SQL keywords or contain spaces
    fn awkward_model() -> SchemaModel {
        SchemaModel::new(
            vec![
                Table::new(
                    "order",
                    vec![
                        Column::new("id", "INTEGER").primary_key(),
                        Column::new("amount", "DECIMAL(10,2)"),
                        Column::new("group", "TEXT"),
                    ],
                ),
                Table::new(
                    "Order Details",
                    vec![
                        Column::new("id", "INTEGER").primary_key(),
                        Column::new("order_id", "INTEGER"),
                        Column::new("quantity", "INTEGER"),
                    ],
                ),
            ],
            vec![Relationship::declared("Order Details", "order_id", "order", "id")],
        )
    }

    fn synth_awkward(question: &str) -> Synthesis {
        QuerySynthesizer::default()
            .synthesize(question, &awkward_model())
            .expect("synthesis")
    }

    #[test]
    fn test_count_rows() {
        let s = synth("How many customers do we have?");
        assert_eq!(s.trace.rule, RuleId::CountRows);
        assert_eq!(s.sql, "SELECT COUNT(*) AS total_customers FROM customers");
        assert_eq!(s.trace.tables, vec!["customers"]);
    }

    #[test]
    fn test_top_by_related_aggregate() {
        let s = synth("What are the top 10 customers by total spending?");
        assert_eq!(s.trace.rule, RuleId::TopByRelatedAggregate);
        assert_eq!(
            s.sql,
            "SELECT customers.customer_name, SUM(orders.total_amount) AS total_spent \
             FROM customers JOIN orders ON customers.customer_id = orders.customer_id \
             GROUP BY customers.customer_id, customers.customer_name \
             ORDER BY total_spent DESC LIMIT 10"
        );
        assert_eq!(s.trace.tables, vec!["customers", "orders"]);
        assert_eq!(s.trace.limit, Some(LimitBinding { value: 10, defaulted: false }));
    }

    #[test]
    fn test_top_quantity_and_default_limit() {
        let s = synth("What are the top 3 customers by spending?");
        assert!(s.sql.ends_with("LIMIT 3"));

        let s = synth("Which products are selling the most?");
        assert_eq!(s.trace.rule, RuleId::TopByRelatedAggregate);
        assert!(s.sql.contains("SUM(order_items.quantity) AS total_sold"));
        assert!(s.sql.ends_with("LIMIT 10"));
        assert_eq!(s.trace.limit.map(|l| l.defaulted), Some(true));
    }

    #[test]
    fn test_top_by_column() {
        let s = synth("top 5 products by price");
        assert_eq!(s.trace.rule, RuleId::TopByColumn);
        assert_eq!(s.sql, "SELECT product_name, price FROM products ORDER BY price DESC LIMIT 5");
    }

    #[test]
    fn test_above_average_uses_subquery() {
        let s = synth("Which products are priced above average?");
        assert_eq!(s.trace.rule, RuleId::AboveAverage);
        assert_eq!(
            s.sql,
            "SELECT product_name, price FROM products WHERE price > (SELECT AVG(price) FROM products) ORDER BY price DESC"
        );
        assert!(s.trace.operations.subquery);
    }

    #[test]
    fn test_aggregates() {
        let s = synth("What is the average order value?");
        assert_eq!(s.trace.rule, RuleId::AverageColumn);
        assert_eq!(s.sql, "SELECT AVG(total_amount) AS average_total_amount FROM orders");

        let s = synth("What is the total revenue?");
        assert_eq!(s.trace.rule, RuleId::SumColumn);
        assert_eq!(s.sql, "SELECT SUM(total_amount) AS total_revenue FROM orders");

        let s = synth("What is the cheapest product price?");
        assert_eq!(s.trace.rule, RuleId::ExtremeValue);
        assert_eq!(s.sql, "SELECT MIN(price) AS min_price FROM products");
    }

    #[test]
    fn test_count_by_group() {
        let s = synth("Show the number of orders per status");
        assert_eq!(s.trace.rule, RuleId::CountByGroup);
        assert_eq!(
            s.sql,
            "SELECT status, COUNT(*) AS order_count FROM orders GROUP BY status ORDER BY order_count DESC"
        );
    }

    #[test]
    fn test_dates() {
        let s = synth("Show orders placed in 2023");
        assert_eq!(s.trace.rule, RuleId::DateRange);
        assert_eq!(
            s.sql,
            "SELECT * FROM orders WHERE order_date >= '2023-01-01' AND order_date < '2024-01-01' ORDER BY order_date"
        );

        let s = synth("Show me recent orders");
        assert_eq!(s.trace.rule, RuleId::RecentRows);
        assert_eq!(s.sql, "SELECT * FROM orders ORDER BY order_date DESC LIMIT 10");
    }

    #[test]
    fn test_filters() {
        let s = synth("List all customers from the USA");
        assert_eq!(s.trace.rule, RuleId::FilterByValue);
        assert_eq!(
            s.sql,
            "SELECT * FROM customers WHERE (country LIKE 'USA' OR city LIKE 'USA')"
        );

        let s = synth("Show orders with status shipped");
        assert_eq!(s.sql, "SELECT * FROM orders WHERE status LIKE 'shipped'");
    }

    #[test]
    fn test_lists() {
        let s = synth("Show me all products");
        assert_eq!(s.trace.rule, RuleId::ListRows);
        assert_eq!(s.sql, "SELECT * FROM products LIMIT 100");

        let s = synth("Show all orders with customer names");
        assert_eq!(s.trace.rule, RuleId::ListJoined);
        assert_eq!(
            s.sql,
            "SELECT orders.*, customers.customer_name FROM orders JOIN customers ON customers.customer_id = orders.customer_id LIMIT 100"
        );
    }

    #[test]
    fn test_fallback() {
        let s = synth("asdkjhaskjdh");
        assert!(s.trace.fallback);
        assert_eq!(s.trace.rule, RuleId::Fallback);
        assert_eq!(s.sql, "SELECT * FROM customers LIMIT 10");

        let s = synth("tell me something about products");
        assert!(s.trace.fallback);
        assert_eq!(s.sql, "SELECT * FROM products LIMIT 10");
    }

    #[test]
    fn test_reserved_names_are_quoted() {
        let s = synth_awkward("How many orders are there?");
        assert_eq!(s.trace.rule, RuleId::CountRows);
        assert_eq!(s.sql, "SELECT COUNT(*) AS total_order FROM \"order\"");

        let s = synth_awkward("Count orders per group");
        assert_eq!(s.trace.rule, RuleId::CountByGroup);
        assert_eq!(
            s.sql,
            "SELECT \"group\", COUNT(*) AS order_count FROM \"order\" GROUP BY \"group\" ORDER BY order_count DESC"
        );
        assert_eq!(s.trace.operations.group_by, vec!["group"]);
    }

    #[test]
    fn test_spaced_names_are_quoted() {
        let s = synth_awkward("asdf");
        assert!(s.trace.fallback);
        assert_eq!(s.sql, "SELECT * FROM \"Order Details\" LIMIT 10");

        let s = synth_awkward("Show all order details with orders");
        assert_eq!(s.trace.rule, RuleId::ListJoined);
        assert_eq!(
            s.sql,
            "SELECT \"Order Details\".*, \"order\".\"group\" FROM \"Order Details\" \
             JOIN \"order\" ON \"order\".id = \"Order Details\".order_id LIMIT 100"
        );

        let s = synth_awkward("Top orders by quantity sold");
        assert_eq!(s.trace.rule, RuleId::TopByRelatedAggregate);
        assert_eq!(
            s.sql,
            "SELECT \"order\".\"group\", SUM(\"Order Details\".quantity) AS total_sold \
             FROM \"order\" JOIN \"Order Details\" ON \"order\".id = \"Order Details\".order_id \
             GROUP BY \"order\".id, \"order\".\"group\" ORDER BY total_sold DESC LIMIT 10"
        );
    }

    #[test]
    fn test_non_ascii_filter_value() {
        let s = synth("List all customers from Zürich");
        assert_eq!(s.trace.rule, RuleId::FilterByValue);
        assert_eq!(
            s.sql,
            "SELECT * FROM customers WHERE (country LIKE 'Zürich' OR city LIKE 'Zürich')"
        );
    }

    #[test]
    fn test_oversized_quantity_uses_default_limit() {
        let s = synth("top 18446744073709551615 products by price");
        assert_eq!(s.trace.rule, RuleId::TopByColumn);
        assert_eq!(s.sql, "SELECT product_name, price FROM products ORDER BY price DESC LIMIT 10");
        assert_eq!(s.trace.limit, Some(LimitBinding { value: 10, defaulted: true }));
    }

    #[test]
    fn test_ambiguity_only_counts_for_bound_tables() {
        let model = SchemaModel::new(
            vec![
                Table::new("order", vec![Column::new("id", "INTEGER").primary_key()]),
                Table::new("orders", vec![Column::new("id", "INTEGER").primary_key()]),
                Table::new(
                    "products",
                    vec![
                        Column::new("id", "INTEGER").primary_key(),
                        Column::new("price", "REAL"),
                    ],
                ),
            ],
            Vec::<Relationship>::new(),
        );
        let synthesizer = QuerySynthesizer::default();

        let s = synthesizer
            .synthesize("How many products are in orders?", &model)
            .expect("synthesis");
        assert_eq!(s.trace.tables, vec!["products"]);
        assert!(!s.trace.ambiguous);

        let s = synthesizer.synthesize("How many orders are there?", &model).expect("synthesis");
        assert_eq!(s.trace.tables, vec!["order"]);
        assert!(s.trace.ambiguous);
    }

    #[test]
    fn test_empty_schema_is_an_error() {
        let err = QuerySynthesizer::default()
            .synthesize("How many customers?", &SchemaModel::empty())
            .unwrap_err();
        assert!(matches!(err, QueryCraftError::EmptySchema));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let model = ecommerce_model();
        let synthesizer = QuerySynthesizer::default();
        let first = synthesizer.synthesize("Top 10 customers by total spending", &model).expect("first");
        let second = synthesizer.synthesize("Top 10 customers by total spending", &model).expect("second");
        assert_eq!(first, second);
    }
}
