//! Complexity Classifier
//!
//! Buckets a query into Easy / Medium / Advanced from its structural
//! features. Features come from the synthesis trace when one is available,
//! otherwise from the SQL text: parsed with `sqlparser`, or scanned with a
//! keyword heuristic when parsing fails.
//!
//! Precedence: subquery, derived table, CTE, window function or more than
//! two tables is Advanced; aggregation, grouping or exactly two tables is
//! Medium; anything else is Easy. A bare `COUNT(*)` is a row count, not an
//! aggregation.

use crate::synthesizer::SynthesisTrace;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{
    Expr, Function, FunctionArg, FunctionArgExpr, GroupByExpr, Query, SelectItem, SetExpr, Statement,
    TableFactor, TableWithJoins,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

lazy_static! {
    static ref TABLE_REF: Regex =
        Regex::new(r#"(?i)\b(?:FROM|JOIN)\s+("(?:[^"]|"")+"|[A-Za-z_][A-Za-z0-9_]*)"#).expect("table regex");
    static ref VALUE_AGGREGATE: Regex =
        Regex::new(r"(?i)\b(?:SUM|AVG|MIN|MAX)\s*\(|\bCOUNT\s*\(\s*[^*\s)]").expect("aggregate regex");
    static ref WINDOW: Regex = Regex::new(r"(?i)\bOVER\s*\(").expect("window regex");
    static ref NESTED_SELECT: Regex = Regex::new(r"(?i)\(\s*SELECT\b|^\s*WITH\b").expect("subquery regex");
    static ref GROUPING: Regex = Regex::new(r"(?i)\bGROUP\s+BY\b|\bHAVING\b").expect("grouping regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Easy,
    Medium,
    Advanced,
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ComplexityTier::Easy => "easy",
            ComplexityTier::Medium => "medium",
            ComplexityTier::Advanced => "advanced",
        };
        f.write_str(label)
    }
}

/// Structural features that drive the classification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryFeatures {
    /// Distinct tables referenced, lexicographic
    pub tables: Vec<String>,
    pub table_count: usize,
    pub has_aggregation: bool,
    pub has_grouping: bool,
    /// Scalar or correlated subquery, derived table, CTE or set operation
    pub has_subquery: bool,
    pub has_window_function: bool,
}

impl QueryFeatures {
    pub fn from_trace(trace: &SynthesisTrace) -> Self {
        let tables: BTreeSet<String> = trace.tables.iter().cloned().collect();
        Self {
            table_count: tables.len(),
            tables: tables.into_iter().collect(),
            has_aggregation: trace.value_aggregate().is_some(),
            has_grouping: !trace.operations.group_by.is_empty(),
            has_subquery: trace.operations.subquery,
            has_window_function: false,
        }
    }

    /// Extract features from SQL text using sqlparser
    pub fn from_sql(sql: &str) -> Self {
        let dialect = GenericDialect {};
        match Parser::parse_sql(&dialect, sql) {
            Ok(statements) => {
                let mut visitor = FeatureVisitor::default();
                for statement in &statements {
                    if let Statement::Query(query) = statement {
                        visitor.query(query);
                    }
                }
                visitor.finish()
            }
            Err(e) => {
                warn!("SQL parsing failed: {}, using heuristic fallback", e);
                Self::from_sql_heuristic(sql)
            }
        }
    }

    /// Keyword scan used when the SQL does not parse
    fn from_sql_heuristic(sql: &str) -> Self {
        let tables = extract_tables(sql);
        Self {
            table_count: tables.len(),
            tables,
            has_aggregation: VALUE_AGGREGATE.is_match(sql),
            has_grouping: GROUPING.is_match(sql),
            has_subquery: NESTED_SELECT.is_match(sql),
            has_window_function: WINDOW.is_match(sql),
        }
    }
}

/// Table names following FROM / JOIN, lower-cased and de-duplicated
pub fn extract_tables(sql: &str) -> Vec<String> {
    TABLE_REF
        .captures_iter(sql)
        .filter_map(|c| c.get(1))
        .map(|m| unquote(m.as_str()).to_lowercase())
        .filter(|name| name != "select")
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn unquote(name: &str) -> String {
    match name.strip_prefix('"').and_then(|n| n.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => name.to_string(),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ComplexityClassifier;

impl ComplexityClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, features: &QueryFeatures) -> ComplexityTier {
        if features.has_subquery || features.has_window_function || features.table_count > 2 {
            ComplexityTier::Advanced
        } else if features.has_aggregation || features.has_grouping || features.table_count == 2 {
            ComplexityTier::Medium
        } else {
            ComplexityTier::Easy
        }
    }

    pub fn classify_trace(&self, trace: &SynthesisTrace) -> ComplexityTier {
        self.classify(&QueryFeatures::from_trace(trace))
    }

    pub fn classify_sql(&self, sql: &str) -> ComplexityTier {
        self.classify(&QueryFeatures::from_sql(sql))
    }
}

#[derive(Default)]
struct FeatureVisitor {
    tables: BTreeSet<String>,
    has_aggregation: bool,
    has_grouping: bool,
    has_subquery: bool,
    has_window_function: bool,
    /// Nesting depth; anything below the top level is a subquery
    depth: usize,
}

impl FeatureVisitor {
    fn finish(self) -> QueryFeatures {
        QueryFeatures {
            table_count: self.tables.len(),
            tables: self.tables.into_iter().collect(),
            has_aggregation: self.has_aggregation,
            has_grouping: self.has_grouping,
            has_subquery: self.has_subquery,
            has_window_function: self.has_window_function,
        }
    }

    fn query(&mut self, query: &Query) {
        if self.depth > 0 {
            self.has_subquery = true;
        }
        self.depth += 1;
        if let Some(with) = &query.with {
            self.has_subquery = true;
            for cte in &with.cte_tables {
                self.query(&cte.query);
            }
        }
        self.set_expr(&query.body);
        self.depth -= 1;
    }

    fn set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => {
                for item in &select.projection {
                    if let SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } = item {
                        self.expr(expr);
                    }
                }
                for from in &select.from {
                    self.table_with_joins(from);
                }
                if let Some(selection) = &select.selection {
                    self.expr(selection);
                }
                match &select.group_by {
                    GroupByExpr::All => self.has_grouping = true,
                    GroupByExpr::Expressions(exprs) => {
                        if !exprs.is_empty() {
                            self.has_grouping = true;
                        }
                    }
                }
                if let Some(having) = &select.having {
                    self.has_grouping = true;
                    self.expr(having);
                }
            }
            SetExpr::Query(query) => self.query(query),
            SetExpr::SetOperation { left, right, .. } => {
                self.has_subquery = true;
                self.set_expr(left);
                self.set_expr(right);
            }
            _ => {}
        }
    }

    fn table_with_joins(&mut self, from: &TableWithJoins) {
        self.table_factor(&from.relation);
        for join in &from.joins {
            self.table_factor(&join.relation);
        }
    }

    fn table_factor(&mut self, factor: &TableFactor) {
        match factor {
            TableFactor::Table { name, .. } => {
                self.tables.insert(name.to_string().to_lowercase());
            }
            TableFactor::Derived { subquery, .. } => {
                self.has_subquery = true;
                self.query(subquery);
            }
            TableFactor::NestedJoin { table_with_joins, .. } => {
                self.table_with_joins(table_with_joins);
            }
            _ => {}
        }
    }

    fn function(&mut self, func: &Function) {
        if func.over.is_some() {
            self.has_window_function = true;
        }
        let name = func.name.to_string().to_uppercase();
        let args: Vec<&FunctionArgExpr> = func
            .args
            .iter()
            .map(|arg| match arg {
                FunctionArg::Unnamed(arg) | FunctionArg::Named { arg, .. } => arg,
            })
            .collect();
        match name.as_str() {
            "SUM" | "AVG" | "MIN" | "MAX" | "TOTAL" | "GROUP_CONCAT" => self.has_aggregation = true,
            "COUNT" => {
                let row_count = args.iter().all(|a| matches!(a, FunctionArgExpr::Wildcard));
                if !row_count {
                    self.has_aggregation = true;
                }
            }
            _ => {}
        }
        for arg in args {
            if let FunctionArgExpr::Expr(expr) = arg {
                self.expr(expr);
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Function(func) => self.function(func),
            Expr::Subquery(query) => self.nested(query),
            Expr::Exists { subquery, .. } => self.nested(subquery),
            Expr::InSubquery { expr, subquery, .. } => {
                self.expr(expr);
                self.nested(subquery);
            }
            Expr::BinaryOp { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::UnaryOp { expr, .. }
            | Expr::Nested(expr)
            | Expr::IsNull(expr)
            | Expr::IsNotNull(expr)
            | Expr::Cast { expr, .. } => self.expr(expr),
            Expr::Between { expr, low, high, .. } => {
                self.expr(expr);
                self.expr(low);
                self.expr(high);
            }
            Expr::InList { expr, list, .. } => {
                self.expr(expr);
                for e in list {
                    self.expr(e);
                }
            }
            Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
                self.expr(expr);
                self.expr(pattern);
            }
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                if let Some(op) = operand {
                    self.expr(op);
                }
                for e in conditions.iter().chain(results.iter()) {
                    self.expr(e);
                }
                if let Some(e) = else_result {
                    self.expr(e);
                }
            }
            _ => {}
        }
    }

    fn nested(&mut self, query: &Query) {
        self.has_subquery = true;
        self.query(query);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(sql: &str) -> ComplexityTier {
        ComplexityClassifier::new().classify_sql(sql)
    }

    #[test]
    fn test_row_count_is_easy() {
        assert_eq!(tier("SELECT COUNT(*) AS total_customers FROM customers"), ComplexityTier::Easy);
        assert_eq!(tier("SELECT * FROM products LIMIT 100"), ComplexityTier::Easy);
    }

    #[test]
    fn test_aggregation_and_joins_are_medium() {
        assert_eq!(tier("SELECT AVG(total_amount) AS a FROM orders"), ComplexityTier::Medium);
        assert_eq!(
            tier("SELECT status, COUNT(*) FROM orders GROUP BY status"),
            ComplexityTier::Medium
        );
        assert_eq!(
            tier("SELECT o.* FROM orders o JOIN customers c ON c.customer_id = o.customer_id"),
            ComplexityTier::Medium
        );
    }

    #[test]
    fn test_advanced_precedence() {
        assert_eq!(
            tier("SELECT price FROM products WHERE price > (SELECT AVG(price) FROM products)"),
            ComplexityTier::Advanced
        );
        assert_eq!(
            tier("WITH t AS (SELECT * FROM orders) SELECT COUNT(*) FROM t"),
            ComplexityTier::Advanced
        );
        assert_eq!(
            tier("SELECT customer_id, RANK() OVER (ORDER BY total_amount DESC) FROM orders"),
            ComplexityTier::Advanced
        );
        assert_eq!(
            tier(
                "SELECT * FROM order_items oi JOIN orders o ON o.order_id = oi.order_id \
                 JOIN products p ON p.product_id = oi.product_id"
            ),
            ComplexityTier::Advanced
        );
    }

    #[test]
    fn test_heuristic_fallback_on_unparseable_sql() {
        let features = QueryFeatures::from_sql("SELECT SUM(x) FROM orders WHERE");
        assert!(features.has_aggregation);
        assert_eq!(features.tables, vec!["orders"]);
        assert_eq!(
            tier("SELECT (SELECT MAX(x) FROM a) FROM b JOIN c ON"),
            ComplexityTier::Advanced
        );
    }

    #[test]
    fn test_extract_tables() {
        assert_eq!(
            extract_tables("SELECT * FROM Orders JOIN customers ON 1=1 JOIN orders ON 1=1"),
            vec!["customers", "orders"]
        );
        assert_eq!(
            extract_tables(r#"SELECT * FROM "Order Details" JOIN "order" ON 1=1"#),
            vec!["order", "order details"]
        );
    }
}
