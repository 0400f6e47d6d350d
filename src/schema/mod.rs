//! Schema Model
//!
//! In-memory semantic representation of a database: tables, their columns in
//! introspected order, and foreign-key relationships (declared or inferred).
//!
//! A `SchemaModel` is immutable once built. Rebuilding goes through
//! `SchemaRegistry`, which swaps whole snapshots.

pub mod ident;
pub mod inference;
pub mod introspect;
pub mod snapshot;

pub use ident::{qualified, quote_identifier, sql_identifier};
pub use inference::{NamingConventionInference, RelationshipInference};
pub use introspect::{ForeignKey, SchemaBuilder, SchemaSource};
pub use snapshot::{SchemaRegistry, SchemaSnapshot};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Declared type as reported by the database, e.g. "INTEGER", "VARCHAR(50)"
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    fn type_upper(&self) -> String {
        self.data_type.to_uppercase()
    }

    pub fn is_numeric(&self) -> bool {
        let t = self.type_upper();
        ["INT", "REAL", "FLOA", "DOUB", "DEC", "NUMERIC", "MONEY"]
            .iter()
            .any(|k| t.contains(k))
    }

    pub fn is_temporal(&self) -> bool {
        let t = self.type_upper();
        t.contains("DATE") || t.contains("TIME")
    }

    pub fn is_textual(&self) -> bool {
        let t = self.type_upper();
        !self.is_temporal() && (t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT"))
    }

    /// Identifier-like columns (`id`, `*_id`) are never used as measures.
    pub fn is_identifier(&self) -> bool {
        let n = self.name.to_lowercase();
        self.primary_key || n == "id" || n.ends_with("_id")
    }
}

/// Where a relationship came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipOrigin {
    /// Introspected foreign-key constraint
    Declared,
    /// Inferred from naming conventions
    Inferred,
}

/// Foreign key to primary key edge: `from_table.from_column -> to_table.to_column`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub origin: RelationshipOrigin,
}

impl Relationship {
    pub fn declared(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_column: from_column.into(),
            to_table: to_table.into(),
            to_column: to_column.into(),
            origin: RelationshipOrigin::Declared,
        }
    }

    pub fn inferred(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            origin: RelationshipOrigin::Inferred,
            ..Self::declared(from_table, from_column, to_table, to_column)
        }
    }

    /// SQL join condition, e.g. `customers.customer_id = orders.customer_id`
    pub fn join_condition(&self) -> String {
        format!(
            "{} = {}",
            qualified(&self.to_table, &self.to_column),
            qualified(&self.from_table, &self.from_column)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    /// Columns in introspected order
    pub columns: Vec<Column>,
    /// Outgoing relationships (this table holds the foreign key)
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            relationships: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The single primary-key column, if the key is not composite
    pub fn primary_key(&self) -> Option<&Column> {
        let mut keys = self.columns.iter().filter(|c| c.primary_key);
        match (keys.next(), keys.next()) {
            (Some(pk), None) => Some(pk),
            _ => None,
        }
    }

    /// Human-facing column: first textual non-key column containing "name",
    /// else the first textual non-key column.
    pub fn label_column(&self) -> Option<&Column> {
        let textual = || self.columns.iter().filter(|c| c.is_textual() && !c.primary_key);
        textual()
            .find(|c| c.name.to_lowercase().contains("name"))
            .or_else(|| textual().next())
    }

    pub fn date_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_temporal())
    }

    /// Numeric columns usable as measures
    pub fn numeric_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_numeric() && !c.is_identifier())
    }

    pub fn textual_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_textual() && !c.primary_key)
    }
}

/// Process-wide semantic schema. Keys are unique table names, iterated in
/// lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaModel {
    tables: BTreeMap<String, Table>,
    relationships: Vec<Relationship>,
}

impl SchemaModel {
    /// Build a model from tables and candidate relationships.
    ///
    /// Relationships whose endpoints do not resolve to an existing table and
    /// column are dropped. Duplicates are removed; the first occurrence wins.
    pub fn new(tables: Vec<Table>, candidates: Vec<Relationship>) -> Self {
        let mut tables: BTreeMap<String, Table> = tables
            .into_iter()
            .map(|mut t| {
                t.relationships.clear();
                (t.name.clone(), t)
            })
            .collect();

        let mut seen = HashSet::new();
        let mut relationships = Vec::new();
        for rel in candidates {
            let resolves = |table: &str, column: &str| {
                tables.get(table).map(|t| t.has_column(column)).unwrap_or(false)
            };
            if !resolves(&rel.from_table, &rel.from_column) || !resolves(&rel.to_table, &rel.to_column) {
                debug!(
                    "Dropping unresolved relationship {}.{} -> {}.{}",
                    rel.from_table, rel.from_column, rel.to_table, rel.to_column
                );
                continue;
            }
            let key = (
                rel.from_table.clone(),
                rel.from_column.clone(),
                rel.to_table.clone(),
                rel.to_column.clone(),
            );
            if seen.insert(key) {
                relationships.push(rel);
            }
        }

        for rel in &relationships {
            if let Some(table) = tables.get_mut(&rel.from_table) {
                table.relationships.push(rel.clone());
            }
        }

        Self { tables, relationships }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name).or_else(|| {
            self.tables
                .values()
                .find(|t| t.name.eq_ignore_ascii_case(name))
        })
    }

    /// Tables in lexicographic order
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|k| k.as_str())
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Relationship linking two tables in either direction
    pub fn relationship_between(&self, a: &str, b: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| {
            (r.from_table == a && r.to_table == b) || (r.from_table == b && r.to_table == a)
        })
    }

    /// Relationships whose target is `table` (tables that reference it)
    pub fn referencing<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships
            .iter()
            .filter(move |r| r.to_table == table && r.from_table != table)
    }

    /// Whether a column takes part in any relationship as the foreign-key side
    pub fn is_foreign_key(&self, table: &str, column: &str) -> bool {
        self.relationships
            .iter()
            .any(|r| r.from_table == table && r.from_column == column)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Demo e-commerce model shared by unit tests across the crate.
    pub(crate) fn ecommerce_model() -> SchemaModel {
        let customers = Table::new(
            "customers",
            vec![
                Column::new("customer_id", "INTEGER").primary_key(),
                Column::new("customer_name", "TEXT").not_null(),
                Column::new("email", "TEXT"),
                Column::new("city", "TEXT"),
                Column::new("country", "TEXT"),
                Column::new("registration_date", "DATE"),
            ],
        );
        let products = Table::new(
            "products",
            vec![
                Column::new("product_id", "INTEGER").primary_key(),
                Column::new("product_name", "TEXT").not_null(),
                Column::new("category", "TEXT"),
                Column::new("price", "DECIMAL(10,2)"),
                Column::new("stock_quantity", "INTEGER"),
            ],
        );
        let orders = Table::new(
            "orders",
            vec![
                Column::new("order_id", "INTEGER").primary_key(),
                Column::new("customer_id", "INTEGER"),
                Column::new("order_date", "DATE"),
                Column::new("total_amount", "DECIMAL(10,2)"),
                Column::new("status", "TEXT"),
            ],
        );
        let order_items = Table::new(
            "order_items",
            vec![
                Column::new("item_id", "INTEGER").primary_key(),
                Column::new("order_id", "INTEGER"),
                Column::new("product_id", "INTEGER"),
                Column::new("quantity", "INTEGER"),
                Column::new("unit_price", "DECIMAL(10,2)"),
            ],
        );
        SchemaModel::new(
            vec![customers, products, orders, order_items],
            vec![
                Relationship::declared("orders", "customer_id", "customers", "customer_id"),
                Relationship::declared("order_items", "order_id", "orders", "order_id"),
                Relationship::declared("order_items", "product_id", "products", "product_id"),
            ],
        )
    }

    #[test]
    fn test_column_affinity() {
        assert!(Column::new("price", "DECIMAL(10,2)").is_numeric());
        assert!(Column::new("qty", "integer").is_numeric());
        assert!(Column::new("created_at", "TIMESTAMP").is_temporal());
        assert!(Column::new("name", "VARCHAR(50)").is_textual());
        assert!(!Column::new("created_at", "DATETIME").is_textual());
        assert!(Column::new("customer_id", "INTEGER").is_identifier());
    }

    #[test]
    fn test_tables_are_lexicographic() {
        let model = ecommerce_model();
        let names: Vec<&str> = model.table_names().collect();
        assert_eq!(names, vec!["customers", "order_items", "orders", "products"]);
    }

    #[test]
    fn test_unresolved_relationships_are_dropped() {
        let model = SchemaModel::new(
            vec![
                Table::new("a", vec![Column::new("id", "INTEGER").primary_key()]),
                Table::new("b", vec![Column::new("a_id", "INTEGER")]),
            ],
            vec![
                Relationship::declared("b", "a_id", "a", "id"),
                Relationship::declared("b", "a_id", "a", "id"),
                Relationship::declared("b", "missing", "a", "id"),
                Relationship::declared("b", "a_id", "ghost", "id"),
            ],
        );
        assert_eq!(model.relationships().len(), 1);
        assert_eq!(model.table("b").map(|t| t.relationships.len()), Some(1));
    }

    #[test]
    fn test_table_helpers() {
        let model = ecommerce_model();
        let customers = model.table("customers").expect("customers");
        assert_eq!(customers.label_column().map(|c| c.name.as_str()), Some("customer_name"));
        assert_eq!(customers.date_column().map(|c| c.name.as_str()), Some("registration_date"));
        assert_eq!(customers.primary_key().map(|c| c.name.as_str()), Some("customer_id"));

        let orders = model.table("ORDERS").expect("case-insensitive lookup");
        let numeric: Vec<&str> = orders.numeric_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(numeric, vec!["total_amount"]);
    }

    #[test]
    fn test_relationship_lookup() {
        let model = ecommerce_model();
        assert!(model.relationship_between("customers", "orders").is_some());
        assert!(model.relationship_between("orders", "customers").is_some());
        assert!(model.relationship_between("customers", "products").is_none());
        let referencing: Vec<&str> = model
            .referencing("products")
            .map(|r| r.from_table.as_str())
            .collect();
        assert_eq!(referencing, vec!["order_items"]);
        assert!(model.is_foreign_key("orders", "customer_id"));
    }
}
