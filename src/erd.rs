//! ERD Projector
//!
//! Projects a schema snapshot into an abstract entity-relationship graph:
//! one node per table, one edge per relationship. Rendering is left to the
//! consumer; `to_mermaid` emits a Mermaid `erDiagram` description.

use crate::schema::{RelationshipOrigin, SchemaModel};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErdColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub primary_key: bool,
    pub foreign_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErdNode {
    pub table: String,
    pub columns: Vec<ErdColumn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErdEdge {
    /// Referencing table (many side)
    pub from_table: String,
    pub from_column: String,
    /// Referenced table (one side)
    pub to_table: String,
    pub to_column: String,
    pub inferred: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErdGraph {
    pub nodes: Vec<ErdNode>,
    pub edges: Vec<ErdEdge>,
}

impl ErdGraph {
    /// Mermaid `erDiagram`. Inferred relationships are drawn dotted. Names
    /// are reduced to word characters, which is all Mermaid accepts unquoted.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("erDiagram\n");
        for node in &self.nodes {
            let _ = writeln!(out, "    {} {{", mermaid_name(&node.table));
            for column in &node.columns {
                let marker = match (column.primary_key, column.foreign_key) {
                    (true, true) => " PK, FK",
                    (true, false) => " PK",
                    (false, true) => " FK",
                    (false, false) => "",
                };
                let _ = writeln!(
                    out,
                    "        {} {}{}",
                    mermaid_type(&column.data_type),
                    mermaid_name(&column.name),
                    marker
                );
            }
            let _ = writeln!(out, "    }}");
        }
        for edge in &self.edges {
            let line = if edge.inferred { ".." } else { "--" };
            let _ = writeln!(
                out,
                "    {} ||{}o{{ {} : \"{}\"",
                mermaid_name(&edge.to_table),
                line,
                mermaid_name(&edge.from_table),
                edge.from_column.replace('"', "'")
            );
        }
        out
    }
}

fn mermaid_name(name: &str) -> String {
    let word: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if word.is_empty() {
        "_".to_string()
    } else {
        word
    }
}

/// Mermaid attribute types must be a single word
fn mermaid_type(data_type: &str) -> String {
    let word: String = data_type
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if word.is_empty() {
        "unknown".to_string()
    } else {
        word.to_lowercase()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ErdProjector;

impl ErdProjector {
    pub fn new() -> Self {
        Self
    }

    /// Every table becomes a node and every relationship an edge; nothing is
    /// dropped, including self-references.
    pub fn project(&self, model: &SchemaModel) -> ErdGraph {
        let nodes = model
            .tables()
            .map(|table| ErdNode {
                table: table.name.clone(),
                columns: table
                    .columns
                    .iter()
                    .map(|c| ErdColumn {
                        name: c.name.clone(),
                        data_type: c.data_type.clone(),
                        primary_key: c.primary_key,
                        foreign_key: model.is_foreign_key(&table.name, &c.name),
                    })
                    .collect(),
            })
            .collect();
        let edges = model
            .relationships()
            .iter()
            .map(|r| ErdEdge {
                from_table: r.from_table.clone(),
                from_column: r.from_column.clone(),
                to_table: r.to_table.clone(),
                to_column: r.to_column.clone(),
                inferred: r.origin == RelationshipOrigin::Inferred,
            })
            .collect();
        ErdGraph { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::ecommerce_model;
    use crate::schema::{Column, Relationship, Table};

    #[test]
    fn test_projection_covers_schema() {
        let model = ecommerce_model();
        let graph = ErdProjector::new().project(&model);
        assert_eq!(graph.nodes.len(), model.table_count());
        assert_eq!(graph.edges.len(), model.relationships().len());

        let orders = graph.nodes.iter().find(|n| n.table == "orders").expect("orders node");
        let customer_id = orders.columns.iter().find(|c| c.name == "customer_id").expect("fk column");
        assert!(customer_id.foreign_key);
        assert!(!customer_id.primary_key);
    }

    #[test]
    fn test_self_reference_is_kept() {
        let model = SchemaModel::new(
            vec![Table::new(
                "employees",
                vec![
                    Column::new("employee_id", "INTEGER").primary_key(),
                    Column::new("manager_id", "INTEGER"),
                ],
            )],
            vec![Relationship::inferred("employees", "manager_id", "employees", "employee_id")],
        );
        let graph = ErdProjector::new().project(&model);
        assert_eq!(graph.edges.len(), 1);
        assert!(graph.edges[0].inferred);
        assert!(graph.to_mermaid().contains("employees ||..o{ employees : \"manager_id\""));
    }

    #[test]
    fn test_mermaid_output() {
        let graph = ErdProjector::new().project(&ecommerce_model());
        let mermaid = graph.to_mermaid();
        assert!(mermaid.starts_with("erDiagram\n"));
        assert!(mermaid.contains("    customers {\n        integer customer_id PK\n"));
        assert!(mermaid.contains("        decimal price\n"));
        assert!(mermaid.contains("customers ||--o{ orders : \"customer_id\""));
    }

    #[test]
    fn test_unrelated_tables_are_still_nodes() {
        let mut tables: Vec<Table> = ecommerce_model().tables().cloned().collect();
        tables.push(Table::new(
            "audit_log",
            vec![
                Column::new("entry_id", "INTEGER").primary_key(),
                Column::new("message", "TEXT"),
            ],
        ));
        let model = SchemaModel::new(tables, ecommerce_model().relationships().to_vec());
        let graph = ErdProjector::new().project(&model);

        let names: Vec<&str> = graph.nodes.iter().map(|n| n.table.as_str()).collect();
        assert!(names.contains(&"audit_log"));
        assert_eq!(names.len(), model.table_count());
        assert_eq!(graph.edges.len(), 3);
        for edge in &graph.edges {
            assert!(names.contains(&edge.from_table.as_str()), "{} has no node", edge.from_table);
            assert!(names.contains(&edge.to_table.as_str()), "{} has no node", edge.to_table);
        }
        assert!(graph.to_mermaid().contains("    audit_log {\n        integer entry_id PK\n"));
    }

    #[test]
    fn test_mermaid_names_are_sanitised() {
        let model = SchemaModel::new(
            vec![
                Table::new("order", vec![Column::new("id", "INTEGER").primary_key()]),
                Table::new(
                    "Order Details",
                    vec![
                        Column::new("id", "INTEGER").primary_key(),
                        Column::new("order id", "INTEGER"),
                    ],
                ),
            ],
            vec![Relationship::declared("Order Details", "order id", "order", "id")],
        );
        let mermaid = ErdProjector::new().project(&model).to_mermaid();
        assert!(mermaid.contains("    Order_Details {\n"));
        assert!(mermaid.contains("        integer order_id FK\n"));
        assert!(mermaid.contains("    order ||--o{ Order_Details : \"order id\""));
        assert!(!mermaid.contains("Order Details {"));
    }

    #[test]
    fn test_empty_schema_projects_empty_graph() {
        let graph = ErdProjector::new().project(&SchemaModel::empty());
        assert_eq!(graph, ErdGraph::default());
        assert_eq!(graph.to_mermaid(), "erDiagram\n");
    }
}
