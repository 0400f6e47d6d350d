//! Schema Model Builder
//!
//! Introspects a connection provider into a `SchemaModel`. Declared foreign
//! keys are authoritative; the configured `RelationshipInference` fills in
//! columns that carry no constraint.

use super::{Column, NamingConventionInference, Relationship, RelationshipInference, SchemaModel, Table};
use crate::error::{QueryCraftError, Result};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Foreign-key constraint as reported by the connection provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub from_column: String,
    pub to_table: String,
    /// `None` when the constraint references the target's primary key implicitly
    pub to_column: Option<String>,
}

/// Connection provider contract: synchronous metadata enumeration.
pub trait SchemaSource {
    fn table_names(&self) -> Result<Vec<String>>;

    fn columns(&self, table: &str) -> Result<Vec<Column>>;

    /// Providers without constraint metadata return an empty list.
    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>>;
}

pub struct SchemaBuilder {
    inference: Box<dyn RelationshipInference>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new(Box::new(NamingConventionInference::default()))
    }
}

impl SchemaBuilder {
    pub fn new(inference: Box<dyn RelationshipInference>) -> Self {
        Self { inference }
    }

    /// Introspect `source` into a new model. Enumeration failures surface as
    /// `SchemaUnavailable`; a reachable database with zero tables yields an
    /// empty model.
    pub fn build(&self, source: &dyn SchemaSource) -> Result<SchemaModel> {
        let started = Instant::now();
        let names = source.table_names().map_err(unavailable)?;

        let mut tables = Vec::with_capacity(names.len());
        let mut declared_fks = Vec::with_capacity(names.len());
        for name in &names {
            let columns = source.columns(name).map_err(unavailable)?;
            let fks = source.foreign_keys(name).map_err(unavailable)?;
            tables.push(Table::new(name.clone(), columns));
            declared_fks.push(fks);
        }

        let mut candidates = Vec::new();
        for (table, fks) in tables.iter().zip(&declared_fks) {
            for fk in fks {
                match resolve_declared(table, fk, &tables) {
                    Some(rel) => candidates.push(rel),
                    None => warn!(
                        "Foreign key {}.{} -> {} does not resolve to a key column",
                        table.name, fk.from_column, fk.to_table
                    ),
                }
            }
            for column in &table.columns {
                if fks.iter().any(|fk| fk.from_column.eq_ignore_ascii_case(&column.name)) {
                    continue;
                }
                if let Some(rel) = self.inference.infer(table, column, &tables) {
                    debug!(
                        "Inferred relationship {}.{} -> {}.{}",
                        rel.from_table, rel.from_column, rel.to_table, rel.to_column
                    );
                    candidates.push(rel);
                }
            }
        }

        let model = SchemaModel::new(tables, candidates);
        info!(
            "Introspected {} tables and {} relationships in {}ms",
            model.table_count(),
            model.relationships().len(),
            started.elapsed().as_millis()
        );
        Ok(model)
    }
}

fn unavailable(err: QueryCraftError) -> QueryCraftError {
    match err {
        QueryCraftError::SchemaUnavailable(_) => err,
        other => QueryCraftError::SchemaUnavailable(other.to_string()),
    }
}

fn resolve_declared(table: &Table, fk: &ForeignKey, tables: &[Table]) -> Option<Relationship> {
    let target = tables.iter().find(|t| t.name.eq_ignore_ascii_case(&fk.to_table))?;
    let to_column = match &fk.to_column {
        Some(column) => column.clone(),
        None => target.primary_key()?.name.clone(),
    };
    Some(Relationship::declared(&table.name, &fk.from_column, &target.name, to_column))
}
