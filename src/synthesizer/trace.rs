use crate::catalog::RuleId;
use serde::Serialize;

/// How a question token was bound to a schema entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Token equals the name or its singular form
    Exact,
    /// Token is a known synonym of the name
    Synonym,
    /// Token is contained in the column name
    Substring,
    /// Name-similarity score above the threshold
    Fuzzy,
    /// Inferred from measure vocabulary or a relationship
    Inferred,
    /// No question evidence; chosen by type or position
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Table,
    Column,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityBinding {
    /// Template slot the entity fills
    pub slot: &'static str,
    pub kind: EntityKind,
    pub table: String,
    /// Column name for column bindings
    pub column: Option<String>,
    pub matched: MatchKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitBinding {
    pub value: u64,
    /// True when no quantity appeared in the question
    pub defaulted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregateFunction {
    pub fn sql(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Min => "MIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub function: AggregateFunction,
    /// `None` for `COUNT(*)`
    pub column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    /// Compared columns; more than one are OR-ed together
    pub columns: Vec<String>,
    /// Human-readable condition, e.g. "matches 'USA'"
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Join {
    pub left: String,
    pub right: String,
    pub condition: String,
}

/// Structural operations of the produced SQL
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Operations {
    pub aggregate: Option<Aggregate>,
    pub group_by: Vec<String>,
    pub order_by: Option<OrderBy>,
    pub filter: Option<Filter>,
    pub join: Option<Join>,
    pub subquery: bool,
}

/// Record of which rule fired and how every slot was bound. Confidence,
/// complexity and explanation are all derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisTrace {
    pub rule: RuleId,
    pub specificity: u8,
    pub fallback: bool,
    /// Referenced tables in the order they appear in the SQL
    pub tables: Vec<String>,
    pub bindings: Vec<EntityBinding>,
    pub limit: Option<LimitBinding>,
    pub operations: Operations,
    /// Two schema entities matched a token equally well
    pub ambiguous: bool,
}

impl SynthesisTrace {
    /// The aggregate, ignoring a bare row count
    pub fn value_aggregate(&self) -> Option<&Aggregate> {
        self.operations
            .aggregate
            .as_ref()
            .filter(|a| !(a.function == AggregateFunction::Count && a.column.is_none()))
    }

    pub fn binding(&self, slot: &str) -> Option<&EntityBinding> {
        self.bindings.iter().find(|b| b.slot == slot)
    }
}
