//! Pattern Catalog
//!
//! Priority-ordered dispatch table of question-recognition rules. Each rule
//! pairs a trigger (keyword groups plus schema requirements) with a SQL
//! template whose `{slot}`s are bound by the synthesizer.
//!
//! Order is significant: the first rule whose trigger is fully satisfied
//! wins, so specific intents sit above the generic ones that would shadow
//! them.

pub mod samples;
pub mod vocabulary;

pub use samples::{sample_catalog, SampleQuery, SAMPLE_QUERIES};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable rule identifier, shared by the SQL template and the explanation
/// template for the same logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    TopByRelatedAggregate,
    TopByColumn,
    AboveAverage,
    CountByGroup,
    CountRows,
    AverageColumn,
    SumColumn,
    ExtremeValue,
    DateRange,
    RecentRows,
    FilterByValue,
    ListJoined,
    ListRows,
    Fallback,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::TopByRelatedAggregate => "top_by_related_aggregate",
            RuleId::TopByColumn => "top_by_column",
            RuleId::AboveAverage => "above_average",
            RuleId::CountByGroup => "count_by_group",
            RuleId::CountRows => "count_rows",
            RuleId::AverageColumn => "average_column",
            RuleId::SumColumn => "sum_column",
            RuleId::ExtremeValue => "extreme_value",
            RuleId::DateRange => "date_range",
            RuleId::RecentRows => "recent_rows",
            RuleId::FilterByValue => "filter_by_value",
            RuleId::ListJoined => "list_joined",
            RuleId::ListRows => "list_rows",
            RuleId::Fallback => "fallback",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema entities a rule needs before it can fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// A table named (exactly or fuzzily) in the question
    MentionedTable,
    /// A table plus a numeric measure, found via the question or its vocabulary
    NumericColumn,
    /// An entity table and a referencing table that carries a numeric measure
    RelatedMeasure,
    /// A textual column named in the question to group by
    GroupingColumn,
    /// A table with a date/time column
    TemporalColumn,
    /// A date range expressed in the question
    DateRange,
    /// A filter value tied to a column or location
    FilterValue,
    /// Two mentioned tables linked by a relationship
    RelatedTables,
}

/// Keyword trigger: every group must contribute at least one hit.
/// Multi-word entries are matched as phrases on word boundaries.
#[derive(Debug, Clone, Serialize)]
pub struct Trigger {
    pub keyword_groups: &'static [&'static [&'static str]],
    pub requires: &'static [Requirement],
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternRule {
    pub id: RuleId,
    pub description: &'static str,
    pub trigger: Trigger,
    /// SQL with named `{slot}` placeholders
    pub template: &'static str,
    /// Base confidence and tie-break weight
    pub specificity: u8,
}

/// Substitute `{slot}` placeholders. Unknown slots are left untouched.
pub fn render_template(template: &str, slots: &[(&str, String)]) -> String {
    slots.iter().fold(template.to_string(), |sql, (slot, value)| {
        sql.replace(&format!("{{{}}}", slot), value)
    })
}

const RANK_DESC: &[&str] = &["top", "highest", "most", "best", "largest", "biggest", "greatest"];
pub(crate) const RANK_ASCENDING: &[&str] = &["bottom", "least", "worst"];
const RANK_ANY: &[&str] = &[
    "top", "highest", "most", "best", "largest", "biggest", "greatest", "bottom", "least", "worst",
];
const AGGREGATE_MEASURE: &[&str] = &[
    "spending", "spend", "spent", "revenue", "sales", "paid", "sold", "selling", "sell", "popular",
    "purchased", "bought", "total", "amount", "value", "quantity",
];
pub(crate) const AVERAGE: &[&str] = &["average", "avg", "mean"];
const COMPARISON: &[&str] = &["above", "more than", "higher than", "greater than", "over", "exceed", "exceeds", "exceeding"];
const COUNT: &[&str] = &["count", "how many", "number of"];
const GROUPING: &[&str] = &["per", "each", "by", "breakdown", "group", "grouped"];
const SUM: &[&str] = &["total", "sum", "revenue"];
const EXTREME: &[&str] = &["maximum", "max", "minimum", "min", "lowest", "cheapest", "smallest"];
pub(crate) const EXTREME_MIN: &[&str] = &["minimum", "min", "lowest", "cheapest", "smallest"];
const RECENT: &[&str] = &["recent", "latest", "newest", "last"];
const FILTER: &[&str] = &["from", "in", "with", "where", "whose"];
pub(crate) const LIST: &[&str] = &["list", "show", "all", "get", "display", "find", "give", "view", "see", "fetch"];

pub const FALLBACK_SPECIFICITY: u8 = 60;

pub const FALLBACK_TEMPLATE: &str = "SELECT * FROM {table} LIMIT {limit}";

lazy_static! {
    /// The ordered catalog. Iteration order is the matching order.
    pub static ref PATTERN_CATALOG: Vec<PatternRule> = vec![
        PatternRule {
            id: RuleId::TopByRelatedAggregate,
            description: "Rank entities by an aggregate of a related table, e.g. top customers by spending",
            trigger: Trigger {
                keyword_groups: &[RANK_DESC, AGGREGATE_MEASURE],
                requires: &[Requirement::RelatedMeasure],
            },
            template: "SELECT {entity_columns}, SUM({fact}.{measure}) AS {alias} FROM {entity} JOIN {fact} ON {join_condition} GROUP BY {group_by} ORDER BY {alias} DESC LIMIT {limit}",
            specificity: 82,
        },
        PatternRule {
            id: RuleId::TopByColumn,
            description: "Rank rows of one table by a numeric column",
            trigger: Trigger {
                keyword_groups: &[RANK_ANY],
                requires: &[Requirement::NumericColumn],
            },
            template: "SELECT {columns} FROM {table} ORDER BY {measure} {direction} LIMIT {limit}",
            specificity: 80,
        },
        PatternRule {
            id: RuleId::AboveAverage,
            description: "Rows whose measure exceeds the table average",
            trigger: Trigger {
                keyword_groups: &[AVERAGE, COMPARISON],
                requires: &[Requirement::NumericColumn],
            },
            template: "SELECT {columns} FROM {table} WHERE {measure} > (SELECT AVG({measure}) FROM {table}) ORDER BY {measure} DESC",
            specificity: 78,
        },
        PatternRule {
            id: RuleId::CountByGroup,
            description: "Row counts broken down by a column",
            trigger: Trigger {
                keyword_groups: &[COUNT, GROUPING],
                requires: &[Requirement::MentionedTable, Requirement::GroupingColumn],
            },
            template: "SELECT {group_column}, COUNT(*) AS {alias} FROM {table} GROUP BY {group_column} ORDER BY {alias} DESC",
            specificity: 78,
        },
        PatternRule {
            id: RuleId::CountRows,
            description: "Count the rows of a table",
            trigger: Trigger {
                keyword_groups: &[COUNT],
                requires: &[Requirement::MentionedTable],
            },
            template: "SELECT COUNT(*) AS {alias} FROM {table}",
            specificity: 80,
        },
        PatternRule {
            id: RuleId::AverageColumn,
            description: "Average of a numeric column",
            trigger: Trigger {
                keyword_groups: &[AVERAGE],
                requires: &[Requirement::NumericColumn],
            },
            template: "SELECT AVG({measure}) AS {alias} FROM {table}",
            specificity: 76,
        },
        PatternRule {
            id: RuleId::SumColumn,
            description: "Sum of a numeric column",
            trigger: Trigger {
                keyword_groups: &[SUM],
                requires: &[Requirement::NumericColumn],
            },
            template: "SELECT SUM({measure}) AS {alias} FROM {table}",
            specificity: 76,
        },
        PatternRule {
            id: RuleId::ExtremeValue,
            description: "Maximum or minimum of a numeric column",
            trigger: Trigger {
                keyword_groups: &[EXTREME],
                requires: &[Requirement::NumericColumn],
            },
            template: "SELECT {function}({measure}) AS {alias} FROM {table}",
            specificity: 74,
        },
        PatternRule {
            id: RuleId::DateRange,
            description: "Rows within a date range",
            trigger: Trigger {
                keyword_groups: &[],
                requires: &[Requirement::DateRange, Requirement::TemporalColumn],
            },
            template: "SELECT * FROM {table} WHERE {predicate} ORDER BY {date_column}",
            specificity: 74,
        },
        PatternRule {
            id: RuleId::RecentRows,
            description: "Most recent rows by a date column",
            trigger: Trigger {
                keyword_groups: &[RECENT],
                requires: &[Requirement::TemporalColumn],
            },
            template: "SELECT * FROM {table} ORDER BY {date_column} DESC LIMIT {limit}",
            specificity: 72,
        },
        PatternRule {
            id: RuleId::FilterByValue,
            description: "Rows matching a value in a named or location column",
            trigger: Trigger {
                keyword_groups: &[FILTER],
                requires: &[Requirement::MentionedTable, Requirement::FilterValue],
            },
            template: "SELECT * FROM {table} WHERE {predicate}",
            specificity: 70,
        },
        PatternRule {
            id: RuleId::ListJoined,
            description: "Rows of one table alongside a related table",
            trigger: Trigger {
                keyword_groups: &[LIST],
                requires: &[Requirement::RelatedTables],
            },
            template: "SELECT {columns} FROM {table} JOIN {other} ON {join_condition} LIMIT {limit}",
            specificity: 70,
        },
        PatternRule {
            id: RuleId::ListRows,
            description: "Rows of a single table",
            trigger: Trigger {
                keyword_groups: &[LIST],
                requires: &[Requirement::MentionedTable],
            },
            template: "SELECT * FROM {table} LIMIT {limit}",
            specificity: 68,
        },
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_order_is_specific_first() {
        let ids: Vec<RuleId> = PATTERN_CATALOG.iter().map(|r| r.id).collect();
        let pos = |id: RuleId| ids.iter().position(|r| *r == id).expect("rule present");
        assert_eq!(pos(RuleId::TopByRelatedAggregate), 0);
        assert!(pos(RuleId::TopByRelatedAggregate) < pos(RuleId::TopByColumn));
        assert!(pos(RuleId::AboveAverage) < pos(RuleId::AverageColumn));
        assert!(pos(RuleId::CountByGroup) < pos(RuleId::CountRows));
        assert!(pos(RuleId::FilterByValue) < pos(RuleId::ListRows));
        assert!(pos(RuleId::ListJoined) < pos(RuleId::ListRows));
        assert_eq!(ids.last(), Some(&RuleId::ListRows));
    }

    #[test]
    fn test_rule_ids_are_unique() {
        let ids: HashSet<RuleId> = PATTERN_CATALOG.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), PATTERN_CATALOG.len());
        assert!(!ids.contains(&RuleId::Fallback));
    }

    #[test]
    fn test_fallback_is_least_specific() {
        assert!(PATTERN_CATALOG.iter().all(|r| r.specificity > FALLBACK_SPECIFICITY));
    }

    #[test]
    fn test_render_template() {
        let rule = PATTERN_CATALOG
            .iter()
            .find(|r| r.id == RuleId::CountRows)
            .expect("count rule");
        let sql = render_template(
            rule.template,
            &[("alias", "customer_count".to_string()), ("table", "customers".to_string())],
        );
        assert_eq!(sql, "SELECT COUNT(*) AS customer_count FROM customers");
        assert!(!rule.trigger.requires.is_empty());
    }
}
