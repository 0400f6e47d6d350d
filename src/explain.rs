//! Explanation Builder
//!
//! Renders a plain-language justification from the synthesis trace. Each
//! rule has its own template keyed by the same rule id as its SQL template,
//! so the text cannot drift from the query.

use crate::catalog::RuleId;
use crate::synthesizer::{AggregateFunction, SynthesisTrace};

#[derive(Debug, Default, Clone, Copy)]
pub struct ExplanationBuilder;

impl ExplanationBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn explain(&self, question: &str, trace: &SynthesisTrace) -> String {
        let mut sentences = vec![operation(trace)];
        if !trace.tables.is_empty() {
            sentences.push(format!("Tables consulted: {}.", trace.tables.join(", ")));
        }
        if trace.ambiguous {
            sentences.push("Some names in the question matched more than one table equally well.".to_string());
        }
        sentences.push(format!("It answers: \"{}\"", question.trim()));
        sentences.join(" ")
    }
}

/// Table bound to `slot`, or the first referenced table
fn table<'a>(trace: &'a SynthesisTrace, slot: &str) -> &'a str {
    trace
        .binding(slot)
        .map(|b| b.table.as_str())
        .or_else(|| trace.tables.first().map(|t| t.as_str()))
        .unwrap_or("the data")
}

fn column<'a>(trace: &'a SynthesisTrace, slot: &str) -> &'a str {
    trace
        .binding(slot)
        .and_then(|b| b.column.as_deref())
        .unwrap_or("the value")
}

fn limit(trace: &SynthesisTrace) -> u64 {
    trace.limit.map(|l| l.value).unwrap_or_default()
}

fn operation(trace: &SynthesisTrace) -> String {
    let ops = &trace.operations;
    match trace.rule {
        RuleId::TopByRelatedAggregate => {
            let entity = table(trace, "entity");
            let fact = table(trace, "fact");
            format!(
                "This query ranks {} by the sum of {}.{}, joining {} to {}, sorting from highest to lowest and keeping the top {}.",
                entity,
                fact,
                column(trace, "measure"),
                fact,
                entity,
                limit(trace)
            )
        }
        RuleId::TopByColumn => {
            let descending = ops.order_by.as_ref().map(|o| o.descending).unwrap_or(true);
            format!(
                "This query sorts {} by {} ({}) and returns the first {}.",
                table(trace, "table"),
                column(trace, "measure"),
                if descending { "highest first" } else { "lowest first" },
                limit(trace)
            )
        }
        RuleId::AboveAverage => {
            let measure = column(trace, "measure");
            format!(
                "This query filters {} to rows whose {} is above the average {}, computed with a subquery, highest first.",
                table(trace, "table"),
                measure,
                measure
            )
        }
        RuleId::CountByGroup => format!(
            "This query counts the rows of {} for each {}, largest groups first.",
            table(trace, "table"),
            column(trace, "group_column")
        ),
        RuleId::CountRows => format!(
            "This query counts the total number of rows in the {} table.",
            table(trace, "table")
        ),
        RuleId::AverageColumn | RuleId::SumColumn | RuleId::ExtremeValue => {
            let what = match ops.aggregate.as_ref().map(|a| a.function) {
                Some(AggregateFunction::Avg) => "the average",
                Some(AggregateFunction::Sum) => "the sum of",
                Some(AggregateFunction::Max) => "the maximum",
                Some(AggregateFunction::Min) => "the minimum",
                _ => "an aggregate of",
            };
            format!(
                "This query calculates {} {} across all rows of {}.",
                what,
                column(trace, "measure"),
                table(trace, "table")
            )
        }
        RuleId::DateRange => {
            let condition = ops
                .filter
                .as_ref()
                .map(|f| f.condition.as_str())
                .unwrap_or("in the requested range");
            format!(
                "This query filters {} to rows with {} {}, ordered by date.",
                table(trace, "table"),
                column(trace, "date_column"),
                condition
            )
        }
        RuleId::RecentRows => format!(
            "This query sorts {} by {} from newest to oldest and returns the latest {}.",
            table(trace, "table"),
            column(trace, "date_column"),
            limit(trace)
        ),
        RuleId::FilterByValue => match &ops.filter {
            Some(filter) => format!(
                "This query filters {} to rows where {} {}.",
                table(trace, "table"),
                filter.columns.join(" or "),
                filter.condition
            ),
            None => format!("This query filters {}.", table(trace, "table")),
        },
        RuleId::ListJoined => format!(
            "This query lists {} joined with the related {}, returning at most {} rows.",
            table(trace, "table"),
            table(trace, "other"),
            limit(trace)
        ),
        RuleId::ListRows => format!(
            "This query lists the rows of {}, returning at most {}.",
            table(trace, "table"),
            limit(trace)
        ),
        RuleId::Fallback => format!(
            "No specific pattern matched the question, so this is a fallback query that shows up to {} sample rows from {}, the table that best matches the question.",
            limit(trace),
            table(trace, "table")
        ),
    }
}
