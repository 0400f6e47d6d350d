//! Slot binding for each catalog rule. A binder returns `None` when the
//! schema cannot satisfy the rule's requirements, letting the next rule try.

use super::question::Question;
use super::resolve::{measure_hints, ColumnMatch, EntityResolver, Resolution, TableMatch};
use super::trace::{
    Aggregate, AggregateFunction, EntityBinding, EntityKind, Filter, Join, LimitBinding, MatchKind,
    Operations, OrderBy,
};
use super::SynthesisLimits;
use crate::catalog::vocabulary::{is_stopword, LOCATION_COLUMNS, SOLD_WORDS, SPENDING_WORDS};
use crate::catalog::{PatternRule, Requirement, RuleId, EXTREME_MIN, RANK_ASCENDING};
use crate::fuzzy_matcher::singularize;
use crate::schema::{qualified, sql_identifier, Column, Relationship, SchemaModel, Table};

pub(super) struct Context<'a> {
    pub question: &'a Question,
    pub model: &'a SchemaModel,
    pub resolver: &'a EntityResolver,
    pub resolution: &'a Resolution,
    pub limits: &'a SynthesisLimits,
}

#[derive(Debug, Default)]
pub(super) struct Binding {
    pub slots: Vec<(&'static str, String)>,
    pub tables: Vec<String>,
    pub bindings: Vec<EntityBinding>,
    pub limit: Option<LimitBinding>,
    pub operations: Operations,
    /// A bound table came from a token that matched several tables
    pub ambiguous: bool,
}

impl Binding {
    fn slot(&mut self, name: &'static str, value: impl Into<String>) {
        self.slots.push((name, value.into()));
    }

    fn table(&mut self, slot: &'static str, m: &TableMatch) {
        if !self.tables.contains(&m.table) {
            self.tables.push(m.table.clone());
        }
        self.ambiguous |= m.ambiguous;
        self.bindings.push(EntityBinding {
            slot,
            kind: EntityKind::Table,
            table: m.table.clone(),
            column: None,
            matched: m.matched,
        });
        self.slot(slot, sql_identifier(&m.table));
    }

    fn column(&mut self, slot: &'static str, table: &str, m: &ColumnMatch) {
        self.bindings.push(EntityBinding {
            slot,
            kind: EntityKind::Column,
            table: table.to_string(),
            column: Some(m.column.clone()),
            matched: m.matched,
        });
        self.slot(slot, sql_identifier(&m.column));
    }

    fn limit(&mut self, question: &Question, default: u64) -> u64 {
        let requested = question.limit();
        let value = requested.unwrap_or(default);
        self.limit = Some(LimitBinding {
            value,
            defaulted: requested.is_none(),
        });
        self.slot("limit", value.to_string());
        value
    }
}

pub(super) fn bind(rule: &PatternRule, ctx: &Context) -> Option<Binding> {
    let triggered = rule
        .trigger
        .keyword_groups
        .iter()
        .all(|group| ctx.question.has_any(group));
    if !triggered || !rule.trigger.requires.iter().all(|req| satisfied(*req, ctx)) {
        return None;
    }
    match rule.id {
        RuleId::TopByRelatedAggregate => top_by_related_aggregate(ctx),
        RuleId::TopByColumn => top_by_column(ctx),
        RuleId::AboveAverage => above_average(ctx),
        RuleId::CountByGroup => count_by_group(ctx),
        RuleId::CountRows => count_rows(ctx),
        RuleId::AverageColumn => aggregate_column(ctx, AggregateFunction::Avg),
        RuleId::SumColumn => aggregate_column(ctx, AggregateFunction::Sum),
        RuleId::ExtremeValue => {
            let function = if ctx.question.has_any(EXTREME_MIN) {
                AggregateFunction::Min
            } else {
                AggregateFunction::Max
            };
            aggregate_column(ctx, function)
        }
        RuleId::DateRange => date_range(ctx),
        RuleId::RecentRows => recent_rows(ctx),
        RuleId::FilterByValue => filter_by_value(ctx),
        RuleId::ListJoined => list_joined(ctx),
        RuleId::ListRows => list_rows(ctx),
        RuleId::Fallback => None,
    }
}

/// Schema-level precondition for a rule. The binder still picks the actual
/// entities; a rule whose requirements fail is skipped without binding.
fn satisfied(requirement: Requirement, ctx: &Context) -> bool {
    let mut mentioned = mentioned_tables(ctx).map(|(_, t)| t);
    match requirement {
        Requirement::MentionedTable => mentioned.next().is_some(),
        Requirement::NumericColumn if ctx.resolution.tables.is_empty() => {
            ctx.model.tables().any(|t| t.numeric_columns().next().is_some())
        }
        Requirement::NumericColumn => mentioned.any(|t| t.numeric_columns().next().is_some()),
        Requirement::RelatedMeasure => mentioned.any(|t| {
            ctx.model
                .referencing(&t.name)
                .filter_map(|rel| ctx.model.table(&rel.from_table))
                .any(|fact| fact.numeric_columns().next().is_some())
        }),
        Requirement::GroupingColumn => mentioned
            .next()
            .map(|t| t.textual_columns().next().is_some())
            .unwrap_or(false),
        Requirement::TemporalColumn => mentioned.any(|t| t.date_column().is_some()),
        Requirement::DateRange => ctx.question.date_range().is_some(),
        Requirement::FilterValue => mentioned.any(|t| {
            t.textual_columns().any(|c| ctx.question.has_keyword(&c.name.to_lowercase()))
                || LOCATION_COLUMNS.iter().any(|name| t.has_column(name))
        }),
        Requirement::RelatedTables => {
            let tables = &ctx.resolution.tables;
            tables.iter().enumerate().any(|(i, left)| {
                tables[i + 1..]
                    .iter()
                    .any(|right| ctx.model.relationship_between(&left.table, &right.table).is_some())
            })
        }
    }
}

/// Bind the fallback: the best-matching table, else the first table.
pub(super) fn fallback(ctx: &Context) -> Option<Binding> {
    let table = match ctx.resolution.best() {
        Some(m) => m.clone(),
        None => {
            let name = ctx.model.table_names().next()?;
            TableMatch {
                table: name.to_string(),
                matched: MatchKind::Default,
                score: 0.0,
                position: 0,
                ambiguous: false,
            }
        }
    };
    let mut b = Binding::default();
    b.table("table", &table);
    let limit = ctx.limits.fallback;
    b.limit = Some(LimitBinding {
        value: limit,
        defaulted: true,
    });
    b.slot("limit", limit.to_string());
    Some(b)
}

fn is_measure(column: &Column) -> bool {
    column.is_numeric() && !column.is_identifier()
}

fn is_grouping(column: &Column) -> bool {
    column.is_textual() && !column.primary_key
}

fn mentioned_tables<'a>(ctx: &'a Context<'a>) -> impl Iterator<Item = (&'a TableMatch, &'a Table)> + 'a {
    ctx.resolution
        .tables
        .iter()
        .filter_map(move |m| ctx.model.table(&m.table).map(|t| (m, t)))
}

/// Table and numeric measure for single-table aggregates. Mentioned tables
/// are tried in question order; with none mentioned the measure vocabulary
/// picks the table.
fn measure_table(ctx: &Context, hints: &[&str]) -> Option<(TableMatch, ColumnMatch)> {
    if ctx.resolution.tables.is_empty() {
        return ctx
            .resolver
            .table_for_column(ctx.question, ctx.model, is_measure, hints);
    }
    mentioned_tables(ctx).find_map(|(m, table)| {
        ctx.resolver
            .resolve_column(ctx.question, table, is_measure, hints, true)
            .map(|column| (m.clone(), column))
    })
}

fn label_and(table: &Table, column: &str) -> String {
    match table.label_column() {
        Some(label) => format!("{}, {}", sql_identifier(&label.name), sql_identifier(column)),
        None => "*".to_string(),
    }
}

fn top_by_related_aggregate(ctx: &Context) -> Option<Binding> {
    let hints = measure_hints(ctx.question);
    for (entity_match, entity) in mentioned_tables(ctx) {
        // A measure named on the entity itself ranks by that column instead
        if ctx
            .resolver
            .resolve_column(ctx.question, entity, is_measure, &[], false)
            .is_some()
        {
            return None;
        }
        let Some(key) = entity.primary_key() else {
            continue;
        };

        let mut best: Option<(&Relationship, &Table, ColumnMatch)> = None;
        for rel in ctx.model.referencing(&entity.name) {
            let Some(fact) = ctx.model.table(&rel.from_table) else {
                continue;
            };
            let Some(measure) = ctx.resolver.resolve_column(ctx.question, fact, is_measure, &hints, true) else {
                continue;
            };
            let rank = |t: &Table, m: &ColumnMatch| {
                (ctx.resolution.get(&t.name).is_none(), m.sort_key(), t.name.clone())
            };
            let better = match &best {
                None => true,
                Some((_, current, current_measure)) => rank(fact, &measure) < rank(*current, current_measure),
            };
            if better {
                best = Some((rel, fact, measure));
            }
        }
        let Some((rel, fact, measure)) = best else {
            continue;
        };

        let fact_match = ctx.resolution.get(&fact.name).cloned().unwrap_or(TableMatch {
            table: fact.name.clone(),
            matched: MatchKind::Inferred,
            score: 0.0,
            position: 0,
            ambiguous: false,
        });
        let alias = if ctx.question.has_any(SPENDING_WORDS) {
            "total_spent".to_string()
        } else if ctx.question.has_any(SOLD_WORDS) {
            "total_sold".to_string()
        } else {
            format!("total_{}", measure.column.trim_start_matches("total_"))
        };
        let e = &entity.name;
        let (entity_columns, group_by) = match entity.label_column() {
            Some(label) => (
                qualified(e, &label.name),
                vec![qualified(e, &key.name), qualified(e, &label.name)],
            ),
            None => (qualified(e, &key.name), vec![qualified(e, &key.name)]),
        };

        let mut b = Binding::default();
        b.table("entity", entity_match);
        b.table("fact", &fact_match);
        b.column("measure", &fact.name, &measure);
        if let Some(label) = entity.label_column() {
            b.bindings.push(EntityBinding {
                slot: "label",
                kind: EntityKind::Column,
                table: e.clone(),
                column: Some(label.name.clone()),
                matched: MatchKind::Default,
            });
        }
        b.slot("entity_columns", entity_columns);
        b.slot("alias", sql_identifier(&alias));
        b.slot("join_condition", rel.join_condition());
        b.slot("group_by", group_by.join(", "));
        b.limit(ctx.question, ctx.limits.top_default);
        b.operations = Operations {
            aggregate: Some(Aggregate {
                function: AggregateFunction::Sum,
                column: Some(format!("{}.{}", fact.name, measure.column)),
            }),
            group_by,
            order_by: Some(OrderBy {
                column: alias,
                descending: true,
            }),
            join: Some(Join {
                left: e.clone(),
                right: fact.name.clone(),
                condition: rel.join_condition(),
            }),
            ..Operations::default()
        };
        return Some(b);
    }
    None
}

fn top_by_column(ctx: &Context) -> Option<Binding> {
    let hints = measure_hints(ctx.question);
    let (table_match, measure) = measure_table(ctx, &hints)?;
    let table = ctx.model.table(&table_match.table)?;
    let descending = !ctx.question.has_any(RANK_ASCENDING);

    let mut b = Binding::default();
    b.table("table", &table_match);
    b.column("measure", &table.name, &measure);
    b.slot("columns", label_and(table, &measure.column));
    b.slot("direction", if descending { "DESC" } else { "ASC" });
    b.limit(ctx.question, ctx.limits.top_default);
    b.operations.order_by = Some(OrderBy {
        column: measure.column.clone(),
        descending,
    });
    Some(b)
}

fn above_average(ctx: &Context) -> Option<Binding> {
    let hints = measure_hints(ctx.question);
    let (table_match, measure) = measure_table(ctx, &hints)?;
    let table = ctx.model.table(&table_match.table)?;

    let mut b = Binding::default();
    b.table("table", &table_match);
    b.column("measure", &table.name, &measure);
    b.slot("columns", label_and(table, &measure.column));
    b.operations = Operations {
        filter: Some(Filter {
            columns: vec![measure.column.clone()],
            condition: "is above the average".to_string(),
        }),
        order_by: Some(OrderBy {
            column: measure.column.clone(),
            descending: true,
        }),
        subquery: true,
        ..Operations::default()
    };
    Some(b)
}

fn count_by_group(ctx: &Context) -> Option<Binding> {
    // Only the first table; a later table's columns describe a different entity
    let (table_match, table) = mentioned_tables(ctx).next()?;
    let group = ctx
        .resolver
        .resolve_column(ctx.question, table, is_grouping, &[], false)?;
    let alias = format!("{}_count", singularize(&table.name));

    let mut b = Binding::default();
    b.table("table", table_match);
    b.column("group_column", &table.name, &group);
    b.slot("alias", sql_identifier(&alias));
    b.operations = Operations {
        aggregate: Some(Aggregate {
            function: AggregateFunction::Count,
            column: None,
        }),
        group_by: vec![group.column.clone()],
        order_by: Some(OrderBy {
            column: alias,
            descending: true,
        }),
        ..Operations::default()
    };
    Some(b)
}

fn count_rows(ctx: &Context) -> Option<Binding> {
    let (table_match, table) = mentioned_tables(ctx).next()?;
    let mut b = Binding::default();
    b.table("table", table_match);
    b.slot("alias", sql_identifier(&format!("total_{}", table.name)));
    b.operations.aggregate = Some(Aggregate {
        function: AggregateFunction::Count,
        column: None,
    });
    Some(b)
}

fn aggregate_column(ctx: &Context, function: AggregateFunction) -> Option<Binding> {
    let hints = measure_hints(ctx.question);
    let (table_match, measure) = measure_table(ctx, &hints)?;
    let alias = match function {
        AggregateFunction::Sum if ctx.question.has_keyword("revenue") => "total_revenue".to_string(),
        AggregateFunction::Sum => format!("total_{}", measure.column.trim_start_matches("total_")),
        AggregateFunction::Avg => format!("average_{}", measure.column),
        AggregateFunction::Max => format!("max_{}", measure.column),
        AggregateFunction::Min => format!("min_{}", measure.column),
        AggregateFunction::Count => format!("count_{}", measure.column),
    };

    let mut b = Binding::default();
    b.table("table", &table_match);
    b.column("measure", &table_match.table, &measure);
    b.slot("alias", sql_identifier(&alias));
    b.slot("function", function.sql());
    b.operations.aggregate = Some(Aggregate {
        function,
        column: Some(measure.column.clone()),
    });
    Some(b)
}

/// First mentioned table with a date column, preferring one named in the question
fn temporal_table(ctx: &Context) -> Option<(TableMatch, ColumnMatch)> {
    mentioned_tables(ctx).find_map(|(m, table)| {
        ctx.resolver
            .resolve_column(ctx.question, table, Column::is_temporal, &[], true)
            .map(|column| (m.clone(), column))
    })
}

fn date_range(ctx: &Context) -> Option<Binding> {
    let range = ctx.question.date_range()?;
    let (table_match, date_column) = temporal_table(ctx)?;

    let mut b = Binding::default();
    b.table("table", &table_match);
    b.column("date_column", &table_match.table, &date_column);
    b.slot("predicate", range.predicate(&sql_identifier(&date_column.column)));
    b.operations = Operations {
        filter: Some(Filter {
            columns: vec![date_column.column.clone()],
            condition: range.describe(),
        }),
        order_by: Some(OrderBy {
            column: date_column.column.clone(),
            descending: false,
        }),
        ..Operations::default()
    };
    Some(b)
}

fn recent_rows(ctx: &Context) -> Option<Binding> {
    let (table_match, date_column) = temporal_table(ctx)?;

    let mut b = Binding::default();
    b.table("table", &table_match);
    b.column("date_column", &table_match.table, &date_column);
    b.limit(ctx.question, ctx.limits.recent);
    b.operations.order_by = Some(OrderBy {
        column: date_column.column.clone(),
        descending: true,
    });
    Some(b)
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A captured value that is really a number, date, filler or table name
fn is_non_value(ctx: &Context, value: &str) -> bool {
    let lower = value.to_lowercase();
    let singular = singularize(&lower);
    lower.chars().all(|c| c.is_ascii_digit() || c == '-')
        || is_stopword(&lower)
        || ctx
            .model
            .table_names()
            .any(|t| t.eq_ignore_ascii_case(&lower) || singularize(t) == singular)
}

fn filter_by_value(ctx: &Context) -> Option<Binding> {
    // `<column> <value>`, e.g. "orders with status shipped"
    for (table_match, table) in mentioned_tables(ctx) {
        for column in table.columns.iter().filter(|c| is_grouping(c)) {
            let Some(at) = ctx.question.position(&column.name.to_lowercase()) else {
                continue;
            };
            let Some(value) = ctx.question.value_after(at) else {
                continue;
            };
            if is_non_value(ctx, &value) {
                continue;
            }
            let mut b = Binding::default();
            b.table("table", table_match);
            b.column(
                "column",
                &table.name,
                &ColumnMatch::new(&column.name, MatchKind::Exact),
            );
            b.slot(
                "predicate",
                format!("{} LIKE {}", sql_identifier(&column.name), quote(&value)),
            );
            b.operations.filter = Some(Filter {
                columns: vec![column.name.clone()],
                condition: format!("matches '{}'", value),
            });
            return Some(b);
        }
    }

    // `from|in <place>` against location columns
    let value = ["from", "in"]
        .iter()
        .filter_map(|marker| ctx.question.position(marker))
        .filter_map(|at| ctx.question.value_after(at))
        .find(|value| !is_non_value(ctx, value))?;
    let (table_match, table, columns) = mentioned_tables(ctx).find_map(|(m, table)| {
        let columns: Vec<&Column> = LOCATION_COLUMNS
            .iter()
            .filter_map(|name| table.column(name))
            .collect();
        (!columns.is_empty()).then_some((m, table, columns))
    })?;

    let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    let comparisons: Vec<String> = names
        .iter()
        .map(|c| format!("{} LIKE {}", sql_identifier(c), quote(&value)))
        .collect();
    let predicate = if comparisons.len() == 1 {
        comparisons.join("")
    } else {
        format!("({})", comparisons.join(" OR "))
    };

    let mut b = Binding::default();
    b.table("table", table_match);
    for name in &names {
        b.column("column", &table.name, &ColumnMatch::new(name, MatchKind::Inferred));
    }
    b.slot("predicate", predicate);
    b.operations.filter = Some(Filter {
        columns: names,
        condition: format!("matches '{}'", value),
    });
    Some(b)
}

fn list_joined(ctx: &Context) -> Option<Binding> {
    let tables = &ctx.resolution.tables;
    let (left, right, rel) = tables.iter().enumerate().find_map(|(i, left)| {
        tables[i + 1..].iter().find_map(|right| {
            ctx.model
                .relationship_between(&left.table, &right.table)
                .map(|rel| (left, right, rel))
        })
    })?;
    let other = ctx.model.table(&right.table)?;
    let columns = match other.label_column() {
        Some(label) => format!("{}.*, {}", sql_identifier(&left.table), qualified(&other.name, &label.name)),
        None => format!("{}.*, {}.*", sql_identifier(&left.table), sql_identifier(&other.name)),
    };

    let mut b = Binding::default();
    b.table("table", left);
    b.table("other", right);
    b.slot("columns", columns);
    b.slot("join_condition", rel.join_condition());
    b.limit(ctx.question, ctx.limits.list);
    b.operations.join = Some(Join {
        left: left.table.clone(),
        right: right.table.clone(),
        condition: rel.join_condition(),
    });
    Some(b)
}

fn list_rows(ctx: &Context) -> Option<Binding> {
    let (table_match, _) = mentioned_tables(ctx).next()?;
    let mut b = Binding::default();
    b.table("table", table_match);
    b.limit(ctx.question, ctx.limits.list);
    Some(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::ecommerce_model;
    use crate::synthesizer::resolve::priority;

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_requirements_follow_schema() {
        let model = ecommerce_model();
        let resolver = EntityResolver::default();
        let limits = SynthesisLimits::default();
        let check = |text: &str, requirement: Requirement| {
            let question = Question::parse(text);
            let resolution = resolver.resolve_tables(&question, &model);
            let ctx = Context {
                question: &question,
                model: &model,
                resolver: &resolver,
                resolution: &resolution,
                limits: &limits,
            };
            satisfied(requirement, &ctx)
        };

        assert!(check("show products", Requirement::MentionedTable));
        assert!(!check("show me everything", Requirement::MentionedTable));
        assert!(check("what is the average price", Requirement::NumericColumn));
        assert!(check("top customers by spending", Requirement::RelatedMeasure));
        assert!(!check("top order items by spending", Requirement::RelatedMeasure));
        assert!(check("count products per category", Requirement::GroupingColumn));
        assert!(!check("count order items per quantity", Requirement::GroupingColumn));
        assert!(check("recent orders", Requirement::TemporalColumn));
        assert!(!check("recent products", Requirement::TemporalColumn));
        assert!(check("orders in 2023", Requirement::DateRange));
        assert!(!check("orders please", Requirement::DateRange));
        assert!(check("customers from Paris", Requirement::FilterValue));
        assert!(!check("products from Paris", Requirement::FilterValue));
        assert!(check("orders with customer names", Requirement::RelatedTables));
        assert!(!check("products and customers", Requirement::RelatedTables));
    }

    #[test]
    fn test_unmet_requirement_skips_rule() {
        let model = ecommerce_model();
        let resolver = EntityResolver::default();
        let limits = SynthesisLimits::default();
        let question = Question::parse("show the most recent products");
        let resolution = resolver.resolve_tables(&question, &model);
        let ctx = Context {
            question: &question,
            model: &model,
            resolver: &resolver,
            resolution: &resolution,
            limits: &limits,
        };
        let recent = crate::catalog::PATTERN_CATALOG
            .iter()
            .find(|r| r.id == RuleId::RecentRows)
            .expect("recent rule");
        assert_eq!(recent.trigger.requires, &[Requirement::TemporalColumn]);
        assert!(bind(recent, &ctx).is_none());
    }

    #[test]
    fn test_priority_orders_match_kinds() {
        assert!(priority(MatchKind::Exact) < priority(MatchKind::Substring));
        assert!(priority(MatchKind::Inferred) < priority(MatchKind::Default));
    }
}
