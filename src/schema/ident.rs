//! Identifier rendering for generated SQL.
//!
//! Plain identifiers are emitted bare so generated SQL stays readable. Names
//! that are reserved words or contain anything outside `[A-Za-z0-9_]` are
//! double-quoted with embedded quotes doubled.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref PLAIN_IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex");

    /// SQLite keywords, which must be quoted to be used as names
    static ref RESERVED_WORDS: HashSet<&'static str> = [
        "abort", "action", "add", "after", "all", "alter", "always", "analyze", "and", "as",
        "asc", "attach", "autoincrement", "before", "begin", "between", "by", "cascade",
        "case", "cast", "check", "collate", "column", "commit", "conflict", "constraint",
        "create", "cross", "current", "current_date", "current_time", "current_timestamp",
        "database", "default", "deferrable", "deferred", "delete", "desc", "detach",
        "distinct", "do", "drop", "each", "else", "end", "escape", "except", "exclude",
        "exclusive", "exists", "explain", "fail", "filter", "first", "following", "for",
        "foreign", "from", "full", "generated", "glob", "group", "groups", "having", "if",
        "ignore", "immediate", "in", "index", "indexed", "initially", "inner", "insert",
        "instead", "intersect", "into", "is", "isnull", "join", "key", "last", "left",
        "like", "limit", "match", "materialized", "natural", "no", "not", "nothing",
        "notnull", "null", "nulls", "of", "offset", "on", "or", "order", "others", "outer",
        "over", "partition", "plan", "pragma", "preceding", "primary", "query", "raise",
        "range", "recursive", "references", "regexp", "reindex", "release", "rename",
        "replace", "restrict", "returning", "right", "rollback", "row", "rows", "savepoint",
        "select", "set", "table", "temp", "temporary", "then", "ties", "to", "transaction",
        "trigger", "unbounded", "union", "unique", "update", "user", "using", "vacuum",
        "values", "view", "virtual", "when", "where", "window", "with", "without",
    ]
    .into_iter()
    .collect();
}

/// Always double-quote a name, e.g. for PRAGMA arguments
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a table, column or alias name for generated SQL, quoting only when needed.
pub fn sql_identifier(name: &str) -> String {
    if PLAIN_IDENTIFIER.is_match(name) && !RESERVED_WORDS.contains(name.to_lowercase().as_str()) {
        name.to_string()
    } else {
        quote_identifier(name)
    }
}

/// `table.column` with both parts rendered by [`sql_identifier`]
pub fn qualified(table: &str, column: &str) -> String {
    format!("{}.{}", sql_identifier(table), sql_identifier(column))
}
