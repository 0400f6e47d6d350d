//! Question normalisation: tokens, keyword tests, quantities, date ranges
//! and raw-case value capture.

use crate::catalog::vocabulary::number_word;
use crate::fuzzy_matcher::singularize;
use chrono::{Datelike, Duration, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"[\p{L}\p{N}]+(?:-[\p{L}\p{N}]+)*").expect("token regex");
    static ref ISO_DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex");
}

const LIMIT_MARKERS: &[&str] = &["top", "first", "bottom", "last", "limit"];
const LOWER_MARKERS: &[&str] = &["since", "after", "from"];
const UPPER_MARKERS: &[&str] = &["before", "until", "till"];
/// Largest LIMIT the SQL engine accepts (a signed 64-bit integer)
const MAX_LIMIT: u64 = i64::MAX as u64;
const VALUE_FILLERS: &[&str] = &["the", "a", "an", "is", "equals", "equal", "to", "of", "as"];

#[derive(Debug, Clone)]
pub struct Question {
    raw: String,
    /// Lower-cased tokens
    tokens: Vec<String>,
    /// Same tokens in their original case
    raw_tokens: Vec<String>,
}

impl Question {
    pub fn parse(text: &str) -> Self {
        let raw_tokens: Vec<String> = TOKEN
            .find_iter(text.trim())
            .map(|m| m.as_str().to_string())
            .collect();
        let tokens = raw_tokens.iter().map(|t| t.to_lowercase()).collect();
        Self {
            raw: text.trim().to_string(),
            tokens,
            raw_tokens,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> String {
        self.tokens.join(" ")
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Position of a keyword or phrase. Single words match by token equality
    /// or singular-form equality; phrases match consecutive tokens.
    pub fn position(&self, keyword: &str) -> Option<usize> {
        let words: Vec<&str> = keyword.split_whitespace().collect();
        match words.as_slice() {
            [] => None,
            [word] => {
                let singular = singularize(word);
                self.tokens
                    .iter()
                    .position(|t| t == word || singularize(t) == singular)
            }
            phrase => self
                .tokens
                .windows(phrase.len())
                .position(|window| window.iter().zip(phrase).all(|(t, w)| t == w)),
        }
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.position(keyword).is_some()
    }

    pub fn has_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.has_keyword(k))
    }

    /// Requested row count: the quantity after a limit marker, else the first
    /// standalone quantity that is not a year. Zero and quantities beyond
    /// `MAX_LIMIT` count as no request.
    pub fn limit(&self) -> Option<u64> {
        let after_marker = self.tokens.windows(2).find_map(|pair| {
            if LIMIT_MARKERS.contains(&pair[0].as_str()) {
                quantity(&pair[1])
            } else {
                None
            }
        });
        after_marker
            .or_else(|| {
                self.tokens
                    .iter()
                    .filter(|t| t.chars().all(|c| c.is_ascii_digit()))
                    .filter_map(|t| t.parse::<u64>().ok())
                    .find(|n| !is_year(*n))
            })
            .filter(|n| (1..=MAX_LIMIT).contains(n))
    }

    /// Date range expressed with ISO dates or a bare year.
    pub fn date_range(&self) -> Option<DateRange> {
        let dates: Vec<(usize, NaiveDate)> = self
            .tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| ISO_DATE.is_match(t))
            .filter_map(|(i, t)| NaiveDate::parse_from_str(t, "%Y-%m-%d").ok().map(|d| (i, d)))
            .collect();

        match dates.as_slice() {
            [(_, a), (_, b), ..] => {
                let (start, end) = if a <= b { (*a, *b) } else { (*b, *a) };
                return Some(DateRange::between(start, end));
            }
            [(index, date)] => {
                let range = match self.marker_before(*index) {
                    Some(Marker::Lower) => DateRange::since(*date),
                    Some(Marker::Upper) => DateRange::before(*date),
                    None => DateRange::between(*date, *date),
                };
                return Some(range);
            }
            [] => {}
        }

        let (index, year) = self
            .tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.len() == 4 && t.chars().all(|c| c.is_ascii_digit()))
            .filter_map(|(i, t)| t.parse::<i32>().ok().map(|y| (i, y)))
            .find(|(_, y)| is_year(*y as u64))?;
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
        Some(match self.marker_before(index) {
            Some(Marker::Lower) => DateRange::since(start),
            Some(Marker::Upper) => DateRange::before(start),
            None => DateRange::year(start, next),
        })
    }

    fn marker_before(&self, index: usize) -> Option<Marker> {
        let previous = self.tokens.get(index.checked_sub(1)?)?.as_str();
        if LOWER_MARKERS.contains(&previous) {
            Some(Marker::Lower)
        } else if UPPER_MARKERS.contains(&previous) {
            Some(Marker::Upper)
        } else {
            None
        }
    }

    /// Capture the value following the token at `index`, in its original
    /// case. Filler words are skipped; a capitalised value extends over
    /// following capitalised words ("New York").
    pub fn value_after(&self, index: usize) -> Option<String> {
        let mut i = index + 1;
        while self
            .tokens
            .get(i)
            .map(|t| VALUE_FILLERS.contains(&t.as_str()))
            .unwrap_or(false)
        {
            i += 1;
        }
        let first = self.raw_tokens.get(i)?;
        let mut words = vec![first.as_str()];
        if starts_uppercase(first) {
            words.extend(
                self.raw_tokens[i + 1..]
                    .iter()
                    .take_while(|t| starts_uppercase(t))
                    .take(2)
                    .map(|t| t.as_str()),
            );
        }
        Some(words.join(" "))
    }
}

enum Marker {
    Lower,
    Upper,
}

fn starts_uppercase(token: &str) -> bool {
    token.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

fn quantity(token: &str) -> Option<u64> {
    if token.chars().all(|c| c.is_ascii_digit()) {
        token.parse().ok()
    } else {
        number_word(token)
    }
}

fn is_year(n: u64) -> bool {
    (1900..=2100).contains(&n)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateBound {
    pub date: NaiveDate,
    pub inclusive: bool,
}

/// Half-open or closed date interval over a temporal column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub lower: Option<DateBound>,
    pub upper: Option<DateBound>,
}

impl DateRange {
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            lower: Some(DateBound { date: start, inclusive: true }),
            upper: Some(DateBound { date: end, inclusive: true }),
        }
    }

    pub fn since(start: NaiveDate) -> Self {
        Self {
            lower: Some(DateBound { date: start, inclusive: true }),
            upper: None,
        }
    }

    pub fn before(end: NaiveDate) -> Self {
        Self {
            lower: None,
            upper: Some(DateBound { date: end, inclusive: false }),
        }
    }

    fn year(start: NaiveDate, next: NaiveDate) -> Self {
        Self {
            lower: Some(DateBound { date: start, inclusive: true }),
            upper: Some(DateBound { date: next, inclusive: false }),
        }
    }

    /// SQL predicate over `column`
    pub fn predicate(&self, column: &str) -> String {
        match (self.lower, self.upper) {
            (Some(lo), Some(hi)) if lo.inclusive && hi.inclusive => {
                if lo.date == hi.date {
                    format!("{} = '{}'", column, lo.date)
                } else {
                    format!("{} BETWEEN '{}' AND '{}'", column, lo.date, hi.date)
                }
            }
            (lower, upper) => {
                let mut parts = Vec::new();
                if let Some(lo) = lower {
                    let op = if lo.inclusive { ">=" } else { ">" };
                    parts.push(format!("{} {} '{}'", column, op, lo.date));
                }
                if let Some(hi) = upper {
                    let op = if hi.inclusive { "<=" } else { "<" };
                    parts.push(format!("{} {} '{}'", column, op, hi.date));
                }
                parts.join(" AND ")
            }
        }
    }

    /// Human-readable form for explanations
    pub fn describe(&self) -> String {
        match (self.lower, self.upper) {
            (Some(lo), Some(hi)) if !hi.inclusive && is_calendar_year(lo.date, hi.date) => {
                format!("during {}", lo.date.year())
            }
            (Some(lo), Some(hi)) if lo.date == hi.date => format!("on {}", lo.date),
            (Some(lo), Some(hi)) => format!("between {} and {}", lo.date, hi.date),
            (Some(lo), None) => format!("on or after {}", lo.date),
            (None, Some(hi)) => format!("before {}", hi.date),
            (None, None) => "at any time".to_string(),
        }
    }
}

fn is_calendar_year(start: NaiveDate, next: NaiveDate) -> bool {
    start.ordinal() == 1 && next.ordinal() == 1 && next - start <= Duration::days(366)
}
