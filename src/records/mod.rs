// src/records/mod.rs
use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::classify::Role;
use crate::diag::Diagnostics;
use crate::normalize::Table;
use crate::resolve::{normalize_header_cell, ColumnBinding, Field};
use crate::sanitize::Sanitizer;

static FOOTNOTE_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\(\[]\d+[\)\]]").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

/// A resolved cell value. `NotAvailable` covers unbound fields, empty cells
/// and unparseable text alike — this stage never guesses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Amount(f64),
    NotAvailable,
}

impl FieldValue {
    pub fn amount(&self) -> Option<f64> {
        match self {
            FieldValue::Amount(v) => Some(*v),
            FieldValue::NotAvailable => None,
        }
    }
}

/// One extracted compensation record.
#[derive(Debug, Clone, Serialize)]
pub struct Person {
    pub name: String,
    pub title: Option<String>,
    pub role: Role,
    pub year: Option<i32>,
    pub values: BTreeMap<Field, FieldValue>,
}

/// Coerce a table cell to a number: footnote refs, dollar signs, thousands
/// separators and stray whitespace go; accounting parentheses mean negative.
pub fn clean_numeric(raw: &str) -> Option<f64> {
    let cleaned = FOOTNOTE_REF_RE.replace_all(raw, " ");
    let cleaned: String = cleaned
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '$' && *c != ',')
        .collect();
    if cleaned.is_empty() || cleaned == "-" || cleaned == "\u{2014}" || cleaned == "\u{2013}" {
        return None;
    }
    let cleaned = if cleaned.starts_with('(') && cleaned.ends_with(')') && cleaned.len() > 2 {
        format!("-{}", &cleaned[1..cleaned.len() - 1])
    } else {
        cleaned
    };
    cleaned.parse::<f64>().ok()
}

fn find_column(header: &[String], needle: &str) -> Option<usize> {
    header
        .iter()
        .position(|c| normalize_header_cell(c).contains(needle))
}

fn parse_year(raw: &str) -> Option<i32> {
    YEAR_RE.find(raw).and_then(|m| m.as_str().parse().ok())
}

fn row_values(row: &[String], binding: &ColumnBinding) -> BTreeMap<Field, FieldValue> {
    Field::ALL
        .iter()
        .map(|&field| {
            let value = binding
                .get(field)
                .and_then(|idx| row.get(idx))
                .and_then(|cell| clean_numeric(cell))
                .map_or(FieldValue::NotAvailable, FieldValue::Amount);
            (field, value)
        })
        .collect()
}

fn bound_cells_empty(row: &[String], binding: &ColumnBinding) -> bool {
    binding
        .iter()
        .all(|(_, idx)| row.get(idx).map_or(true, |c| c.trim().is_empty()))
}

/// Build `Person` records from a classified table.
///
/// Row order is preserved. When a person recurs (multi-year summary tables),
/// the row with the greatest year wins; a row without a parseable year never
/// displaces one that has one. A label-less row carrying only title text is
/// merged into the preceding person when that person still lacks a title;
/// every other invalid row is skipped with a diagnostic.
pub fn build_records(
    table: &Table,
    role: Role,
    binding: &ColumnBinding,
    sanitizer: &Sanitizer,
    diag: &mut Diagnostics,
) -> Vec<Person> {
    let label_col = find_column(&table.header, "name").unwrap_or(0);
    let year_col = find_column(&table.header, "year");

    let mut out: Vec<Person> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for row in &table.rows {
        let label = row.get(label_col).map(String::as_str).unwrap_or("");

        let Some(sanitized) = sanitizer.sanitize(label) else {
            if bound_cells_empty(row, binding) {
                if let Some(prev) = out.last_mut() {
                    if prev.title.is_none() {
                        if let Some(title) = sanitizer.extract_title(label) {
                            diag.info(format!(
                                "merged continuation row into {} ({})",
                                prev.name, title
                            ));
                            prev.title = Some(title);
                            continue;
                        }
                    }
                }
            }
            diag.info(format!(
                "skipped {} row with no valid person name: {:?}",
                role,
                label.chars().take(60).collect::<String>()
            ));
            continue;
        };

        let year = year_col
            .and_then(|idx| row.get(idx))
            .and_then(|cell| parse_year(cell));
        let person = Person {
            name: sanitized.name.clone(),
            title: sanitized.title,
            role,
            year,
            values: row_values(row, binding),
        };

        match by_name.get(&sanitized.name).copied() {
            Some(pos) => {
                // Same person again: the newest year wins, in place.
                let keep_new = match (out[pos].year, person.year) {
                    (Some(old), Some(new)) => new > old,
                    (None, Some(_)) => true,
                    _ => false,
                };
                if keep_new {
                    out[pos] = person;
                }
            }
            None => {
                by_name.insert(sanitized.name, out.len());
                out.push(person);
            }
        }
    }

    out
}
