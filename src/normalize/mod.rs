// src/normalize/mod.rs
mod reader;

pub use reader::{read_dump, read_tables_dir};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// One logical table recovered from the raw dump.
///
/// `title` comes from the section-boundary heading above the table (or the
/// source file stem); `index` preserves source order for deterministic
/// tie-breaks. Header and rows carry no width invariant — cells may be
/// missing. Built once by the normalizer, never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub index: usize,
    pub title: Option<String>,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub footnotes: Vec<String>,
    /// Set when no header row could be detected. The classifier deprioritizes
    /// these.
    pub low_confidence: bool,
}

impl Table {
    pub fn title_lower(&self) -> String {
        self.title.as_deref().unwrap_or("").to_lowercase()
    }
}

static FOOTNOTE_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-•*]|\(|\d+\s*[.)])").unwrap());

/// Separator rows are markdown table rules that survived upstream conversion:
/// every non-empty cell is a run of dashes, possibly with alignment colons.
fn is_separator_row(row: &[String]) -> bool {
    let mut saw_cell = false;
    for cell in row {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        saw_cell = true;
        let mut saw_dash = false;
        for c in cell.chars() {
            match c {
                '-' | '\u{2013}' | '\u{2014}' => saw_dash = true,
                ':' => {}
                _ => return false,
            }
        }
        if !saw_dash {
            return false;
        }
    }
    saw_cell
}

fn is_empty_row(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

/// Section boundaries are markdown headings carried through the dump as the
/// first cell of a row.
fn boundary_title(row: &[String]) -> Option<String> {
    let first = row.first().map(|c| c.trim()).unwrap_or("");
    if first.starts_with('#') {
        Some(first.trim_start_matches('#').trim().to_string())
    } else {
        None
    }
}

fn populated_cells(row: &[String]) -> usize {
    row.iter().filter(|c| !c.trim().is_empty()).count()
}

/// The upstream table dumper writes a bare `FOOTNOTES:` banner between body
/// and notes; it carries no content and is dropped outright.
fn is_footnote_sentinel(row: &[String]) -> bool {
    row.iter()
        .find(|c| !c.trim().is_empty())
        .is_some_and(|c| c.trim().eq_ignore_ascii_case("footnotes:"))
}

/// A body row is routed to footnotes when it starts with a footnote marker or
/// is a single populated cell trailing a header of three or more columns.
fn is_footnote_row(row: &[String], header_width: usize) -> bool {
    let first = match row.iter().find(|c| !c.trim().is_empty()) {
        Some(c) => c.trim(),
        None => return false,
    };
    if FOOTNOTE_MARKER_RE.is_match(first) {
        return true;
    }
    header_width >= 3 && populated_cells(row) == 1
}

fn footnote_text(row: &[String]) -> String {
    row.iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

struct TableAssembler {
    tables: Vec<Table>,
    title: Option<String>,
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    footnotes: Vec<String>,
}

impl TableAssembler {
    fn new(initial_title: Option<String>) -> Self {
        Self {
            tables: Vec::new(),
            title: initial_title,
            header: None,
            rows: Vec::new(),
            footnotes: Vec::new(),
        }
    }

    fn has_content(&self) -> bool {
        self.header.is_some() || !self.rows.is_empty() || !self.footnotes.is_empty()
    }

    /// Close out the current table, if any, and reset for the next one.
    fn flush(&mut self, next_title: Option<String>) {
        if self.has_content() {
            let header = self.header.take().unwrap_or_default();
            let low_confidence = header.is_empty();
            self.tables.push(Table {
                index: self.tables.len(),
                title: self.title.take(),
                header,
                rows: std::mem::take(&mut self.rows),
                footnotes: std::mem::take(&mut self.footnotes),
                low_confidence,
            });
        }
        self.title = next_title;
        self.header = None;
    }

    fn push(&mut self, row: Vec<String>) {
        if is_separator_row(&row) || is_empty_row(&row) {
            return;
        }
        if let Some(title) = boundary_title(&row) {
            self.flush(if title.is_empty() { None } else { Some(title) });
            return;
        }
        if is_footnote_sentinel(&row) {
            return;
        }
        match &self.header {
            None => {
                // A footnote-marker row cannot open a table; without it the
                // block may end up headerless (and flagged so on flush).
                if is_footnote_row(&row, 0) {
                    self.footnotes.push(footnote_text(&row));
                } else {
                    self.header = Some(row.iter().map(|c| c.trim().to_string()).collect());
                }
            }
            Some(header) => {
                if is_footnote_row(&row, header.len()) {
                    self.footnotes.push(footnote_text(&row));
                } else {
                    self.rows.push(row);
                }
            }
        }
    }

    fn finish(mut self) -> Vec<Table> {
        self.flush(None);
        self.tables
    }
}

/// Normalize a raw row dump into discrete tables, preserving source order.
///
/// Never fails on data shape: rows that fit nowhere become footnotes or are
/// dropped, and a headerless block still yields a low-confidence `Table`.
pub fn normalize_rows(rows: Vec<Vec<String>>, initial_title: Option<String>) -> Vec<Table> {
    let mut assembler = TableAssembler::new(initial_title);
    for row in rows {
        assembler.push(row);
    }
    assembler.finish()
}

/// Re-index a combined table list after merging several sources.
pub fn reindex(tables: &mut [Table]) {
    for (i, t) in tables.iter_mut().enumerate() {
        t.index = i;
    }
}
