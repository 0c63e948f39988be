// src/classify/mod.rs
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::normalize::Table;
use crate::resolve::normalize_header_cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Executive,
    Director,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Executive => "Executive",
            Role::Director => "Director",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-role classification result. "Not found" is an expected, non-fatal
/// outcome callers log and skip.
#[derive(Debug)]
pub enum Classification<'a> {
    Found(&'a Table),
    NotFound,
}

impl<'a> Classification<'a> {
    pub fn table(&self) -> Option<&'a Table> {
        match self {
            Classification::Found(t) => Some(t),
            Classification::NotFound => None,
        }
    }
}

fn title_matches(table: &Table, pattern: &str, rejects: &[String]) -> bool {
    // File-stem titles arrive underscore-separated; fold them into the same
    // space-separated form the patterns use.
    let title = table.title_lower().replace('_', " ");
    if title.is_empty() || !title.contains(pattern) {
        return false;
    }
    !rejects.iter().any(|r| title.contains(r.as_str()))
}

fn anchor_score(table: &Table, anchors: &[String]) -> usize {
    table
        .header
        .iter()
        .map(|c| normalize_header_cell(c))
        .filter(|cell| anchors.iter().any(|a| cell.contains(a.as_str())))
        .count()
}

/// Pick the table representing `role`'s compensation.
///
/// Title patterns are tried in priority order against source-ordered tables;
/// the first hit wins. Failing that, tables are scored by role-anchor keyword
/// hits in the header, requiring the configured minimum; ties break to the
/// earliest table. Low-confidence tables are only eligible once every
/// confident table has missed the threshold.
pub fn classify<'a>(tables: &'a [Table], role: Role, cfg: &ClassifierConfig) -> Classification<'a> {
    let role_cfg = cfg.for_role(role);

    for pattern in &role_cfg.patterns {
        let pattern = pattern.to_lowercase();
        if let Some(table) = tables
            .iter()
            .find(|t| title_matches(t, &pattern, &role_cfg.reject))
        {
            debug!(role = %role, pattern = %pattern, index = table.index, "classified by title");
            return Classification::Found(table);
        }
    }

    let scored_best = |skip_low_confidence: bool| {
        tables
            .iter()
            .filter(|t| !(skip_low_confidence && t.low_confidence))
            .map(|t| (anchor_score(t, &role_cfg.anchors), t))
            .filter(|(score, _)| *score >= cfg.min_anchor_score)
            // max_by_key keeps the later element on ties; earliest index must
            // win, so compare strictly.
            .fold(None::<(usize, &Table)>, |best, (score, t)| match best {
                Some((bs, _)) if bs >= score => best,
                _ => Some((score, t)),
            })
    };

    if let Some((score, table)) = scored_best(true).or_else(|| scored_best(false)) {
        debug!(role = %role, score, index = table.index, "classified by anchor score");
        return Classification::Found(table);
    }

    Classification::NotFound
}
