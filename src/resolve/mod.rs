// src/resolve/mod.rs
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::classify::Role;

/// Canonical compensation fields, in output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    BasePay,
    CashBonus,
    StockAwards,
    NonEquityIncentive,
    OptionAwards,
    AllOtherCompensation,
    TotalCompensation,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::BasePay,
        Field::CashBonus,
        Field::StockAwards,
        Field::NonEquityIncentive,
        Field::OptionAwards,
        Field::AllOtherCompensation,
        Field::TotalCompensation,
    ];

    /// Column name used in the CSV outputs.
    pub fn column_name(&self) -> &'static str {
        match self {
            Field::BasePay => "BasePay",
            Field::CashBonus => "CashBonus",
            Field::StockAwards => "StockAwards",
            Field::NonEquityIncentive => "NonEquityIncentive",
            Field::OptionAwards => "OptionAwards",
            Field::AllOtherCompensation => "AllOtherCompensation",
            Field::TotalCompensation => "TotalCompensation",
        }
    }
}

/// One keyword rule binding a header cell to a canonical field.
///
/// Rules are evaluated in list order, most specific first, so a broad rule
/// ("total") cannot steal a column a narrower one ("non-equity incentive")
/// should own. The exclusion check is absolute: a cell containing any
/// exclusion keyword never matches, whatever the inclusions say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: Field,
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub roles: Vec<Role>,
}

impl FieldRule {
    pub fn applies_to(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Does a normalized header cell satisfy this rule?
    pub fn matches(&self, cell: &str) -> bool {
        if self.exclude.iter().any(|kw| cell.contains(kw.as_str())) {
            return false;
        }
        self.include.iter().any(|kw| cell.contains(kw.as_str()))
    }
}

/// Injective mapping from canonical field to header column index.
#[derive(Debug, Default, Clone)]
pub struct ColumnBinding {
    bound: BTreeMap<Field, usize>,
    used: HashSet<usize>,
}

impl ColumnBinding {
    pub fn get(&self, field: Field) -> Option<usize> {
        self.bound.get(&field).copied()
    }

    pub fn is_bound(&self, field: Field) -> bool {
        self.bound.contains_key(&field)
    }

    pub fn column_taken(&self, idx: usize) -> bool {
        self.used.contains(&idx)
    }

    /// Bind `field` to `idx`. Returns false without modifying anything if the
    /// field or the column is already taken.
    fn bind(&mut self, field: Field, idx: usize) -> bool {
        if self.bound.contains_key(&field) || self.used.contains(&idx) {
            return false;
        }
        self.bound.insert(field, idx);
        self.used.insert(idx);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, usize)> + '_ {
        self.bound.iter().map(|(f, i)| (*f, *i))
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

/// Lowercase, trim, collapse internal whitespace.
pub fn normalize_header_cell(cell: &str) -> String {
    cell.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a table header against the rule list for `role`.
///
/// Cells are scanned left to right per rule; the first satisfying cell not
/// already claimed by an earlier rule wins. Unmatched fields stay unbound,
/// unmatched columns are ignored.
pub fn resolve_columns(header: &[String], rules: &[FieldRule], role: Role) -> ColumnBinding {
    let cells: Vec<String> = header.iter().map(|c| normalize_header_cell(c)).collect();

    let mut binding = ColumnBinding::default();
    for rule in rules {
        if !rule.applies_to(role) || binding.is_bound(rule.field) {
            continue;
        }
        for (idx, cell) in cells.iter().enumerate() {
            if binding.column_taken(idx) || cell.is_empty() {
                continue;
            }
            if rule.matches(cell) {
                binding.bind(rule.field, idx);
                break;
            }
        }
    }
    binding
}
