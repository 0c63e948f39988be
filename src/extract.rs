// src/extract.rs
use tracing::info;

use crate::classify::{classify, Classification, Role};
use crate::config::ExtractConfig;
use crate::diag::Diagnostics;
use crate::normalize::Table;
use crate::records::{build_records, Person};
use crate::resolve::resolve_columns;
use crate::sanitize::Sanitizer;

/// The synchronous half of a run: classify, resolve, build. Deterministic —
/// identical tables and config always produce identical output.
#[derive(Debug)]
pub struct Extraction {
    pub people: Vec<Person>,
    pub diagnostics: Diagnostics,
    /// Roles for which a table was actually found.
    pub found_roles: Vec<Role>,
}

pub fn extract_people(tables: &[Table], roles: &[Role], cfg: &ExtractConfig) -> Extraction {
    let sanitizer = Sanitizer::new(&cfg.sanitizer);
    let mut diagnostics = Diagnostics::new();
    let mut people = Vec::new();
    let mut found_roles = Vec::new();

    for &role in roles {
        match classify(tables, role, &cfg.classifier) {
            Classification::Found(table) => {
                let binding = resolve_columns(&table.header, &cfg.field_rules, role);
                if binding.is_empty() {
                    diagnostics.warn(format!(
                        "{} table {} matched no field rules; all values will be unavailable",
                        role, table.index
                    ));
                }
                let records =
                    build_records(table, role, &binding, &sanitizer, &mut diagnostics);
                info!(
                    role = %role,
                    table = table.index,
                    records = records.len(),
                    "extracted records"
                );
                found_roles.push(role);
                people.extend(records);
            }
            Classification::NotFound => {
                diagnostics.warn(format!("no {} compensation table found", role));
            }
        }
    }

    Extraction {
        people,
        diagnostics,
        found_roles,
    }
}
