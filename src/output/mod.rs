// src/output/mod.rs
use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use csv::Writer;
use serde_json::json;
use tracing::info;

use crate::classify::Role;
use crate::diag::Diagnostics;
use crate::normalize::Table;
use crate::records::Person;
use crate::resolve::Field;
use crate::validate::ValidationReport;

fn fmt_amount(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn header_row(with_role: bool) -> Vec<String> {
    let mut cols: Vec<String> = Vec::new();
    cols.push("Name".to_string());
    if with_role {
        cols.push("Role".to_string());
    }
    cols.push("Title".to_string());
    cols.push("Year".to_string());
    cols.extend(Field::ALL.iter().map(|f| f.column_name().to_string()));
    cols
}

fn person_row(person: &Person, with_role: bool) -> Vec<String> {
    let mut row = Vec::new();
    row.push(person.name.clone());
    if with_role {
        row.push(person.role.label().to_string());
    }
    row.push(person.title.clone().unwrap_or_default());
    row.push(person.year.map(|y| y.to_string()).unwrap_or_default());
    for field in Field::ALL {
        let cell = person
            .values
            .get(&field)
            .and_then(|v| v.amount())
            .map(fmt_amount)
            .unwrap_or_default();
        row.push(cell);
    }
    row
}

/// Write one role's records with the fixed column order.
pub fn write_role_csv(path: impl AsRef<Path>, people: &[Person], role: Role) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("creating output file {}", path.display()))?;
    wtr.write_record(header_row(false))?;
    for person in people.iter().filter(|p| p.role == role) {
        wtr.write_record(person_row(person, false))?;
    }
    wtr.flush()?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Write every record across roles, with a `Role` column.
pub fn write_combined_csv(path: impl AsRef<Path>, people: &[Person]) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("creating output file {}", path.display()))?;
    wtr.write_record(header_row(true))?;
    for person in people {
        wtr.write_record(person_row(person, true))?;
    }
    wtr.flush()?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Full results document: records per role, diagnostics, validation reports,
/// extraction metadata.
pub fn write_json(
    path: impl AsRef<Path>,
    company: &str,
    people: &[Person],
    diagnostics: &Diagnostics,
    validation: &[ValidationReport],
) -> Result<()> {
    let path = path.as_ref();
    let executives: Vec<&Person> = people.iter().filter(|p| p.role == Role::Executive).collect();
    let directors: Vec<&Person> = people.iter().filter(|p| p.role == Role::Director).collect();

    let doc = json!({
        "company": company,
        "generated_at": Utc::now().to_rfc3339(),
        "executives": executives,
        "directors": directors,
        "extraction_metadata": {
            "total_executives": executives.len(),
            "total_directors": directors.len(),
        },
        "diagnostics": diagnostics.entries,
        "validation": validation,
    });

    let file = File::create(path)
        .with_context(|| format!("creating output file {}", path.display()))?;
    serde_json::to_writer_pretty(file, &doc)
        .with_context(|| format!("writing JSON results to {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn title_slug(table: &Table) -> String {
    let base = table.title.as_deref().unwrap_or("table");
    let slug: String = base
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "table".to_string()
    } else {
        slug
    }
}

/// Materialize normalized tables as per-table CSVs plus a metadata sidecar —
/// the `normalize-tables` command's output, mirroring the upstream table
/// dumper's directory layout (footnotes trail the body after a blank row).
pub fn write_normalized_tables(dir: impl AsRef<Path>, tables: &[Table]) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut metadata = Vec::new();
    for table in tables {
        let filename = format!("table_{:02}_{}.csv", table.index + 1, title_slug(table));
        let path = dir.join(&filename);
        let mut wtr = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("creating table file {}", path.display()))?;

        let width = table.header.len().max(1);
        wtr.write_record(&table.header)?;
        for row in &table.rows {
            wtr.write_record(row)?;
        }
        if !table.footnotes.is_empty() {
            let pad = |first: &str| {
                let mut r = vec![first.to_string()];
                r.resize(width, String::new());
                r
            };
            wtr.write_record(pad(""))?;
            wtr.write_record(pad("FOOTNOTES:"))?;
            for note in &table.footnotes {
                wtr.write_record(pad(note))?;
            }
        }
        wtr.flush()?;

        metadata.push(json!({
            "file": filename,
            "title": table.title,
            "num_rows": table.rows.len(),
            "num_columns": table.header.len(),
            "columns": table.header,
            "low_confidence": table.low_confidence,
        }));
    }

    let meta_path = dir.join("table_metadata.json");
    let file = File::create(&meta_path)
        .with_context(|| format!("creating {}", meta_path.display()))?;
    serde_json::to_writer_pretty(file, &metadata)?;
    info!("wrote {} tables to {}", tables.len(), dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::FieldValue;
    use std::collections::BTreeMap;

    fn person(name: &str, role: Role, total: f64) -> Person {
        let mut values = BTreeMap::new();
        for field in Field::ALL {
            values.insert(field, FieldValue::NotAvailable);
        }
        values.insert(Field::TotalCompensation, FieldValue::Amount(total));
        Person {
            name: name.to_string(),
            title: Some("Chief Executive Officer".to_string()),
            role,
            year: Some(2024),
            values,
        }
    }

    #[test]
    fn role_csv_has_the_fixed_column_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("executives.csv");
        let people = vec![
            person("Sundar Pichai", Role::Executive, 10725043.0),
            person("Frances Arnold", Role::Director, 332461.0),
        ];
        write_role_csv(&path, &people, Role::Executive)?;

        let text = fs::read_to_string(&path)?;
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Name,Title,Year,BasePay,CashBonus,StockAwards,NonEquityIncentive,OptionAwards,AllOtherCompensation,TotalCompensation"
        );
        // only the executive row, N/A fields empty
        let row = lines.next().unwrap();
        assert!(row.starts_with("Sundar Pichai,Chief Executive Officer,2024,"));
        assert!(row.ends_with(",10725043"));
        assert!(lines.next().is_none());
        Ok(())
    }

    #[test]
    fn combined_csv_carries_the_role_column() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("combined.csv");
        let people = vec![
            person("Sundar Pichai", Role::Executive, 10725043.0),
            person("Frances Arnold", Role::Director, 332461.0),
        ];
        write_combined_csv(&path, &people)?;

        let text = fs::read_to_string(&path)?;
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("Name,Role,Title,Year,"));
        assert!(lines.next().unwrap().contains(",Executive,"));
        assert!(lines.next().unwrap().contains(",Director,"));
        Ok(())
    }

    #[test]
    fn json_document_groups_roles_and_reports() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("results.json");
        let people = vec![person("Sundar Pichai", Role::Executive, 10725043.0)];
        let diag = Diagnostics::new();
        write_json(&path, "Alphabet Inc.", &people, &diag, &[])?;

        let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(doc["company"], "Alphabet Inc.");
        assert_eq!(doc["executives"][0]["name"], "Sundar Pichai");
        assert_eq!(doc["extraction_metadata"]["total_executives"], 1);
        assert_eq!(doc["directors"].as_array().unwrap().len(), 0);
        Ok(())
    }

    #[test]
    fn normalized_tables_round_trip_through_the_dir_reader() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let tables = vec![Table {
            index: 0,
            title: Some("Executive Compensation".to_string()),
            header: vec!["Name".into(), "Salary".into(), "Total".into()],
            rows: vec![vec![
                "Sundar Pichai".into(),
                "2,015,288".into(),
                "10,725,043".into(),
            ]],
            footnotes: vec!["(1) Salary earned in fiscal 2024.".into()],
            low_confidence: false,
        }];
        write_normalized_tables(dir.path(), &tables)?;

        assert!(dir.path().join("table_01_executive_compensation.csv").exists());
        assert!(dir.path().join("table_metadata.json").exists());

        let back = crate::normalize::read_tables_dir(dir.path())?;
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].header, tables[0].header);
        assert_eq!(back[0].rows, tables[0].rows);
        assert_eq!(back[0].footnotes.len(), 1);
        Ok(())
    }
}
