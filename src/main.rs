use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use proxycomp::{
    classify::Role,
    config::ExtractConfig,
    extract::extract_people,
    normalize::{read_dump, read_tables_dir, reindex},
    output,
    validate::Validator,
};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "proxycomp",
    about = "Extract compensation records from proxy-statement table dumps"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a bulk table dump into per-table CSVs plus a metadata sidecar.
    NormalizeTables {
        /// Bulk CSV dump holding one or more concatenated tables.
        #[arg(long)]
        input: PathBuf,
        /// Output directory for the per-table files.
        #[arg(long, default_value = "extracted_tables")]
        tables_dir: PathBuf,
    },
    /// Extract per-person compensation records and write CSV/JSON results.
    ExtractCompensation {
        /// Directory of per-table CSVs (as written by normalize-tables).
        #[arg(long)]
        tables_dir: Option<PathBuf>,
        /// Bulk CSV dump, normalized on the fly. May be combined with
        /// --tables-dir.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Company name, passed through to validation and the results file.
        #[arg(long, default_value = "Unknown")]
        company: String,
        #[arg(long, value_enum, default_value_t = RoleFilter::Both)]
        role_filter: RoleFilter,
        /// YAML config overriding the built-in rule tables.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long, default_value = "compensation")]
        output_prefix: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleFilter {
    Executive,
    Director,
    Both,
}

impl RoleFilter {
    fn roles(self) -> Vec<Role> {
        match self {
            RoleFilter::Executive => vec![Role::Executive],
            RoleFilter::Director => vec![Role::Director],
            RoleFilter::Both => vec![Role::Executive, Role::Director],
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();
    match cli.command {
        Command::NormalizeTables { input, tables_dir } => {
            let tables = read_dump(&input)?;
            info!("normalized {} tables from {}", tables.len(), input.display());
            output::write_normalized_tables(&tables_dir, &tables)?;
        }

        Command::ExtractCompensation {
            tables_dir,
            input,
            company,
            role_filter,
            config,
            out_dir,
            output_prefix,
        } => {
            // ─── 2) load config ──────────────────────────────────────
            let cfg = match config {
                Some(path) => ExtractConfig::load(path)?,
                None => ExtractConfig::default(),
            };

            // ─── 3) gather and normalize tables ──────────────────────
            if tables_dir.is_none() && input.is_none() {
                bail!("either --tables-dir or --input is required");
            }
            let mut tables = Vec::new();
            if let Some(dir) = &tables_dir {
                tables.extend(read_tables_dir(dir)?);
            }
            if let Some(path) = &input {
                tables.extend(read_dump(path)?);
            }
            reindex(&mut tables);
            info!("{} normalized tables", tables.len());

            // ─── 4) classify, resolve, build ─────────────────────────
            let roles = role_filter.roles();
            let extraction = extract_people(&tables, &roles, &cfg);
            if extraction.found_roles.is_empty() {
                bail!("no compensation tables found for any requested role");
            }

            // ─── 5) advisory validation ──────────────────────────────
            let validator = Validator::new(cfg.validation.clone());
            let reports = validator
                .validate_records(&company, &extraction.people)
                .await;

            // ─── 6) write outputs ────────────────────────────────────
            fs::create_dir_all(&out_dir)?;
            for role in &roles {
                let suffix = match role {
                    Role::Executive => "executives",
                    Role::Director => "directors",
                };
                output::write_role_csv(
                    out_dir.join(format!("{}_{}.csv", output_prefix, suffix)),
                    &extraction.people,
                    *role,
                )?;
            }
            output::write_combined_csv(
                out_dir.join(format!("{}_combined.csv", output_prefix)),
                &extraction.people,
            )?;
            output::write_json(
                out_dir.join(format!("{}_results.json", output_prefix)),
                &company,
                &extraction.people,
                &extraction.diagnostics,
                &reports,
            )?;

            info!(
                "extracted {} records across {} roles",
                extraction.people.len(),
                extraction.found_roles.len()
            );
        }
    }

    Ok(())
}
