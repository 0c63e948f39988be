// src/config/mod.rs
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::classify::Role;
use crate::resolve::{Field, FieldRule};

/// Everything tunable about an extraction run. Loaded once at startup and
/// passed explicitly into the pipeline; the compiled-in defaults reproduce the
/// vocabulary of the proxy statements this was built against, so no config
/// file is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub field_rules: Vec<FieldRule>,
    pub classifier: ClassifierConfig,
    pub sanitizer: SanitizerConfig,
    pub validation: ValidationConfig,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            field_rules: default_field_rules(),
            classifier: ClassifierConfig::default(),
            sanitizer: SanitizerConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl ExtractConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub executive: RolePatterns,
    pub director: RolePatterns,
    /// Minimum anchor-keyword hits for the fallback scorer to accept a table.
    pub min_anchor_score: usize,
}

impl ClassifierConfig {
    pub fn for_role(&self, role: Role) -> &RolePatterns {
        match role {
            Role::Executive => &self.executive,
            Role::Director => &self.director,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            executive: RolePatterns {
                patterns: string_vec(&[
                    "executive compensation",
                    "named executive officer",
                    "summary compensation",
                ]),
                anchors: string_vec(&[
                    "salary",
                    "bonus",
                    "non-equity incentive",
                    "stock awards",
                ]),
                reject: string_vec(&["director"]),
            },
            director: RolePatterns {
                patterns: string_vec(&["director compensation", "board compensation"]),
                anchors: string_vec(&["fees earned", "retainer", "board fees"]),
                reject: string_vec(&["executive"]),
            },
            min_anchor_score: 2,
        }
    }
}

/// Ordered title patterns, header anchors and title vetoes for one role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RolePatterns {
    pub patterns: Vec<String>,
    pub anchors: Vec<String>,
    pub reject: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Words that mark a fragment or tail as a title rather than a name.
    pub title_words: Vec<String>,
    /// Substrings that disqualify a candidate outright (companies, section
    /// labels, temporal phrases).
    pub non_person_terms: Vec<String>,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            title_words: string_vec(&[
                "chief",
                "officer",
                "president",
                "vice",
                "senior",
                "executive",
                "director",
                "chairman",
                "chair",
                "secretary",
                "treasurer",
                "controller",
                "manager",
                "founder",
                "lead",
                "ceo",
                "cfo",
                "coo",
                "cto",
                "and",
                "of",
                "the",
            ]),
            non_person_terms: string_vec(&[
                "inc",
                "llc",
                "corporation",
                "company",
                "holdings",
                "group",
                "partners",
                "limited",
                "ltd",
                "ventures",
                "president",
                "officer",
                "director",
                "manager",
                "executive",
                "chairman",
                "secretary",
                "treasurer",
                "controller",
                "chief",
                "footnotes",
                "consists",
                "reflects",
                "amounts",
                "shares",
                "salary",
                "bonus",
                "compensation",
                "total",
                "see note",
                "as of",
                "through",
                "until",
                "named executive",
                "all other",
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key; validation is skipped when
    /// it is unset.
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_concurrency: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.1,
            timeout_secs: 30,
            max_concurrency: 4,
        }
    }
}

fn string_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The rule table, most specific first. Order matters: NonEquityIncentive
/// must be tested before CashBonus ("incentive" would otherwise leak into a
/// bonus match) and before TotalCompensation; StockAwards excludes "option"
/// so option columns fall through to OptionAwards.
fn default_field_rules() -> Vec<FieldRule> {
    let both = vec![Role::Executive, Role::Director];
    let exec = vec![Role::Executive];
    let dir = vec![Role::Director];

    vec![
        FieldRule {
            field: Field::NonEquityIncentive,
            include: string_vec(&[
                "non-equity incentive",
                "non equity incentive",
                "incentive plan compensation",
            ]),
            exclude: vec![],
            roles: exec.clone(),
        },
        FieldRule {
            field: Field::AllOtherCompensation,
            include: string_vec(&[
                "all other compensation",
                "other compensation",
                "other comp",
                "perquisites",
            ]),
            exclude: vec![],
            roles: both.clone(),
        },
        FieldRule {
            field: Field::OptionAwards,
            include: string_vec(&["option award", "stock option", "option grants"]),
            exclude: vec![],
            roles: both.clone(),
        },
        FieldRule {
            field: Field::StockAwards,
            include: string_vec(&[
                "stock award",
                "equity award",
                "restricted stock",
                "stock compensation",
                "equity compensation",
            ]),
            exclude: string_vec(&["option", "non-equity", "non equity"]),
            roles: both.clone(),
        },
        FieldRule {
            field: Field::BasePay,
            include: string_vec(&["salary", "base pay", "base compensation", "base cash"]),
            exclude: vec![],
            roles: exec.clone(),
        },
        FieldRule {
            field: Field::BasePay,
            include: string_vec(&[
                "fees earned",
                "fees paid",
                "cash fees",
                "retainer",
                "board fees",
                "fees",
            ]),
            exclude: vec![],
            roles: dir,
        },
        FieldRule {
            field: Field::CashBonus,
            include: string_vec(&["bonus"]),
            exclude: string_vec(&["non-equity", "non equity", "incentive plan"]),
            roles: exec,
        },
        FieldRule {
            field: Field::TotalCompensation,
            include: string_vec(&["total"]),
            exclude: string_vec(&["target", "shares", "stock owned"]),
            roles: both,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_rules_lead_with_the_most_specific() {
        let rules = default_field_rules();
        let pos = |f: Field| rules.iter().position(|r| r.field == f).unwrap();
        assert!(pos(Field::NonEquityIncentive) < pos(Field::CashBonus));
        assert!(pos(Field::NonEquityIncentive) < pos(Field::TotalCompensation));
        assert!(pos(Field::OptionAwards) < pos(Field::StockAwards));
    }

    #[test]
    fn partial_yaml_overrides_merge_with_defaults() -> anyhow::Result<()> {
        let mut tmp = tempfile::Builder::new().suffix(".yaml").tempfile()?;
        writeln!(
            tmp,
            "classifier:\n  min_anchor_score: 3\nvalidation:\n  enabled: false\n"
        )?;

        let cfg = ExtractConfig::load(tmp.path())?;
        assert_eq!(cfg.classifier.min_anchor_score, 3);
        assert!(!cfg.validation.enabled);
        // untouched sections keep their defaults
        assert!(!cfg.field_rules.is_empty());
        assert_eq!(cfg.validation.model, "gpt-4o-mini");
        Ok(())
    }

    #[test]
    fn field_rules_round_trip_through_yaml() -> anyhow::Result<()> {
        let cfg = ExtractConfig::default();
        let text = serde_yaml::to_string(&cfg)?;
        let back: ExtractConfig = serde_yaml::from_str(&text)?;
        assert_eq!(back.field_rules.len(), cfg.field_rules.len());
        assert_eq!(back.field_rules[0].field, cfg.field_rules[0].field);
        Ok(())
    }
}
