// src/validate/mod.rs
use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::ValidationConfig;
use crate::records::Person;
use crate::resolve::Field;

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").unwrap());

/// Advisory verdict for one record. Validation never mutates the record it
/// scores; a failed or timed-out call degrades to `Skipped` for that record
/// alone.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub record_index: usize,
    pub name: String,
    #[serde(flatten)]
    pub outcome: ValidationOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Scored { confidence: f64, issues: Vec<String> },
    Skipped { reason: String },
}

pub struct Validator {
    cfg: ValidationConfig,
    client: Client,
    api_key: Option<String>,
}

impl Validator {
    pub fn new(cfg: ValidationConfig) -> Self {
        let api_key = env::var(&cfg.api_key_env).ok().filter(|k| !k.is_empty());
        if cfg.enabled && api_key.is_none() {
            warn!(
                "no API key in ${}; validation will be skipped",
                cfg.api_key_env
            );
        }
        Self {
            cfg,
            client: Client::new(),
            api_key,
        }
    }

    /// Score every record with bounded fan-out. Reports come back ordered by
    /// record index no matter how the calls complete.
    pub async fn validate_records(&self, company: &str, people: &[Person]) -> Vec<ValidationReport> {
        let skipped_all = |reason: &str| {
            people
                .iter()
                .enumerate()
                .map(|(i, p)| ValidationReport {
                    record_index: i,
                    name: p.name.clone(),
                    outcome: ValidationOutcome::Skipped {
                        reason: reason.to_string(),
                    },
                })
                .collect()
        };

        if !self.cfg.enabled {
            return skipped_all("validation disabled");
        }
        let Some(api_key) = self.api_key.clone() else {
            return skipped_all("no API key");
        };

        let sem = Arc::new(Semaphore::new(self.cfg.max_concurrency.max(1)));
        let calls = people.iter().enumerate().map(|(i, person)| {
            let sem = Arc::clone(&sem);
            let api_key = api_key.clone();
            async move {
                let outcome = match sem.acquire().await {
                    Ok(_permit) => {
                        let call = self.score(company, person, &api_key);
                        match timeout(Duration::from_secs(self.cfg.timeout_secs), call).await {
                            Ok(Ok(outcome)) => outcome,
                            Ok(Err(err)) => {
                                warn!("validation of {} failed: {}", person.name, err);
                                ValidationOutcome::Skipped {
                                    reason: err.to_string(),
                                }
                            }
                            Err(_) => ValidationOutcome::Skipped {
                                reason: "validation call timed out".to_string(),
                            },
                        }
                    }
                    Err(_) => ValidationOutcome::Skipped {
                        reason: "validation pool closed".to_string(),
                    },
                };
                ValidationReport {
                    record_index: i,
                    name: person.name.clone(),
                    outcome,
                }
            }
        });

        join_all(calls).await
    }

    async fn score(
        &self,
        company: &str,
        person: &Person,
        api_key: &str,
    ) -> Result<ValidationOutcome> {
        let body = json!({
            "model": self.cfg.model,
            "temperature": self.cfg.temperature,
            "max_tokens": 500,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a financial data validation expert. Analyze compensation data for accuracy and completeness.",
                },
                { "role": "user", "content": build_prompt(company, person) },
            ],
        });

        let mut attempt = 0;
        let reply: serde_json::Value = loop {
            attempt += 1;
            let resp = self
                .client
                .post(&self.cfg.endpoint)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await;
            match resp {
                Ok(resp) if resp.status().is_success() => match resp.json().await {
                    Ok(v) => break v,
                    Err(_) if attempt < MAX_RETRIES => {
                        sleep(RETRY_DELAY).await;
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                },
                Ok(resp) if attempt < MAX_RETRIES && resp.status().is_server_error() => {
                    sleep(RETRY_DELAY).await;
                    continue;
                }
                Ok(resp) => return Err(anyhow!("HTTP error: {}", resp.status())),
                Err(_) if attempt < MAX_RETRIES => {
                    sleep(RETRY_DELAY).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let content = reply["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("malformed completion response"))?;
        debug!(name = %person.name, "validation reply received");
        Ok(parse_reply(content))
    }
}

fn build_prompt(company: &str, person: &Person) -> String {
    let mut prompt = format!(
        "Please validate the following {} compensation record extracted for {}:\n\n{}",
        person.role, company, person.name
    );
    if let Some(title) = &person.title {
        prompt.push_str(&format!(" ({})", title));
    }
    if let Some(year) = person.year {
        prompt.push_str(&format!(", fiscal year {}", year));
    }
    prompt.push('\n');
    for field in Field::ALL {
        let shown = person
            .values
            .get(&field)
            .and_then(|v| v.amount())
            .map(|v| format!("${:.0}", v))
            .unwrap_or_else(|| "N/A".to_string());
        prompt.push_str(&format!("  {}: {}\n", field.column_name(), shown));
    }
    prompt.push_str(
        "\nRespond as JSON with keys: confidence (0-10), issues (list of strings).",
    );
    prompt
}

/// Pull the verdict out of a model reply. Free-text replies degrade to a
/// mid-scale confidence with the raw text as the single issue.
fn parse_reply(text: &str) -> ValidationOutcome {
    if let Some(m) = JSON_OBJECT_RE.find(text) {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(m.as_str()) {
            let confidence = v["confidence"].as_f64().unwrap_or(5.0);
            let issues = v["issues"]
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|i| i.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            return ValidationOutcome::Scored { confidence, issues };
        }
    }
    ValidationOutcome::Scored {
        confidence: 5.0,
        issues: vec![text.trim().to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Role;
    use crate::records::FieldValue;
    use std::collections::BTreeMap;

    fn person(name: &str) -> Person {
        let mut values = BTreeMap::new();
        for field in Field::ALL {
            values.insert(field, FieldValue::NotAvailable);
        }
        values.insert(Field::BasePay, FieldValue::Amount(2015288.0));
        Person {
            name: name.to_string(),
            title: None,
            role: Role::Executive,
            year: Some(2024),
            values,
        }
    }

    #[test]
    fn parse_reply_reads_embedded_json() {
        let out = parse_reply(
            "Here you go:\n{\"confidence\": 8, \"issues\": [\"bonus missing\"]}\nthanks",
        );
        match out {
            ValidationOutcome::Scored { confidence, issues } => {
                assert_eq!(confidence, 8.0);
                assert_eq!(issues, vec!["bonus missing"]);
            }
            _ => panic!("expected scored outcome"),
        }
    }

    #[test]
    fn parse_reply_degrades_on_free_text() {
        let out = parse_reply("Looks fine to me.");
        match out {
            ValidationOutcome::Scored { confidence, issues } => {
                assert_eq!(confidence, 5.0);
                assert_eq!(issues, vec!["Looks fine to me."]);
            }
            _ => panic!("expected scored outcome"),
        }
    }

    #[test]
    fn prompt_shows_missing_fields_as_na() {
        let prompt = build_prompt("Alphabet Inc.", &person("Sundar Pichai"));
        assert!(prompt.contains("BasePay: $2015288"));
        assert!(prompt.contains("CashBonus: N/A"));
    }

    #[tokio::test]
    async fn missing_key_skips_every_record_in_order() {
        let cfg = ValidationConfig {
            api_key_env: "PROXYCOMP_TEST_NO_SUCH_KEY".to_string(),
            ..ValidationConfig::default()
        };
        let validator = Validator::new(cfg);
        let people = vec![person("Sundar Pichai"), person("Ruth Porat")];

        let reports = validator.validate_records("Alphabet Inc.", &people).await;
        assert_eq!(reports.len(), 2);
        for (i, report) in reports.iter().enumerate() {
            assert_eq!(report.record_index, i);
            assert!(matches!(
                report.outcome,
                ValidationOutcome::Skipped { .. }
            ));
        }
    }

    #[tokio::test]
    async fn disabled_validation_reports_skipped() {
        let cfg = ValidationConfig {
            enabled: false,
            ..ValidationConfig::default()
        };
        let validator = Validator::new(cfg);
        let reports = validator
            .validate_records("Alphabet Inc.", &[person("Sundar Pichai")])
            .await;
        match &reports[0].outcome {
            ValidationOutcome::Skipped { reason } => assert_eq!(reason, "validation disabled"),
            _ => panic!("expected skipped"),
        }
    }
}
