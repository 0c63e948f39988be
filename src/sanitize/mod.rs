// src/sanitize/mod.rs
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::SanitizerConfig;

static FOOTNOTE_FRAGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:-|\(|\d+\s*[.)])").unwrap());

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2},?\s+\d{4}\b|^\s*(?:19|20)\d{2}\s*$",
    )
    .unwrap()
});

static FOOTNOTE_REF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[\(\[]\d+[\)\]]\s*").unwrap());

static HONORIFIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:mr|ms|mrs|dr)\.?\s+").unwrap());

/// The validated output of one label cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedName {
    pub name: String,
    pub title: Option<String>,
}

/// Turns raw label cells ("Sundar Pichai\nChief Executive Officer (1)") into
/// validated person names. Word lists come from configuration, compiled once
/// here and carried immutably; no shared state.
#[derive(Debug)]
pub struct Sanitizer {
    title_words: HashSet<String>,
    non_person_terms: Vec<String>,
}

impl Sanitizer {
    pub fn new(cfg: &SanitizerConfig) -> Self {
        Self {
            title_words: cfg.title_words.iter().map(|w| w.to_lowercase()).collect(),
            non_person_terms: cfg
                .non_person_terms
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
        }
    }

    fn is_title_word(&self, token: &str) -> bool {
        let token = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if token.is_empty() {
            return false;
        }
        // "Co-Founder" counts through its hyphen parts.
        self.title_words.contains(&token)
            || token.split('-').any(|part| self.title_words.contains(part))
    }

    /// Does a fragment read as a job title rather than a person?
    pub fn looks_like_title(&self, text: &str) -> bool {
        let mut tokens = text.split_whitespace();
        match tokens.next() {
            Some(first) => self.is_title_word(first),
            None => false,
        }
    }

    /// The name-validity rule: at least two tokens, each uppercase-initial,
    /// mostly alphabetic, at most one digit (a middle initial is fine, a date
    /// is not), no boilerplate substrings, and not a pure title phrase.
    pub fn is_valid_person_name(&self, name: &str) -> bool {
        let trimmed = name.trim();
        if trimmed.len() < 3 || trimmed.starts_with('-') {
            return false;
        }

        let lower = trimmed.to_lowercase();
        if self
            .non_person_terms
            .iter()
            .any(|term| lower.contains(term.as_str()))
        {
            return false;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        if tokens.len() < 2 {
            return false;
        }
        if !tokens
            .iter()
            .all(|t| t.chars().next().is_some_and(|c| c.is_uppercase()))
        {
            return false;
        }
        if tokens.iter().all(|t| self.is_title_word(t)) {
            return false;
        }

        let digits = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
        if digits > 1 {
            return false;
        }
        let alpha = trimmed.chars().filter(|c| c.is_alphabetic()).count();
        alpha * 10 >= trimmed.chars().count() * 6
    }

    /// Cut a fragment where the name stops and the title/affiliation tail
    /// begins: at the first connective or the first title keyword past the
    /// leading token.
    fn split_title_tail<'a>(&self, fragment: &'a str) -> (&'a str, Option<&'a str>) {
        const CONNECTIVES: [&str; 7] = [
            " and ", " of ", " at ", " through ", " until ", " as of ", ",",
        ];

        let lower = fragment.to_lowercase();
        let mut cut = None;

        for sep in CONNECTIVES {
            if let Some(pos) = lower.find(sep) {
                cut = Some(cut.map_or(pos, |c: usize| c.min(pos)));
            }
        }

        let mut offset = 0;
        for (i, token) in fragment.split_whitespace().enumerate() {
            let pos = fragment[offset..].find(token).map(|p| p + offset);
            let Some(pos) = pos else { break };
            offset = pos + token.len();
            if i >= 1 && self.is_title_word(token) {
                cut = Some(cut.map_or(pos, |c: usize| c.min(pos)));
                break;
            }
        }

        match cut {
            // lowercase folding can shift byte offsets for non-ASCII labels;
            // only cut on a clean boundary
            Some(pos) if pos > 0 && fragment.is_char_boundary(pos) => {
                let (head, tail) = fragment.split_at(pos);
                let tail = tail
                    .trim_start_matches(|c: char| c == ',' || c == ';' || c.is_whitespace());
                (
                    head.trim_end(),
                    if tail.is_empty() { None } else { Some(tail) },
                )
            }
            _ => (fragment.trim(), None),
        }
    }

    /// The first fragment of `label` that reads as a job title, cleaned of
    /// footnote refs. Used by the record builder's continuation-row merge.
    pub fn extract_title(&self, label: &str) -> Option<String> {
        for fragment in label.split(['\n', ';']) {
            let fragment = fragment.trim();
            if fragment.is_empty()
                || FOOTNOTE_FRAGMENT_RE.is_match(fragment)
                || DATE_RE.is_match(fragment)
            {
                continue;
            }
            let cleaned = FOOTNOTE_REF_RE.replace_all(fragment, " ").to_string();
            let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
            if self.looks_like_title(&cleaned) {
                return Some(cleaned);
            }
        }
        None
    }

    /// Extract a validated name (and title, when one is present) from one raw
    /// label cell. Returns `None` when no fragment passes the validity rule —
    /// the caller drops the row rather than emit a half-valid person.
    pub fn sanitize(&self, label: &str) -> Option<SanitizedName> {
        let mut name: Option<String> = None;
        let mut title: Option<String> = None;

        for fragment in label.split(['\n', ';']) {
            let fragment = fragment.trim();
            if fragment.is_empty()
                || FOOTNOTE_FRAGMENT_RE.is_match(fragment)
                || DATE_RE.is_match(fragment)
            {
                continue;
            }

            let cleaned = FOOTNOTE_REF_RE.replace_all(fragment, " ").to_string();
            let cleaned = HONORIFIC_RE.replace(cleaned.trim(), "").to_string();
            let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
            if cleaned.is_empty() {
                continue;
            }

            if name.is_none() {
                let (head, tail) = self.split_title_tail(&cleaned);
                if self.is_valid_person_name(head) {
                    name = Some(head.to_string());
                    if title.is_none() {
                        title = tail
                            .filter(|t| self.looks_like_title(t))
                            .map(|t| t.to_string());
                    }
                    continue;
                }
            }

            // Not a name: keep the first title-looking fragment for the
            // record, drop the rest.
            if title.is_none() && self.looks_like_title(&cleaned) {
                title = Some(cleaned);
            }
        }

        name.map(|name| SanitizedName { name, title })
    }
}
