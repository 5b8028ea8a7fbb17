//! Query Normalizer
//!
//! Rewrites a free-text question into column- and operator-oriented tokens
//! before it reaches the prompt. Passes run in a fixed order and each one is
//! a single left-to-right scan over the previous pass's output:
//!
//! 1. synonym folding (lower-cases first)
//! 2. qualitative substitution
//! 3. unit and comparator normalization
//! 4. implicit reference insertion
//! 5. logical operator canonicalization
//!
//! Phrase matching is word-bounded and longest-match-first. Single-quoted
//! literals are never rewritten.

mod tables;

pub use tables::NormalizerConfig;

use crate::error::{NlqError, Result};
use lazy_static::lazy_static;
use regex::{Captures, NoExpand, Regex};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Matches a single-quoted literal that starts a token.
const QUOTED_LITERAL: &str = r"\B'[^']*'";

const COMPARATOR_PHRASES: &[(&str, &str)] = &[
    ("greater than or equal to", ">="),
    ("more than or equal to", ">="),
    ("at least", ">="),
    ("minimum of", ">="),
    ("minimum", ">="),
    ("min", ">="),
    ("no less than", ">="),
    ("not less than", ">="),
    ("less than or equal to", "<="),
    ("at most", "<="),
    ("maximum of", "<="),
    ("maximum", "<="),
    ("max", "<="),
    ("no more than", "<="),
    ("not more than", "<="),
    ("up to", "<="),
    ("upto", "<="),
    ("within", "<="),
    ("not equal to", "!="),
    ("greater than", ">"),
    ("more than", ">"),
    ("higher than", ">"),
    ("above", ">"),
    ("over", ">"),
    ("exceeding", ">"),
    ("less than", "<"),
    ("lower than", "<"),
    ("fewer than", "<"),
    ("below", "<"),
    ("under", "<"),
    ("equal to", "="),
    ("equals", "="),
    ("exactly", "="),
];

lazy_static! {
    static ref GROUPED_NUMBER: Regex = Regex::new(r"\b\d{1,3}(?:,\d{2,3})+\b").unwrap();
    static ref UNIT_AMOUNT: Regex = Regex::new(
        r"\b(?P<amount>\d+(?:\.\d+)?)\s*(?P<unit>lakhs|lakh|lacs|lac|crores|crore|cr|thousand|k)\b"
    )
    .unwrap();
    static ref COMPARATOR: Regex = Regex::new(&format!(
        r"\b(?P<phrase>{})\s+(?P<value>-?\d+(?:\.\d+)?)\b",
        phrase_alternation(COMPARATOR_PHRASES.iter().map(|(phrase, _)| *phrase)).unwrap_or_default()
    ))
    .unwrap();
    static ref QUALIFIED_FEE: Regex =
        Regex::new(r"\b(?P<level>ug|undergrad|pg|postgrad)\s+fees?\b").unwrap();
    static ref BARE_FEE: Regex = Regex::new(r"\bfees?\b").unwrap();
    static ref LOGICAL: Regex =
        Regex::new(&format!(r"{}|\b(?P<op>and|or|not|with|having)\b", QUOTED_LITERAL)).unwrap();
}

/// Stateless text normalizer built from a [`NormalizerConfig`].
///
/// All patterns are compiled once in [`Normalizer::new`]; `normalize` is
/// pure and safe to call concurrently.
pub struct Normalizer {
    config: NormalizerConfig,
    synonyms: PhraseTable,
    qualifiers: Option<Regex>,
    thresholds: HashMap<String, String>,
    triggers: PhraseTable,
    locations: PhraseTable,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self> {
        let synonyms = PhraseTable::new(config.fuzzy_keywords.iter().flat_map(|(column, synonyms)| {
            synonyms.iter().map(move |synonym| (synonym.clone(), column.clone()))
        }))?;

        let thresholds: HashMap<String, String> = config
            .qualitative_thresholds
            .iter()
            .map(|(qualifier, fragment)| (collapse_whitespace(&qualifier.to_lowercase()), fragment.clone()))
            .collect();

        let mut adjacent_columns = config.numeric_columns();
        for level in ["", "ug ", "undergrad ", "pg ", "postgrad "] {
            adjacent_columns.push(format!("{}fee", level));
            adjacent_columns.push(format!("{}fees", level));
        }

        let qualifiers = match (
            phrase_alternation(thresholds.keys().map(String::as_str)),
            phrase_alternation(adjacent_columns.iter().map(String::as_str)),
        ) {
            (Some(qualifiers), Some(columns)) => Some(compile(&format!(
                r"{}|\b(?P<qualifier>{})\b(?:\s+(?:(?P<column>{})\b|(?P<number>\d)))?",
                QUOTED_LITERAL, qualifiers, columns
            ))?),
            _ => None,
        };

        let triggers = PhraseTable::new(
            config
                .implicit_references
                .iter()
                .map(|(trigger, column)| (trigger.clone(), column.clone())),
        )?;

        let state_column = config.state_column.clone();
        let locations = PhraseTable::new(config.locations.iter().map(|location| {
            let location = collapse_whitespace(&location.to_lowercase());
            let condition = format!("{} = '{}'", state_column, location);
            (location, condition)
        }))?;

        Ok(Self {
            config,
            synonyms,
            qualifiers,
            thresholds,
            triggers,
            locations,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(NormalizerConfig::default())
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Run every pass over `raw`. Never fails; unmatched text passes through.
    pub fn normalize(&self, raw: &str) -> String {
        let folded = self.fold_synonyms(raw);
        let mut consumed = Vec::new();
        let qualified = self.substitute_qualifiers(&folded, &mut consumed);
        let compared = normalize_comparators(&qualified);
        let referenced = self.insert_implicit_references(&compared, &consumed);
        let normalized = canonicalize_logical(&referenced);

        debug!(raw = %raw, normalized = %normalized, "Normalized query");
        normalized
    }

    fn fold_synonyms(&self, raw: &str) -> String {
        let lowered = collapse_whitespace(&raw.to_lowercase());
        self.synonyms.replace_all(&lowered)
    }

    /// Qualifiers that were replaced without an adjacent column are pushed
    /// to `consumed` so the implicit-reference pass can still see them.
    fn substitute_qualifiers(&self, text: &str, consumed: &mut Vec<String>) -> String {
        let Some(pattern) = &self.qualifiers else {
            return text.to_string();
        };

        pattern
            .replace_all(text, |caps: &Captures| {
                let Some(qualifier) = caps.name("qualifier") else {
                    return caps[0].to_string();
                };
                // "top 10" is a count, not a threshold
                if caps.name("number").is_some() {
                    return caps[0].to_string();
                }
                let qualifier = collapse_whitespace(qualifier.as_str());
                let Some(fragment) = self.thresholds.get(&qualifier) else {
                    return caps[0].to_string();
                };
                match caps.name("column") {
                    Some(column) => format!("{} {}", column.as_str(), fragment),
                    None => {
                        consumed.push(qualifier);
                        fragment.clone()
                    }
                }
            })
            .into_owned()
    }

    fn insert_implicit_references(&self, text: &str, consumed: &[String]) -> String {
        let mut out = self.resolve_fees(text);

        let mut implied: Vec<String> = consumed
            .iter()
            .filter_map(|qualifier| self.config.implicit_references.get(qualifier).cloned())
            .collect();
        implied.extend(self.triggers.matches(&out));

        let mut present = word_set(&out);
        let fee_columns = self.config.fee_columns();
        let fee_named = fee_columns.iter().any(|fee| present.contains(*fee));
        for column in implied {
            // An explicit UG or PG fee already settles which fee is meant
            if fee_named && fee_columns.contains(&column.as_str()) {
                continue;
            }
            if present.insert(column.clone()) {
                out.push(' ');
                out.push_str(&column);
            }
        }

        if word_set(&out).contains(&self.config.state_column) {
            out
        } else {
            self.locations.replace_all(&out)
        }
    }

    fn resolve_fees(&self, text: &str) -> String {
        let qualified = QUALIFIED_FEE.replace_all(text, |caps: &Captures| match &caps["level"] {
            "pg" | "postgrad" => self.config.postgraduate_fee_column.clone(),
            _ => self.config.undergraduate_fee_column.clone(),
        });
        BARE_FEE
            .replace_all(&qualified, NoExpand(&self.config.undergraduate_fee_column))
            .into_owned()
    }
}

/// Word-bounded phrase -> replacement table compiled into one alternation.
struct PhraseTable {
    pattern: Option<Regex>,
    replacements: HashMap<String, String>,
}

impl PhraseTable {
    fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let replacements: HashMap<String, String> = entries
            .into_iter()
            .map(|(phrase, replacement)| (collapse_whitespace(&phrase.to_lowercase()), replacement))
            .filter(|(phrase, _)| !phrase.is_empty())
            .collect();

        let pattern = match phrase_alternation(replacements.keys().map(String::as_str)) {
            Some(alternation) => Some(compile(&format!(
                r"{}|\b(?P<phrase>{})\b",
                QUOTED_LITERAL, alternation
            ))?),
            None => None,
        };

        Ok(Self { pattern, replacements })
    }

    fn lookup(&self, matched: &str) -> Option<&String> {
        self.replacements.get(&collapse_whitespace(matched))
    }

    fn replace_all(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };
        pattern
            .replace_all(text, |caps: &Captures| {
                caps.name("phrase")
                    .and_then(|phrase| self.lookup(phrase.as_str()))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Replacement values of every match, in order of appearance.
    fn matches(&self, text: &str) -> Vec<String> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };
        pattern
            .captures_iter(text)
            .filter_map(|caps| {
                caps.name("phrase")
                    .and_then(|phrase| self.lookup(phrase.as_str()))
                    .cloned()
            })
            .collect()
    }
}

fn normalize_comparators(text: &str) -> String {
    let ungrouped = GROUPED_NUMBER.replace_all(text, |caps: &Captures| caps[0].replace(',', ""));

    let expanded = UNIT_AMOUNT.replace_all(&ungrouped, |caps: &Captures| {
        let multiplier = match &caps["unit"] {
            "lakh" | "lakhs" | "lac" | "lacs" => 100_000.0,
            "crore" | "crores" | "cr" => 10_000_000.0,
            _ => 1_000.0,
        };
        match caps["amount"].parse::<f64>().map(|amount| (amount * multiplier).round()) {
            Ok(value) if value.is_finite() && value < i64::MAX as f64 => format!("{}", value as i64),
            _ => caps[0].to_string(),
        }
    });

    COMPARATOR
        .replace_all(&expanded, |caps: &Captures| {
            let phrase = collapse_whitespace(&caps["phrase"]);
            match COMPARATOR_PHRASES.iter().find(|(p, _)| *p == phrase) {
                Some((_, symbol)) => format!("{} {}", symbol, &caps["value"]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn canonicalize_logical(text: &str) -> String {
    LOGICAL
        .replace_all(text, |caps: &Captures| match caps.name("op").map(|m| m.as_str()) {
            Some("and") | Some("with") | Some("having") => "AND".to_string(),
            Some("or") => "OR".to_string(),
            Some("not") => "NOT".to_string(),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Build `(?:a|b|...)` with longer phrases first so leftmost-first matching
/// prefers the longest phrase at any position. Inner spaces match any run
/// of whitespace.
fn phrase_alternation<'a, I>(phrases: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut phrases: Vec<String> = phrases
        .into_iter()
        .map(collapse_whitespace)
        .filter(|p| !p.is_empty())
        .collect();
    if phrases.is_empty() {
        return None;
    }
    phrases.sort_by(|a, b| {
        b.chars()
            .count()
            .cmp(&a.chars().count())
            .then_with(|| a.cmp(b))
    });
    phrases.dedup();

    let alternatives: Vec<String> = phrases
        .iter()
        .map(|phrase| {
            phrase
                .split(' ')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();
    Some(format!("(?:{})", alternatives.join("|")))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| NlqError::Config(format!("Invalid normalizer pattern: {}", e)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn word_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}
