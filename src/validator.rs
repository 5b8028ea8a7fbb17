//! Statement Validator
//!
//! Straight-line allow-list filter over untrusted SQL text from the
//! generative backend. Checks run in order and stop at the first failure:
//!
//! 1. empty input
//! 2. any `;` (one statement only)
//! 3. word-bounded denylisted keyword, case-insensitive
//! 4. tokenization (sqlparser, PostgreSQL dialect)
//! 5. first non-whitespace, non-comment token is SELECT or WITH
//!
//! This is not a SQL grammar. A discovered bypass is fixed by tightening
//! these checks or extending [`DENIED_KEYWORDS`].

use crate::execution::ensure_limit_with;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::fmt;

pub const DENIED_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE", "COPY",
];

lazy_static! {
    static ref DENIED: Regex =
        Regex::new(&format!(r"(?i)\b(?:{})\b", DENIED_KEYWORDS.join("|"))).unwrap();
}

/// Why a candidate statement was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", content = "detail", rename_all = "snake_case")]
pub enum Rejection {
    Empty,
    MultipleStatements,
    DisallowedKeyword(String),
    Unparseable(String),
    EmptyStatement,
    NotReadOnly(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Empty => write!(f, "empty"),
            Rejection::MultipleStatements => write!(f, "multiple statements not allowed"),
            Rejection::DisallowedKeyword(keyword) => write!(f, "disallowed keyword: {}", keyword),
            Rejection::Unparseable(msg) => write!(f, "could not parse: {}", msg),
            Rejection::EmptyStatement => write!(f, "empty statement"),
            Rejection::NotReadOnly(first) => {
                write!(f, "only SELECT/WITH allowed (statement starts with {})", first)
            }
        }
    }
}

/// Accept/reject decision. There is no partially accepted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyVerdict {
    pub accepted: bool,
    pub reason: Option<Rejection>,
}

impl SafetyVerdict {
    fn accept() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    fn reject(reason: Rejection) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
        }
    }

    pub fn reason_text(&self) -> Option<String> {
        self.reason.as_ref().map(ToString::to_string)
    }
}

/// Run the full check sequence over `candidate`.
pub fn validate(candidate: &str) -> SafetyVerdict {
    match check(candidate) {
        Ok(()) => SafetyVerdict::accept(),
        Err(reason) => SafetyVerdict::reject(reason),
    }
}

fn check(candidate: &str) -> Result<(), Rejection> {
    if candidate.is_empty() {
        return Err(Rejection::Empty);
    }

    if candidate.trim().contains(';') {
        return Err(Rejection::MultipleStatements);
    }

    if let Some(found) = DENIED.find(candidate) {
        return Err(Rejection::DisallowedKeyword(found.as_str().to_uppercase()));
    }

    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, candidate)
        .tokenize()
        .map_err(|e| Rejection::Unparseable(e.to_string()))?;

    let first = tokens
        .iter()
        .find(|token| !matches!(token, Token::Whitespace(_) | Token::EOF))
        .ok_or(Rejection::EmptyStatement)?;

    match first {
        Token::Word(word)
            if word.quote_style.is_none()
                && matches!(word.value.to_uppercase().as_str(), "SELECT" | "WITH") =>
        {
            Ok(())
        }
        other => Err(Rejection::NotReadOnly(other.to_string())),
    }
}

/// SQL text from the generative backend that has not been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnvalidatedSql(String);

impl UnvalidatedSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Append a `LIMIT` when the text has none.
    pub fn with_row_limit(self, limit: u64) -> Self {
        Self(ensure_limit_with(&self.0, limit))
    }

    /// The only way to obtain a [`ValidatedSql`].
    pub fn validate(self) -> Result<ValidatedSql, Rejection> {
        check(&self.0)?;
        Ok(ValidatedSql(self.0))
    }
}

impl fmt::Display for UnvalidatedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SQL text that passed every validator check. Executors accept only this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSql(String);

impl ValidatedSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ValidatedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
