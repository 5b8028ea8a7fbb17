//! Error Classifier
//!
//! Classifies database error text into the stable taxonomy returned to callers.

use crate::error::NlqError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref QUOTED_NAME: Regex = Regex::new(r#""([^"]+)""#).unwrap();
    static ref UNQUOTED_COLUMN: Regex = Regex::new(r"column\s+([\w.]+)\s+does not exist").unwrap();
}

/// Failure taxonomy shared by the pipeline and the HTTP surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingQuery,
    UnsafeSql,
    GenerationError,
    NoRows,
    MissingColumn,
    MissingTable,
    InvalidOperator,
    Timeout,
    ConnectionError,
    SyntaxError,
    UnknownError,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::MissingQuery => "missing_query",
            ErrorKind::UnsafeSql => "unsafe_sql",
            ErrorKind::GenerationError => "generation_error",
            ErrorKind::NoRows => "no_rows",
            ErrorKind::MissingColumn => "missing_column",
            ErrorKind::MissingTable => "missing_table",
            ErrorKind::InvalidOperator => "invalid_operator",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::SyntaxError => "syntax_error",
            ErrorKind::UnknownError => "unknown_error",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::MissingQuery => "Missing 'query' in JSON body.",
            ErrorKind::UnsafeSql => "The generated SQL was rejected by the safety checks.",
            ErrorKind::GenerationError => "The SQL generator did not return a query.",
            ErrorKind::NoRows => "The query ran successfully but returned no rows.",
            ErrorKind::MissingColumn => "The generated SQL referenced a column that does not exist.",
            ErrorKind::MissingTable => "The generated SQL referenced a table that does not exist.",
            ErrorKind::InvalidOperator => "The generated SQL compared values of incompatible types.",
            ErrorKind::Timeout => "The query took too long and was cancelled.",
            ErrorKind::ConnectionError => "Could not reach the database.",
            ErrorKind::SyntaxError => "The generated SQL has a syntax error.",
            ErrorKind::UnknownError => "The query failed to execute.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    /// Identifier named by the database message, when there is one
    pub detail: Option<String>,
}

const CONNECTION_PATTERNS: &[&str] = &[
    "error communicating with database",
    "connection refused",
    "could not connect",
    "connection reset",
    "server closed the connection",
    "terminating connection",
    "pool timed out",
    "pool closed",
    "no route to host",
    "broken pipe",
];

const TIMEOUT_PATTERNS: &[&str] = &[
    "statement timeout",
    "canceling statement",
    "lock timeout",
    "timed out",
];

const OPERATOR_PATTERNS: &[&str] = &[
    "operator does not exist",
    "no operator matches",
    "could not identify an equality operator",
    "could not identify an ordering operator",
    "invalid input syntax for type",
];

/// Error classifier
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify an error into the taxonomy
    pub fn classify(&self, error: &NlqError) -> Classification {
        match error {
            NlqError::Database(message) => self.classify_message(message),
            other => self.classify_message(&other.to_string()),
        }
    }

    /// Classify raw backend error text. Patterns are checked most specific
    /// first; anything unrecognized is `UnknownError`. Quoted identifiers are
    /// blanked before matching so a name like `"timeout_ms"` cannot select a
    /// category.
    pub fn classify_message(&self, message: &str) -> Classification {
        let error_msg = QUOTED_NAME
            .replace_all(&message.to_lowercase(), "\"\"")
            .into_owned();
        let contains_any = |patterns: &[&str]| patterns.iter().any(|p| error_msg.contains(p));
        let missing = error_msg.contains("does not exist") || error_msg.contains("not found");

        let kind = if contains_any(CONNECTION_PATTERNS) {
            ErrorKind::ConnectionError
        } else if contains_any(TIMEOUT_PATTERNS) {
            ErrorKind::Timeout
        } else if contains_any(OPERATOR_PATTERNS) {
            ErrorKind::InvalidOperator
        } else if error_msg.contains("column") && missing {
            ErrorKind::MissingColumn
        } else if ((error_msg.contains("relation") || error_msg.contains("table")) && missing)
            || error_msg.contains("missing from-clause entry")
        {
            ErrorKind::MissingTable
        } else if error_msg.contains("syntax error") {
            ErrorKind::SyntaxError
        } else {
            ErrorKind::UnknownError
        };

        let detail = match kind {
            ErrorKind::MissingColumn | ErrorKind::MissingTable => extract_identifier(message),
            _ => None,
        };

        Classification { kind, detail }
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_identifier(message: &str) -> Option<String> {
    QUOTED_NAME
        .captures(message)
        .or_else(|| UNQUOTED_COLUMN.captures(message))
        .map(|caps| caps[1].to_string())
}
