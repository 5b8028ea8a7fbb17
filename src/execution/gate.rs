//! Execution Gate
//!
//! Caps unbounded result sets and turns executor failures into the error
//! taxonomy. Actual execution is delegated to a [`QueryExecutor`].

use crate::config::DEFAULT_ROW_LIMIT;
use crate::error::Result;
use crate::execution::error_classifier::{ErrorClassifier, ErrorKind};
use crate::validator::{UnvalidatedSql, ValidatedSql};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::sync::Arc;
use tracing::{info, warn};

lazy_static! {
    static ref LIMIT_WORD: Regex = Regex::new(r"(?i)\blimit\b").unwrap();
}

/// One result row: column name -> value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Database access layer. Accepts only validated statements.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_rows(&self, sql: &ValidatedSql) -> Result<Vec<Row>>;
}

/// Append `LIMIT 500` on a new line unless a LIMIT clause is already present.
pub fn ensure_limit(sql: &str) -> String {
    ensure_limit_with(sql, DEFAULT_ROW_LIMIT)
}

pub fn ensure_limit_with(sql: &str, limit: u64) -> String {
    if has_limit_clause(sql) {
        sql.to_string()
    } else {
        format!("{}\nLIMIT {}", sql.trim_end(), limit)
    }
}

/// True when an unquoted LIMIT keyword appears outside literals and comments.
/// Text the tokenizer rejects falls back to a word match; the validator
/// rejects such text anyway.
fn has_limit_clause(sql: &str) -> bool {
    let dialect = PostgreSqlDialect {};
    match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens.iter().any(|token| {
            matches!(token, Token::Word(word) if word.quote_style.is_none() && word.keyword == Keyword::LIMIT)
        }),
        Err(_) => LIMIT_WORD.is_match(sql),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub detail: Option<String>,
    /// Raw executor message
    pub message: String,
}

pub struct ExecutionGate {
    executor: Arc<dyn QueryExecutor>,
    classifier: ErrorClassifier,
    row_limit: u64,
}

impl ExecutionGate {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self::with_row_limit(executor, DEFAULT_ROW_LIMIT)
    }

    pub fn with_row_limit(executor: Arc<dyn QueryExecutor>, row_limit: u64) -> Self {
        Self {
            executor,
            classifier: ErrorClassifier::new(),
            row_limit,
        }
    }

    pub fn row_limit(&self) -> u64 {
        self.row_limit
    }

    pub fn cap(&self, candidate: UnvalidatedSql) -> UnvalidatedSql {
        candidate.with_row_limit(self.row_limit)
    }

    pub async fn execute(&self, sql: &ValidatedSql) -> std::result::Result<Vec<Row>, ExecutionError> {
        match self.executor.fetch_rows(sql).await {
            Ok(rows) => {
                info!(rows = rows.len(), "Query executed");
                Ok(rows)
            }
            Err(e) => {
                let classification = self.classifier.classify(&e);
                warn!(kind = %classification.kind, error = %e, "Query execution failed");
                Err(ExecutionError {
                    kind: classification.kind,
                    detail: classification.detail,
                    message: e.to_string(),
                })
            }
        }
    }
}
