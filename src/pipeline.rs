//! Query Pipeline
//!
//! raw text -> normalizer -> prompt -> generator -> row cap -> validator ->
//! execution gate. Every failure comes back as a [`QueryFailure`]; nothing
//! here panics or propagates past the caller.

use crate::execution::{ErrorKind, ExecutionGate, Row};
use crate::llm::SqlGenerator;
use crate::normalizer::Normalizer;
use crate::prompt::build_prompt_with_limit;
use crate::schema::SchemaMap;
use crate::validator::UnvalidatedSql;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub sql: String,
    pub normalized_query: String,
    pub rows: Vec<Row>,
    /// `Some(NoRows)` when the statement ran but matched nothing
    pub notice: Option<ErrorKind>,
}

impl QueryOutcome {
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = json!({
            "sql": self.sql,
            "rows": self.rows,
        });
        if let Some(notice) = self.notice {
            body["notice"] = json!(notice.code());
            body["message"] = json!(notice.user_message());
        }
        body
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    pub kind: ErrorKind,
    /// Validator rejection reason or raw backend/database message
    pub reason: String,
    pub detail: Option<String>,
    /// The SQL that was checked or executed, when one exists
    pub sql: Option<String>,
}

impl QueryFailure {
    fn new(kind: ErrorKind, reason: impl Into<String>, sql: Option<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            detail: None,
            sql,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut body = json!({
            "error": self.kind.code(),
            "sql": self.sql,
        });
        match self.kind {
            ErrorKind::UnsafeSql => {
                body["reason"] = json!(self.reason);
            }
            _ => {
                body["message"] = json!(self.kind.user_message());
                body["cause"] = json!(self.reason);
                if let Some(detail) = &self.detail {
                    body["detail"] = json!(detail);
                }
            }
        }
        body
    }
}

pub struct QueryPipeline {
    normalizer: Arc<Normalizer>,
    schema: Arc<SchemaMap>,
    generator: Arc<dyn SqlGenerator>,
    gate: ExecutionGate,
}

impl QueryPipeline {
    pub fn new(
        normalizer: Arc<Normalizer>,
        schema: Arc<SchemaMap>,
        generator: Arc<dyn SqlGenerator>,
        gate: ExecutionGate,
    ) -> Self {
        Self {
            normalizer,
            schema,
            generator,
            gate,
        }
    }

    pub fn schema(&self) -> &SchemaMap {
        &self.schema
    }

    /// Normalized query and the prompt built from it.
    pub fn prepare_prompt(&self, raw_query: &str) -> (String, String) {
        let normalized = self.normalizer.normalize(raw_query);
        let prompt = build_prompt_with_limit(&self.schema, &normalized, self.gate.row_limit());
        (normalized, prompt)
    }

    pub async fn run(&self, raw_query: &str) -> Result<QueryOutcome, QueryFailure> {
        let request_id = Uuid::new_v4();
        self.run_inner(raw_query)
            .instrument(info_span!("nlq_request", %request_id))
            .await
    }

    async fn run_inner(&self, raw_query: &str) -> Result<QueryOutcome, QueryFailure> {
        let query = raw_query.trim();
        if query.is_empty() {
            return Err(QueryFailure::new(
                ErrorKind::MissingQuery,
                ErrorKind::MissingQuery.user_message(),
                None,
            ));
        }
        info!(query = %query, "Received query");

        let (normalized, prompt) = self.prepare_prompt(query);
        debug!(normalized = %normalized, prompt_chars = prompt.len(), "Prompt assembled");

        let candidate = match self.generator.generate_sql(&prompt).await {
            Ok(sql) if !sql.trim().is_empty() => UnvalidatedSql::new(sql),
            Ok(_) => {
                warn!("Generator returned empty SQL");
                return Err(QueryFailure::new(
                    ErrorKind::GenerationError,
                    "generator returned empty SQL",
                    None,
                ));
            }
            Err(e) => {
                warn!(error = %e, "SQL generation failed");
                return Err(QueryFailure::new(ErrorKind::GenerationError, e.to_string(), None));
            }
        };

        let capped = self.gate.cap(candidate);
        let sql = capped.as_str().to_string();

        let validated = match capped.validate() {
            Ok(validated) => validated,
            Err(rejection) => {
                warn!(reason = %rejection, sql = %sql, "Rejected unsafe SQL");
                return Err(QueryFailure::new(
                    ErrorKind::UnsafeSql,
                    rejection.to_string(),
                    Some(sql),
                ));
            }
        };

        match self.gate.execute(&validated).await {
            Ok(rows) => {
                let notice = rows.is_empty().then_some(ErrorKind::NoRows);
                info!(rows = rows.len(), "Query completed");
                Ok(QueryOutcome {
                    sql,
                    normalized_query: normalized,
                    rows,
                    notice,
                })
            }
            Err(e) => Err(QueryFailure {
                kind: e.kind,
                reason: e.message,
                detail: e.detail,
                sql: Some(sql),
            }),
        }
    }
}
