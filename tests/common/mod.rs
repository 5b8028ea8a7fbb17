#![allow(dead_code)]

use async_trait::async_trait;
use nlq_gate::error::{NlqError, Result};
use nlq_gate::execution::{ExecutionGate, QueryExecutor, Row};
use nlq_gate::llm::SqlGenerator;
use nlq_gate::normalizer::Normalizer;
use nlq_gate::pipeline::QueryPipeline;
use nlq_gate::schema::SchemaMap;
use nlq_gate::validator::ValidatedSql;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Returns a canned response and remembers the last prompt.
pub struct ScriptedGenerator {
    response: std::result::Result<String, String>,
    pub last_prompt: Mutex<Option<String>>,
}

impl ScriptedGenerator {
    pub fn returning(sql: &str) -> Self {
        Self {
            response: Ok(sql.to_string()),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            last_prompt: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SqlGenerator for ScriptedGenerator {
    async fn generate_sql(&self, prompt: &str) -> Result<String> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        self.response.clone().map_err(NlqError::Llm)
    }
}

/// Counts calls and records every statement it was asked to run.
pub struct RecordingExecutor {
    response: std::result::Result<Vec<Row>, String>,
    pub calls: AtomicUsize,
    pub executed: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            response: Ok(rows),
            calls: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn fetch_rows(&self, sql: &ValidatedSql) -> Result<Vec<Row>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.executed.lock().unwrap().push(sql.as_str().to_string());
        self.response.clone().map_err(NlqError::Database)
    }
}

pub fn college_schema() -> SchemaMap {
    SchemaMap::from_rows([
        ("college_profiles", "id"),
        ("college_profiles", "college"),
        ("college_profiles", "state"),
        ("college_profiles", "ug_fee"),
        ("college_profiles", "pg_fee"),
        ("alumni_reviews", "college_id"),
        ("alumni_reviews", "rating"),
        ("alumni_reviews", "placement"),
    ])
}

pub fn row(college: &str, rating: f64) -> Row {
    let mut row = Row::new();
    row.insert("college".to_string(), json!(college));
    row.insert("rating".to_string(), json!(rating));
    row
}

pub fn pipeline(generator: Arc<ScriptedGenerator>, executor: Arc<RecordingExecutor>) -> QueryPipeline {
    QueryPipeline::new(
        Arc::new(Normalizer::with_defaults().unwrap()),
        Arc::new(college_schema()),
        generator,
        ExecutionGate::new(executor),
    )
}
