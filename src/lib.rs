pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod execution;
pub mod llm;
pub mod normalizer;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod validator;

pub use error::{NlqError, Result};
pub use execution::{ErrorKind, ExecutionGate, QueryExecutor, Row};
pub use llm::{LlmClient, SqlGenerator};
pub use normalizer::{Normalizer, NormalizerConfig};
pub use pipeline::{QueryFailure, QueryOutcome, QueryPipeline};
pub use schema::{SchemaMap, SchemaProvider};
pub use validator::{validate, Rejection, SafetyVerdict, UnvalidatedSql, ValidatedSql};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
