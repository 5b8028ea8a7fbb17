//! PostgreSQL schema provider and query executor

use crate::config::DatabaseConfig;
use crate::db::connection::{init_pool, DbPool};
use crate::error::{NlqError, Result};
use crate::execution::{QueryExecutor, Row};
use crate::schema::{SchemaMap, SchemaProvider};
use crate::validator::ValidatedSql;
use async_trait::async_trait;
use tracing::info;

const SCHEMA_QUERY: &str = r#"
    SELECT table_name::text, column_name::text
    FROM information_schema.columns
    WHERE table_schema = 'public'
    ORDER BY table_name, ordinal_position
"#;

pub struct PgDatabase {
    pool: DbPool,
}

impl PgDatabase {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = init_pool(config)
            .await
            .map_err(|e| NlqError::Database(e.to_string()))?;
        info!(
            max_connections = config.max_connections,
            statement_timeout_ms = config.statement_timeout_ms,
            "Connected to PostgreSQL"
        );
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Wrap a validated statement so each row comes back as one JSON object.
/// The statement is placed on its own lines so a trailing line comment
/// cannot swallow the closing parenthesis.
fn wrap_as_json_rows(sql: &str) -> String {
    format!("SELECT row_to_json(q) FROM (\n{}\n) AS q", sql)
}

#[async_trait]
impl SchemaProvider for PgDatabase {
    async fn fetch_schema(&self) -> Result<SchemaMap> {
        let rows: Vec<(String, String)> = sqlx::query_as(SCHEMA_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| NlqError::Schema(format!("Failed to read information_schema: {}", e)))?;

        let schema = SchemaMap::from_rows(rows);
        info!(tables = schema.len(), "Loaded schema snapshot");
        Ok(schema)
    }
}

#[async_trait]
impl QueryExecutor for PgDatabase {
    async fn fetch_rows(&self, sql: &ValidatedSql) -> Result<Vec<Row>> {
        let wrapped = wrap_as_json_rows(sql.as_str());
        let values: Vec<serde_json::Value> = sqlx::query_scalar(&wrapped)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| NlqError::Database(e.to_string()))?;

        values
            .into_iter()
            .map(|value| match value {
                serde_json::Value::Object(row) => Ok(row),
                other => Err(NlqError::Database(format!("Unexpected row shape: {}", other))),
            })
            .collect()
    }
}
