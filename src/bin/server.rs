//! HTTP server for natural-language queries
//! Raw tokio TCP server; schema is read once at startup.

use nlq_gate::api::{handle_raw_request, read_request, HttpResponse};
use nlq_gate::config::AppConfig;
use nlq_gate::db::PgDatabase;
use nlq_gate::execution::ExecutionGate;
use nlq_gate::llm::LlmClient;
use nlq_gate::normalizer::{Normalizer, NormalizerConfig};
use nlq_gate::pipeline::QueryPipeline;
use nlq_gate::schema::SchemaProvider;
use serde_json::json;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    nlq_gate::init_logging();

    info!("Starting NLQ gate server...");

    let normalizer_config = match &config.normalizer_config {
        Some(path) => {
            info!(path = %path.display(), "Loading normalizer tables");
            NormalizerConfig::from_file(path)?
        }
        None => NormalizerConfig::default(),
    };
    let normalizer = Arc::new(Normalizer::new(normalizer_config)?);

    let database = Arc::new(PgDatabase::connect(&config.database).await?);
    let schema = Arc::new(database.fetch_schema().await?);
    if schema.is_empty() {
        warn!("Schema snapshot is empty; generated SQL will have nothing to reference");
    }

    let generator = Arc::new(LlmClient::from_config(&config.llm)?);
    info!(model = %generator.model(), "LLM client ready");

    let gate = ExecutionGate::with_row_limit(database.clone(), config.row_limit);
    let pipeline = Arc::new(QueryPipeline::new(normalizer, schema, generator, gate));

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    info!(%address, "Server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &pipeline).await {
                error!(%peer, error = %e, "Connection failed");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, pipeline: &QueryPipeline) -> std::io::Result<()> {
    let response = match read_request(&mut stream).await {
        Ok(raw) => handle_raw_request(pipeline, &raw).await,
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            HttpResponse::new(413, json!({"error": "request_too_large"}))
        }
        Err(e) => return Err(e),
    };

    stream.write_all(response.to_http().as_bytes()).await?;
    stream.flush().await
}
