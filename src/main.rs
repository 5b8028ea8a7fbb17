use anyhow::Result;
use clap::{Parser, Subcommand};
use nlq_gate::config::AppConfig;
use nlq_gate::db::PgDatabase;
use nlq_gate::execution::ExecutionGate;
use nlq_gate::llm::LlmClient;
use nlq_gate::normalizer::{Normalizer, NormalizerConfig};
use nlq_gate::pipeline::QueryPipeline;
use nlq_gate::prompt::build_prompt;
use nlq_gate::schema::{SchemaMap, SchemaProvider};
use nlq_gate::validator::validate;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "nlq-gate")]
#[command(about = "Natural-language to SQL with a read-only safety gate")]
struct Args {
    /// JSON file replacing the built-in normalizer tables
    #[arg(long, global = true)]
    normalizer_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the normalized form of a query
    Normalize { text: String },
    /// Check a SQL statement against the read-only rules
    Validate { sql: String },
    /// Print the prompt that would be sent to the LLM
    Prompt {
        text: String,
        /// Schema as a JSON object of table -> columns (default: live database)
        #[arg(long)]
        schema_file: Option<PathBuf>,
    },
    /// Run the full pipeline against the database
    Ask { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    nlq_gate::init_logging();

    let args = Args::parse();
    let normalizer_path = args
        .normalizer_config
        .or_else(|| std::env::var("NORMALIZER_CONFIG").ok().map(PathBuf::from));
    let normalizer = load_normalizer(normalizer_path.as_ref())?;

    match args.command {
        Command::Normalize { text } => {
            println!("{}", normalizer.normalize(&text));
        }
        Command::Validate { sql } => {
            let verdict = validate(&sql);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            if !verdict.accepted {
                std::process::exit(1);
            }
        }
        Command::Prompt { text, schema_file } => {
            let schema = match schema_file {
                Some(path) => SchemaMap::from_json_file(&path)?,
                None => {
                    let config = AppConfig::from_env()?;
                    PgDatabase::connect(&config.database).await?.fetch_schema().await?
                }
            };
            println!("{}", build_prompt(&schema, &normalizer.normalize(&text)));
        }
        Command::Ask { text } => {
            let config = AppConfig::from_env()?;
            let database = Arc::new(PgDatabase::connect(&config.database).await?);
            let schema = Arc::new(database.fetch_schema().await?);
            info!(tables = schema.len(), "Schema loaded");

            let generator = Arc::new(LlmClient::from_config(&config.llm)?);
            let gate = ExecutionGate::with_row_limit(database, config.row_limit);
            let pipeline = QueryPipeline::new(Arc::new(normalizer), schema, generator, gate);

            let body = match pipeline.run(&text).await {
                Ok(outcome) => outcome.to_json(),
                Err(failure) => failure.to_json(),
            };
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

fn load_normalizer(path: Option<&PathBuf>) -> Result<Normalizer> {
    let config = match path {
        Some(path) => NormalizerConfig::from_file(path)?,
        None => NormalizerConfig::default(),
    };
    Ok(Normalizer::new(config)?)
}
