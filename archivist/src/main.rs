//! Campaign archivist command line.
//!
//! Loads a campaign snapshot, wires the Claude client and asks questions.
//! Results are printed to stdout as JSON; logs go to stderr.
//!
//! ```bash
//! cargo run -p archivist -- ask "Who is Thalantyr?"
//! cargo run -p archivist -- --db ./campaign.json health
//! ```

use archivist_core::{
    store_health, Archivist, ArchivistConfig, Embedder, HashingEmbedder, HealthReport,
    HttpEmbedder, MemoryStore, StoreError,
};
use clap::{Parser, Subcommand};
use claude::Claude;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Ask the keeper of the campaign chronicles
#[derive(Parser)]
#[command(name = "archivist")]
#[command(version)]
#[command(about = "Ask questions about a role-playing campaign's history")]
struct Cli {
    /// Campaign snapshot JSON (overrides ARCHIVIST_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Model to use (overrides ARCHIVIST_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question and print the answer with its tool trace
    Ask {
        /// The question, as one or more words
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Report store status and record counts
    Health,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("archivist=info,archivist_core=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match ArchivistConfig::from_env() {
        Ok(config) => config,
        Err(e) => return fail(ExitCode::from(2), e.to_string()),
    };
    if let Some(db) = cli.db {
        config = config.with_db_path(db);
    }
    if let Some(model) = cli.model {
        config = config.with_model(model);
    }

    match cli.command {
        Commands::Ask { question } => ask(config, &question.join(" ")).await,
        Commands::Health => health(config).await,
    }
}

/// Why the archivist could not start.
#[derive(Debug)]
enum StartupError {
    /// Missing credentials, bad settings or an unreadable snapshot.
    Config(String),
    /// The store or its embedding service could not be reached.
    Store(String),
}

impl StartupError {
    fn exit_status(&self) -> u8 {
        match self {
            StartupError::Config(_) => 2,
            StartupError::Store(_) => 1,
        }
    }

    fn into_message(self) -> String {
        match self {
            StartupError::Config(message) | StartupError::Store(message) => message,
        }
    }
}

async fn ask(config: ArchivistConfig, question: &str) -> ExitCode {
    let archivist = match build(config).await {
        Ok(archivist) => archivist,
        Err(e) => {
            let code = ExitCode::from(e.exit_status());
            return fail(code, e.into_message());
        }
    };

    match archivist.ask(question).await {
        Ok(answer) => print_json(&answer),
        Err(e) if e.is_client_error() => fail(ExitCode::from(2), e.to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Question failed");
            fail(ExitCode::FAILURE, e.to_string())
        }
    }
}

async fn health(config: ArchivistConfig) -> ExitCode {
    print_json(&health_report(&config).await)
}

/// Health needs only the store; no API key is read.
async fn health_report(config: &ArchivistConfig) -> HealthReport {
    match open_store(config).await {
        Ok(store) => store_health(&store).await,
        Err(e) => HealthReport::error(e.into_message()),
    }
}

async fn build(config: ArchivistConfig) -> Result<Archivist, StartupError> {
    let mut client = Claude::from_env().map_err(|e| {
        StartupError::Config(format!(
            "{e}. Set ANTHROPIC_API_KEY in .env or with: export ANTHROPIC_API_KEY=your_key_here"
        ))
    })?;
    if let Some(ref model) = config.model {
        client = client.with_model(model);
    }
    if let Some(ref base_url) = config.api_base_url {
        client = client.with_base_url(base_url);
    }

    let store = open_store(&config).await?;

    Archivist::new(config, Arc::new(client), Arc::new(store))
        .await
        .map_err(|e| StartupError::Store(e.to_string()))
}

async fn open_store(config: &ArchivistConfig) -> Result<MemoryStore, StartupError> {
    let embedder = embedder(config).map_err(|e| StartupError::Config(e.to_string()))?;
    MemoryStore::open(&config.db_path, embedder)
        .await
        .map_err(|e| {
            let message = format!("Cannot load {}: {e}", config.db_path.display());
            match e {
                StoreError::Embedding(_) | StoreError::Unavailable(_) => {
                    StartupError::Store(message)
                }
                _ => StartupError::Config(message),
            }
        })
}

fn embedder(config: &ArchivistConfig) -> Result<Arc<dyn Embedder>, StoreError> {
    match config.embedding_url {
        Some(ref url) => {
            tracing::info!(url = %url, model = %config.embedding_model, "Using remote embeddings");
            Ok(Arc::new(HttpEmbedder::new(
                url.clone(),
                config.embedding_model.clone(),
                config.embedding_api_key.clone(),
            )?))
        }
        None => Ok(Arc::new(HashingEmbedder::new())),
    }
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn fail(code: ExitCode, message: String) -> ExitCode {
    let body = ErrorBody { error: message };
    match serde_json::to_string_pretty(&body) {
        Ok(json) => println!("{json}"),
        Err(_) => eprintln!("Error: {}", body.error),
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_core::HealthStatus;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "events": [
            {
                "id": "s1-e0",
                "document": "The party leaves Candlekeep.",
                "metadata": {"session": 1, "order": 0, "event_type": "departure", "entities": "Imoen"}
            }
        ],
        "entities": [
            {
                "id": "Imoen",
                "document": "A cheerful thief.",
                "metadata": {"type": "character", "status": "alive", "first_session": 1, "last_session": 1}
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_health_reads_store_without_client() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();
        let config = ArchivistConfig::default().with_db_path(file.path());

        let report = health_report(&config).await;
        assert_eq!(report.status, HealthStatus::Online);
        let stats = report.stats.unwrap();
        assert_eq!(stats.events_count, 1);
        assert_eq!(stats.entities_count, 1);
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_config_error() {
        let config = ArchivistConfig::default().with_db_path("/nonexistent/campaign.json");

        let err = open_store(&config).await.err().unwrap();
        assert!(matches!(err, StartupError::Config(_)));
        assert_eq!(err.exit_status(), 2);

        let report = health_report(&config).await;
        assert_eq!(report.status, HealthStatus::Error);
        assert!(report.detail.unwrap().starts_with("Cannot load /nonexistent/campaign.json"));
    }

    #[test]
    fn test_store_failure_is_server_error() {
        assert_eq!(StartupError::Store("down".to_string()).exit_status(), 1);
        assert_eq!(StartupError::Config("no key".to_string()).exit_status(), 2);
    }
}
