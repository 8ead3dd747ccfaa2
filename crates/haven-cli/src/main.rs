//! Haven CLI — the main entry point.
//!
//! Commands:
//! - `chat`  — Interactive counseling chat (or a single message)
//! - `diary` — Turn a session's transcript into a diary entry
//!
//! This binary is the composition root: every collaborator is built here
//! and passed in explicitly. There are no process-wide singletons.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use haven_agent::ChatOrchestrator;
use haven_config::AppConfig;
use haven_core::retrieval::Retriever;
use haven_core::session::SessionStore;
use haven_core::Provider;
use haven_memory::{InMemorySessionStore, KeywordRetriever, SqliteSessionStore};
use haven_providers::OpenAiCompatProvider;

#[derive(Parser)]
#[command(
    name = "haven",
    about = "Haven — a CBT companion agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "haven.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the counselor
    Chat {
        /// Session ID (created on first use)
        #[arg(short, long)]
        session: String,

        /// User ID that owns the session
        #[arg(short, long)]
        user: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// JSONL file of past diary entries to seed the diary retriever
        #[arg(long)]
        diary_file: Option<PathBuf>,

        /// Text file (blank-line separated) to seed the knowledge retriever
        #[arg(long)]
        knowledge_file: Option<PathBuf>,
    },

    /// Generate a diary entry from a session's transcript
    Diary {
        /// Session ID
        #[arg(short, long)]
        session: String,
    },
}

/// One diary entry line in a `--diary-file`.
#[derive(Deserialize)]
struct DiaryLine {
    content: String,
    #[serde(default)]
    created_at: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Chat {
            session,
            user,
            message,
            diary_file,
            knowledge_file,
        } => run_chat(&config, &session, &user, message, diary_file, knowledge_file).await,
        Commands::Diary { session } => run_diary(&config, &session).await,
    }
}

async fn run_chat(
    config: &AppConfig,
    session_id: &str,
    user_id: &str,
    message: Option<String>,
    diary_file: Option<PathBuf>,
    knowledge_file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = build_store(config).await?;
    if !store.exists(session_id).await? {
        store.create(session_id, user_id).await?;
        info!(session_id, user_id, "Created session");
    }

    let diary_retriever = load_diary_retriever(user_id, diary_file.as_deref()).await?;
    let mut orchestrator = ChatOrchestrator::new(
        store,
        build_provider(config)?,
        diary_retriever,
        &config.provider.model,
    )
    .with_temperature(config.provider.temperature)
    .with_buffer_token_limit(config.memory.buffer_token_limit)
    .with_diary_top_k(config.retrieval.diary_top_k)
    .with_knowledge_top_k(config.retrieval.knowledge_top_k);

    if let Some(path) = knowledge_file.as_deref() {
        orchestrator =
            orchestrator.with_knowledge_retriever(load_knowledge_retriever(path).await?);
    }

    if let Some(message) = message {
        respond(&orchestrator, session_id, &message).await?;
        return Ok(());
    }

    println!("Chatting as {user_id} in session {session_id}. Type 'exit' to quit.");
    let stdin = std::io::stdin();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        respond(&orchestrator, session_id, line).await?;
    }
    Ok(())
}

async fn respond(
    orchestrator: &ChatOrchestrator,
    session_id: &str,
    message: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = orchestrator.process(session_id, message).await?;
    println!("haven> {}", outcome.answer);
    if let Some(dates) = outcome.diary_reference_dates {
        println!("       (recalled diary entries from: {})", dates.join(", "));
    }
    Ok(())
}

async fn run_diary(
    config: &AppConfig,
    session_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = build_store(config).await?;
    let orchestrator = ChatOrchestrator::new(
        store,
        build_provider(config)?,
        Arc::new(KeywordRetriever::new("diary")),
        &config.provider.model,
    );

    let result = orchestrator.generate_diary(session_id).await?;
    println!("{}", result.diary_text);
    if !result.alternative_perspective.is_empty() {
        println!("\nAnother way to see it: {}", result.alternative_perspective);
    }
    if let Some(diagnostic) = result.diagnostic {
        info!(diagnostic = %diagnostic, "Diary generation degraded");
    }
    Ok(())
}

async fn build_store(
    config: &AppConfig,
) -> Result<Arc<dyn SessionStore>, Box<dyn std::error::Error>> {
    match config.memory.backend.as_str() {
        "sqlite" => {
            let path = if config.memory.path.starts_with("sqlite:") {
                config.memory.path.clone()
            } else {
                format!("sqlite://{}", config.memory.path)
            };
            Ok(Arc::new(SqliteSessionStore::new(&path).await?))
        }
        _ => Ok(Arc::new(InMemorySessionStore::new())),
    }
}

fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, Box<dyn std::error::Error>> {
    let p = &config.provider;
    let provider = match p.name.as_str() {
        "ollama" => OpenAiCompatProvider::ollama(p.api_url.as_deref()),
        name => {
            let api_key = p
                .api_key
                .clone()
                .ok_or_else(|| format!("{name} requires an API key (set HAVEN_API_KEY)"))?;
            match (name, &p.api_url) {
                (_, Some(url)) => OpenAiCompatProvider::new(name, url.as_str(), api_key),
                ("openrouter", None) => OpenAiCompatProvider::openrouter(api_key),
                _ => OpenAiCompatProvider::openai(api_key),
            }
        }
    };
    Ok(Arc::new(provider))
}

/// Seed the diary retriever from a JSONL file of past entries, owned by
/// the chatting user.
async fn load_diary_retriever(
    user_id: &str,
    path: Option<&std::path::Path>,
) -> Result<Arc<dyn Retriever>, Box<dyn std::error::Error>> {
    let retriever = KeywordRetriever::new("diary");
    if let Some(path) = path {
        let raw = std::fs::read_to_string(path)?;
        let mut count = 0usize;
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            let entry: DiaryLine = serde_json::from_str(line)?;
            let mut metadata = serde_json::Map::new();
            if let Some(date) = entry.created_at {
                metadata.insert("created_at".into(), serde_json::json!(date));
            }
            retriever.add(Some(user_id), entry.content, metadata).await;
            count += 1;
        }
        info!(count, "Loaded diary entries from {}", path.display());
    }
    Ok(Arc::new(retriever))
}

/// Seed the knowledge retriever from a blank-line-separated text file.
async fn load_knowledge_retriever(
    path: &std::path::Path,
) -> Result<Arc<dyn Retriever>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let retriever = KeywordRetriever::new("knowledge");
    let mut count = 0usize;
    for block in raw.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
        retriever.add(None, block, serde_json::Map::new()).await;
        count += 1;
    }
    info!(count, "Loaded knowledge blocks from {}", path.display());
    Ok(Arc::new(retriever))
}
