//! Docweaver CLI entry point
//!
//! Drives a document generation session from the terminal: sections are
//! printed as they are generated and feedback is typed on the prompt line.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::info;
use uuid::Uuid;

use docstore::DocStore;
use docweaver::cli::{Cli, Command};
use docweaver::config::Config;
use docweaver::delivery::ConsoleSink;
use docweaver::feedback::{FeedbackKind, FeedbackPayload};
use docweaver::llm::create_client;
use docweaver::session::{SessionManager, replay_stored};
use docweaver::templates;

fn setup_logging(verbose: bool) -> Result<()> {
    // Write to a log file, not stdout - the terminal belongs to the session
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docweaver")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("docweaver.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Some(Command::Run {
            query,
            template,
            document_id,
        }) => cmd_run(&config, &query, &template, document_id).await,
        Some(Command::Replay { document_id }) => cmd_replay(&config, &document_id).await,
        Some(Command::Templates) => cmd_templates(),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Run an interactive generation session in the terminal
async fn cmd_run(config: &Config, query: &str, template: &str, document_id: Option<String>) -> Result<()> {
    config.validate()?;

    let llm = create_client(&config.llm)?;
    let store = Arc::new(DocStore::open(&config.storage.db_path)?);
    let sink = Arc::new(ConsoleSink::new());
    let manager = SessionManager::new(config.clone(), llm, sink.clone(), Some(store));

    let document_id = document_id.unwrap_or_else(|| format!("doc-{}", Uuid::now_v7()));
    println!("Generating document {} with template '{}'", document_id, template);

    manager.client_connected(&document_id).await;
    let channel = manager.channel();
    let handle = manager.spawn_document(&document_id, query, template);

    let mut editor = DefaultEditor::new()?;
    while !handle.is_finished() {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                manager.client_disconnected(&document_id).await;
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Some(payload) = parse_feedback_line(trimmed) else {
            println!("Expected: continue | edit <html> | regenerate | end");
            continue;
        };

        let Some(section_id) = sink.last_section_id() else {
            println!("No section has been delivered yet");
            continue;
        };

        channel.deliver(&section_id, payload).await;
    }

    let state = handle.await??;
    println!("Generated {} sections for document {}", state.sections.len(), state.document_id);
    Ok(())
}

/// Parse a terminal feedback line
fn parse_feedback_line(line: &str) -> Option<FeedbackPayload> {
    if let Some(rest) = line.strip_prefix("edit ") {
        return Some(FeedbackPayload::edit(rest.trim()));
    }
    match line {
        "continue" | "c" => Some(FeedbackPayload::new(FeedbackKind::Continue)),
        "regenerate" | "r" => Some(FeedbackPayload::new(FeedbackKind::Regenerate)),
        "end" | "q" => Some(FeedbackPayload::new(FeedbackKind::End)),
        _ => None,
    }
}

/// Replay a stored document to the terminal
async fn cmd_replay(config: &Config, document_id: &str) -> Result<()> {
    let store = DocStore::open(&config.storage.db_path)?;

    let Some(doc) = store.document(document_id)? else {
        println!("Unknown document: {}", document_id);
        return Ok(());
    };
    if !doc.content_generated {
        println!("Document {} has not finished generating", document_id);
        return Ok(());
    }

    let sink = ConsoleSink::new();
    let count = replay_stored(&store, &sink, document_id).await?;
    println!("Replayed {} sections", count);
    Ok(())
}

/// List known templates and their sections
fn cmd_templates() -> Result<()> {
    for name in templates::known_templates() {
        println!("{}", name);
        if let Some(sections) = templates::template_sections(name) {
            for section in sections {
                println!("  - {}", section);
            }
        }
    }
    Ok(())
}
