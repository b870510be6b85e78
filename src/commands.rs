use anyhow::Context;
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::cohere::CohereClient;
use crate::config::{Config, ConfigError};
use crate::ingest::load_documents;
use crate::session::{ProcessReport, Session};
use crate::{RagError, Result};

/// Session wired to the hosted Cohere service for both embeddings and answers
pub type CohereSession = Session<CohereClient, CohereClient>;

/// One line typed into the chat loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Exit,
    History,
    Question(String),
}

impl ChatInput {
    #[inline]
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" | "/exit" | "/quit" => Self::Exit,
            "/history" => Self::History,
            question => Self::Question(question.to_string()),
        }
    }
}

/// Validate inputs and build a session; nothing is loaded or sent yet
#[inline]
pub fn prepare_session(
    config: &Config,
    paths: &[PathBuf],
    api_key: Option<&str>,
) -> Result<CohereSession> {
    let api_key = config
        .resolve_api_key(api_key)
        .ok_or(ConfigError::MissingApiKey)?;

    if paths.is_empty() {
        return Err(ConfigError::NoDocuments.into());
    }

    config.validate()?;

    let client =
        CohereClient::new(&config.cohere, api_key).context("Failed to create Cohere client")?;
    let session = Session::from_config(client.clone(), client, config)?;

    Ok(session)
}

/// Load `paths` and index them into `session`, showing a spinner meanwhile
#[inline]
pub fn process_documents(session: &mut CohereSession, paths: &[PathBuf]) -> Result<ProcessReport> {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.enable_steady_tick(Duration::from_millis(120));

    bar.set_message(format!("Reading {} files", paths.len()));
    let documents = load_documents(paths);
    if documents.is_empty() {
        bar.finish_and_clear();
        return Err(RagError::Ingest(
            "None of the provided files could be read".to_string(),
        ));
    }

    let skipped_pages: usize = documents.iter().map(|d| d.skipped_pages).sum();
    if skipped_pages > 0 {
        warn!("{} PDF pages could not be extracted", skipped_pages);
    }

    let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();

    bar.set_message("Processing documents");
    let result = session.process(&texts);
    bar.finish_and_clear();

    let report = result?;
    info!(
        "Indexed {} of {} segments from {} documents ({} dimensions)",
        report.embedded, report.segments, report.documents, report.dimension
    );

    Ok(report)
}

/// Process `paths` then answer questions until the user leaves
#[inline]
pub fn run_chat(config: &Config, paths: &[PathBuf], api_key: Option<&str>) -> Result<()> {
    let mut session = prepare_session(config, paths, api_key)?;
    let report = process_documents(&mut session, paths)?;
    print_report(&report);

    eprintln!(
        "{}",
        style("Ask a question, /history for the transcript, /exit or an empty line to quit.")
            .dim()
    );

    loop {
        let line: String = Input::new()
            .with_prompt(style("you").bold().green().to_string())
            .allow_empty(true)
            .interact_text()
            .context("Failed to read question")?;

        match ChatInput::parse(&line) {
            ChatInput::Exit => break,
            ChatInput::History => print_history(&session),
            ChatInput::Question(question) => match session.ask(&question) {
                Ok(answer) => {
                    println!("{} {}", style("assistant:").bold().cyan(), answer);
                }
                Err(e) => {
                    // The conversation survives a failed turn
                    eprintln!("{} {}", style("Error:").bold().red(), e);
                }
            },
        }
    }

    Ok(())
}

/// Process `paths` and answer a single question
#[inline]
pub fn ask_once(
    config: &Config,
    paths: &[PathBuf],
    api_key: Option<&str>,
    question: &str,
) -> Result<String> {
    let mut session = prepare_session(config, paths, api_key)?;
    let report = process_documents(&mut session, paths)?;
    print_report(&report);

    let answer = session.ask(question)?;
    println!("{}", answer);

    Ok(answer)
}

fn print_report(report: &ProcessReport) {
    eprintln!(
        "{} {} documents, {} segments indexed",
        style("✓").green(),
        report.documents,
        report.embedded
    );
    if report.skipped() > 0 {
        eprintln!(
            "{}",
            style(format!(
                "⚠ {} segments could not be embedded and are not searchable",
                report.skipped()
            ))
            .yellow()
        );
    }
}

fn print_history(session: &CohereSession) {
    if session.history().is_empty() {
        eprintln!("{}", style("No messages yet.").dim());
        return;
    }

    for (role, message) in session.transcript() {
        println!("{} {}", style(format!("{role}:")).bold(), message);
    }
}
