use clap::{Parser, Subcommand};
use rag_chat::Result;
use rag_chat::commands::{ask_once, run_chat};
use rag_chat::config::{Config, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rag-chat")]
#[command(about = "Chat with your documents using retrieval-augmented generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the Cohere connection, chunking and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Process documents and start an interactive chat about them
    Chat {
        /// PDF or text files to process
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Cohere API key; falls back to COHERE_API_KEY, then the config file
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Process documents and answer a single question
    Ask {
        /// PDF or text files to process
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Question to answer from the documents
        #[arg(long, short)]
        question: String,
        /// Cohere API key; falls back to COHERE_API_KEY, then the config file
        #[arg(long)]
        api_key: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Chat { files, api_key } => {
            run_chat(&Config::load_default()?, &files, api_key.as_deref())?;
        }
        Commands::Ask {
            files,
            question,
            api_key,
        } => {
            ask_once(
                &Config::load_default()?,
                &files,
                api_key.as_deref(),
                &question,
            )?;
        }
    }

    Ok(())
}
