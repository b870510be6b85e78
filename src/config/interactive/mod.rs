
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password};

use super::{CohereConfig, Config, ConfigError, RetrievalConfig};
use crate::cohere::CohereClient;
use crate::embeddings::ChunkingConfig;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 RAG Chat Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Cohere Configuration").bold().yellow());
    eprintln!("Configure the hosted service used for embeddings and answers.");
    eprintln!();

    configure_cohere(&mut config.cohere)?;

    eprintln!();
    eprintln!("{}", style("Document Processing").bold().yellow());
    configure_chunking(&mut config.chunking)?;
    configure_retrieval(&mut config.retrieval)?;

    eprintln!();
    match config.resolve_api_key(None) {
        Some(api_key) => {
            eprintln!("{}", style("Testing configuration...").yellow());
            if test_cohere_connection(&config.cohere, &api_key) {
                eprintln!("{}", style("✓ Cohere connection successful!").green());
            } else {
                eprintln!(
                    "{}",
                    style("⚠ Warning: Could not reach Cohere with these settings").yellow()
                );
                eprintln!("You can continue, but check the key and model names before chatting.");
            }
        }
        None => {
            eprintln!(
                "{}",
                style("No API key available, skipping connection test.").dim()
            );
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Cohere Settings:").bold().yellow());
    match config.cohere_url() {
        Ok(url) => eprintln!("  Base URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Base URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Embedding Model: {}", style(&config.cohere.embed_model).cyan());
    eprintln!("  Chat Model: {}", style(&config.cohere.chat_model).cyan());
    eprintln!("  Batch Size: {}", style(config.cohere.batch_size).cyan());
    eprintln!(
        "  Timeout: {}s, {} attempts",
        style(config.cohere.timeout_seconds).cyan(),
        style(config.cohere.retry_attempts).cyan()
    );
    eprintln!("  API Key: {}", describe_api_key(&config));

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!("  Overlap: {}", style(config.chunking.overlap).cyan());

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  History Window: {}",
        style(
            config
                .retrieval
                .history_window
                .map_or_else(|| "all turns".to_string(), |n| format!("{n} turns"))
        )
        .cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn describe_api_key(config: &Config) -> String {
    if std::env::var(super::API_KEY_ENV).is_ok_and(|key| !key.trim().is_empty()) {
        style(format!("set via {}", super::API_KEY_ENV))
            .green()
            .to_string()
    } else if config.cohere.api_key.is_some() {
        style("stored in config file").green().to_string()
    } else {
        style("not set").red().to_string()
    }
}

fn load_existing_config() -> Result<Config> {
    let config_dir = Config::config_dir().context("Failed to locate configuration directory")?;

    if !config_dir.join("config.toml").exists() {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
    }

    Config::load(&config_dir).or_else(|e| {
        eprintln!(
            "{}",
            style(format!("Existing configuration is invalid ({e:#}). Using defaults.")).yellow()
        );
        Ok(Config {
            base_dir: config_dir,
            ..Config::default()
        })
    })
}

fn configure_cohere(cohere: &mut CohereConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Cohere base URL")
        .default(cohere.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = CohereConfig {
                base_url: input.clone(),
                ..CohereConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let embed_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(cohere.embed_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(cohere.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Texts per embedding request")
        .default(cohere.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 || *input > 96 {
                Err("Batch size must be between 1 and 96")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let timeout_seconds: u64 = Input::new()
        .with_prompt("Request timeout in seconds")
        .default(cohere.timeout_seconds)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=600).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 600 seconds")
            }
        })
        .interact_text()?;

    let retry_attempts: u32 = Input::new()
        .with_prompt("Attempts per request")
        .default(cohere.retry_attempts)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (1..=10).contains(input) {
                Ok(())
            } else {
                Err("Attempts must be between 1 and 10")
            }
        })
        .interact_text()?;

    let store_key = Confirm::new()
        .with_prompt("Store an API key in the config file?")
        .default(cohere.api_key.is_some())
        .interact()?;

    cohere.set_base_url(base_url)?;
    cohere.set_embed_model(embed_model)?;
    cohere.set_chat_model(chat_model)?;
    cohere.set_batch_size(batch_size)?;
    cohere.set_timeout_seconds(timeout_seconds)?;
    cohere.set_retry_attempts(retry_attempts)?;

    if store_key {
        let api_key = Password::new()
            .with_prompt("Cohere API key (leave empty to keep the current one)")
            .allow_empty_password(true)
            .interact()?;
        if !api_key.trim().is_empty() {
            cohere.set_api_key(Some(api_key));
        }
    } else {
        cohere.set_api_key(None);
    }

    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Segment size in characters")
        .default(chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Segment size must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let overlap: usize = Input::new()
        .with_prompt("Overlap between segments")
        .default(chunking.overlap.min(chunk_size - 1))
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            ChunkingConfig {
                chunk_size,
                overlap: *input,
            }
            .validate()
        })
        .interact_text()?;

    *chunking = ChunkingConfig {
        chunk_size,
        overlap,
    };

    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalConfig) -> Result<()> {
    let top_k: usize = Input::new()
        .with_prompt("Segments retrieved per question")
        .default(retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("At least one segment must be retrieved")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    // 0 means replay the whole conversation
    let window: usize = Input::new()
        .with_prompt("Dialogue turns replayed to the model (0 = all)")
        .default(retrieval.history_window.unwrap_or(0))
        .interact_text()?;

    retrieval.top_k = top_k;
    retrieval.history_window = (window > 0).then_some(window);
    retrieval.validate()?;

    Ok(())
}

#[allow(clippy::ptr_arg, reason = "dialoguer validators receive &String")]
fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

fn test_cohere_connection(cohere: &CohereConfig, api_key: &str) -> bool {
    let client = match CohereClient::new(cohere, api_key) {
        Ok(client) => client
            .with_timeout(std::time::Duration::from_secs(10))
            .with_retry_attempts(1),
        Err(_) => return false,
    };

    client.health_check().is_ok()
}
