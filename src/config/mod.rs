// Configuration management module
// TOML settings for the Cohere connection, chunking and retrieval

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    API_KEY_ENV, CONFIG_DIR_ENV, CohereConfig, Config, ConfigError, RetrievalConfig,
};
