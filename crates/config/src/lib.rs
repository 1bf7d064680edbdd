//! Configuration management for the knowledge agent
//!
//! Supports loading configuration from:
//! - TOML files
//! - Environment variables (KNOWLEDGE_AGENT_ prefix)
//! - Runtime hot reload via [`ConfigHandle`] (atomic pointer swap; an
//!   in-flight query never observes a partially-updated settings struct)

pub mod constants;
pub mod handle;
pub mod settings;

pub use handle::ConfigHandle;
pub use settings::{
    load_settings, AgentSettings, FusionMode, GenerationSettings, PipelineSettings,
    RetrievalSettings, RouterSettings, Settings, StrategyConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
