use keel_core::ConfigError;
use keel_vault::VaultError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
