use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "API token not found. Set it with one of:\n\
        - --api-token\n\
        - HCLOUD_TOKEN environment variable\n\
        - api_token in ~/.config/converge/config.yaml"
    )]
    MissingToken,

    #[error("Config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
