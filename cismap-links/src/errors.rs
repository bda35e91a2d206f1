use thiserror::Error;

use cismap_core::CisMapError;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error(transparent)]
    Core(#[from] CisMapError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Failed to parse pipeline config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid pipeline config: {0}")]
    InvalidConfig(String),
}

pub type LinkResult<T> = std::result::Result<T, LinkError>;
