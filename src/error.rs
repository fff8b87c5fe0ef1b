use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors. Per-machine failures never surface here; they are recorded
/// in the operation outcome instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("The configuration path {path} does not exist or is not readable: {source}")]
    ExplicitConfigMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read configuration file at {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Configuration at {path} could not be parsed: {source}")]
    ParseYamlConfig {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Configuration at {path} could not be parsed: {source}")]
    ParseTomlConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid value for `{key}`: {message}")]
    InvalidOption { key: &'static str, message: String },
    #[error("Error in reading VM file {path}: {source}")]
    ReadVmFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to get the list of machines from `{command}`: {output}")]
    DiscoveryFailed { command: String, output: String },
    #[error("Failed to open log file {path}: {source}")]
    OpenLogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
