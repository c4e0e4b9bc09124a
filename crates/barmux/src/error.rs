use std::{path::PathBuf, time::Duration};

/// A line of input that could not be understood. Logged and skipped.
pub use bar_protocol::ParseError as InputError;

/// Problems with the configuration. These abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is a directory, please provide the path to the configuration file", .0.display())]
    IsDirectory(PathBuf),
    #[error("Failed to parse configuration file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unknown probe kind `{kind}` (used by probe `{id}`)")]
    UnknownProbe { id: String, kind: String },
    #[error("Probe identifier `{0}` is used more than once")]
    DuplicateProbe(String),
    #[error("Missing required option `{option}` for probe `{id}`")]
    MissingOption { id: String, option: String },
    #[error("Invalid value for option `{option}` of probe `{id}`: {message}")]
    InvalidOption { id: String, option: String, message: String },
    #[error("Invalid color `{0}`, expected `#RRGGBB`")]
    InvalidColor(String),
    #[error("Invalid value for `general.{setting}`: {message}")]
    InvalidSetting { setting: &'static str, message: String },
}

/// Failure of a single probe run or click handler. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("{0}")]
    Failed(String),
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

impl ProbeError {
    /// Short name of the kind of failure, shown on the bar.
    pub fn class(&self) -> &'static str {
        match self {
            ProbeError::Failed(_) => "error",
            ProbeError::Panicked(_) => "panic",
            ProbeError::TimedOut(_) => "timeout",
        }
    }
}

impl From<anyhow::Error> for ProbeError {
    fn from(err: anyhow::Error) -> Self {
        ProbeError::Failed(format!("{:#}", err))
    }
}

/// Writing to the bar failed. The stream can not be recovered from this.
#[derive(Debug, thiserror::Error)]
#[error("Failed to write to the bar")]
pub struct OutputError(#[from] pub std::io::Error);
