// src/errors.rs

//! Crate-wide error taxonomy and `Result` alias.

#[derive(Debug)]
pub enum DagrunError {
    Config(String),

    DuplicateNode(String),

    UnknownNode(String),

    Cycle { source: String, target: String },

    InvalidState(String),

    Dispatch { node: String, reason: String },

    ExecutorUnavailable(String),

    Deadlock(Vec<String>),

    RunTimeout(std::time::Duration),

    Io(std::io::Error),

    Toml(toml::de::Error),

    Other(anyhow::Error),
}

impl std::fmt::Display for DagrunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DagrunError::Config(msg) => write!(f, "Configuration error: {msg}"),
            DagrunError::DuplicateNode(name) => write!(f, "duplicate node '{name}' in graph"),
            DagrunError::UnknownNode(name) => write!(f, "unknown node '{name}'"),
            DagrunError::Cycle { source, target } => {
                write!(f, "edge '{source}' -> '{target}' would create a cycle")
            }
            DagrunError::InvalidState(msg) => write!(f, "invalid state transition: {msg}"),
            DagrunError::Dispatch { node, reason } => {
                write!(f, "dispatch failed for node '{node}': {reason}")
            }
            DagrunError::ExecutorUnavailable(msg) => write!(f, "executor unavailable: {msg}"),
            DagrunError::Deadlock(stuck) => write!(
                f,
                "no runnable work but graph is incomplete; stuck nodes: {stuck:?}"
            ),
            DagrunError::RunTimeout(dur) => write!(f, "run exceeded timeout of {dur:?}"),
            DagrunError::Io(err) => write!(f, "IO error: {err}"),
            DagrunError::Toml(err) => write!(f, "TOML parsing error: {err}"),
            DagrunError::Other(err) => std::fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for DagrunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DagrunError::Io(err) => Some(err),
            DagrunError::Toml(err) => Some(err),
            DagrunError::Other(err) => err.source(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DagrunError {
    fn from(err: std::io::Error) -> Self {
        DagrunError::Io(err)
    }
}

impl From<toml::de::Error> for DagrunError {
    fn from(err: toml::de::Error) -> Self {
        DagrunError::Toml(err)
    }
}

impl From<anyhow::Error> for DagrunError {
    fn from(err: anyhow::Error) -> Self {
        DagrunError::Other(err)
    }
}

impl DagrunError {
    /// Whether a scheduling-time error is fatal to the whole run.
    ///
    /// Everything except executor unavailability is localized to the
    /// affected node and handled by the retry/propagation machinery.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DagrunError::ExecutorUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, DagrunError>;
