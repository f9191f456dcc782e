use thiserror::Error;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Protobuf parsing error: {0}")]
    ProtobufError(#[from] prost::DecodeError),

    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] serde_json::Error),

    #[error("Failed to load graph from {0}: {1}")]
    ModelLoadError(PathBuf, String),

    #[error("Failed to import node {node}: {reason}")]
    Import { node: String, reason: String },

    #[error("Node {node} is missing its {position} operand (input reference {input:?})")]
    MissingOperand {
        node: String,
        position: &'static str,
        input: String,
    },

    #[error("Sequence from {start} to {stop} with step {step} never terminates")]
    NonTerminatingSequence { start: f64, stop: f64, step: f64 },

    #[error("Sequence from {start} to {stop} with step {step} exceeds {limit} elements")]
    SequenceTooLong {
        start: f64,
        stop: f64,
        step: f64,
        limit: usize,
    },

    #[error("Operator {0} has more than one populated argument source")]
    InconsistentArgumentSources(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),
}

impl Error {
    /// True for errors caused by structurally invalid foreign graph input
    pub fn is_import_error(&self) -> bool {
        matches!(self, Error::Import { .. } | Error::MissingOperand { .. })
    }

    pub(crate) fn import(node: &str, reason: impl Into<String>) -> Self {
        Error::Import {
            node: node.to_string(),
            reason: reason.into(),
        }
    }
}
