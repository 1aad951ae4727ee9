//! Error types shared across the pipeline, replay loop, and cluster seams.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// A single station record that could not be turned into an observation.
///
/// Reader callers drop the record and keep going; one bad line never aborts
/// a load.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormatError {
    #[error("line {line}: expected at least {expected} fields, found {found}")]
    MissingField {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid timestamp `{value}` (expected YYYYMMDDHHMM)")]
    Timestamp { line: usize, value: String },

    #[error("line {line}: invalid numeric field `{value}`")]
    Numeric { line: usize, value: String },
}

/// A metadata patch against one resource failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PublishError {
    #[error("resource not found: {0}")]
    UnknownResource(String),

    #[error("patch rejected for {resource}: {reason}")]
    Rejected { resource: String, reason: String },

    #[error("annotation sink write failed: {0}")]
    Sink(String),
}

/// The optional consumption source could not be queried for this tick.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("consumption query failed: {0}")]
pub struct ExogenousQueryError(pub String);

/// Listing or reading resources from the cluster failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClusterError {
    #[error("cluster unreachable: {0}")]
    Unreachable(String),

    #[error("invalid resource filter `{0}` (expected key=value)")]
    InvalidFilter(String),

    #[error("unknown resource `{0}`")]
    UnknownResource(String),
}

/// Startup-level failures. All of these are fatal before the replay loop runs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read station file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {}", join_config_errors(.0))]
    Config(Vec<ConfigError>),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("prepared series is empty for window {start}..={end}")]
    EmptySeries { start: String, end: String },

    #[error("no resources to annotate")]
    NoResources,
}

fn join_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;
