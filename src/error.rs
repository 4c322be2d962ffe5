//! Error types for the defensx-node crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while compiling the OpenAPI document into the operation table.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    #[error("OpenAPI spec not found. Expected one of:\n{}", format_candidates(.candidates))]
    SpecNotFound { candidates: Vec<PathBuf> },

    #[error("failed to read OpenAPI spec: {path}")]
    SpecRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse OpenAPI spec as YAML: {path}")]
    SpecParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("OpenAPI spec is missing required \"paths\" object")]
    MissingPaths,

    #[error("failed to serialize generated operations")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write generated operations: {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_candidates(candidates: &[PathBuf]) -> String {
    candidates
        .iter()
        .map(|p| format!("- {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The embedded operation table could not be decoded.
#[derive(Debug, Error)]
#[error("embedded operation catalog is malformed")]
pub struct CatalogError(#[source] pub serde_json::Error);

/// Failures of the authenticated HTTP call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] reqwest::Error),

    #[error("failed to read response body: {0}")]
    ResponseRead(#[source] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpError {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// The single reported error kind of a node execution.
///
/// Every variant is fatal for the remaining input records and is never retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NodeError {
    #[error("Missing API Root in credentials.")]
    MissingApiRoot,

    #[error("Please select an operation.")]
    OperationNotSelected,

    #[error("Unknown operation: {id}")]
    UnknownOperation { id: String },

    #[error("Unsupported HTTP method: {method}")]
    UnsupportedMethod { method: String },

    #[error("{context}: {source}")]
    InvalidJson {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid number for {field}")]
    InvalidNumber { field: String },

    #[error("Invalid boolean for {field}")]
    InvalidBoolean { field: String },

    #[error("DefensX request failed: {0}")]
    RequestFailed(#[from] TransportError),

    #[error("Connection test expected HTTP 200, got {status}")]
    UnexpectedStatus { status: reqwest::StatusCode },
}
