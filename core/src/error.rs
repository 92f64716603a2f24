//! Error types for the service client.
//!
//! # Design
//! Each failure class gets its own enum so callers can tell a fatal
//! construction problem (`ConfigError`) from a per-call failure
//! (`ValidationError`, `TransportError`). `ClientError` is what a method
//! invocation returns; it wraps the per-call kinds unchanged so the
//! originating error is never rewritten on the way out.

use std::path::PathBuf;

use thiserror::Error;

/// Construction-time failures. Any of these aborts `ServiceClient::build`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read service config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed service config: {0}")]
    Malformed(String),

    #[error("service '{method}' has no endpoint")]
    MissingEndpoint { method: String },

    #[error("client '{client}' has no default dispatch handler")]
    MissingDefaultHandler { client: String },

    #[error("'{name}' is declared by both '{first}' and '{second}'")]
    DuplicateOverride {
        name: String,
        first: String,
        second: String,
    },
}

/// An override artifact that could not be read, parsed or bound.
///
/// Only the named artifact is dropped; the remaining artifacts still load.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("override artifact '{artifact}' failed to load: {reason}")]
pub struct OverrideLoadError {
    pub artifact: String,
    pub reason: String,
}

/// What went wrong while building a DTO from a response mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The response was not a JSON object.
    NotAMapping { found: &'static str },
    /// A required field is absent.
    Missing,
    /// The field is present but holds the wrong kind of value.
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// DTO construction failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{dto}: {}", describe(.field, .failure))]
pub struct ValidationError {
    pub dto: String,
    pub field: Option<String>,
    pub failure: ValidationFailure,
}

fn describe(field: &Option<String>, failure: &ValidationFailure) -> String {
    let field = field.as_deref().unwrap_or("<response>");
    match failure {
        ValidationFailure::NotAMapping { found } => {
            format!("expected a mapping response, found {found}")
        }
        ValidationFailure::Missing => format!("field '{field}' is missing"),
        ValidationFailure::Mismatch { expected, found } => {
            format!("field '{field}' must be {expected}, found {found}")
        }
    }
}

/// Failures reported by the transport dispatcher.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be decoded as JSON.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Io(String),
}

/// A stub generation problem for one artifact, or for the output file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StubGenerationError {
    #[error("skipped artifact '{artifact}': {reason}")]
    SkippedArtifact { artifact: String, reason: String },

    #[error("failed to write stubs to {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

impl From<OverrideLoadError> for StubGenerationError {
    fn from(err: OverrideLoadError) -> Self {
        StubGenerationError::SkippedArtifact {
            artifact: err.artifact,
            reason: err.reason,
        }
    }
}

/// Errors returned when invoking a method on a `ServiceClient`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no method named '{0}'")]
    UnknownMethod(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Raised by hand-written handlers for failures of their own.
    #[error("{method}: {message}")]
    Handler { method: String, message: String },

    #[error("response does not match {target}: {reason}")]
    Decode { target: &'static str, reason: String },
}
