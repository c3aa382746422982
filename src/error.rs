//! Error types for `Slimy`
//!
//! Fight and presence failures are recoverable, caller-visible conditions.
//! Configuration, transport, and I/O failures map onto process exit codes.

use std::path::PathBuf;
use thiserror::Error;

use crate::fight::types::Fight;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `slimy` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Transport error (bind failed, server crashed)
    pub const TRANSPORT_ERROR: i32 = 4;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `Slimy` operations.
#[derive(Debug, Error)]
pub enum SlimyError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// HTTP transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Durable store error surfaced outside a request
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SlimyError {
    /// Returns the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Transport(_) => ExitCode::TRANSPORT_ERROR,
            Self::Store(_) => ExitCode::ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Fight Errors
// ============================================================================

/// Fight lifecycle and move-resolution errors.
///
/// Move rejections carry the unchanged Fight so the request layer can
/// answer with the current state alongside the error code.
#[derive(Debug, Clone, Error)]
pub enum FightError {
    /// No Fight exists at the key
    #[error("no active fight for encounter {key}")]
    NotFound {
        /// Encounter key
        key: u64,
    },

    /// A non-terminal Fight already occupies the key
    #[error("encounter {key} already has an active fight")]
    Conflict {
        /// Encounter key
        key: u64,
    },

    /// Submitted by someone other than the registered hunter
    #[error("'{hunter}' is not the hunter of encounter {key}")]
    Unauthorized {
        /// Encounter key
        key: u64,
        /// Identity that submitted the move
        hunter: String,
        /// Fight state, unchanged
        current: Box<Fight>,
    },

    /// The Fight is not waiting for this kind of input
    #[error("encounter {key} cannot accept this now (status {status})")]
    InvalidState {
        /// Encounter key
        key: u64,
        /// Status name at rejection time
        status: &'static str,
        /// Fight state, unchanged
        current: Box<Fight>,
    },

    /// `Catch` chosen while the wild slime is still fighting
    #[error("catch is not allowed in encounter {key} while the wild slime is fighting")]
    IllegalMove {
        /// Encounter key
        key: u64,
        /// Fight state, unchanged
        current: Box<Fight>,
    },
}

impl FightError {
    /// Stable snake_case code used in responses and metric labels.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Unauthorized { .. } => "unauthorized",
            Self::InvalidState { .. } => "invalid_state",
            Self::IllegalMove { .. } => "illegal_move",
        }
    }

    /// The unchanged Fight attached to a move rejection, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Fight> {
        match self {
            Self::Unauthorized { current, .. }
            | Self::InvalidState { current, .. }
            | Self::IllegalMove { current, .. } => Some(current),
            Self::NotFound { .. } | Self::Conflict { .. } => None,
        }
    }
}

// ============================================================================
// Durable Store Errors
// ============================================================================

/// Errors from the external user/slime stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The identity or slime is unknown to the store
    #[error("not found: {0}")]
    NotFound(String),

    /// The store did not answer in time
    #[error("store request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Connection-level failure
    #[error("store network error: {0}")]
    Network(String),

    /// Non-2xx response from a remote store
    #[error("store returned HTTP {0}")]
    HttpStatus(u16),

    /// Response body could not be interpreted
    #[error("invalid store response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", format_issues(.errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Configuration file exceeds the size limit
    #[error("config file {path} is {size} bytes (limit: {limit})")]
    TooLarge {
        /// Path to the configuration file
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Limit in bytes
        limit: u64,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location in the configuration where it was referenced
        location: String,
    },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "fight.catch_probability")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Reported but does not block loading
    Warning,
}

// ============================================================================
// Transport Errors
// ============================================================================

/// HTTP transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error while serving
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to bind the listener
    #[error("bind failed: {0}")]
    BindFailed(String),

    /// Bind address could not be parsed
    #[error("invalid bind address \"{input}\": {message}")]
    InvalidAddress {
        /// Address as given
        input: String,
        /// Parser message
        message: String,
    },
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `Slimy` operations.
pub type Result<T> = std::result::Result<T, SlimyError>;

// ============================================================================
// Tests
// ============================================================================
