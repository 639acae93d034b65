//! Error types for the embedded tool runner.
//!
//! Provides a hierarchy of error types using `thiserror` for ergonomic error handling.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use serde::Serialize;

/// Validation errors for facade inputs and options.
#[derive(Error, Debug, Serialize)]
pub enum ValidationError {
    /// Path-related validation error
    #[error("Path error: {0}")]
    Path(#[from] PathError),
    /// Invalid option value
    #[error("Option error: {0}")]
    Option(String),
}

/// File path errors.
#[derive(Error, Debug, Serialize)]
pub enum PathError {
    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    /// Path exists but is not a file
    #[error("Not a file: {0}")]
    NotFile(PathBuf),
    /// Parent directory of an output path does not exist
    #[error("Directory not found: {0}")]
    MissingDir(PathBuf),
    /// IO error accessing the path
    #[error("IO error: {0}")]
    IO(String),
}

/// Main error type for running embedded tools.
///
/// Every failure a run can hit before, during or after the child process is
/// folded into this type. Nothing here is retried automatically.
#[derive(Error, Debug, Serialize)]
pub enum ToolError {
    /// Input path or option validation failed
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Missing binary sources, input or output
    #[error("Configuration error: {0}")]
    Config(String),

    /// No registered binary fits the host
    #[error("no binary source found matching {os}/{arch}; this platform is probably not supported")]
    UnsupportedPlatform { os: String, arch: String },

    /// The selected binary could not be made executable
    #[error("Load error: {0}")]
    Load(String),

    /// The OS refused to start the process
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// The run deadline passed and the process was killed
    #[error("process timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    /// The process was killed on request
    #[error("process was killed")]
    Killed,

    /// The tool ran and reported failure
    #[error("process exited with {}. {stderr}", exit_label(.code))]
    NonZeroExit { code: Option<i32>, stderr: String },

    /// File or pipe IO error
    #[error("IO error: {0}")]
    IO(String),

    /// Image encode/decode failed
    #[error("Format error: {0}")]
    Format(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "no exit status (terminated by signal)".to_string(),
    }
}

/// Convenience result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

// Helper methods for error creation
impl ToolError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    pub fn load<T: Into<String>>(msg: T) -> Self {
        Self::Load(msg.into())
    }

    pub fn spawn<T: Into<String>>(msg: T) -> Self {
        Self::Spawn(msg.into())
    }

    pub fn io<T: Into<String>>(msg: T) -> Self {
        Self::IO(msg.into())
    }

    pub fn format<T: Into<String>>(msg: T) -> Self {
        Self::Format(msg.into())
    }

    pub fn unsupported_platform(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// True for the two outcomes where the child was terminated by us.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Killed)
    }
}

// Helper methods for validation error creation
impl ValidationError {
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::Path(PathError::NotFound(path.into()))
    }

    pub fn not_a_file(path: impl Into<PathBuf>) -> Self {
        Self::Path(PathError::NotFile(path.into()))
    }

    pub fn missing_dir(path: impl Into<PathBuf>) -> Self {
        Self::Path(PathError::MissingDir(path.into()))
    }

    pub fn option(msg: impl Into<String>) -> Self {
        Self::Option(msg.into())
    }
}

// Convert std::io::Error to ToolError
impl From<io::Error> for ToolError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

// Convert io::Error to PathError
impl From<io::Error> for PathError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

// Convert PathError to ToolError
impl From<PathError> for ToolError {
    fn from(err: PathError) -> Self {
        Self::Validation(ValidationError::Path(err))
    }
}

impl From<image::ImageError> for ToolError {
    fn from(err: image::ImageError) -> Self {
        Self::Format(err.to_string())
    }
}
