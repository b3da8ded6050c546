//! Error types for ybeasy.

use crate::filter::ObjectType;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for ybeasy operations.
#[derive(Debug, Error)]
pub enum YbError {
    /// Unbalanced quote or bracket nesting in a delimited list.
    #[error("Invalid Argument List: {0}")]
    MalformedInput(String),

    /// Filter arguments that cannot be combined or are missing.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Procedure source did not match the expected grammar.
    #[error("Stored proc '{name}' parse failed: {message}")]
    ProcParse { name: String, message: String },

    /// Procedure argument type the transpiler does not know how to bind.
    #[error("Unhandled proc arg_type: {0}")]
    UnsupportedArgType(String),

    /// Procedure return type outside the scalar set.
    #[error("Unhandled proc return_type: {0}")]
    UnsupportedReturnType(String),

    /// Procedure argument without a supplied value or a default.
    #[error("Missing proc arg: {arg} for proc: {procedure}")]
    MissingArgument { arg: String, procedure: String },

    /// Recovered return value could not be coerced to the return type.
    #[error("Invalid proc return value: '{0}'")]
    InvalidReturnValue(String),

    /// The client process failed or wrote genuine stderr.
    #[error("{stderr}")]
    Execution { exit_code: i32, stderr: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A file the tools depend on could not be read.
    #[error("{}: {}", .path.display(), .source)]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML decoding error.
    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl YbError {
    /// Create a procedure parse error.
    pub fn proc_parse(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProcParse {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a missing required filter error.
    pub fn missing_filter(otype: ObjectType) -> Self {
        Self::InvalidFilter(format!(
            "the following argument is required: --{}",
            otype
        ))
    }

    /// Exit code the process should terminate with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Execution { exit_code, .. } if *exit_code != 0 => *exit_code,
            _ => 1,
        }
    }
}

/// Result type alias for ybeasy operations.
pub type YbResult<T> = Result<T, YbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = YbError::MissingArgument {
            arg: "a_table".into(),
            procedure: "chunk_p".into(),
        };
        assert_eq!(err.to_string(), "Missing proc arg: a_table for proc: chunk_p");
    }

    #[test]
    fn test_exit_code() {
        let err = YbError::Execution {
            exit_code: 3,
            stderr: "ERROR:  relation does not exist".into(),
        };
        assert_eq!(err.exit_code(), 3);
        assert_eq!(YbError::MalformedInput("(a".into()).exit_code(), 1);

        // stderr with a zero exit code still fails the process
        let err = YbError::Execution {
            exit_code: 0,
            stderr: "WARNING".into(),
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_filter() {
        let err = YbError::missing_filter(ObjectType::Table);
        assert_eq!(
            err.to_string(),
            "Invalid filter: the following argument is required: --table"
        );
    }
}
