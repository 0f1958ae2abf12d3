//!
//! # Overview
//!
//! This module defines the unified, `miette`-based error type for the sample tester. Every
//! failure that can occur while loading a test plan, resolving a call, or interpreting a
//! case is represented by [`SampleError`]. Errors are built with the `err_msg!` macro,
//! which removes the repeated `message`/`source` boilerplate from call sites.
//!
//! # Error Construction
//!
//! - `err_msg!(Config, "unknown YAML directive: {}", name)`
//! - `err_msg!(Call, "could not resolve call: {}", reason)`
//!
//! # Severity
//!
//! Errors are classified by [`ErrorType`]. The case interpreter only gives two classes a
//! dedicated path: `Call` becomes a CALL ERROR and `Interrupted` unwinds the whole run.
//! Everything else is recorded as an unhandled exception of the stage that raised it.

use miette::Diagnostic;
use thiserror::Error;

/// Constructs a [`SampleError`] variant with a formatted message and no cause.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $msg:literal $(, $arg:expr)* $(,)?) => {
        $crate::SampleError::$variant {
            message: format!($msg $(, $arg)*),
            source: None,
        }
    };
    ($variant:ident, $msg:expr) => {
        $crate::SampleError::$variant {
            message: format!("{}", $msg),
            source: None,
        }
    };
}

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Type-safe classification of [`SampleError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Malformed segment, unknown directive, missing required field
    Config,
    /// Artifact or command resolution failure
    Call,
    /// Parse or evaluation failure inside embedded code
    Snippet,
    /// Template/argument mismatch while formatting a message
    Format,
    /// Missing process environment variable
    Environment,
    /// Unreadable or malformed test plan or environment file
    Plan,
    /// Filesystem and process I/O
    Io,
    /// The run was cancelled by the user
    Interrupted,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Config => "Config",
            ErrorType::Call => "Call",
            ErrorType::Snippet => "Snippet",
            ErrorType::Format => "Format",
            ErrorType::Environment => "Environment",
            ErrorType::Plan => "Plan",
            ErrorType::Io => "Io",
            ErrorType::Interrupted => "Interrupted",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for every failure mode of the sample tester.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("ConfigError: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
    #[error("CallError: {message}")]
    Call {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
    #[error("SnippetError: {message}")]
    Snippet {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
    #[error("FormatError: {message}")]
    Format {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
    #[error("EnvironmentError: {message}")]
    Environment {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
    #[error("PlanError: {message}")]
    Plan {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
    #[error("IoError: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
    #[error("keyboard interrupt detected")]
    Interrupted,
}

impl SampleError {
    /// Returns the classification of this error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            SampleError::Config { .. } => ErrorType::Config,
            SampleError::Call { .. } => ErrorType::Call,
            SampleError::Snippet { .. } => ErrorType::Snippet,
            SampleError::Format { .. } => ErrorType::Format,
            SampleError::Environment { .. } => ErrorType::Environment,
            SampleError::Plan { .. } => ErrorType::Plan,
            SampleError::Io { .. } => ErrorType::Io,
            SampleError::Interrupted => ErrorType::Interrupted,
        }
    }

    /// The bare message, without the classification prefix.
    pub fn message(&self) -> String {
        match self {
            SampleError::Config { message, .. }
            | SampleError::Call { message, .. }
            | SampleError::Snippet { message, .. }
            | SampleError::Format { message, .. }
            | SampleError::Environment { message, .. }
            | SampleError::Plan { message, .. }
            | SampleError::Io { message, .. } => message.clone(),
            SampleError::Interrupted => self.to_string(),
        }
    }

    /// Attaches an underlying cause to this error.
    pub fn with_source<E>(self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let boxed: Option<BoxedSource> = Some(Box::new(cause));
        match self {
            SampleError::Config { message, .. } => SampleError::Config { message, source: boxed },
            SampleError::Call { message, .. } => SampleError::Call { message, source: boxed },
            SampleError::Snippet { message, .. } => SampleError::Snippet { message, source: boxed },
            SampleError::Format { message, .. } => SampleError::Format { message, source: boxed },
            SampleError::Environment { message, .. } => {
                SampleError::Environment { message, source: boxed }
            }
            SampleError::Plan { message, .. } => SampleError::Plan { message, source: boxed },
            SampleError::Io { message, .. } => SampleError::Io { message, source: boxed },
            SampleError::Interrupted => SampleError::Interrupted,
        }
    }

    /// Display text followed by the full `source()` chain, one cause per line.
    ///
    /// This is what gets recorded for unhandled stage errors.
    pub fn describe(&self) -> String {
        let mut description = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            description.push_str("\n  caused by: ");
            description.push_str(&err.to_string());
            cause = err.source();
        }
        description
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, SampleError::Interrupted)
    }
}

impl Diagnostic for SampleError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!(
            "sampletester::{}",
            self.error_type().as_str().to_lowercase()
        )))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let help = match self {
            SampleError::Config { .. } => "each segment must be a single-key map naming a known directive",
            SampleError::Plan { .. } => "test plans need a top-level `test: {suites: [...]}` mapping",
            SampleError::Interrupted => "the run was aborted; remaining cases were not executed",
            _ => return None,
        };
        Some(Box::new(help))
    }
}

impl From<std::io::Error> for SampleError {
    fn from(err: std::io::Error) -> Self {
        err_msg!(Io, "{}", err).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_matches_variant() {
        assert_eq!(err_msg!(Call, "x").error_type(), ErrorType::Call);
        assert_eq!(SampleError::Interrupted.error_type(), ErrorType::Interrupted);
        assert!(SampleError::Interrupted.is_interrupt());
    }

    #[test]
    fn test_message_formatting() {
        let err = err_msg!(Config, "unknown YAML directive: {}", "frobnicate");
        assert_eq!(err.message(), "unknown YAML directive: frobnicate");
        assert_eq!(err.to_string(), "ConfigError: unknown YAML directive: frobnicate");
    }

    #[test]
    fn test_describe_includes_cause_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = err_msg!(Plan, "could not read plan").with_source(io);
        let description = err.describe();
        assert!(description.starts_with("PlanError: could not read plan"));
        assert!(description.contains("caused by: no such file"));
    }

    #[test]
    fn test_diagnostic_code() {
        let err = err_msg!(Snippet, "unbound symbol");
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("sampletester::snippet"));
    }
}
