//! Error types for the converter module.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Missing dependency recognised from a tool's diagnostic output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownCause {
    /// pandoc needs a LaTeX engine to produce PDF.
    LatexMissing,
    /// ImageMagick delegates PDF/PostScript reading to Ghostscript.
    GhostscriptMissing,
    /// ImageMagick delegates raster to SVG tracing to Potrace.
    PotraceMissing,
}

impl KnownCause {
    /// Short remediation hint shown to the user.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::LatexMissing => "PDF output needs a LaTeX engine (install TeX Live or MacTeX)",
            Self::GhostscriptMissing => "reading PDF or PostScript needs Ghostscript",
            Self::PotraceMissing => "vector tracing needs Potrace",
        }
    }
}

impl fmt::Display for KnownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hint())
    }
}

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// External tool could not be located.
    #[error("{tool} not found; is it installed?")]
    ToolNotFound { tool: String },

    /// Tool exited unsuccessfully for an unrecognised reason.
    #[error("{tool} failed with exit code {}: {}", fmt_code(*exit_code), stderr.trim())]
    InvocationFailed {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Tool failed and its output names a specific missing dependency.
    #[error("{tool} failed: {cause}")]
    InvocationFailedKnownCause {
        tool: String,
        cause: KnownCause,
        stderr: String,
    },

    /// Archive was written but its integrity check failed.
    #[error("Archive verification failed for {archive}: {}", stderr.trim())]
    VerificationFailed { archive: PathBuf, stderr: String },

    /// Job was cancelled.
    #[error("Conversion cancelled")]
    Cancelled,

    /// The chosen service cannot read this input.
    #[error("Cannot convert {input} with {service}")]
    UnsupportedFormatCombination { input: PathBuf, service: String },

    /// Options rejected before dispatch.
    #[error("Invalid options: {reason}")]
    InvalidOptions { reason: String },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Tool reported success but the expected output is absent.
    #[error("Expected output was not produced: {path}")]
    OutputMissing { path: PathBuf },

    /// Failed to probe media file.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_code(code: Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none (killed by signal)".to_string())
}

impl ConverterError {
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Creates a new invocation failed error with the captured stderr.
    pub fn invocation_failed(
        tool: impl Into<String>,
        exit_code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::InvocationFailed {
            tool: tool.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    pub fn unsupported(input: impl Into<PathBuf>, service: impl fmt::Display) -> Self {
        Self::UnsupportedFormatCombination {
            input: input.into(),
            service: service.to_string(),
        }
    }

    /// Creates a new invalid options error.
    pub fn invalid_options(reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            reason: reason.into(),
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Diagnostic text captured from the tool, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::InvocationFailed { stderr, .. }
            | Self::InvocationFailedKnownCause { stderr, .. }
            | Self::VerificationFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::VerificationFailed { .. })
    }

    /// Label used for the `result` metric dimension.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            _ => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_failed_message_includes_stderr() {
        let err = ConverterError::invocation_failed("pandoc", Some(43), "boom\n");
        assert_eq!(err.to_string(), "pandoc failed with exit code 43: boom");
        assert_eq!(err.stderr(), Some("boom\n"));
    }

    #[test]
    fn test_signal_exit_message() {
        let err = ConverterError::invocation_failed("ffmpeg", None, "");
        assert!(err.to_string().contains("killed by signal"));
    }

    #[test]
    fn test_known_cause_message() {
        let err = ConverterError::InvocationFailedKnownCause {
            tool: "pandoc".to_string(),
            cause: KnownCause::LatexMissing,
            stderr: "pdflatex not found".to_string(),
        };
        assert!(err.to_string().contains("LaTeX"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_cancelled() {
        assert!(ConverterError::Cancelled.is_cancelled());
        assert_eq!(ConverterError::Cancelled.metric_label(), "cancelled");
        assert_eq!(ConverterError::tool_not_found("zip").metric_label(), "failed");
    }
}
