//! Exit status interpretation shared by all backends.

use tracing::warn;

use crate::format::{Format, ImageFormat};
use crate::metrics;
use crate::tools::Tool;

use super::error::{ConverterError, KnownCause};

/// Lowercased stderr fragments that identify a missing dependency.
///
/// Only absence signatures from the shell or the tool belong here; a
/// delegate that runs and fails is an ordinary failure.
const KNOWN_CAUSES: &[(&str, KnownCause)] = &[
    ("pdflatex not found", KnownCause::LatexMissing),
    ("xelatex not found", KnownCause::LatexMissing),
    ("lualatex not found", KnownCause::LatexMissing),
    ("gs: not found", KnownCause::GhostscriptMissing),
    ("gs: command not found", KnownCause::GhostscriptMissing),
    ("gs: no such file or directory", KnownCause::GhostscriptMissing),
    ("ghostscript not found", KnownCause::GhostscriptMissing),
    ("ghostscript is not installed", KnownCause::GhostscriptMissing),
    ("potrace: not found", KnownCause::PotraceMissing),
    ("potrace: command not found", KnownCause::PotraceMissing),
    ("potrace: no such file or directory", KnownCause::PotraceMissing),
];

/// A non-zero exit that still produces a usable file.
struct BenignExit {
    tool: Tool,
    exit_code: i32,
    format: Format,
}

/// ImageMagick promotes libheif encoder warnings to exit code 1 after the
/// HEIC file has been written completely.
const BENIGN_EXITS: &[BenignExit] = &[BenignExit {
    tool: Tool::ImageMagick,
    exit_code: 1,
    format: Format::Image(ImageFormat::Heic),
}];

/// Finished tool run as seen by the classifier.
#[derive(Debug, Clone, Copy)]
pub struct ExitReport<'a> {
    pub tool: Tool,
    pub exit_code: Option<i32>,
    pub stderr: &'a str,
    /// Output format the run was expected to produce.
    pub target: Option<Format>,
    /// Whether the expected output file exists on disk.
    pub output_exists: bool,
}

/// Maps a tool exit to success or a typed failure.
///
/// Zero exits succeed. Non-zero exits first look for a known missing
/// dependency in stderr, then for an allow-listed benign crash with its
/// output present. Anything else is a generic failure carrying stderr.
pub fn classify(report: ExitReport<'_>) -> Result<(), ConverterError> {
    if report.exit_code == Some(0) {
        return Ok(());
    }

    if let Some(cause) = known_cause(report.stderr) {
        return Err(ConverterError::InvocationFailedKnownCause {
            tool: report.tool.name().to_string(),
            cause,
            stderr: report.stderr.to_string(),
        });
    }

    if report.output_exists && is_benign(&report) {
        warn!(
            tool = report.tool.name(),
            exit_code = ?report.exit_code,
            "Treating non-zero exit as success, output is present"
        );
        metrics::CLASSIFICATION_DOWNGRADES
            .with_label_values(&[report.tool.name()])
            .inc();
        return Ok(());
    }

    Err(ConverterError::invocation_failed(
        report.tool.name(),
        report.exit_code,
        report.stderr,
    ))
}

pub fn known_cause(stderr: &str) -> Option<KnownCause> {
    let lowered = stderr.to_lowercase();
    KNOWN_CAUSES
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, cause)| *cause)
}

fn is_benign(report: &ExitReport<'_>) -> bool {
    let (Some(code), Some(target)) = (report.exit_code, report.target) else {
        return false;
    };
    BENIGN_EXITS
        .iter()
        .any(|b| b.tool == report.tool && b.exit_code == code && b.format == target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DocumentFormat;

    fn report<'a>(tool: Tool, code: Option<i32>, stderr: &'a str) -> ExitReport<'a> {
        ExitReport {
            tool,
            exit_code: code,
            stderr,
            target: None,
            output_exists: false,
        }
    }

    #[test]
    fn test_zero_exit_succeeds() {
        assert!(classify(report(Tool::Pandoc, Some(0), "warnings")).is_ok());
    }

    #[test]
    fn test_latex_missing_is_known_cause() {
        let stderr = "pdflatex not found. Please select a different --pdf-engine or install pdflatex";
        let err = classify(report(Tool::Pandoc, Some(47), stderr)).unwrap_err();
        assert!(matches!(
            err,
            ConverterError::InvocationFailedKnownCause {
                cause: KnownCause::LatexMissing,
                ..
            }
        ));
    }

    #[test]
    fn test_ghostscript_and_potrace_causes() {
        assert_eq!(
            known_cause(
                "sh: 1: gs: not found\nmagick: FailedToExecuteCommand `'gs' -sstdout=%stderr -dQUIET' (-1)"
            ),
            Some(KnownCause::GhostscriptMissing)
        );
        assert_eq!(
            known_cause("sh: potrace: command not found\nmagick: delegate failed `'potrace' --svg'"),
            Some(KnownCause::PotraceMissing)
        );
        assert_eq!(known_cause("something else"), None);
    }

    #[test]
    fn test_installed_ghostscript_failure_is_generic() {
        let stderr = "GPL Ghostscript 10.02.1: Unrecoverable error, exit code 1\n\
            magick: FailedToExecuteCommand `'gs' -sstdout=%stderr -dQUIET -dSAFER' (1)";
        assert_eq!(known_cause(stderr), None);

        let err = classify(report(Tool::ImageMagick, Some(1), stderr)).unwrap_err();
        assert!(matches!(
            err,
            ConverterError::InvocationFailed { exit_code: Some(1), ref stderr, .. }
                if stderr.contains("Unrecoverable error")
        ));
        assert_eq!(known_cause("magick: delegate failed `'potrace' --svg' (1)"), None);
    }

    #[test]
    fn test_heic_exit_one_with_output_is_downgraded() {
        let mut r = report(Tool::ImageMagick, Some(1), "heif encoder warning");
        r.target = Some(Format::Image(ImageFormat::Heic));
        r.output_exists = true;
        assert!(classify(r).is_ok());
    }

    #[test]
    fn test_heic_exit_one_without_output_fails() {
        let mut r = report(Tool::ImageMagick, Some(1), "heif encoder warning");
        r.target = Some(Format::Image(ImageFormat::Heic));
        assert!(matches!(
            classify(r),
            Err(ConverterError::InvocationFailed { .. })
        ));
    }

    #[test]
    fn test_allow_list_is_narrow() {
        // Same exit code, other format
        let mut r = report(Tool::ImageMagick, Some(1), "");
        r.target = Some(Format::Image(ImageFormat::Png));
        r.output_exists = true;
        assert!(classify(r).is_err());

        // Same format, other exit code
        let mut r = report(Tool::ImageMagick, Some(2), "");
        r.target = Some(Format::Image(ImageFormat::Heic));
        r.output_exists = true;
        assert!(classify(r).is_err());

        // Other tool
        let mut r = report(Tool::Pandoc, Some(1), "");
        r.target = Some(Format::Document(DocumentFormat::Html));
        r.output_exists = true;
        assert!(classify(r).is_err());
    }

    #[test]
    fn test_signal_exit_fails() {
        let err = classify(report(Tool::Ffmpeg, None, "")).unwrap_err();
        assert!(matches!(
            err,
            ConverterError::InvocationFailed { exit_code: None, .. }
        ));
    }
}
