//! Batch lifecycle integration tests.
//!
//! These tests run the real router and backends against scripted tools:
//! - Fail-fast sequencing and partial results
//! - Failure classification surfaced through the batch
//! - Cancellation of a running tool
//! - Artifact ownership from temp space to the caller

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use convertino_core::{
    converter::{ConverterError, KnownCause},
    format::{ArchiveFormat, DocumentFormat, OcrFormat},
    testing::FakeToolkit,
    tools::Tool,
    BatchDriver, BatchProgress, ConversionContext, ConversionOptions, ConversionService, JobState,
    Router,
};

/// pandoc stand-in: fails for inputs named `*bad*`, logs every call.
fn pandoc_script(log: &std::path::Path) -> String {
    format!(
        r#"for last; do :; done
echo "$last" >> "{log}"
case "$last" in *bad*) echo "pandoc: unexpected token" >&2; exit 64;; esac
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
echo "<p>converted</p>" > "$out""#,
        log = log.display()
    )
}

struct Harness {
    kit: FakeToolkit,
    source_dir: TempDir,
    ctx: ConversionContext,
    driver: BatchDriver,
}

impl Harness {
    fn new(install: impl FnOnce(&FakeToolkit)) -> Self {
        let kit = FakeToolkit::new();
        install(&kit);
        let ctx = kit.context();
        let driver = BatchDriver::new(ctx.clone(), Arc::new(Router::with_defaults()));
        Self {
            kit,
            source_dir: TempDir::new().expect("Failed to create source dir"),
            ctx,
            driver,
        }
    }

    fn sources(&self, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = self.source_dir.path().join(name);
                std::fs::write(&path, format!("# {}\n", name)).unwrap();
                path
            })
            .collect()
    }

    fn log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.kit.dir().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    /// Entries directly under the temp root.
    fn temp_entries(&self) -> usize {
        std::fs::read_dir(self.ctx.temps.root())
            .map(|d| d.count())
            .unwrap_or(0)
    }
}

#[tokio::test]
async fn test_second_failure_stops_batch() {
    let h = Harness::new(|kit| {
        kit.install_tool(Tool::Pandoc, &pandoc_script(&kit.dir().join("calls.log")));
    });
    let inputs = h.sources(&["one.md", "two-bad.md", "three.md"]);
    let progress = BatchProgress::new();

    let outcome = h
        .driver
        .convert_batch(
            &inputs,
            ConversionService::document(DocumentFormat::Html),
            &ConversionOptions::default(),
            &progress,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.artifacts[0].suggested_name, "one.html");
    assert_eq!(outcome.artifacts[0].sources, vec![inputs[0].clone()]);

    let error = outcome.error.as_ref().expect("batch should fail");
    assert_eq!(error.index, 1);
    assert_eq!(error.file, inputs[1]);
    assert!(matches!(
        error.source,
        ConverterError::InvocationFailed { exit_code: Some(64), .. }
    ));
    assert!(error.to_string().contains("two-bad.md"));

    // The third file was never handed to the tool
    let calls = h.log_lines();
    assert_eq!(calls.len(), 2);
    assert!(!calls.iter().any(|c| c.ends_with("three.md")));
    assert_eq!(outcome.jobs[2].state, JobState::Queued);
    assert_eq!(progress.snapshot(), (2, 3));

    // Only the first job's output directory is left in temp space
    assert_eq!(h.temp_entries(), 1);
    assert!(h.ctx.temps.is_tracked(&outcome.artifacts[0].temp_path));
}

#[tokio::test]
async fn test_missing_latex_is_a_known_cause() {
    let h = Harness::new(|kit| {
        kit.install_tool(
            Tool::Pandoc,
            r#"echo 'pdflatex not found. Please select a different --pdf-engine or install pdflatex' >&2
exit 47"#,
        );
    });
    let inputs = h.sources(&["report.md"]);

    let outcome = h
        .driver
        .convert_batch(
            &inputs,
            ConversionService::document(DocumentFormat::Pdf),
            &ConversionOptions::default(),
            &BatchProgress::new(),
            &CancellationToken::new(),
        )
        .await;

    let error = outcome.error.expect("batch should fail");
    match error.source {
        ConverterError::InvocationFailedKnownCause { cause, ref stderr, .. } => {
            assert_eq!(cause, KnownCause::LatexMissing);
            assert!(stderr.contains("pdflatex"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.ctx.temps.tracked_count(), 0);
}

#[tokio::test]
async fn test_cancel_terminates_running_tool() {
    let h = Harness::new(|kit| {
        kit.install_tool(Tool::Pandoc, "exec sleep 30");
    });
    let inputs = h.sources(&["slow.md", "never.md"]);
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        let processes = h.ctx.processes.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                if processes.active_count() == 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            cancel.cancel();
        })
    };

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        h.driver.convert_batch(
            &inputs,
            ConversionService::document(DocumentFormat::Html),
            &ConversionOptions::default(),
            &BatchProgress::new(),
            &cancel,
        ),
    )
    .await
    .expect("cancellation should end the batch promptly");
    canceller.await.unwrap();

    assert!(outcome.was_cancelled());
    assert!(outcome.artifacts.is_empty());
    let states: Vec<_> = outcome.jobs.iter().map(|j| j.state).collect();
    assert_eq!(states, [JobState::Cancelled, JobState::Queued]);
    assert_eq!(h.ctx.processes.active_count(), 0);
    assert_eq!(h.ctx.temps.tracked_count(), 0);
    assert_eq!(h.temp_entries(), 0);
}

#[tokio::test]
async fn test_saved_artifacts_survive_cleanup() {
    let h = Harness::new(|kit| {
        kit.install_tool(Tool::Pandoc, &pandoc_script(&kit.dir().join("calls.log")));
    });
    let inputs = h.sources(&["a.md", "b.md"]);
    let out = TempDir::new().unwrap();

    let outcome = h
        .driver
        .convert_batch(
            &inputs,
            ConversionService::document(DocumentFormat::Html),
            &ConversionOptions::default(),
            &BatchProgress::new(),
            &CancellationToken::new(),
        )
        .await;
    assert!(outcome.is_success());
    assert_eq!(outcome.artifacts.len(), 2);

    let saved = assert_ok!(h.ctx.save_artifact(&outcome.artifacts[0], out.path()).await);
    assert_eq!(saved, out.path().join("a.html"));

    // The unsaved artifact is still owned by the temp manager
    let unsaved = outcome.artifacts[1].temp_path.clone();
    assert!(h.ctx.temps.is_tracked(&unsaved));
    h.ctx.temps.cleanup();

    assert!(saved.exists());
    assert!(!unsaved.exists());
    assert_eq!(h.temp_entries(), 0);
    let record = outcome.artifacts[0].record(Some(convertino_core::Format::Document(
        DocumentFormat::Markdown,
    )));
    assert_eq!(record.source_name, "a.md");
    assert_eq!(record.output_format, "document:html");
}

#[tokio::test]
async fn test_separate_archives_are_verified() {
    let h = Harness::new(|kit| {
        let log = kit.dir().join("calls.log");
        kit.install_tool(
            Tool::Zip,
            &format!(
                r#"if [ "$1" = "-T" ]; then echo "test $2" >> "{log}"; exit 0; fi
for a; do case "$a" in -*) ;; *) out="$a"; break;; esac; done
echo "create $out $(ls | tr '\n' ' ')" >> "{log}"
echo zip > "$out""#,
                log = log.display()
            ),
        );
    });
    let inputs = h.sources(&["a.txt", "b.txt"]);
    let mut options = ConversionOptions::default();
    options.archive.separate = true;

    let outcome = h
        .driver
        .convert_batch(
            &inputs,
            ConversionService::archive(ArchiveFormat::Zip),
            &options,
            &BatchProgress::new(),
            &CancellationToken::new(),
        )
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.jobs.len(), 1);
    let names: Vec<_> = outcome
        .artifacts
        .iter()
        .map(|a| a.suggested_name.as_str())
        .collect();
    assert_eq!(names, ["a.zip", "b.zip"]);

    let calls = h.log_lines();
    assert_eq!(calls.iter().filter(|c| c.starts_with("test ")).count(), 2);
    // Each archive is staged with only its own member
    assert!(calls.iter().any(|c| c.starts_with("create ") && c.contains("a.zip a.txt")));
    // Staging directories are gone; only the job output dir remains
    assert_eq!(h.temp_entries(), 1);
}

#[tokio::test]
async fn test_failed_verification_is_distinct() {
    let h = Harness::new(|kit| {
        kit.install_tool(
            Tool::Zip,
            r#"if [ "$1" = "-T" ]; then echo "zip error: Zip file invalid" >&2; exit 2; fi
for a; do case "$a" in -*) ;; *) out="$a"; break;; esac; done
echo zip > "$out""#,
        );
    });
    let inputs = h.sources(&["a.txt"]);

    let outcome = h
        .driver
        .convert_batch(
            &inputs,
            ConversionService::archive(ArchiveFormat::Zip),
            &ConversionOptions::default(),
            &BatchProgress::new(),
            &CancellationToken::new(),
        )
        .await;

    let error = outcome.error.expect("verification should fail");
    assert!(matches!(
        error.source,
        ConverterError::VerificationFailed { ref stderr, .. } if stderr.contains("invalid")
    ));
    assert!(outcome.artifacts.is_empty());
    assert_eq!(h.temp_entries(), 0);
}

#[tokio::test]
async fn test_all_pdf_batch_extracts_text() {
    let h = Harness::new(|kit| {
        let log = kit.dir().join("calls.log");
        kit.install_tool(
            Tool::PdfToText,
            &format!(
                r#"echo "$2" >> "{log}"
echo "text of $(basename "$2")" > "$3""#,
                log = log.display()
            ),
        );
    });
    let inputs = h.sources(&["a.pdf", "b.pdf"]);
    let service = ConversionService::ocr(OcrFormat::ExtractedText);
    assert!(h.ctx.resolver().compatible_outputs(&inputs).contains(&service));

    let outcome = h
        .driver
        .convert_batch(
            &inputs,
            service,
            &ConversionOptions::default(),
            &BatchProgress::new(),
            &CancellationToken::new(),
        )
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    let names: Vec<_> = outcome
        .artifacts
        .iter()
        .map(|a| a.suggested_name.as_str())
        .collect();
    assert_eq!(names, ["a.txt", "b.txt"]);
    let text = std::fs::read_to_string(&outcome.artifacts[1].temp_path).unwrap();
    assert_eq!(text.trim(), "text of b.pdf");
    assert_eq!(h.log_lines().len(), 2);
}
