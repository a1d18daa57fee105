//! Sequential, fail-fast batch conversion.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compat::ConversionService;
use crate::context::ConversionContext;
use crate::converter::{ConversionRequest, ConvertedArtifact, ConverterError};
use crate::format::DetectionContext;
use crate::options::ConversionOptions;
use crate::router::Router;

/// Lifecycle of a single job within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// A request plus its current state.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub request: ConversionRequest,
    pub state: JobState,
}

impl ConversionJob {
    pub fn new(request: ConversionRequest) -> Self {
        Self {
            request,
            state: JobState::Queued,
        }
    }

    fn transition(&mut self, next: JobState) {
        debug!(
            job_id = %self.request.job_id,
            from = ?self.state,
            to = ?next,
            "Job state change"
        );
        self.state = next;
    }
}

/// Terminal summary of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub inputs: Vec<PathBuf>,
    pub state: JobState,
    pub artifacts: usize,
    pub error: Option<String>,
}

/// Shared `(current, total)` counter updated as each job starts.
#[derive(Debug, Default)]
pub struct BatchProgress {
    current: AtomicUsize,
    total: AtomicUsize,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> (usize, usize) {
        (
            self.current.load(Ordering::Acquire),
            self.total.load(Ordering::Acquire),
        )
    }

    fn reset(&self, total: usize) {
        self.current.store(0, Ordering::Release);
        self.total.store(total, Ordering::Release);
    }

    fn started(&self, index: usize) {
        self.current.store(index + 1, Ordering::Release);
    }
}

/// The job that stopped a batch.
#[derive(Debug, thiserror::Error)]
#[error("Conversion of {} failed: {source}", file.display())]
pub struct BatchError {
    /// First input of the failing job.
    pub file: PathBuf,
    /// Zero-based job index.
    pub index: usize,
    #[source]
    pub source: ConverterError,
}

/// Everything a batch produced, plus the error that stopped it.
#[derive(Debug)]
pub struct BatchOutcome {
    pub artifacts: Vec<ConvertedArtifact>,
    pub error: Option<BatchError>,
    pub jobs: Vec<JobReport>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn was_cancelled(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| e.source.is_cancelled())
    }
}

/// Runs batches one job at a time through the router.
#[derive(Debug, Clone)]
pub struct BatchDriver {
    ctx: ConversionContext,
    router: Arc<Router>,
}

impl BatchDriver {
    pub fn new(ctx: ConversionContext, router: Arc<Router>) -> Self {
        Self { ctx, router }
    }

    pub fn context(&self) -> &ConversionContext {
        &self.ctx
    }

    /// Splits a batch into jobs: one over everything for merging services,
    /// one per input otherwise.
    pub fn plan(
        &self,
        inputs: &[PathBuf],
        service: ConversionService,
        options: &ConversionOptions,
    ) -> Vec<ConversionJob> {
        let context = DetectionContext::for_batch(inputs);
        let formats: Vec<_> = inputs
            .iter()
            .map(|p| self.ctx.registry.detect(p, context))
            .collect();

        if service.merges_inputs(context.pdf_as_image) {
            return vec![ConversionJob::new(ConversionRequest::new(
                inputs.to_vec(),
                formats,
                service,
                options.clone(),
            ))];
        }

        inputs
            .iter()
            .zip(formats)
            .map(|(input, format)| {
                ConversionJob::new(ConversionRequest::new(
                    vec![input.clone()],
                    vec![format],
                    service,
                    options.clone(),
                ))
            })
            .collect()
    }

    /// Converts `inputs` in order and stops at the first failure.
    ///
    /// Artifacts of jobs completed before the failure are returned alongside
    /// the error; later jobs are never attempted and stay `Queued`.
    pub async fn convert_batch(
        &self,
        inputs: &[PathBuf],
        service: ConversionService,
        options: &ConversionOptions,
        progress: &BatchProgress,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut jobs = self.plan(inputs, service, options);
        progress.reset(jobs.len());
        info!(service = %service, inputs = inputs.len(), jobs = jobs.len(), "Batch started");

        let mut artifacts = Vec::new();
        let mut produced = vec![0usize; jobs.len()];
        let mut errors: Vec<Option<String>> = vec![None; jobs.len()];
        let mut failure = None;

        for (index, job) in jobs.iter_mut().enumerate() {
            if cancel.is_cancelled() {
                job.transition(JobState::Cancelled);
                errors[index] = Some(ConverterError::Cancelled.to_string());
                failure = Some(self.batch_error(job, index, ConverterError::Cancelled));
                break;
            }

            progress.started(index);
            job.transition(JobState::Running);

            match self.router.run_job(&self.ctx, &job.request, cancel).await {
                Ok(mut produced_now) => {
                    job.transition(JobState::Succeeded);
                    produced[index] = produced_now.len();
                    artifacts.append(&mut produced_now);
                }
                Err(e) => {
                    job.transition(if e.is_cancelled() {
                        JobState::Cancelled
                    } else {
                        JobState::Failed
                    });
                    errors[index] = Some(e.to_string());
                    failure = Some(self.batch_error(job, index, e));
                    break;
                }
            }
        }

        match &failure {
            Some(e) => warn!(
                index = e.index,
                file = %e.file.display(),
                artifacts = artifacts.len(),
                error = %e.source,
                "Batch stopped"
            ),
            None => info!(artifacts = artifacts.len(), "Batch finished"),
        }

        let jobs = jobs
            .into_iter()
            .zip(produced)
            .zip(errors)
            .map(|((job, artifacts), error)| JobReport {
                job_id: job.request.job_id,
                inputs: job.request.inputs,
                state: job.state,
                artifacts,
                error,
            })
            .collect();

        BatchOutcome {
            artifacts,
            error: failure,
            jobs,
        }
    }

    fn batch_error(&self, job: &ConversionJob, index: usize, source: ConverterError) -> BatchError {
        BatchError {
            file: job.request.primary_input().map(|p| p.to_path_buf()).unwrap_or_default(),
            index,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::BackendKind;
    use crate::config::{Config, TempConfig};
    use crate::format::{ArchiveFormat, Format, ImageFormat};
    use crate::testing::MockBackend;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        driver: BatchDriver,
        mock: Arc<MockBackend>,
    }

    fn fixture(kind: BackendKind) -> Fixture {
        let dir = TempDir::new().unwrap();
        let ctx = ConversionContext::new(Config {
            temp: TempConfig {
                root: dir.path().join("temp"),
            },
            ..Default::default()
        });
        let mock = Arc::new(MockBackend::new(kind));
        let mut router = Router::new();
        router.register(mock.clone());
        Fixture {
            dir,
            driver: BatchDriver::new(ctx, Arc::new(router)),
            mock,
        }
    }

    fn files(dir: &TempDir, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|n| {
                let p = dir.path().join(n);
                std::fs::write(&p, n.as_bytes()).unwrap();
                p
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fail_fast_keeps_earlier_artifacts() {
        let f = fixture(BackendKind::Image);
        f.mock.fail_on("2.png").await;
        let inputs = files(&f.dir, &["1.png", "2.png", "3.png"]);
        let progress = BatchProgress::new();

        let outcome = f
            .driver
            .convert_batch(
                &inputs,
                ConversionService::image(ImageFormat::Jpeg),
                &ConversionOptions::default(),
                &progress,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.artifacts.len(), 1);
        assert_eq!(outcome.artifacts[0].suggested_name, "1.jpg");
        let error = outcome.error.as_ref().unwrap();
        assert_eq!(error.index, 1);
        assert!(error.file.ends_with("2.png"));
        assert_eq!(progress.snapshot(), (2, 3));

        let states: Vec<_> = outcome.jobs.iter().map(|j| j.state).collect();
        assert_eq!(states, [JobState::Succeeded, JobState::Failed, JobState::Queued]);
        assert_eq!(f.mock.recorded_requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_archive_runs_one_job() {
        let f = fixture(BackendKind::Archive);
        let inputs = files(&f.dir, &["a.txt", "b.bin"]);
        let outcome = f
            .driver
            .convert_batch(
                &inputs,
                ConversionService::archive(ArchiveFormat::Zip),
                &ConversionOptions::default(),
                &BatchProgress::new(),
                &CancellationToken::new(),
            )
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.jobs.len(), 1);
        assert_eq!(outcome.jobs[0].inputs.len(), 2);
    }

    #[test]
    fn test_plan_merges_all_pdf_batch() {
        let f = fixture(BackendKind::Image);
        let pdf = ConversionService::image(ImageFormat::Pdf);
        let options = ConversionOptions::default();

        let jobs = f.driver.plan(
            &[PathBuf::from("a.pdf"), PathBuf::from("b.PDF")],
            pdf,
            &options,
        );
        assert_eq!(jobs.len(), 1);
        assert_eq!(
            jobs[0].request.input_formats,
            vec![Some(Format::Image(ImageFormat::Pdf)); 2]
        );

        let jobs = f.driver.plan(
            &[PathBuf::from("a.pdf"), PathBuf::from("b.png")],
            pdf,
            &options,
        );
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.state == JobState::Queued));
    }

    #[tokio::test]
    async fn test_cancel_stops_current_and_remaining() {
        let f = fixture(BackendKind::Image);
        f.mock.set_delay(Duration::from_secs(10)).await;
        let inputs = files(&f.dir, &["1.png", "2.png"]);
        let cancel = CancellationToken::new();

        let trigger = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };
        let outcome = f
            .driver
            .convert_batch(
                &inputs,
                ConversionService::image(ImageFormat::Webp),
                &ConversionOptions::default(),
                &BatchProgress::new(),
                &cancel,
            )
            .await;
        trigger.await.unwrap();

        assert!(outcome.was_cancelled());
        assert!(outcome.artifacts.is_empty());
        let states: Vec<_> = outcome.jobs.iter().map(|j| j.state).collect();
        assert_eq!(states, [JobState::Cancelled, JobState::Queued]);
    }

    #[tokio::test]
    async fn test_already_cancelled_batch_attempts_nothing() {
        let f = fixture(BackendKind::Image);
        let inputs = files(&f.dir, &["1.png"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = f
            .driver
            .convert_batch(
                &inputs,
                ConversionService::image(ImageFormat::Webp),
                &ConversionOptions::default(),
                &BatchProgress::new(),
                &cancel,
            )
            .await;
        assert!(outcome.was_cancelled());
        assert!(f.mock.recorded_requests().await.is_empty());
        assert!(JobState::Cancelled.is_terminal());
        assert!(!JobState::Queued.is_terminal());
    }
}
