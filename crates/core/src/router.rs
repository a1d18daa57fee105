//! Dispatch of a single conversion job to its backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::compat::BackendKind;
use crate::context::ConversionContext;
use crate::converter::{
    ArchiveBackend, Backend, ConversionRequest, ConvertedArtifact, ConverterError, DocumentBackend,
    ImageBackend, MediaBackend, OcrBackend, SpeechBackend,
};
use crate::metrics;
use crate::tempfiles::JobWorkspace;

/// Maps each backend family to its executor.
#[derive(Clone, Default)]
pub struct Router {
    backends: HashMap<BackendKind, Arc<dyn Backend>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.backends.keys().collect();
        kinds.sort();
        f.debug_struct("Router").field("backends", &kinds).finish()
    }
}

impl Router {
    /// Router without any backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with the built-in backends registered.
    pub fn with_defaults() -> Self {
        let mut router = Self::new();
        router.register(Arc::new(DocumentBackend::new()));
        router.register(Arc::new(ImageBackend::new()));
        router.register(Arc::new(MediaBackend::new()));
        router.register(Arc::new(OcrBackend::new()));
        router.register(Arc::new(SpeechBackend::new()));
        router.register(Arc::new(ArchiveBackend::new()));
        router
    }

    /// Registers `backend` for its kind, replacing any previous one.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.kind(), backend);
    }

    pub fn backend(&self, kind: BackendKind) -> Option<&Arc<dyn Backend>> {
        self.backends.get(&kind)
    }

    /// Runs one job to completion.
    ///
    /// Options and inputs are checked before any tool is spawned. The job
    /// owns a fresh workspace: on success its outputs stay tracked by the
    /// temp file manager, on failure or cancellation everything is removed.
    pub async fn run_job(
        &self,
        ctx: &ConversionContext,
        request: &ConversionRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConvertedArtifact>, ConverterError> {
        let backend_id = request.service.backend.id();
        let started = Instant::now();
        let result = self.dispatch(ctx, request, cancel).await;
        let elapsed = started.elapsed();

        metrics::JOB_DURATION
            .with_label_values(&[backend_id])
            .observe(elapsed.as_secs_f64());

        match &result {
            Ok(artifacts) => {
                metrics::JOBS_TOTAL
                    .with_label_values(&[backend_id, "succeeded"])
                    .inc();
                info!(
                    job_id = %request.job_id,
                    service = %request.service,
                    artifacts = artifacts.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Job succeeded"
                );
            }
            Err(e) => {
                metrics::JOBS_TOTAL
                    .with_label_values(&[backend_id, e.metric_label()])
                    .inc();
                warn!(
                    job_id = %request.job_id,
                    service = %request.service,
                    error = %e,
                    "Job failed"
                );
            }
        }
        result
    }

    async fn dispatch(
        &self,
        ctx: &ConversionContext,
        request: &ConversionRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConvertedArtifact>, ConverterError> {
        request.options.validate(&request.service)?;

        for input in &request.inputs {
            if !tokio::fs::try_exists(input).await.unwrap_or(false) {
                return Err(ConverterError::InputNotFound {
                    path: input.clone(),
                });
            }
        }

        let backend = self.backend(request.service.backend).ok_or_else(|| {
            ConverterError::unsupported(
                request.primary_input().unwrap_or(std::path::Path::new("")),
                request.service,
            )
        })?;

        for (input, format) in request.inputs.iter().zip(&request.input_formats) {
            if !backend.accepts(*format, &request.service) {
                return Err(ConverterError::unsupported(input, request.service));
            }
        }

        if cancel.is_cancelled() {
            return Err(ConverterError::Cancelled);
        }

        debug!(
            job_id = %request.job_id,
            backend = backend.name(),
            inputs = request.inputs.len(),
            "Dispatching job"
        );

        let mut workspace = JobWorkspace::new(ctx.temps.clone())?;
        let artifacts = backend.convert(ctx, request, &mut workspace, cancel).await?;

        let outputs: Vec<_> = artifacts.iter().map(|a| a.temp_path.clone()).collect();
        workspace.commit(&outputs);
        Ok(artifacts)
    }
}
