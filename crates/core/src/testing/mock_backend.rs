//! Mock backend for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::compat::{BackendKind, ConversionService};
use crate::context::ConversionContext;
use crate::converter::{Backend, ConversionRequest, ConvertedArtifact, ConverterError};
use crate::format::Format;
use crate::tempfiles::JobWorkspace;

/// Mock implementation of the Backend trait.
///
/// Provides controllable behavior for testing:
/// - Track requests for assertions
/// - Fail on configured input file names
/// - Simulate slow conversions that honour cancellation
///
/// # Example
///
/// ```rust,ignore
/// use convertino_core::testing::MockBackend;
///
/// let backend = Arc::new(MockBackend::new(BackendKind::Image));
/// backend.fail_on("broken.png").await;
///
/// let mut router = Router::new();
/// router.register(backend.clone());
///
/// // Run a batch...
///
/// assert_eq!(backend.recorded_requests().await.len(), 2);
/// ```
#[derive(Debug)]
pub struct MockBackend {
    kind: BackendKind,
    /// Recorded requests, in dispatch order.
    requests: Arc<RwLock<Vec<ConversionRequest>>>,
    /// Input file names whose conversion fails.
    failing: Arc<RwLock<HashSet<String>>>,
    /// Simulated conversion duration.
    delay: Arc<RwLock<Option<Duration>>>,
}

impl MockBackend {
    /// Create a new mock backend registered for `kind`.
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            requests: Arc::new(RwLock::new(Vec::new())),
            failing: Arc::new(RwLock::new(HashSet::new())),
            delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Get all recorded requests.
    pub async fn recorded_requests(&self) -> Vec<ConversionRequest> {
        self.requests.read().await.clone()
    }

    /// Make conversions of inputs named `file_name` fail.
    pub async fn fail_on(&self, file_name: &str) {
        self.failing.write().await.insert(file_name.to_string());
    }

    /// Set how long each conversion takes.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    async fn should_fail(&self, request: &ConversionRequest) -> bool {
        let failing = self.failing.read().await;
        request.inputs.iter().any(|input| {
            input
                .file_name()
                .is_some_and(|n| failing.contains(n.to_string_lossy().as_ref()))
        })
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn accepts(&self, _input: Option<Format>, _service: &ConversionService) -> bool {
        true
    }

    async fn convert(
        &self,
        _ctx: &ConversionContext,
        request: &ConversionRequest,
        workspace: &mut JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConvertedArtifact>, ConverterError> {
        self.requests.write().await.push(request.clone());

        if let Some(delay) = *self.delay.read().await {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(ConverterError::Cancelled),
            }
        }

        if self.should_fail(request).await {
            return Err(ConverterError::invocation_failed(
                "mock",
                Some(1),
                "simulated failure",
            ));
        }

        let input = request
            .primary_input()
            .ok_or_else(|| ConverterError::invalid_options("no inputs"))?;
        let output = workspace.output_path(&request.output_name_for(input));
        tokio::fs::write(&output, format!("converted {}", input.display())).await?;

        Ok(vec![ConvertedArtifact::from_output(
            request.inputs.clone(),
            output,
            request.target(),
        )?])
    }
}
