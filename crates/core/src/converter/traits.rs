//! Trait definitions for the converter module.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::ConverterError;
use super::types::{ConversionRequest, ConvertedArtifact};
use crate::compat::{BackendKind, ConversionService};
use crate::context::ConversionContext;
use crate::format::Format;
use crate::tempfiles::JobWorkspace;

/// An executor for one backend family.
///
/// Implementations locate their tool, build a deterministic argument vector
/// from the request, run it through the process manager and classify the
/// result. Outputs are written inside `workspace`; scratch paths are
/// allocated from it so they disappear with the job.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Returns the name of this backend implementation.
    fn name(&self) -> &str;

    /// Whether this backend can read `input` when producing `service`.
    fn accepts(&self, input: Option<Format>, service: &ConversionService) -> bool;

    /// Runs the conversion. Cancellation surfaces as
    /// [`ConverterError::Cancelled`].
    async fn convert(
        &self,
        ctx: &ConversionContext,
        request: &ConversionRequest,
        workspace: &mut JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConvertedArtifact>, ConverterError>;
}
