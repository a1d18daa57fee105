//! Archive backend over zip and tar.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::ConverterError;
use super::traits::Backend;
use super::types::{ConversionRequest, ConvertedArtifact};
use crate::compat::{BackendKind, ConversionService};
use crate::context::ConversionContext;
use crate::format::Format;
use crate::pipeline::archive::create_archives;
use crate::tempfiles::JobWorkspace;

/// Bundles any files, recognised or not.
#[derive(Debug, Default, Clone)]
pub struct ArchiveBackend;

impl ArchiveBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for ArchiveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Archive
    }

    fn name(&self) -> &str {
        "archiver"
    }

    fn accepts(&self, _input: Option<Format>, service: &ConversionService) -> bool {
        matches!(service.format, Format::Archive(_))
    }

    async fn convert(
        &self,
        ctx: &ConversionContext,
        request: &ConversionRequest,
        workspace: &mut JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConvertedArtifact>, ConverterError> {
        let Format::Archive(format) = request.target() else {
            return Err(ConverterError::invalid_options(format!(
                "{} is not an archive service",
                request.service
            )));
        };
        if request.inputs.is_empty() {
            return Err(ConverterError::invalid_options("nothing to archive"));
        }
        create_archives(
            ctx,
            &request.inputs,
            format,
            &request.options.archive,
            workspace,
            cancel,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ArchiveFormat, ImageFormat};

    #[test]
    fn test_accepts_unknown_inputs() {
        let backend = ArchiveBackend::new();
        let zip = ConversionService::archive(ArchiveFormat::Zip);
        assert!(backend.accepts(None, &zip));
        assert!(backend.accepts(Some(Format::Image(ImageFormat::Png)), &zip));
        assert!(!backend.accepts(None, &ConversionService::image(ImageFormat::Png)));
    }
}
