//! pandoc backend.

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::error::ConverterError;
use super::exec::execute;
use super::traits::Backend;
use super::types::{ConversionRequest, ConvertedArtifact};
use crate::compat::{BackendKind, ConversionService};
use crate::context::ConversionContext;
use crate::format::{DocumentFormat, Format};
use crate::options::DocumentOptions;
use crate::process::ToolInvocation;
use crate::tempfiles::JobWorkspace;
use crate::tools::Tool;

/// Builds pandoc arguments, `None` when either side has no pandoc name.
pub fn pandoc_args(
    from: DocumentFormat,
    to: DocumentFormat,
    options: &DocumentOptions,
    input: &Path,
    output: &Path,
) -> Option<Vec<String>> {
    let mut args = vec![
        "-f".to_string(),
        from.reader()?.to_string(),
        "-t".to_string(),
        to.writer()?.to_string(),
    ];
    if to == DocumentFormat::Pdf {
        if let Some(engine) = &options.pdf_engine {
            args.push(format!("--pdf-engine={}", engine));
        }
    }
    if options.table_of_contents {
        args.push("--toc".to_string());
    }
    if options.standalone {
        args.push("--standalone".to_string());
    }
    args.extend([
        "-o".to_string(),
        output.to_string_lossy().to_string(),
        input.to_string_lossy().to_string(),
    ]);
    Some(args)
}

/// pandoc executor.
#[derive(Debug, Default, Clone)]
pub struct DocumentBackend;

impl DocumentBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for DocumentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn name(&self) -> &str {
        "pandoc"
    }

    fn accepts(&self, input: Option<Format>, service: &ConversionService) -> bool {
        match (input, service.format) {
            (Some(Format::Document(from)), Format::Document(to)) => {
                from.compatible_outputs().contains(&to)
            }
            _ => false,
        }
    }

    async fn convert(
        &self,
        ctx: &ConversionContext,
        request: &ConversionRequest,
        workspace: &mut JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConvertedArtifact>, ConverterError> {
        let (input, format) = request.single_input()?;
        let (Some(Format::Document(from)), Format::Document(to)) = (format, request.target()) else {
            return Err(ConverterError::unsupported(input, request.service));
        };

        let output = workspace.output_path(&request.output_name_for(input));
        let args = pandoc_args(from, to, &request.options.document, input, &output)
            .ok_or_else(|| ConverterError::unsupported(input, request.service))?;

        let handle = ctx.tools.locate(Tool::Pandoc)?;
        let mut invocation = ToolInvocation::new(&handle);
        invocation.args(args);
        execute(ctx, &invocation, Some(request.target()), Some(&output), cancel).await?;

        Ok(vec![ConvertedArtifact::from_output(
            request.inputs.clone(),
            output,
            request.target(),
        )?])
    }
}
