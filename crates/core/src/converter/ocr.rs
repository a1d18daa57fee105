//! Text recognition backend (tesseract, pdftotext).
//!
//! Raster images go straight to tesseract. PDFs are either read for their
//! embedded text layer with pdftotext, or rasterised page by page and
//! recognised, with the page texts joined by form feeds.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::ConverterError;
use super::exec::execute;
use super::traits::Backend;
use super::types::{ConversionRequest, ConvertedArtifact};
use crate::compat::{BackendKind, ConversionService};
use crate::context::ConversionContext;
use crate::format::{Format, OcrFormat};
use crate::options::OcrOptions;
use crate::pipeline::pdf_pages;
use crate::process::ToolInvocation;
use crate::tempfiles::JobWorkspace;
use crate::tools::Tool;

/// Separator between page texts of a recognised PDF.
const PAGE_BREAK: &str = "\x0c";

/// tesseract arguments. `base` is the output path without extension, or
/// `stdout`.
pub fn tesseract_args(input: &Path, base: &str, options: &OcrOptions, format: OcrFormat) -> Vec<String> {
    let mut args = vec![
        input.to_string_lossy().to_string(),
        base.to_string(),
        "-l".to_string(),
        options.language.clone(),
        "--psm".to_string(),
        options.level.psm().to_string(),
    ];
    if let Some(config) = format.tesseract_config() {
        args.push(config.to_string());
    }
    args
}

pub fn pdftotext_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-layout".to_string(),
        input.to_string_lossy().to_string(),
        output.to_string_lossy().to_string(),
    ]
}

#[derive(Debug, Default, Clone)]
pub struct OcrBackend;

impl OcrBackend {
    pub fn new() -> Self {
        Self
    }

    async fn recognize_image(
        &self,
        ctx: &ConversionContext,
        input: &Path,
        output: &Path,
        format: OcrFormat,
        options: &OcrOptions,
        cancel: &CancellationToken,
    ) -> Result<(), ConverterError> {
        let tesseract = ctx.tools.locate(Tool::Tesseract)?;
        // tesseract appends the extension itself
        let base = output.with_extension("");
        let mut invocation = ToolInvocation::new(&tesseract);
        invocation.args(tesseract_args(
            input,
            &base.to_string_lossy(),
            options,
            format,
        ));
        execute(ctx, &invocation, Some(Format::Ocr(format)), Some(output), cancel).await?;
        Ok(())
    }

    async fn recognize_pdf(
        &self,
        ctx: &ConversionContext,
        input: &Path,
        output: &Path,
        options: &OcrOptions,
        workspace: &mut JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<(), ConverterError> {
        let tesseract = ctx.tools.locate(Tool::Tesseract)?;
        let pages_dir = workspace.scratch_dir()?;

        let result = async {
            let pages = pdf_pages::rasterize(ctx, input, &pages_dir, options.effective_pdf_dpi(), cancel).await?;
            debug!(input = %input.display(), pages = pages.len(), "Recognising PDF pages");

            let mut texts = Vec::with_capacity(pages.len());
            for page in &pages {
                let mut invocation = ToolInvocation::new(&tesseract);
                invocation.args(tesseract_args(page, "stdout", options, OcrFormat::Text));
                let outcome = execute(ctx, &invocation, Some(Format::Ocr(OcrFormat::Text)), None, cancel).await?;
                texts.push(outcome.stdout);
            }
            tokio::fs::write(output, texts.join(PAGE_BREAK)).await?;
            Ok::<_, ConverterError>(pages.len())
        }
        .await;

        workspace.release(&pages_dir);
        let pages = result?;
        info!(input = %input.display(), pages, "PDF recognised");
        Ok(())
    }
}

#[async_trait]
impl Backend for OcrBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ocr
    }

    fn name(&self) -> &str {
        "tesseract"
    }

    fn accepts(&self, input: Option<Format>, service: &ConversionService) -> bool {
        let Format::Ocr(target) = service.format else {
            return false;
        };
        match input {
            // All-PDF batches detect PDFs as images
            Some(format) if format.is_pdf() => {
                matches!(target, OcrFormat::Text | OcrFormat::ExtractedText)
            }
            Some(Format::Image(image)) => image.is_raster() && target != OcrFormat::ExtractedText,
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
        let Format::Ocr(target) = request.target() else {
            return Err(ConverterError::unsupported(input, request.service));
        };
        let output: PathBuf = workspace.output_path(&request.output_name_for(input));
        let options = &request.options.ocr;
        let is_pdf = format.is_some_and(|f| f.is_pdf());

        match (is_pdf, target) {
            (true, OcrFormat::ExtractedText) => {
                let pdftotext = ctx.tools.locate(Tool::PdfToText)?;
                let mut invocation = ToolInvocation::new(&pdftotext);
                invocation.args(pdftotext_args(input, &output));
                execute(ctx, &invocation, Some(request.target()), Some(&output), cancel).await?;
            }
            (true, OcrFormat::Text) => {
                self.recognize_pdf(ctx, input, &output, options, workspace, cancel)
                    .await?;
            }
            (false, OcrFormat::Text | OcrFormat::Hocr | OcrFormat::SearchablePdf) => {
                self.recognize_image(ctx, input, &output, target, options, cancel)
                    .await?;
            }
            _ => return Err(ConverterError::unsupported(input, request.service)),
        }

        Ok(vec![ConvertedArtifact::from_output(
            request.inputs.clone(),
            output,
            request.target(),
        )?])
    }
}
