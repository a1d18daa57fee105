//! ImageMagick backend.

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ConverterError;
use super::exec::execute;
use super::traits::Backend;
use super::types::{ConversionRequest, ConvertedArtifact};
use crate::compat::{BackendKind, ConversionService};
use crate::context::ConversionContext;
use crate::format::{Format, ImageFormat};
use crate::options::ImageOptions;
use crate::pipeline::pdf_pages::collect_pages;
use crate::process::ToolInvocation;
use crate::tempfiles::JobWorkspace;
use crate::tools::Tool;

/// File name of a PDF merged from several inputs.
const MERGED_PDF: &str = "Merged.pdf";

/// Builds `magick` arguments. `rasterize_pdf` adds the density for PDF
/// sources.
pub fn image_args(
    inputs: &[&Path],
    output: &Path,
    target: ImageFormat,
    options: &ImageOptions,
    rasterize_pdf: bool,
) -> Vec<String> {
    let mut args = Vec::new();
    if rasterize_pdf {
        // Density must precede the input to take effect
        args.extend(["-density".to_string(), options.effective_pdf_dpi().to_string()]);
    }
    args.extend(inputs.iter().map(|p| p.to_string_lossy().to_string()));

    if let Some(quality) = options.quality {
        args.extend(["-quality".to_string(), quality.to_string()]);
    }
    if options.strip_metadata && target.supports_exif() {
        args.push("-strip".to_string());
    }
    if options.lossless {
        match target {
            ImageFormat::Webp => args.extend(["-define".to_string(), "webp:lossless=true".to_string()]),
            ImageFormat::Heic | ImageFormat::Avif => {
                args.extend(["-define".to_string(), "heic:lossless=true".to_string()])
            }
            _ => {}
        }
    }
    if target == ImageFormat::Ico {
        // ICO entries are limited to 256x256
        args.extend(["-resize".to_string(), "256x256>".to_string()]);
    }

    args.push(output.to_string_lossy().to_string());
    args
}

/// ImageMagick executor. PDF and multi-frame sources may yield one artifact
/// per page or frame.
#[derive(Debug, Default, Clone)]
pub struct ImageBackend;

impl ImageBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for ImageBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Image
    }

    fn name(&self) -> &str {
        "imagemagick"
    }

    fn accepts(&self, input: Option<Format>, service: &ConversionService) -> bool {
        let Format::Image(target) = service.format else {
            return false;
        };
        target.is_writable()
            && match input {
                Some(Format::Image(_)) => true,
                Some(format) => format.is_pdf(),
                None => false,
            }
    }

    async fn convert(
        &self,
        ctx: &ConversionContext,
        request: &ConversionRequest,
        workspace: &mut JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConvertedArtifact>, ConverterError> {
        let Format::Image(target) = request.target() else {
            return Err(ConverterError::unsupported(
                request.primary_input().unwrap_or(Path::new("")),
                request.service,
            ));
        };
        let handle = ctx.tools.locate(Tool::ImageMagick)?;

        let any_pdf = request.input_formats.iter().flatten().any(Format::is_pdf);
        let output = match request.inputs.as_slice() {
            [single] => workspace.output_path(&request.output_name_for(single)),
            _ if target == ImageFormat::Pdf => workspace.output_path(MERGED_PDF),
            _ => {
                let (input, _) = request.single_input()?;
                workspace.output_path(&request.output_name_for(input))
            }
        };

        let inputs: Vec<&Path> = request.inputs.iter().map(|p| p.as_path()).collect();
        let mut invocation = ToolInvocation::new(&handle);
        invocation.args(image_args(
            &inputs,
            &output,
            target,
            &request.options.image,
            any_pdf,
        ));
        execute(ctx, &invocation, Some(request.target()), Some(&output), cancel).await?;

        let label = if any_pdf { "page" } else { "frame" };
        let outputs = collect_pages(&output, label)?;
        debug!(outputs = outputs.len(), "Image conversion produced outputs");

        outputs
            .into_iter()
            .map(|path| ConvertedArtifact::from_output(request.inputs.clone(), path, request.target()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DocumentFormat;

    #[test]
    fn test_pdf_args_put_density_first() {
        let args = image_args(
            &[Path::new("/in/report.pdf")],
            Path::new("/out/report.png"),
            ImageFormat::Png,
            &ImageOptions::default(),
            true,
        );
        assert_eq!(args, ["-density", "150", "/in/report.pdf", "/out/report.png"]);
    }

    #[test]
    fn test_quality_strip_and_lossless() {
        let options = ImageOptions {
            quality: Some(80),
            lossless: true,
            strip_metadata: true,
            pdf_dpi: None,
        };
        let args = image_args(&[Path::new("/a.png")], Path::new("/a.webp"), ImageFormat::Webp, &options, false);
        assert_eq!(
            args,
            [
                "/a.png",
                "-quality",
                "80",
                "-strip",
                "-define",
                "webp:lossless=true",
                "/a.webp"
            ]
        );

        // BMP carries no EXIF and has no lossless switch
        let args = image_args(&[Path::new("/a.png")], Path::new("/a.bmp"), ImageFormat::Bmp, &options, false);
        assert!(!args.contains(&"-strip".to_string()));
        assert!(!args.contains(&"-define".to_string()));
    }

    #[test]
    fn test_ico_is_resized() {
        let args = image_args(&[Path::new("/a.png")], Path::new("/a.ico"), ImageFormat::Ico, &ImageOptions::default(), false);
        assert!(args.contains(&"256x256>".to_string()));
    }

    #[test]
    fn test_accepts() {
        let backend = ImageBackend::new();
        let png = ConversionService::image(ImageFormat::Png);
        assert!(backend.accepts(Some(Format::Image(ImageFormat::Heic)), &png));
        assert!(backend.accepts(Some(Format::Document(DocumentFormat::Pdf)), &png));
        assert!(!backend.accepts(Some(Format::Document(DocumentFormat::Markdown)), &png));
        assert!(!backend.accepts(None, &png));
        assert!(!backend.accepts(
            Some(Format::Image(ImageFormat::Png)),
            &ConversionService::image(ImageFormat::Psd)
        ));
    }
}
