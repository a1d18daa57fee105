//! Multi-page and multi-frame image export.
//!
//! ImageMagick writes one file per page or frame when the target cannot hold
//! several, numbering them `base-0.ext`, `base-1.ext`, ... next to the
//! requested output. Single page sources get the plain name instead.

use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::ConversionContext;
use crate::converter::image::image_args;
use crate::converter::{execute, file_stem, ConverterError};
use crate::format::{Format, ImageFormat};
use crate::options::ImageOptions;
use crate::process::ToolInvocation;
use crate::tools::Tool;

/// The tool's numbered output for zero-based index `n`.
pub fn numbered_output(output: &Path, n: usize) -> PathBuf {
    let stem = file_stem(output);
    let name = match output.extension() {
        Some(ext) => format!("{}-{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}-{}", stem, n),
    };
    output.with_file_name(name)
}

/// Final name for zero-based index `n`, e.g. `report-page1.png`.
pub fn labelled_output(output: &Path, label: &str, n: usize) -> PathBuf {
    let stem = file_stem(output);
    let name = match output.extension() {
        Some(ext) => format!("{}-{}{}.{}", stem, label, n + 1, ext.to_string_lossy()),
        None => format!("{}-{}{}", stem, label, n + 1),
    };
    output.with_file_name(name)
}

/// Gathers the files written for `output`, in page order.
///
/// Numbered candidates are probed from 0 until the first gap and renamed to
/// their labelled names. Without any numbered file the plain output is the
/// single result; if that is missing too the run produced nothing.
pub fn collect_pages(output: &Path, label: &str) -> Result<Vec<PathBuf>, ConverterError> {
    let mut pages = Vec::new();
    for n in 0.. {
        let candidate = numbered_output(output, n);
        if !candidate.exists() {
            break;
        }
        let renamed = labelled_output(output, label, n);
        std::fs::rename(&candidate, &renamed)?;
        pages.push(renamed);
    }

    if !pages.is_empty() {
        debug!(output = %output.display(), count = pages.len(), "Collected numbered outputs");
        return Ok(pages);
    }
    if output.exists() {
        return Ok(vec![output.to_path_buf()]);
    }
    Err(ConverterError::OutputMissing {
        path: output.to_path_buf(),
    })
}

/// Rasterises every page of `pdf` into `dir` as PNG at `dpi`.
pub async fn rasterize(
    ctx: &ConversionContext,
    pdf: &Path,
    dir: &Path,
    dpi: u32,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>, ConverterError> {
    let magick = ctx.tools.locate(Tool::ImageMagick)?;
    let output = dir.join(format!("{}.png", file_stem(pdf)));
    let options = ImageOptions {
        pdf_dpi: Some(dpi),
        ..Default::default()
    };

    let mut invocation = ToolInvocation::new(&magick);
    invocation.args(image_args(
        &[pdf],
        &output,
        ImageFormat::Png,
        &options,
        true,
    ));
    execute(
        ctx,
        &invocation,
        Some(Format::Image(ImageFormat::Png)),
        Some(&output),
        cancel,
    )
    .await?;

    collect_pages(&output, "page")
}
