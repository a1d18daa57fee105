//! Animated GIF encoding with a generated palette.

use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::ConversionContext;
use crate::converter::{execute, ConverterError};
use crate::format::{Format, VideoFormat};
use crate::options::GifOptions;
use crate::process::ToolInvocation;
use crate::tempfiles::JobWorkspace;
use crate::tools::ToolHandle;

fn base_filter(options: &GifOptions) -> String {
    format!(
        "fps={},scale={}:-1:flags=lanczos",
        options.effective_fps(),
        options.effective_width()
    )
}

/// Stage A: derive an optimal 256 colour palette from the source.
pub fn palette_args(input: &Path, palette: &Path, options: &GifOptions) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-vf".to_string(),
        format!("{},palettegen", base_filter(options)),
        palette.to_string_lossy().to_string(),
    ]
}

/// Stage B: re-read source and palette into a looping animation.
pub fn render_args(input: &Path, palette: &Path, output: &Path, options: &GifOptions) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-i".to_string(),
        palette.to_string_lossy().to_string(),
        "-lavfi".to_string(),
        format!("{} [x]; [x][1:v] paletteuse", base_filter(options)),
        "-loop".to_string(),
        "0".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Single stage encode with ffmpeg's default palette.
pub fn direct_args(input: &Path, output: &Path, options: &GifOptions) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-vf".to_string(),
        base_filter(options),
        "-loop".to_string(),
        "0".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Encodes `input` as an animated GIF at `output`.
///
/// With palette generation enabled the palette image is a scratch file,
/// removed after stage B whether it succeeded or not.
pub async fn encode(
    ctx: &ConversionContext,
    ffmpeg: &ToolHandle,
    input: &Path,
    output: &Path,
    options: &GifOptions,
    workspace: &mut JobWorkspace,
    cancel: &CancellationToken,
) -> Result<(), ConverterError> {
    let target = Some(Format::Video(VideoFormat::Gif));

    if !options.palette {
        let mut invocation = ToolInvocation::new(ffmpeg);
        invocation.args(direct_args(input, output, options));
        execute(ctx, &invocation, target, Some(output), cancel).await?;
        return Ok(());
    }

    let palette = workspace.scratch_file("png")?;
    let result = async {
        let mut stage_a = ToolInvocation::new(ffmpeg);
        stage_a.args(palette_args(input, &palette, options));
        debug!(input = %input.display(), "GIF: generating palette");
        execute(ctx, &stage_a, None, Some(&palette), cancel).await?;

        let mut stage_b = ToolInvocation::new(ffmpeg);
        stage_b.args(render_args(input, &palette, output, options));
        debug!(input = %input.display(), "GIF: rendering with palette");
        execute(ctx, &stage_b, target, Some(output), cancel).await?;
        Ok(())
    }
    .await;

    workspace.release(&palette);
    result
}
