//! Two-pass video encoding.
//!
//! Pass 1 analyses the source and writes encoder statistics to a fresh
//! scratch directory, discarding its video. Pass 2 encodes for real with the
//! same codec arguments and the statistics. Both passes run from the
//! caller's working directory and address the statistics through an
//! absolute prefix. The statistics directory is removed once pass 2
//! finishes, whatever its outcome.

use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::ConversionContext;
use crate::converter::media::{video_codec_args, video_output_args};
use crate::converter::{execute, ConverterError};
use crate::format::{Format, VideoEncoder, VideoFormat};
use crate::options::VideoOptions;
use crate::process::ToolInvocation;
use crate::tempfiles::JobWorkspace;
use crate::tools::ToolHandle;

const STATS_PREFIX: &str = "ffmpeg2pass";

/// Arguments selecting `pass` and its statistics file.
pub fn pass_args(encoder: VideoEncoder, pass: u8, stats_prefix: &Path) -> Vec<String> {
    let stats = stats_prefix.to_string_lossy();
    match encoder {
        // libx265 ignores -pass/-passlogfile
        VideoEncoder::Hevc => vec![
            "-x265-params".to_string(),
            format!("pass={}:stats={}.log", pass, stats),
        ],
        _ => vec![
            "-pass".to_string(),
            pass.to_string(),
            "-passlogfile".to_string(),
            stats.to_string(),
        ],
    }
}

/// Builds both passes' argument vectors.
pub fn build_passes(
    input: &Path,
    output: &Path,
    format: VideoFormat,
    options: &VideoOptions,
    stats_prefix: &Path,
) -> Result<(Vec<String>, Vec<String>), ConverterError> {
    let encoder = options
        .effective_encoder(format)
        .filter(VideoEncoder::supports_two_pass)
        .ok_or_else(|| {
            ConverterError::invalid_options(format!(
                "{} has no encoder that supports two-pass encoding",
                format.display_name()
            ))
        })?;
    let codec = video_codec_args(format, options);
    let input = input.to_string_lossy().to_string();

    let mut first = vec!["-y".to_string(), "-i".to_string(), input.clone()];
    first.extend(codec.iter().cloned());
    first.extend(pass_args(encoder, 1, stats_prefix));
    first.extend(["-an", "-f", "null", "/dev/null"].map(String::from));

    let mut second = vec!["-y".to_string(), "-i".to_string(), input];
    second.extend(codec);
    second.extend(pass_args(encoder, 2, stats_prefix));
    second.extend(video_output_args(format));
    second.push(output.to_string_lossy().to_string());

    Ok((first, second))
}

/// Runs both passes, writing the result to `output`.
#[allow(clippy::too_many_arguments)]
pub async fn encode(
    ctx: &ConversionContext,
    ffmpeg: &ToolHandle,
    input: &Path,
    output: &Path,
    format: VideoFormat,
    options: &VideoOptions,
    workspace: &mut JobWorkspace,
    cancel: &CancellationToken,
) -> Result<(), ConverterError> {
    let stats_dir = workspace.scratch_dir()?;
    let stats_prefix = stats_dir.join(STATS_PREFIX);

    let result = async {
        let (first, second) = build_passes(input, output, format, options, &stats_prefix)?;

        let mut pass1 = ToolInvocation::new(ffmpeg);
        pass1.args(first);
        debug!(input = %input.display(), "Two-pass encode: analysis pass");
        execute(ctx, &pass1, None, None, cancel).await?;

        let mut pass2 = ToolInvocation::new(ffmpeg);
        pass2.args(second);
        debug!(input = %input.display(), "Two-pass encode: encoding pass");
        execute(ctx, &pass2, Some(Format::Video(format)), Some(output), cancel).await?;
        Ok(())
    }
    .await;

    workspace.release(&stats_dir);
    if result.is_ok() {
        info!(output = %output.display(), "Two-pass encode finished");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(encoder: Option<VideoEncoder>) -> VideoOptions {
        VideoOptions {
            encoder,
            bitrate_kbps: Some(3000),
            two_pass: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_passes_share_codec_args() {
        let (first, second) = build_passes(
            Path::new("/in.mov"),
            Path::new("/out.mp4"),
            VideoFormat::Mp4,
            &options(None),
            Path::new("/stats/ffmpeg2pass"),
        )
        .unwrap();

        let pass = |args: &[String]| args.windows(2).any(|w| w[0] == "-b:v" && w[1] == "3000k");
        assert!(pass(&first) && pass(&second));
        assert!(first.windows(2).any(|w| w[0] == "-pass" && w[1] == "1"));
        assert!(second.windows(2).any(|w| w[0] == "-pass" && w[1] == "2"));
        assert_eq!(first.last().unwrap(), "/dev/null");
        assert!(first.contains(&"-an".to_string()));
        assert_eq!(second.last().unwrap(), "/out.mp4");
        assert!(second.contains(&"/stats/ffmpeg2pass".to_string()));
    }

    #[test]
    fn test_hevc_uses_x265_params() {
        let (first, _) = build_passes(
            Path::new("/in.mov"),
            Path::new("/out.mkv"),
            VideoFormat::Mkv,
            &options(Some(VideoEncoder::Hevc)),
            Path::new("/s/p"),
        )
        .unwrap();
        assert!(first.contains(&"pass=1:stats=/s/p.log".to_string()));
        assert!(!first.contains(&"-passlogfile".to_string()));
    }

    #[test]
    fn test_prores_rejected() {
        let err = build_passes(
            Path::new("/in"),
            Path::new("/out.mov"),
            VideoFormat::Mov,
            &options(Some(VideoEncoder::ProRes)),
            Path::new("/s/p"),
        )
        .unwrap_err();
        assert!(matches!(err, ConverterError::InvalidOptions { .. }));
    }
}
