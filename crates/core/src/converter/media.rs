//! ffmpeg backend for audio and video.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::ConverterError;
use super::exec::execute;
use super::traits::Backend;
use super::types::{ConversionRequest, ConvertedArtifact};
use crate::compat::{BackendKind, ConversionService};
use crate::context::ConversionContext;
use crate::format::{AudioFormat, Format, VideoEncoder, VideoFormat};
use crate::options::{AudioOptions, VideoOptions, VideoQuality};
use crate::pipeline::{gif, two_pass};
use crate::process::ToolInvocation;
use crate::tempfiles::JobWorkspace;
use crate::tools::Tool;

/// Information about a media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_secs: f64,
    /// Container format name (e.g., "matroska", "mp3").
    pub format: String,
    pub audio_codec: Option<String>,
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u8>,
    pub video_codec: Option<String>,
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    pub video_fps: Option<f32>,
}

impl MediaInfo {
    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }
}

/// Parses `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, ConverterError> {
    #[derive(Deserialize)]
    struct ProbeOutput {
        format: ProbeFormat,
        #[serde(default)]
        streams: Vec<ProbeStream>,
    }

    #[derive(Deserialize)]
    struct ProbeFormat {
        format_name: String,
        duration: Option<String>,
        size: Option<String>,
    }

    #[derive(Deserialize)]
    struct ProbeStream {
        codec_type: String,
        codec_name: Option<String>,
        sample_rate: Option<String>,
        channels: Option<u8>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        #[serde(default)]
        disposition: ProbeDisposition,
    }

    #[derive(Deserialize, Default)]
    struct ProbeDisposition {
        #[serde(default)]
        attached_pic: u8,
    }

    let probe: ProbeOutput = serde_json::from_str(output)
        .map_err(|e| ConverterError::probe_failed(format!("invalid ffprobe output: {}", e)))?;

    let audio = probe.streams.iter().find(|s| s.codec_type == "audio");
    // Cover art shows up as a video stream; it is not motion video.
    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video" && s.disposition.attached_pic == 0);

    Ok(MediaInfo {
        path: path.to_path_buf(),
        size_bytes: probe
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        duration_secs: probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0.0),
        format: probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown")
            .to_string(),
        audio_codec: audio.and_then(|s| s.codec_name.clone()),
        audio_sample_rate: audio
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|r| r.parse().ok()),
        audio_channels: audio.and_then(|s| s.channels),
        video_codec: video.and_then(|s| s.codec_name.clone()),
        video_width: video.and_then(|s| s.width),
        video_height: video.and_then(|s| s.height),
        video_fps: video
            .and_then(|s| s.r_frame_rate.as_deref())
            .and_then(parse_frame_rate),
    })
}

/// Parses rates like "24000/1001" or "30".
fn parse_frame_rate(rate: &str) -> Option<f32> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f32 = num.parse().ok()?;
            let den: f32 = den.parse().ok()?;
            (den > 0.0).then(|| num / den)
        }
        None => rate.parse().ok(),
    }
}

/// Inspects `path` with ffprobe under process supervision.
pub async fn probe(
    ctx: &ConversionContext,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<MediaInfo, ConverterError> {
    let handle = ctx.tools.locate(Tool::Ffprobe)?;
    let mut invocation = ToolInvocation::new(&handle);
    invocation
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .path(path);

    let outcome = ctx.processes.run(&invocation, cancel).await?;
    if !outcome.success() {
        return Err(ConverterError::probe_failed(format!(
            "ffprobe exited with {:?}: {}",
            outcome.exit_code,
            outcome.stderr.trim()
        )));
    }
    parse_probe_output(path, &outcome.stdout)
}

/// Builds ffmpeg arguments for an audio output.
pub fn audio_args(input: &Path, output: &Path, format: AudioFormat, options: &AudioOptions) -> Vec<String> {
    let sample_size = options.sample_size.filter(|_| format.is_lossless());
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-vn".to_string(),
        "-c:a".to_string(),
        format.ffmpeg_codec(sample_size).to_string(),
    ];

    if format.is_lossy() {
        let vbr = options.vbr && format.supports_vbr();
        match (format, vbr, options.bitrate_kbps) {
            (AudioFormat::Opus, true, bitrate) => {
                args.extend(["-vbr".to_string(), "on".to_string()]);
                if let Some(b) = bitrate {
                    args.extend(["-b:a".to_string(), format!("{}k", b)]);
                }
            }
            (AudioFormat::Mp3, true, _) => args.extend(["-q:a".to_string(), "2".to_string()]),
            (AudioFormat::Vorbis, true, _) => args.extend(["-q:a".to_string(), "6".to_string()]),
            (_, _, Some(b)) => args.extend(["-b:a".to_string(), format!("{}k", b)]),
            _ => {}
        }
    }

    if let Some(rate) = options.sample_rate {
        args.extend(["-ar".to_string(), rate.to_string()]);
    }
    if let Some(channels) = options.channels {
        args.extend(["-ac".to_string(), channels.to_string()]);
    }

    // PCM picks depth through the codec; FLAC and ALAC through the sample format
    let sample_fmt = match (format, sample_size) {
        (AudioFormat::Flac, Some(16)) => Some("s16"),
        (AudioFormat::Flac, Some(24)) => Some("s32"),
        (AudioFormat::Alac, Some(16)) => Some("s16p"),
        (AudioFormat::Alac, Some(24)) => Some("s32p"),
        _ => None,
    };
    if let Some(fmt) = sample_fmt {
        args.extend(["-sample_fmt".to_string(), fmt.to_string()]);
    }

    args.push(output.to_string_lossy().to_string());
    args
}

/// Encoder, rate control, scaling and frame rate arguments. Shared by the
/// single-pass encode and both passes of a two-pass encode.
pub fn video_codec_args(format: VideoFormat, options: &VideoOptions) -> Vec<String> {
    let mut args = Vec::new();
    let Some(encoder) = options.effective_encoder(format) else {
        return args;
    };
    args.extend(["-c:v".to_string(), encoder.ffmpeg_codec().to_string()]);

    match (options.bitrate_kbps, encoder) {
        (Some(bitrate), _) => args.extend(["-b:v".to_string(), format!("{}k", bitrate)]),
        (None, VideoEncoder::H264 | VideoEncoder::Hevc) => {
            let crf = match options.quality {
                VideoQuality::Low => 28,
                VideoQuality::Medium => 23,
                VideoQuality::High => 18,
            };
            args.extend(["-crf".to_string(), crf.to_string()]);
        }
        (None, VideoEncoder::Vp9 | VideoEncoder::Av1) => {
            let crf = match options.quality {
                VideoQuality::Low => 38,
                VideoQuality::Medium => 31,
                VideoQuality::High => 24,
            };
            // Constant quality mode needs the bitrate cap disabled
            args.extend([
                "-crf".to_string(),
                crf.to_string(),
                "-b:v".to_string(),
                "0".to_string(),
            ]);
        }
        (None, VideoEncoder::ProRes) => {
            let profile = match options.quality {
                VideoQuality::Low => "0",
                VideoQuality::Medium => "2",
                VideoQuality::High => "3",
            };
            args.extend(["-profile:v".to_string(), profile.to_string()]);
        }
        (None, VideoEncoder::Mpeg4) => {
            let q = match options.quality {
                VideoQuality::Low => "8",
                VideoQuality::Medium => "5",
                VideoQuality::High => "2",
            };
            args.extend(["-q:v".to_string(), q.to_string()]);
        }
    }

    if encoder == VideoEncoder::Hevc && matches!(format, VideoFormat::Mp4 | VideoFormat::Mov) {
        args.extend(["-tag:v".to_string(), "hvc1".to_string()]);
    }

    if let Some(height) = options.resolution.height() {
        // Never upscale; -2 keeps the width even for the encoders
        args.extend([
            "-vf".to_string(),
            format!("scale=-2:'min({},ih)'", height),
        ]);
    }
    if let Some(fps) = options.fps {
        args.extend(["-r".to_string(), fps.to_string()]);
    }
    args
}

/// Container audio codec and muxer flags written after the codec arguments.
pub fn video_output_args(format: VideoFormat) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(codec) = format.audio_codec() {
        args.extend(["-c:a".to_string(), codec.to_string()]);
    }
    if matches!(format, VideoFormat::Mp4 | VideoFormat::Mov) {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }
    args
}

/// Builds ffmpeg arguments for a single-pass video output.
pub fn video_args(input: &Path, output: &Path, format: VideoFormat, options: &VideoOptions) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ];
    args.extend(video_codec_args(format, options));
    args.extend(video_output_args(format));
    args.push(output.to_string_lossy().to_string());
    args
}

/// ffmpeg executor. Audio-only inputs only produce audio.
#[derive(Debug, Default, Clone)]
pub struct MediaBackend;

impl MediaBackend {
    pub fn new() -> Self {
        Self
    }

    /// Rejects audio outputs for inputs without an audio stream. Skipped
    /// when ffprobe is unavailable.
    async fn check_audio_stream(
        &self,
        ctx: &ConversionContext,
        input: &Path,
        service: &ConversionService,
        cancel: &CancellationToken,
    ) -> Result<(), ConverterError> {
        match probe(ctx, input, cancel).await {
            Ok(info) if !info.has_audio() => {
                debug!(input = %input.display(), "Input has no audio stream");
                Err(ConverterError::unsupported(input, service))
            }
            Ok(_) => Ok(()),
            Err(ConverterError::ToolNotFound { .. }) => {
                warn!("ffprobe not available, skipping audio stream check");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Backend for MediaBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Media
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn accepts(&self, input: Option<Format>, service: &ConversionService) -> bool {
        match (input, service.format) {
            (Some(Format::Audio(_)), Format::Audio(out)) => out.is_writable(),
            (Some(Format::Video(_)), Format::Audio(out)) => out.is_writable(),
            (Some(Format::Video(_)), Format::Video(out)) => out.is_writable(),
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
        let (input, _) = request.single_input()?;
        let handle = ctx.tools.locate(Tool::Ffmpeg)?;
        let output = workspace.output_path(&request.output_name_for(input));
        let target = request.target();

        match target {
            Format::Audio(format) => {
                self.check_audio_stream(ctx, input, &request.service, cancel)
                    .await?;
                let mut invocation = ToolInvocation::new(&handle);
                invocation.args(audio_args(input, &output, format, &request.options.audio));
                execute(ctx, &invocation, Some(target), Some(&output), cancel).await?;
            }
            Format::Video(VideoFormat::Gif) => {
                gif::encode(ctx, &handle, input, &output, &request.options.video.gif, workspace, cancel)
                    .await?;
            }
            Format::Video(format) if request.options.video.two_pass => {
                two_pass::encode(ctx, &handle, input, &output, format, &request.options.video, workspace, cancel)
                    .await?;
            }
            Format::Video(format) => {
                let mut invocation = ToolInvocation::new(&handle);
                invocation.args(video_args(input, &output, format, &request.options.video));
                execute(ctx, &invocation, Some(target), Some(&output), cancel).await?;
            }
            _ => return Err(ConverterError::unsupported(input, request.service)),
        }

        Ok(vec![ConvertedArtifact::from_output(
            request.inputs.clone(),
            output,
            target,
        )?])
    }
}
