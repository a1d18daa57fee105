//! Text to speech backend.
//!
//! Synthesis runs through `say` where available and espeak-ng elsewhere.
//! Each engine writes one native container; any other target is transcoded
//! from a scratch file with ffmpeg.

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ConverterError;
use super::exec::execute;
use super::media::audio_args;
use super::traits::Backend;
use super::types::{ConversionRequest, ConvertedArtifact};
use crate::compat::{BackendKind, ConversionService};
use crate::context::ConversionContext;
use crate::format::{AudioFormat, DocumentFormat, Format};
use crate::options::{AudioOptions, SpeechOptions};
use crate::process::ToolInvocation;
use crate::tempfiles::JobWorkspace;
use crate::tools::{Tool, ToolHandle};

/// Synthesis engine, picked from the resolved executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEngine {
    Say,
    Espeak,
}

impl SpeechEngine {
    pub fn for_handle(handle: &ToolHandle) -> Self {
        if handle.program_name() == "say" {
            Self::Say
        } else {
            Self::Espeak
        }
    }

    /// Container the engine writes natively.
    pub fn native_format(&self) -> AudioFormat {
        match self {
            Self::Say => AudioFormat::Aiff,
            Self::Espeak => AudioFormat::Wav,
        }
    }

    pub fn args(&self, input: &Path, output: &Path, options: &SpeechOptions) -> Vec<String> {
        let (voice_flag, rate_flag, output_flag) = match self {
            Self::Say => ("-v", "-r", "-o"),
            Self::Espeak => ("-v", "-s", "-w"),
        };
        let mut args = Vec::new();
        if let Some(voice) = &options.voice {
            args.extend([voice_flag.to_string(), voice.clone()]);
        }
        if let Some(rate) = options.rate {
            args.extend([rate_flag.to_string(), rate.to_string()]);
        }
        args.extend([
            output_flag.to_string(),
            output.to_string_lossy().to_string(),
            "-f".to_string(),
            input.to_string_lossy().to_string(),
        ]);
        args
    }
}

#[derive(Debug, Default, Clone)]
pub struct SpeechBackend;

impl SpeechBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for SpeechBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Speech
    }

    fn name(&self) -> &str {
        "speech"
    }

    fn accepts(&self, input: Option<Format>, service: &ConversionService) -> bool {
        input == Some(Format::Document(DocumentFormat::PlainText))
            && matches!(service.format, Format::Audio(f) if f.is_writable())
    }

    async fn convert(
        &self,
        ctx: &ConversionContext,
        request: &ConversionRequest,
        workspace: &mut JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConvertedArtifact>, ConverterError> {
        let (input, _) = request.single_input()?;
        let Format::Audio(target) = request.target() else {
            return Err(ConverterError::unsupported(input, request.service));
        };
        let handle = ctx.tools.locate(Tool::Speech)?;
        let engine = SpeechEngine::for_handle(&handle);
        let output = workspace.output_path(&request.output_name_for(input));
        let native = engine.native_format();

        if target == native {
            let mut invocation = ToolInvocation::new(&handle);
            invocation.args(engine.args(input, &output, &request.options.speech));
            execute(ctx, &invocation, Some(request.target()), Some(&output), cancel).await?;
        } else {
            let ffmpeg = ctx.tools.locate(Tool::Ffmpeg)?;
            let spoken = workspace.scratch_file(native.id())?;
            let result = async {
                let mut synth = ToolInvocation::new(&handle);
                synth.args(engine.args(input, &spoken, &request.options.speech));
                execute(ctx, &synth, Some(Format::Audio(native)), Some(&spoken), cancel).await?;

                debug!(from = native.id(), to = target.id(), "Transcoding synthesised speech");
                let mut transcode = ToolInvocation::new(&ffmpeg);
                transcode.args(audio_args(&spoken, &output, target, &AudioOptions::default()));
                execute(ctx, &transcode, Some(request.target()), Some(&output), cancel).await?;
                Ok::<_, ConverterError>(())
            }
            .await;
            workspace.release(&spoken);
            result?;
        }

        Ok(vec![ConvertedArtifact::from_output(
            request.inputs.clone(),
            output,
            request.target(),
        )?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn handle(path: &str) -> ToolHandle {
        ToolHandle {
            tool: Tool::Speech,
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_engine_from_program() {
        assert_eq!(SpeechEngine::for_handle(&handle("/usr/bin/say")), SpeechEngine::Say);
        assert_eq!(
            SpeechEngine::for_handle(&handle("/usr/bin/espeak-ng")),
            SpeechEngine::Espeak
        );
        assert_eq!(SpeechEngine::Espeak.native_format(), AudioFormat::Wav);
    }

    #[test]
    fn test_say_args() {
        let options = SpeechOptions {
            voice: Some("Samantha".to_string()),
            rate: Some(180),
        };
        let args = SpeechEngine::Say.args(Path::new("/in.txt"), Path::new("/out.aiff"), &options);
        assert_eq!(
            args,
            ["-v", "Samantha", "-r", "180", "-o", "/out.aiff", "-f", "/in.txt"]
        );
    }

    #[test]
    fn test_espeak_args() {
        let options = SpeechOptions {
            voice: None,
            rate: Some(120),
        };
        let args = SpeechEngine::Espeak.args(Path::new("/in.txt"), Path::new("/out.wav"), &options);
        assert_eq!(args, ["-s", "120", "-w", "/out.wav", "-f", "/in.txt"]);
    }

    #[test]
    fn test_accepts_plain_text_only() {
        let backend = SpeechBackend::new();
        let mp3 = ConversionService::speech(AudioFormat::Mp3);
        assert!(backend.accepts(Some(Format::Document(DocumentFormat::PlainText)), &mp3));
        assert!(!backend.accepts(Some(Format::Document(DocumentFormat::Markdown)), &mp3));
        assert!(!backend.accepts(None, &mp3));
    }
}
