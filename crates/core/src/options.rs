//! Backend option bags and their validation.
//!
//! Options that do not apply to the chosen output are ignored (logged at
//! debug). Values outside their documented range are rejected, never
//! clamped. The only fallbacks are the explicit defaults (PDF DPI, GIF fps
//! and width, OCR language).

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compat::{BackendKind, ConversionService};
use crate::converter::ConverterError;
use crate::format::{ArchiveFormat, AudioFormat, DocumentFormat, Format, ImageFormat, VideoEncoder, VideoFormat};

/// DPI used to rasterise PDF pages for image export.
pub const DEFAULT_PDF_DPI: u32 = 150;
/// DPI used to rasterise PDF pages for recognition.
pub const DEFAULT_OCR_DPI: u32 = 300;
pub const DEFAULT_GIF_FPS: u32 = 15;
pub const DEFAULT_GIF_WIDTH: u32 = 480;

const PDF_DPI_RANGE: (u32, u32) = (36, 1200);

/// PDF engines pandoc may be pointed at.
pub const PDF_ENGINES: &[&str] = &[
    "pdflatex",
    "xelatex",
    "lualatex",
    "tectonic",
    "wkhtmltopdf",
    "weasyprint",
    "typst",
];

static OCR_LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_]{3,}(\+[a-z_]{3,})*$").expect("valid regex"));

/// All options for one conversion. Only the section matching the service's
/// backend is consulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    pub image: ImageOptions,
    pub audio: AudioOptions,
    pub video: VideoOptions,
    pub document: DocumentOptions,
    pub archive: ArchiveOptions,
    pub ocr: OcrOptions,
    pub speech: SpeechOptions,
}

impl ConversionOptions {
    /// Validates the section relevant to `service`.
    pub fn validate(&self, service: &ConversionService) -> Result<(), ConverterError> {
        match (service.backend, service.format) {
            (BackendKind::Document, Format::Document(f)) => self.document.validate(f),
            (BackendKind::Image, Format::Image(f)) => self.image.validate(f),
            (BackendKind::Media, Format::Audio(f)) => self.audio.validate(f),
            (BackendKind::Media, Format::Video(f)) => self.video.validate(f),
            (BackendKind::Archive, Format::Archive(f)) => self.archive.validate(f),
            (BackendKind::Ocr, Format::Ocr(_)) => self.ocr.validate(),
            (BackendKind::Speech, Format::Audio(_)) => self.speech.validate(),
            _ => Err(ConverterError::invalid_options(format!(
                "service {} has no matching option set",
                service
            ))),
        }
    }
}

fn check_range<T: PartialOrd + std::fmt::Display + Copy>(
    name: &str,
    value: Option<T>,
    (min, max): (T, T),
) -> Result<(), ConverterError> {
    match value {
        Some(v) if v < min || v > max => Err(ConverterError::invalid_options(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, v
        ))),
        _ => Ok(()),
    }
}

fn ignored(option: &str, target: impl std::fmt::Display) {
    debug!(option, target = %target, "Option does not apply, ignoring");
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    /// Encoder quality, 1-100.
    pub quality: Option<u8>,
    /// Lossless mode for WebP, AVIF and HEIC.
    pub lossless: bool,
    /// Remove EXIF and other profiles.
    pub strip_metadata: bool,
    /// Rasterisation density for PDF input.
    pub pdf_dpi: Option<u32>,
}

impl ImageOptions {
    pub fn validate(&self, format: ImageFormat) -> Result<(), ConverterError> {
        check_range("image.quality", self.quality, (1, 100))?;
        check_range("image.pdf_dpi", self.pdf_dpi, PDF_DPI_RANGE)?;
        if self.lossless && !format.has_lossless_mode() {
            ignored("image.lossless", format.id());
        }
        if self.strip_metadata && !format.supports_exif() {
            ignored("image.strip_metadata", format.id());
        }
        Ok(())
    }

    pub fn effective_pdf_dpi(&self) -> u32 {
        self.pdf_dpi.unwrap_or(DEFAULT_PDF_DPI)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioOptions {
    pub bitrate_kbps: Option<u32>,
    pub sample_rate: Option<u32>,
    /// Bits per sample, lossless outputs only.
    pub sample_size: Option<u8>,
    pub channels: Option<u8>,
    /// Variable bitrate for MP3, Vorbis and Opus.
    pub vbr: bool,
}

impl AudioOptions {
    pub fn validate(&self, format: AudioFormat) -> Result<(), ConverterError> {
        if !format.is_writable() {
            return Err(ConverterError::invalid_options(format!(
                "{} cannot be written",
                format.display_name()
            )));
        }

        if let Some(bitrate) = self.bitrate_kbps {
            if format.is_lossless() {
                ignored("audio.bitrate_kbps", format.id());
            } else if !format.bitrates().contains(&bitrate) {
                return Err(ConverterError::invalid_options(format!(
                    "{} kbps is not a valid {} bitrate (valid: {:?})",
                    bitrate,
                    format.display_name(),
                    format.bitrates()
                )));
            }
        }

        if let Some(rate) = self.sample_rate {
            if !format.sample_rates().contains(&rate) {
                return Err(ConverterError::invalid_options(format!(
                    "{} Hz is not supported by {} (valid: {:?})",
                    rate,
                    format.display_name(),
                    format.sample_rates()
                )));
            }
        }

        if let Some(size) = self.sample_size {
            if format.is_lossy() {
                ignored("audio.sample_size", format.id());
            } else if !format.sample_sizes().contains(&size) {
                return Err(ConverterError::invalid_options(format!(
                    "{}-bit is not supported by {} (valid: {:?})",
                    size,
                    format.display_name(),
                    format.sample_sizes()
                )));
            }
        }

        check_range("audio.channels", self.channels, (1, 2))?;

        if self.vbr && !format.supports_vbr() {
            ignored("audio.vbr", format.id());
        }
        Ok(())
    }
}

/// Target height for video scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "original")]
    Original,
    #[serde(rename = "2160")]
    P2160,
    #[serde(rename = "1440")]
    P1440,
    #[serde(rename = "1080")]
    P1080,
    #[serde(rename = "720")]
    P720,
    #[serde(rename = "480")]
    P480,
    #[serde(rename = "360")]
    P360,
}

impl Resolution {
    pub fn height(&self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::P2160 => Some(2160),
            Self::P1440 => Some(1440),
            Self::P1080 => Some(1080),
            Self::P720 => Some(720),
            Self::P480 => Some(480),
            Self::P360 => Some(360),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoQuality {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GifOptions {
    /// Two-stage palette generation for better colours.
    pub palette: bool,
    pub fps: Option<u32>,
    pub width: Option<u32>,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            palette: true,
            fps: None,
            width: None,
        }
    }
}

impl GifOptions {
    pub fn effective_fps(&self) -> u32 {
        self.fps.unwrap_or(DEFAULT_GIF_FPS)
    }

    pub fn effective_width(&self) -> u32 {
        self.width.unwrap_or(DEFAULT_GIF_WIDTH)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoOptions {
    pub resolution: Resolution,
    pub quality: VideoQuality,
    /// Defaults to the container's preferred encoder.
    pub encoder: Option<VideoEncoder>,
    /// Target bitrate; replaces the quality setting and is required for
    /// two-pass encoding.
    pub bitrate_kbps: Option<u32>,
    pub two_pass: bool,
    pub fps: Option<u32>,
    pub gif: GifOptions,
}

impl VideoOptions {
    pub fn validate(&self, format: VideoFormat) -> Result<(), ConverterError> {
        if !format.is_writable() {
            return Err(ConverterError::invalid_options(format!(
                "{} cannot be written",
                format.display_name()
            )));
        }

        if format == VideoFormat::Gif {
            check_range("video.gif.fps", self.gif.fps, (1, 50))?;
            check_range("video.gif.width", self.gif.width, (16, 3840))?;
            if self.two_pass || self.encoder.is_some() {
                ignored("video.encoder/two_pass", format.id());
            }
            return Ok(());
        }

        if let Some(encoder) = self.encoder {
            if !format.encoders().contains(&encoder) {
                return Err(ConverterError::invalid_options(format!(
                    "{} cannot carry {:?}",
                    format.display_name(),
                    encoder
                )));
            }
        }
        check_range("video.fps", self.fps, (1, 120))?;
        check_range("video.bitrate_kbps", self.bitrate_kbps, (100, 200_000))?;

        if self.two_pass {
            if self.bitrate_kbps.is_none() {
                return Err(ConverterError::invalid_options(
                    "two-pass encoding needs video.bitrate_kbps",
                ));
            }
            if let Some(encoder) = self.effective_encoder(format) {
                if !encoder.supports_two_pass() {
                    return Err(ConverterError::invalid_options(format!(
                        "{:?} does not support two-pass encoding",
                        encoder
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn effective_encoder(&self, format: VideoFormat) -> Option<VideoEncoder> {
        self.encoder.or_else(|| format.default_encoder())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentOptions {
    pub pdf_engine: Option<String>,
    pub table_of_contents: bool,
    pub standalone: bool,
}

impl DocumentOptions {
    pub fn validate(&self, format: DocumentFormat) -> Result<(), ConverterError> {
        if format.writer().is_none() {
            return Err(ConverterError::invalid_options(format!(
                "{} cannot be written",
                format.display_name()
            )));
        }
        if let Some(engine) = &self.pdf_engine {
            if format != DocumentFormat::Pdf {
                ignored("document.pdf_engine", format.id());
            } else if !PDF_ENGINES.contains(&engine.as_str()) {
                return Err(ConverterError::invalid_options(format!(
                    "unknown PDF engine {:?} (valid: {})",
                    engine,
                    PDF_ENGINES.join(", ")
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveOptions {
    pub compression_level: Option<u8>,
    /// One archive per input instead of a single bundle.
    pub separate: bool,
    /// Run the archiver's integrity check after creation.
    pub verify: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            compression_level: None,
            separate: false,
            verify: true,
        }
    }
}

impl ArchiveOptions {
    pub fn validate(&self, format: ArchiveFormat) -> Result<(), ConverterError> {
        match (self.compression_level, format.compression_levels()) {
            (Some(_), None) => ignored("archive.compression_level", format.id()),
            (level, Some(range)) => check_range("archive.compression_level", level, range)?,
            (None, None) => {}
        }
        Ok(())
    }

    /// Level passed to the archiver, `None` for uncompressed formats.
    pub fn effective_level(&self, format: ArchiveFormat) -> Option<u8> {
        format.compression_levels().and(self.compression_level)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionLevel {
    /// Single uniform block of text.
    Fast,
    /// Full automatic page segmentation.
    #[default]
    Accurate,
}

impl RecognitionLevel {
    /// tesseract page segmentation mode.
    pub fn psm(&self) -> &'static str {
        match self {
            Self::Fast => "6",
            Self::Accurate => "3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrOptions {
    /// tesseract language codes joined with `+`, e.g. `eng+deu`.
    pub language: String,
    pub level: RecognitionLevel,
    pub pdf_dpi: Option<u32>,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            level: RecognitionLevel::default(),
            pdf_dpi: None,
        }
    }
}

impl OcrOptions {
    pub fn validate(&self) -> Result<(), ConverterError> {
        if !OCR_LANGUAGE.is_match(&self.language) {
            return Err(ConverterError::invalid_options(format!(
                "invalid OCR language {:?}",
                self.language
            )));
        }
        check_range("ocr.pdf_dpi", self.pdf_dpi, PDF_DPI_RANGE)
    }

    pub fn effective_pdf_dpi(&self) -> u32 {
        self.pdf_dpi.unwrap_or(DEFAULT_OCR_DPI)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechOptions {
    pub voice: Option<String>,
    /// Words per minute.
    pub rate: Option<u32>,
}

impl SpeechOptions {
    pub fn validate(&self) -> Result<(), ConverterError> {
        if let Some(voice) = &self.voice {
            if voice.trim().is_empty() {
                return Err(ConverterError::invalid_options("speech.voice is empty"));
            }
        }
        check_range("speech.rate", self.rate, (50, 500))
    }
}
