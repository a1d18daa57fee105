//! Conversion services: a backend paired with an output format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::format::{ArchiveFormat, AudioFormat, DocumentFormat, Format, ImageFormat, OcrFormat, VideoFormat};

/// Backend families. Declaration order is the menu section order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Document,
    Image,
    Media,
    Ocr,
    Speech,
    Archive,
}

impl BackendKind {
    pub const ALL: &'static [BackendKind] = &[
        Self::Document,
        Self::Image,
        Self::Media,
        Self::Ocr,
        Self::Speech,
        Self::Archive,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Image => "image",
            Self::Media => "media",
            Self::Ocr => "ocr",
            Self::Speech => "speech",
            Self::Archive => "archive",
        }
    }

    /// Section heading in grouped menus.
    pub fn section_title(&self) -> &'static str {
        match self {
            Self::Document => "Documents",
            Self::Image => "Images",
            Self::Media => "Audio & Video",
            Self::Ocr => "Text Recognition",
            Self::Speech => "Speech",
            Self::Archive => "Archives",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.id() == id)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A (backend, output format) pair chosen by the caller.
///
/// Parses from and displays as `<backend>:<format-id>`, e.g. `media:mp4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ConversionService {
    pub backend: BackendKind,
    pub format: Format,
}

impl ConversionService {
    pub fn document(format: DocumentFormat) -> Self {
        Self {
            backend: BackendKind::Document,
            format: Format::Document(format),
        }
    }

    pub fn image(format: ImageFormat) -> Self {
        Self {
            backend: BackendKind::Image,
            format: Format::Image(format),
        }
    }

    pub fn audio(format: AudioFormat) -> Self {
        Self {
            backend: BackendKind::Media,
            format: Format::Audio(format),
        }
    }

    pub fn video(format: VideoFormat) -> Self {
        Self {
            backend: BackendKind::Media,
            format: Format::Video(format),
        }
    }

    pub fn ocr(format: OcrFormat) -> Self {
        Self {
            backend: BackendKind::Ocr,
            format: Format::Ocr(format),
        }
    }

    pub fn speech(format: AudioFormat) -> Self {
        Self {
            backend: BackendKind::Speech,
            format: Format::Audio(format),
        }
    }

    pub fn archive(format: ArchiveFormat) -> Self {
        Self {
            backend: BackendKind::Archive,
            format: Format::Archive(format),
        }
    }

    pub fn display_name(&self) -> String {
        match (self.backend, self.format) {
            (BackendKind::Speech, format) => format!("Speech: {}", format.display_name()),
            (BackendKind::Image, Format::Image(ImageFormat::Pdf)) => "PDF (merge pages)".to_string(),
            (_, format) => format.display_name().to_string(),
        }
    }

    /// Whether one job consumes the whole batch. Archives always do; the
    /// image PDF service merges when every input is itself a PDF.
    pub fn merges_inputs(&self, all_pdf: bool) -> bool {
        match (self.backend, self.format) {
            (BackendKind::Archive, _) => true,
            (BackendKind::Image, Format::Image(ImageFormat::Pdf)) => all_pdf,
            _ => false,
        }
    }

    fn parse_format(backend: BackendKind, id: &str) -> Option<Format> {
        match backend {
            BackendKind::Document => DocumentFormat::from_id(id).map(Format::Document),
            BackendKind::Image => ImageFormat::from_id(id).map(Format::Image),
            BackendKind::Media => AudioFormat::from_id(id)
                .map(Format::Audio)
                .or_else(|| VideoFormat::from_id(id).map(Format::Video)),
            BackendKind::Ocr => OcrFormat::from_id(id).map(Format::Ocr),
            BackendKind::Speech => AudioFormat::from_id(id).map(Format::Audio),
            BackendKind::Archive => ArchiveFormat::from_id(id).map(Format::Archive),
        }
    }
}

impl fmt::Display for ConversionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.format.id())
    }
}

/// Error returned when a service id cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown conversion service: {0}")]
pub struct ParseServiceError(pub String);

impl FromStr for ConversionService {
    type Err = ParseServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (backend, id) = s
            .split_once(':')
            .ok_or_else(|| ParseServiceError(s.to_string()))?;
        let backend = BackendKind::from_id(backend.trim())
            .ok_or_else(|| ParseServiceError(s.to_string()))?;
        let format = Self::parse_format(backend, id.trim().to_ascii_lowercase().as_str())
            .ok_or_else(|| ParseServiceError(s.to_string()))?;
        Ok(Self { backend, format })
    }
}

impl From<ConversionService> for String {
    fn from(service: ConversionService) -> Self {
        service.to_string()
    }
}

impl TryFrom<String> for ConversionService {
    type Error = ParseServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
