//! The tagged `Format` union plus the OCR and archive catalogs.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::document::DocumentFormat;
use super::image::ImageFormat;
use super::media::{AudioFormat, VideoFormat};

/// Text recognition outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrFormat {
    /// Plain text recognised from pixels.
    Text,
    /// hOCR markup with word boxes.
    Hocr,
    /// PDF with an invisible text layer.
    SearchablePdf,
    /// Plain text pulled from a PDF's embedded text layer, no recognition.
    ExtractedText,
}

impl OcrFormat {
    pub const ALL: &'static [OcrFormat] = &[
        Self::Text,
        Self::Hocr,
        Self::SearchablePdf,
        Self::ExtractedText,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Hocr => "hocr",
            Self::SearchablePdf => "searchable_pdf",
            Self::ExtractedText => "extract_text",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Text => "Text (OCR)",
            Self::Hocr => "hOCR",
            Self::SearchablePdf => "Searchable PDF",
            Self::ExtractedText => "Text (extract)",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Text | Self::ExtractedText => &["txt"],
            Self::Hocr => &["hocr"],
            Self::SearchablePdf => &["pdf"],
        }
    }

    /// tesseract output config name, `None` for plain text.
    pub fn tesseract_config(&self) -> Option<&'static str> {
        match self {
            Self::Hocr => Some("hocr"),
            Self::SearchablePdf => Some("pdf"),
            Self::Text | Self::ExtractedText => None,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.id() == id)
    }
}

/// Archive containers produced by the system archivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
}

impl ArchiveFormat {
    pub const ALL: &'static [ArchiveFormat] = &[
        Self::Zip,
        Self::Tar,
        Self::TarGz,
        Self::TarBz2,
        Self::TarXz,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::TarBz2 => "tar.bz2",
            Self::TarXz => "tar.xz",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Zip => "ZIP Archive",
            Self::Tar => "Tar Archive",
            Self::TarGz => "Tar + Gzip",
            Self::TarBz2 => "Tar + Bzip2",
            Self::TarXz => "Tar + XZ",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Zip => &["zip"],
            Self::Tar => &["tar"],
            Self::TarGz => &["tar.gz", "tgz"],
            Self::TarBz2 => &["tar.bz2", "tbz2"],
            Self::TarXz => &["tar.xz", "txz"],
        }
    }

    /// Inclusive range of accepted compression levels, `None` when the
    /// container is uncompressed.
    pub fn compression_levels(&self) -> Option<(u8, u8)> {
        match self {
            Self::Zip => Some((0, 9)),
            Self::Tar => None,
            Self::TarGz | Self::TarBz2 => Some((1, 9)),
            Self::TarXz => Some((0, 9)),
        }
    }

    /// Compressor program for tar formats.
    pub fn compressor(&self) -> Option<&'static str> {
        match self {
            Self::TarGz => Some("gzip"),
            Self::TarBz2 => Some("bzip2"),
            Self::TarXz => Some("xz"),
            Self::Zip | Self::Tar => None,
        }
    }

    /// tar short flag selecting the compressor.
    pub fn tar_flag(&self) -> Option<char> {
        match self {
            Self::TarGz => Some('z'),
            Self::TarBz2 => Some('j'),
            Self::TarXz => Some('J'),
            Self::Zip | Self::Tar => None,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.id() == id)
    }
}

/// A file format, tagged by domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "domain", content = "format", rename_all = "snake_case")]
pub enum Format {
    Document(DocumentFormat),
    Image(ImageFormat),
    Audio(AudioFormat),
    Video(VideoFormat),
    Ocr(OcrFormat),
    Archive(ArchiveFormat),
}

impl Format {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Document(f) => f.id(),
            Self::Image(f) => f.id(),
            Self::Audio(f) => f.id(),
            Self::Video(f) => f.id(),
            Self::Ocr(f) => f.id(),
            Self::Archive(f) => f.id(),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Document(f) => f.display_name(),
            Self::Image(f) => f.display_name(),
            Self::Audio(f) => f.display_name(),
            Self::Video(f) => f.display_name(),
            Self::Ocr(f) => f.display_name(),
            Self::Archive(f) => f.display_name(),
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Document(f) => f.extensions(),
            Self::Image(f) => f.extensions(),
            Self::Audio(f) => f.extensions(),
            Self::Video(f) => f.extensions(),
            Self::Ocr(f) => f.extensions(),
            Self::Archive(f) => f.extensions(),
        }
    }

    /// Preferred extension for files written in this format.
    pub fn extension(&self) -> &'static str {
        self.extensions().first().copied().unwrap_or("bin")
    }

    pub fn is_lossy(&self) -> bool {
        match self {
            Self::Image(f) => f.is_lossy(),
            Self::Audio(f) => f.is_lossy(),
            Self::Video(_) => true,
            Self::Document(_) | Self::Ocr(_) | Self::Archive(_) => false,
        }
    }

    pub fn is_pdf(&self) -> bool {
        matches!(
            self,
            Self::Document(DocumentFormat::Pdf) | Self::Image(ImageFormat::Pdf)
        )
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio(_))
    }

    pub fn is_media(&self) -> bool {
        matches!(self, Self::Audio(_) | Self::Video(_))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let domain = match self {
            Self::Document(_) => "document",
            Self::Image(_) => "image",
            Self::Audio(_) => "audio",
            Self::Video(_) => "video",
            Self::Ocr(_) => "ocr",
            Self::Archive(_) => "archive",
        };
        write!(f, "{}:{}", domain, self.id())
    }
}
