//! External tool discovery.
//!
//! The [`ToolLocator`] resolves and caches the executables each backend
//! drives. Resolution order for a tool is:
//!
//! 1. an explicit override path from `[tools.overrides]`, when it exists
//! 2. for [`LocateStrategy::SearchPath`] tools, a `which` probe over the
//!    candidate names, then every configured install prefix x candidate
//! 3. for [`LocateStrategy::Bundled`] tools, the bundled directory only

mod locator;

pub use locator::{ToolHandle, ToolInfo, ToolLocator};

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a tool's executable is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateStrategy {
    /// `PATH` first, then well-known install prefixes.
    SearchPath,
    /// Pinned build shipped next to the application.
    Bundled,
}

/// External tool families the backends invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Pandoc,
    ImageMagick,
    Ffmpeg,
    Ffprobe,
    Zip,
    Tar,
    Tesseract,
    PdfToText,
    Speech,
}

impl Tool {
    pub const ALL: &'static [Tool] = &[
        Self::Pandoc,
        Self::ImageMagick,
        Self::Ffmpeg,
        Self::Ffprobe,
        Self::Zip,
        Self::Tar,
        Self::Tesseract,
        Self::PdfToText,
        Self::Speech,
    ];

    /// Key used in logs, metrics and `[tools.overrides]`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pandoc => "pandoc",
            Self::ImageMagick => "magick",
            Self::Ffmpeg => "ffmpeg",
            Self::Ffprobe => "ffprobe",
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::Tesseract => "tesseract",
            Self::PdfToText => "pdftotext",
            Self::Speech => "speech",
        }
    }

    /// Executable names tried in order.
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            Self::Pandoc => &["pandoc"],
            // ImageMagick 7 ships `magick`, 6 only `convert`
            Self::ImageMagick => &["magick", "convert"],
            Self::Ffmpeg => &["ffmpeg"],
            Self::Ffprobe => &["ffprobe"],
            Self::Zip => &["zip"],
            Self::Tar => &["tar"],
            Self::Tesseract => &["tesseract"],
            Self::PdfToText => &["pdftotext"],
            Self::Speech => &["say", "espeak-ng", "espeak"],
        }
    }

    pub fn strategy(&self) -> LocateStrategy {
        match self {
            Self::Ffmpeg | Self::Ffprobe => LocateStrategy::Bundled,
            _ => LocateStrategy::SearchPath,
        }
    }

    /// Arguments printing a version banner, `None` when the tool has none.
    pub fn version_args(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Ffmpeg | Self::Ffprobe => Some(&["-version"]),
            Self::PdfToText => Some(&["-v"]),
            Self::Zip => Some(&["-v"]),
            Self::Speech => None,
            _ => Some(&["--version"]),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
