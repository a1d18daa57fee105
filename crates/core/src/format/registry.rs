//! Extension based format detection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::document::DocumentFormat;
use super::image::ImageFormat;
use super::media::{AudioFormat, VideoFormat};
use super::types::Format;

/// Batch level hints used to resolve ambiguous extensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionContext {
    /// Treat `.pdf` as an image source rather than a document.
    pub pdf_as_image: bool,
}

impl DetectionContext {
    /// PDFs are images when the whole batch consists of PDFs, documents otherwise.
    pub fn for_batch(paths: &[PathBuf]) -> Self {
        Self {
            pdf_as_image: !paths.is_empty() && paths.iter().all(|p| is_pdf_path(p)),
        }
    }
}

/// Lowercased final extension of a path.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn is_pdf_path(path: &Path) -> bool {
    extension_of(path).as_deref() == Some("pdf")
}

/// Static catalog mapping extensions to readable formats.
///
/// Built once and read-only afterwards, so it can be shared freely.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    by_extension: HashMap<&'static str, Format>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatRegistry {
    pub fn new() -> Self {
        let mut by_extension = HashMap::new();

        // Earlier entries win on shared extensions (m4a resolves to AAC).
        let readable = DocumentFormat::ALL
            .iter()
            .filter(|f| f.reader().is_some())
            .map(|f| Format::Document(*f))
            .chain(ImageFormat::ALL.iter().filter(|f| **f != ImageFormat::Pdf).map(|f| Format::Image(*f)))
            .chain(AudioFormat::ALL.iter().map(|f| Format::Audio(*f)))
            .chain(
                VideoFormat::ALL
                    .iter()
                    .filter(|f| **f != VideoFormat::Gif)
                    .map(|f| Format::Video(*f)),
            );

        for format in readable {
            for ext in format.extensions() {
                by_extension.entry(*ext).or_insert(format);
            }
        }

        // PDF is resolved per batch in `detect`.
        by_extension.insert("pdf", Format::Document(DocumentFormat::Pdf));

        Self { by_extension }
    }

    /// Detects the format of `path` by its lowercase extension.
    pub fn detect(&self, path: &Path, context: DetectionContext) -> Option<Format> {
        let ext = extension_of(path)?;
        if ext == "pdf" {
            return Some(if context.pdf_as_image {
                Format::Image(ImageFormat::Pdf)
            } else {
                Format::Document(DocumentFormat::Pdf)
            });
        }
        self.by_extension.get(ext.as_str()).copied()
    }

    /// Detects every path of a batch with the batch's own context.
    pub fn detect_batch(&self, paths: &[PathBuf]) -> Vec<Option<Format>> {
        let context = DetectionContext::for_batch(paths);
        paths.iter().map(|p| self.detect(p, context)).collect()
    }

    pub fn known_extensions(&self) -> impl Iterator<Item = &&'static str> {
        self.by_extension.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(path: &str) -> Option<Format> {
        FormatRegistry::new().detect(Path::new(path), DetectionContext::default())
    }

    #[test]
    fn test_detect_is_case_insensitive() {
        assert_eq!(detect("/a/Report.MD"), Some(Format::Document(DocumentFormat::Markdown)));
        assert_eq!(detect("photo.JPG"), Some(Format::Image(ImageFormat::Jpeg)));
    }

    #[test]
    fn test_detect_media() {
        assert_eq!(detect("song.m4a"), Some(Format::Audio(AudioFormat::Aac)));
        assert_eq!(detect("clip.mkv"), Some(Format::Video(VideoFormat::Mkv)));
        assert_eq!(detect("anim.gif"), Some(Format::Image(ImageFormat::Gif)));
    }

    #[test]
    fn test_unreadable_formats_are_absent() {
        assert_eq!(detect("slides.pptx"), None);
        assert_eq!(detect("data.json"), None);
        assert_eq!(detect("noextension"), None);
    }

    #[test]
    fn test_pdf_resolved_by_context() {
        let registry = FormatRegistry::new();
        let all_pdf = vec![PathBuf::from("a.pdf"), PathBuf::from("b.PDF")];
        assert_eq!(
            registry.detect_batch(&all_pdf),
            vec![Some(Format::Image(ImageFormat::Pdf)); 2]
        );

        let mixed = vec![PathBuf::from("a.pdf"), PathBuf::from("b.md")];
        assert_eq!(
            registry.detect_batch(&mixed)[0],
            Some(Format::Document(DocumentFormat::Pdf))
        );
    }

    #[test]
    fn test_empty_batch_context() {
        assert!(!DetectionContext::for_batch(&[]).pdf_as_image);
    }
}
