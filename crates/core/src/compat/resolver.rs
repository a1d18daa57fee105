//! Output menu computation for a batch of inputs.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::service::{BackendKind, ConversionService};
use crate::format::{ArchiveFormat, AudioFormat, DocumentFormat, Format, FormatRegistry, ImageFormat, OcrFormat, VideoFormat};

/// Output formats of the speech backend.
const SPEECH_OUTPUTS: &[AudioFormat] = &[
    AudioFormat::Aiff,
    AudioFormat::Wav,
    AudioFormat::Aac,
    AudioFormat::Mp3,
];

/// One backend's entries in a grouped menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuSection {
    pub backend: BackendKind,
    pub title: &'static str,
    pub services: Vec<ConversionService>,
}

/// Services offered for a batch, ready to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "layout", content = "entries", rename_all = "snake_case")]
pub enum ServiceMenu {
    /// Zero or one non-empty section.
    Flat(Vec<ConversionService>),
    /// Several sections, in backend order.
    Grouped(Vec<MenuSection>),
}

impl ServiceMenu {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flat(services) => services.is_empty(),
            Self::Grouped(sections) => sections.is_empty(),
        }
    }

    /// All services in display order.
    pub fn services(&self) -> Vec<ConversionService> {
        match self {
            Self::Flat(services) => services.clone(),
            Self::Grouped(sections) => sections
                .iter()
                .flat_map(|s| s.services.iter().copied())
                .collect(),
        }
    }
}

/// Computes which services apply jointly to every input of a batch.
#[derive(Debug, Clone)]
pub struct CompatibilityResolver {
    registry: Arc<FormatRegistry>,
}

impl CompatibilityResolver {
    pub fn new(registry: Arc<FormatRegistry>) -> Self {
        Self { registry }
    }

    /// Every service valid for `inputs`, sorted by display name.
    pub fn compatible_outputs(&self, inputs: &[PathBuf]) -> Vec<ConversionService> {
        let mut all: Vec<ConversionService> = self
            .sections(inputs)
            .into_iter()
            .flat_map(|s| s.services)
            .collect();
        sort_by_display_name(&mut all);
        all
    }

    /// The same services arranged for display: flat when a single section
    /// is non-empty, grouped by backend otherwise.
    pub fn menu(&self, inputs: &[PathBuf]) -> ServiceMenu {
        let mut sections = self.sections(inputs);
        if sections.len() <= 1 {
            return ServiceMenu::Flat(sections.pop().map(|s| s.services).unwrap_or_default());
        }
        ServiceMenu::Grouped(sections)
    }

    fn sections(&self, inputs: &[PathBuf]) -> Vec<MenuSection> {
        if inputs.is_empty() {
            return Vec::new();
        }

        let formats = self.registry.detect_batch(inputs);
        debug!(inputs = inputs.len(), detected = ?formats, "Resolving compatible outputs");

        let candidates = if formats.iter().all(|f| *f == Some(Format::Image(ImageFormat::Pdf))) {
            pdf_batch_services()
        } else {
            let known: Vec<Format> = formats.iter().flatten().copied().collect();
            let mut services = document_services(&known);
            services.extend(image_services(&known));
            services.extend(media_services(&known));
            services.extend(ocr_services(&known));
            services.extend(speech_services(&known));
            services.extend(archive_services());
            services
        };

        let mut sections: Vec<MenuSection> = BackendKind::ALL
            .iter()
            .map(|&backend| {
                let mut services: Vec<ConversionService> = Vec::new();
                for service in candidates.iter().filter(|s| s.backend == backend) {
                    if !services.contains(service) {
                        services.push(*service);
                    }
                }
                sort_by_display_name(&mut services);
                MenuSection {
                    backend,
                    title: backend.section_title(),
                    services,
                }
            })
            .collect();
        sections.retain(|s| !s.services.is_empty());
        sections
    }
}

fn sort_by_display_name(services: &mut [ConversionService]) {
    services.sort_by_cached_key(|s| (s.display_name().to_lowercase(), s.to_string()));
}

fn pdf_batch_services() -> Vec<ConversionService> {
    ImageFormat::writable()
        .map(ConversionService::image)
        .chain([
            ConversionService::ocr(OcrFormat::Text),
            ConversionService::ocr(OcrFormat::ExtractedText),
        ])
        .chain(archive_services())
        .collect()
}

/// Intersection of every document input's output list.
fn document_services(formats: &[Format]) -> Vec<ConversionService> {
    let mut documents = formats.iter().filter_map(|f| match f {
        Format::Document(d) => Some(*d),
        _ => None,
    });

    let Some(first) = documents.next() else {
        return Vec::new();
    };
    let mut outputs: Vec<DocumentFormat> = first.compatible_outputs();
    for input in documents {
        let allowed = input.compatible_outputs();
        outputs.retain(|o| allowed.contains(o));
    }
    outputs.into_iter().map(ConversionService::document).collect()
}

fn image_services(formats: &[Format]) -> Vec<ConversionService> {
    if !formats.iter().any(|f| matches!(f, Format::Image(_))) {
        return Vec::new();
    }
    ImageFormat::writable().map(ConversionService::image).collect()
}

fn media_services(formats: &[Format]) -> Vec<ConversionService> {
    let media: Vec<&Format> = formats.iter().filter(|f| f.is_media()).collect();
    if media.is_empty() {
        return Vec::new();
    }

    let audio = AudioFormat::writable().map(ConversionService::audio);
    if media.iter().all(|f| f.is_audio()) {
        return audio.collect();
    }
    audio
        .chain(VideoFormat::writable().map(ConversionService::video))
        .collect()
}

fn ocr_services(formats: &[Format]) -> Vec<ConversionService> {
    let mut services = Vec::new();
    if formats
        .iter()
        .any(|f| matches!(f, Format::Image(i) if i.is_raster()))
    {
        services.extend([
            ConversionService::ocr(OcrFormat::Text),
            ConversionService::ocr(OcrFormat::Hocr),
            ConversionService::ocr(OcrFormat::SearchablePdf),
        ]);
    }
    if formats.iter().any(|f| f.is_pdf()) {
        services.extend([
            ConversionService::ocr(OcrFormat::Text),
            ConversionService::ocr(OcrFormat::ExtractedText),
        ]);
    }
    services
}

fn speech_services(formats: &[Format]) -> Vec<ConversionService> {
    if !formats.contains(&Format::Document(DocumentFormat::PlainText)) {
        return Vec::new();
    }
    SPEECH_OUTPUTS
        .iter()
        .copied()
        .map(ConversionService::speech)
        .collect()
}

fn archive_services() -> Vec<ConversionService> {
    ArchiveFormat::ALL
        .iter()
        .copied()
        .map(ConversionService::archive)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> CompatibilityResolver {
        CompatibilityResolver::new(Arc::new(FormatRegistry::new()))
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    fn of(services: &[ConversionService], backend: BackendKind) -> Vec<ConversionService> {
        services.iter().copied().filter(|s| s.backend == backend).collect()
    }

    #[test]
    fn test_empty_input_gives_empty_result() {
        assert!(resolver().compatible_outputs(&[]).is_empty());
        assert!(resolver().menu(&[]).is_empty());
    }

    #[test]
    fn test_markdown_offers_pdf() {
        let outputs = resolver().compatible_outputs(&paths(&["report.md"]));
        assert!(outputs.contains(&ConversionService::document(DocumentFormat::Pdf)));
        assert!(!outputs.contains(&ConversionService::document(DocumentFormat::Markdown)));
    }

    #[test]
    fn test_document_outputs_are_intersected() {
        let outputs = resolver().compatible_outputs(&paths(&["a.md", "b.csv"]));
        let docs = of(&outputs, BackendKind::Document);

        let md: Vec<_> = DocumentFormat::Markdown.compatible_outputs();
        let csv: Vec<_> = DocumentFormat::Csv.compatible_outputs();
        let mut expected: Vec<ConversionService> = md
            .into_iter()
            .filter(|f| csv.contains(f))
            .map(ConversionService::document)
            .collect();
        sort_by_display_name(&mut expected);
        assert_eq!(docs, expected);
        assert!(!docs.contains(&ConversionService::document(DocumentFormat::Epub)));
    }

    #[test]
    fn test_all_pdf_batch() {
        let outputs = resolver().compatible_outputs(&paths(&["a.pdf", "b.PDF"]));
        assert!(outputs.contains(&ConversionService::image(ImageFormat::Pdf)));
        assert!(outputs.contains(&ConversionService::image(ImageFormat::Png)));
        assert!(outputs.contains(&ConversionService::ocr(OcrFormat::Text)));
        assert!(outputs.contains(&ConversionService::ocr(OcrFormat::ExtractedText)));
        assert!(!outputs.contains(&ConversionService::ocr(OcrFormat::Hocr)));
        assert!(of(&outputs, BackendKind::Document).is_empty());
        assert!(of(&outputs, BackendKind::Media).is_empty());
        assert_eq!(of(&outputs, BackendKind::Archive).len(), ArchiveFormat::ALL.len());
    }

    #[test]
    fn test_audio_only_media() {
        let outputs = resolver().compatible_outputs(&paths(&["a.flac", "b.mp3"]));
        let media = of(&outputs, BackendKind::Media);
        assert!(media.iter().all(|s| s.format.is_audio()));
        assert_eq!(media.len(), AudioFormat::writable().count());

        let outputs = resolver().compatible_outputs(&paths(&["a.flac", "b.mkv"]));
        let media = of(&outputs, BackendKind::Media);
        assert!(media.contains(&ConversionService::video(VideoFormat::Gif)));
        assert!(media.contains(&ConversionService::audio(AudioFormat::Flac)));
    }

    #[test]
    fn test_image_outputs_are_fixed() {
        let png = of(&resolver().compatible_outputs(&paths(&["a.png"])), BackendKind::Image);
        let heic = of(&resolver().compatible_outputs(&paths(&["a.heic"])), BackendKind::Image);
        assert_eq!(png, heic);
        assert!(png.contains(&ConversionService::image(ImageFormat::Png)));
        assert!(!png.contains(&ConversionService::image(ImageFormat::Psd)));
    }

    #[test]
    fn test_ocr_and_speech_preconditions() {
        let outputs = resolver().compatible_outputs(&paths(&["scan.jpg"]));
        assert!(outputs.contains(&ConversionService::ocr(OcrFormat::Hocr)));
        assert!(of(&outputs, BackendKind::Speech).is_empty());

        let outputs = resolver().compatible_outputs(&paths(&["notes.txt"]));
        assert_eq!(of(&outputs, BackendKind::Speech).len(), 4);
        assert!(of(&outputs, BackendKind::Ocr).is_empty());

        // A PDF among documents stays a document and allows extraction
        let outputs = resolver().compatible_outputs(&paths(&["a.pdf", "b.md"]));
        assert!(outputs.contains(&ConversionService::ocr(OcrFormat::ExtractedText)));
    }

    #[test]
    fn test_unknown_inputs_still_get_archives() {
        let outputs = resolver().compatible_outputs(&paths(&["blob.xyz"]));
        assert!(outputs.iter().all(|s| s.backend == BackendKind::Archive));
        assert_eq!(outputs.len(), ArchiveFormat::ALL.len());
    }

    #[test]
    fn test_sorted_by_display_name() {
        let outputs = resolver().compatible_outputs(&paths(&["a.png"]));
        let names: Vec<String> = outputs.iter().map(|s| s.display_name().to_lowercase()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_menu_layout() {
        // Unknown input: only archives, rendered flat
        match resolver().menu(&paths(&["blob.xyz"])) {
            ServiceMenu::Flat(services) => assert_eq!(services.len(), ArchiveFormat::ALL.len()),
            other => panic!("expected flat menu, got {:?}", other),
        }

        match resolver().menu(&paths(&["a.png"])) {
            ServiceMenu::Grouped(sections) => {
                let backends: Vec<BackendKind> = sections.iter().map(|s| s.backend).collect();
                assert_eq!(
                    backends,
                    vec![BackendKind::Image, BackendKind::Ocr, BackendKind::Archive]
                );
            }
            other => panic!("expected grouped menu, got {:?}", other),
        }
    }
}
