//! Format registry.
//!
//! Static per-domain catalogs (document, image, audio, video, OCR, archive)
//! with the metadata the executors and the compatibility resolver need:
//! extensions, lossy/lossless, EXIF support, valid sample rates and sizes,
//! container/encoder pairings and pandoc reader/writer names.
//!
//! Detection is purely extension based. `.pdf` is ambiguous and is resolved
//! per batch: a batch made only of PDFs treats them as images, any other
//! batch treats them as documents.

mod document;
mod image;
mod media;
mod registry;
mod types;

pub use document::DocumentFormat;
pub use image::ImageFormat;
pub use media::{AudioFormat, VideoEncoder, VideoFormat};
pub use registry::{extension_of, is_pdf_path, DetectionContext, FormatRegistry};
pub use types::{ArchiveFormat, Format, OcrFormat};
