//! Backend executors that turn a conversion request into artifacts.
//!
//! Each [`Backend`] drives one tool family: pandoc for documents,
//! ImageMagick for images, ffmpeg for audio and video, tesseract and
//! pdftotext for text recognition, `say`/espeak-ng for speech and
//! zip/tar for archives. Every run goes through the process manager and is
//! classified by exit code and diagnostic text.
//!
//! # Example
//!
//! ```ignore
//! use convertino_core::converter::{Backend, ConversionRequest, DocumentBackend};
//!
//! let request = ConversionRequest::new(
//!     vec![PathBuf::from("notes.md")],
//!     vec![Some(Format::Document(DocumentFormat::Markdown))],
//!     "document:html".parse()?,
//!     ConversionOptions::default(),
//! );
//! let mut workspace = JobWorkspace::new(ctx.temps.clone())?;
//! let artifacts = DocumentBackend::new()
//!     .convert(&ctx, &request, &mut workspace, &cancel)
//!     .await?;
//! ```

mod archive;
mod classify;
mod document;
mod error;
mod exec;
pub mod image;
pub mod media;
mod ocr;
mod speech;
mod traits;
mod types;

pub use archive::ArchiveBackend;
pub use classify::{classify, known_cause, ExitReport};
pub use document::{pandoc_args, DocumentBackend};
pub use error::{ConverterError, KnownCause};
pub use exec::execute;
pub use image::ImageBackend;
pub use media::{MediaBackend, MediaInfo};
pub use ocr::OcrBackend;
pub use speech::{SpeechBackend, SpeechEngine};
pub use traits::Backend;
pub use types::{file_stem, ArtifactRecord, ConversionRequest, ConvertedArtifact};
