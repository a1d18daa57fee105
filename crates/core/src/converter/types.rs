//! Types describing conversion requests and their products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::error::ConverterError;
use crate::compat::ConversionService;
use crate::format::Format;
use crate::options::ConversionOptions;

/// One unit of work handed to a backend.
///
/// Most services carry a single input. Merging services (archives, PDF
/// merge) carry the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub job_id: Uuid,
    pub inputs: Vec<PathBuf>,
    /// Detected format per input, `None` when unknown.
    pub input_formats: Vec<Option<Format>>,
    pub service: ConversionService,
    pub options: ConversionOptions,
}

impl ConversionRequest {
    pub fn new(
        inputs: Vec<PathBuf>,
        input_formats: Vec<Option<Format>>,
        service: ConversionService,
        options: ConversionOptions,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            inputs,
            input_formats,
            service,
            options,
        }
    }

    /// First input; naming of single-input outputs derives from it.
    pub fn primary_input(&self) -> Option<&Path> {
        self.inputs.first().map(PathBuf::as_path)
    }

    pub fn primary_format(&self) -> Option<Format> {
        self.input_formats.first().copied().flatten()
    }

    /// The input of a one-to-one conversion with its detected format.
    pub fn single_input(&self) -> Result<(&Path, Option<Format>), ConverterError> {
        match self.inputs.as_slice() {
            [input] => Ok((input.as_path(), self.primary_format())),
            inputs => Err(ConverterError::invalid_options(format!(
                "{} expects exactly one input, got {}",
                self.service,
                inputs.len()
            ))),
        }
    }

    pub fn target(&self) -> Format {
        self.service.format
    }

    /// Output file name for `input` in the target format.
    pub fn output_name_for(&self, input: &Path) -> String {
        format!("{}.{}", file_stem(input), self.service.format.extension())
    }
}

/// File stem as a lossy string, `output` when the path has none.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string())
}

/// A produced file still owned by the temp file manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedArtifact {
    /// Inputs this output was made from, several when inputs were merged.
    pub sources: Vec<PathBuf>,
    pub temp_path: PathBuf,
    /// Final file name offered to the user.
    pub suggested_name: String,
    pub format: Format,
    pub size_bytes: u64,
}

impl ConvertedArtifact {
    /// Wraps a tool's output file, failing when it does not exist.
    pub fn from_output(
        sources: Vec<PathBuf>,
        temp_path: PathBuf,
        format: Format,
    ) -> Result<Self, ConverterError> {
        let metadata = std::fs::metadata(&temp_path).map_err(|_| ConverterError::OutputMissing {
            path: temp_path.clone(),
        })?;
        let suggested_name = temp_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("output.{}", format.extension()));

        Ok(Self {
            sources,
            temp_path,
            suggested_name,
            format,
            size_bytes: metadata.len(),
        })
    }

    /// History record for the completed job.
    pub fn record(&self, source_format: Option<Format>) -> ArtifactRecord {
        let source_name = match self.sources.as_slice() {
            [single] => single
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            many => format!("{} files", many.len()),
        };

        ArtifactRecord {
            source_name,
            source_format: source_format.map(|f| f.to_string()),
            output_name: self.suggested_name.clone(),
            output_format: self.format.to_string(),
            output_path: self.temp_path.clone(),
            size_bytes: self.size_bytes,
            completed_at: Utc::now(),
        }
    }
}

/// Descriptor persisted by the history collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub source_name: String,
    pub source_format: Option<String>,
    pub output_name: String,
    pub output_format: String,
    pub output_path: PathBuf,
    pub size_bytes: u64,
    pub completed_at: DateTime<Utc>,
}
