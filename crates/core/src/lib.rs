pub mod batch;
pub mod compat;
pub mod config;
pub mod context;
pub mod converter;
pub mod format;
pub mod metrics;
pub mod options;
pub mod pipeline;
pub mod process;
pub mod router;
pub mod tempfiles;
pub mod testing;
pub mod tools;

pub use batch::{
    BatchDriver, BatchError, BatchOutcome, BatchProgress, ConversionJob, JobReport, JobState,
};
pub use compat::{BackendKind, CompatibilityResolver, ConversionService, MenuSection, ServiceMenu};
pub use config::{
    load_config, load_config_from_str, load_default_config, validate_config, Config, ConfigError,
};
pub use context::ConversionContext;
pub use converter::{ArtifactRecord, Backend, ConversionRequest, ConvertedArtifact, ConverterError};
pub use format::{Format, FormatRegistry};
pub use options::ConversionOptions;
pub use process::{install_shutdown_handler, ProcessManager, ShutdownHandle};
pub use router::Router;
pub use tempfiles::{JobWorkspace, TempFileManager};
pub use tools::{Tool, ToolLocator};
