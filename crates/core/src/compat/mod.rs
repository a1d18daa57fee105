//! Format compatibility resolution.
//!
//! Given the files of a batch, the [`CompatibilityResolver`] decides which
//! [`ConversionService`]s apply to all of them jointly. Callers only ever
//! dispatch services taken from that menu.

mod resolver;
mod service;

pub use resolver::{CompatibilityResolver, MenuSection, ServiceMenu};
pub use service::{BackendKind, ConversionService, ParseServiceError};
