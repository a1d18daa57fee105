//! Multi-step conversions built from several tool runs.
//!
//! Each pipeline allocates its intermediate files from the job workspace and
//! releases them when it finishes, whether or not the final run succeeded.

pub mod archive;
pub mod gif;
pub mod pdf_pages;
pub mod two_pass;
