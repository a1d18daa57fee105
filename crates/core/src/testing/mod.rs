//! Testing utilities shared by unit and integration tests.
//!
//! [`FakeToolkit`] installs shell scripts in place of the external tools so
//! the real backends run end to end; [`MockBackend`] replaces a backend
//! entirely for router and batch tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use convertino_core::testing::{FakeToolkit, MockBackend};
//!
//! let kit = FakeToolkit::new();
//! kit.install_tool(Tool::Zip, "exit 0");
//! let ctx = kit.context();
//!
//! let mock = Arc::new(MockBackend::new(BackendKind::Image));
//! mock.fail_on("second.png").await;
//! ```

mod fake_tools;
mod mock_backend;

pub use fake_tools::FakeToolkit;
pub use mock_backend::MockBackend;
