//! # Client Components
//!
//! The uploader side of the relay is split the same way the work is:
//!
//! ## Upload Session ([`validator`])
//! Holds the user's selection and UI-facing state:
//! - Pre-flight validation (one file, PNG only) before any network call
//! - Single submission in flight per session
//! - User-facing error messages, keeping the selection for a manual retry
//!
//! ## Save Target ([`save`])
//! Hands the returned artifact to the user as a downloaded file.

pub mod config;
pub mod save;
pub mod validator;

// Re-export for convenience
pub use config::ClientConfig;
pub use save::{DownloadDir, SaveTarget};
pub use validator::{ClientError, FileCandidate, SavedArtifact, UploadSession};
