//! Upload-validate-relay gateway: one PNG in, one 3D mesh out.
//!
//! - [`client`]: the uploader session (selection, pre-validation, submission, saving)
//! - [`gateway`]: the HTTP gateway in front of the processing backend
//! - [`common`]: upload model, shared validation rule, config and logging helpers

pub mod client;
pub mod common;
pub mod gateway;

pub use client::UploadSession;
pub use gateway::GatewayConfig;
