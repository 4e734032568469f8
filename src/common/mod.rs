//! # Common Components
//!
//! Shared utilities and data structures used by both the gateway and the uploader.
//!
//! ## Modules
//!
//! - [`upload`]: Upload entities and the validation rule both sides enforce
//! - [`config`]: Configuration parsing utilities
//! - [`logging`]: Logger setup for the binaries

pub mod config;
pub mod logging;
pub mod upload;
