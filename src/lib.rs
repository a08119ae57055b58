#![forbid(unsafe_code)]

//! Public entry point for the video downloader backend.
//!
//! The binary in `src/bin/backend.rs` only wires configuration and the HTTP
//! server together; everything else lives here so it can be unit tested
//! without spawning a real extractor.

pub mod config;
pub mod error;
pub mod extractor;
pub mod formats;
pub mod janitor;
pub mod metadata;
pub mod orchestrator;
pub mod server;
