//! Product Porter Core - Shared types library.
//!
//! This crate provides the types shared by the export pipeline and the CLI:
//! - `pipeline` - Bulk export orchestration, artifact joining and publishing
//! - `cli` - Command-line entry point (`porter`)
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no filesystem access. Everything here can be exercised from unit
//! tests without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Record classification, bulk operation projection, export
//!   records, consolidated products and translation row shapes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
