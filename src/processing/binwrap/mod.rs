// src/processing/binwrap/mod.rs

//! Embedded-binary execution core.
//!
//! Runs a precompiled executable that ships inside this crate instead of
//! next to it on disk.
//!
//! # Architecture
//!
//! - [`BinaryRegistry`] / [`BinarySource`]: Candidate binaries tagged with optional OS/arch.
//! - [`platform`]: Host detection and the legacy OS/arch alias tables.
//! - [`ExecutableImage`]: Makes raw bytes spawnable (memfd on Linux, temp file elsewhere).
//! - [`ProcessRunner`]: Argument/env/stream configuration, timeout, kill and output capture.
//! - [`assets`]: The build-time embedded asset table and registry construction.

pub mod assets;
mod loader;
pub mod platform;
mod runner;
mod source;

pub use assets::EmbeddedAsset;
pub use loader::ExecutableImage;
pub use platform::Platform;
pub use runner::{InputStream, KillHandle, OutputSink, ProcessRunner, RunResult, RunStatus};
pub use source::{BinaryRegistry, BinarySource, select};
