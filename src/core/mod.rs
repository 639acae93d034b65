//! Core types and configuration.
//!
//! This module contains the fundamental types used throughout the crate:
//! - [`Tool`]: The embedded mozjpeg tools
//! - [`EncodeOptions`] / [`TransformOptions`]: Facade option values
//! - [`AssetConfig`] / [`RunnerConfig`]: Explicit configuration for registries and runs
//! - [`OptimizationResult`]: Size statistics for a file-to-file run

pub mod config;
mod types;

pub use config::{AssetConfig, RunnerConfig};
pub use types::{CopyMarkers, CropRect, EncodeOptions, OptimizationResult, Tool, TransformOptions};
