//! Build-time embedded binaries and registry construction.
//!
//! `build.rs` scans the asset directory and generates a static table of
//! `include_bytes!` entries; this module turns the entries for one tool into
//! [`BinarySource`]s. A directory with the same layout can be registered at
//! runtime on top of (or instead of) the embedded table.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use crate::core::{AssetConfig, Tool};
use crate::utils::{ToolError, ToolResult};
use super::source::{BinaryRegistry, BinarySource};

/// One row of the generated asset table.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedAsset {
    pub tool: &'static str,
    /// Empty for OS-independent assets
    pub os: &'static str,
    /// Empty for architecture-independent assets
    pub arch: &'static str,
    pub bytes: &'static [u8],
}

include!(concat!(env!("OUT_DIR"), "/embedded_assets.rs"));

/// All embedded assets, across tools and platforms.
pub fn embedded_assets() -> &'static [EmbeddedAsset] {
    EMBEDDED_ASSETS
}

/// Embedded sources for `tool`, in table order.
pub fn embedded_sources(tool: Tool) -> Vec<BinarySource> {
    EMBEDDED_ASSETS
        .iter()
        .filter(|asset| asset.tool == tool.binary_name())
        .map(|asset| {
            BinarySource::from_static(asset.bytes)
                .os(asset.os)
                .arch(asset.arch)
        })
        .collect()
}

/// Reads sources for `tool` from a directory laid out like the embedded table:
/// `<tool>`, `<os>/<tool>` and `<os>/<arch>/<tool>`, each optionally with `.exe`.
pub fn dir_sources(tool: Tool, dir: &Path) -> ToolResult<Vec<BinarySource>> {
    if !dir.is_dir() {
        return Err(ToolError::config(format!(
            "binary directory does not exist: {}",
            dir.display()
        )));
    }

    let mut sources = Vec::new();
    push_tool_files(tool, dir, "", "", &mut sources)?;
    for os_dir in subdirs(dir)? {
        let os = dir_name(&os_dir);
        push_tool_files(tool, &os_dir, &os, "", &mut sources)?;
        for arch_dir in subdirs(&os_dir)? {
            let arch = dir_name(&arch_dir);
            push_tool_files(tool, &arch_dir, &os, &arch, &mut sources)?;
        }
    }

    debug!("Found {} {} source(s) under {}", sources.len(), tool, dir.display());
    Ok(sources)
}

impl BinaryRegistry {
    /// Builds the registry for `tool` from an explicit asset configuration.
    ///
    /// Directory sources are registered before embedded ones so that, within
    /// a selection tier, a deployment override wins over the compiled-in copy.
    pub fn for_tool(tool: Tool, config: &AssetConfig) -> ToolResult<Self> {
        let mut registry = BinaryRegistry::new(tool.binary_name());

        if let Some(dir) = &config.bin_dir {
            for source in dir_sources(tool, dir)? {
                registry.push(source);
            }
        }

        if config.use_embedded {
            for source in embedded_sources(tool) {
                registry.push(source);
            }
        }

        if registry.is_empty() {
            warn!("No binary sources registered for {}", tool);
        } else {
            debug!("Registered {} binary source(s) for {}", registry.len(), tool);
        }

        Ok(registry)
    }
}

fn push_tool_files(
    tool: Tool,
    dir: &Path,
    os: &str,
    arch: &str,
    sources: &mut Vec<BinarySource>,
) -> ToolResult<()> {
    let name = tool.binary_name();
    for candidate in [PathBuf::from(name), PathBuf::from(format!("{name}.exe"))] {
        let path = dir.join(candidate);
        if path.is_file() {
            let bytes = std::fs::read(&path).map_err(|e| {
                ToolError::io(format!("Failed to read binary {}: {}", path.display(), e))
            })?;
            sources.push(BinarySource::new(bytes).os(os).arch(arch));
        }
    }
    Ok(())
}

fn subdirs(dir: &Path) -> ToolResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
