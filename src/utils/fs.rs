use std::path::Path;
use tokio::fs;
use crate::utils::{ToolError, ToolResult};

/// Get file size in bytes
pub async fn get_file_size(path: impl AsRef<Path>) -> ToolResult<u64> {
    fs::metadata(path.as_ref())
        .await
        .map(|m| m.len())
        .map_err(|e| ToolError::io(format!("Failed to get file size of {}: {}", path.as_ref().display(), e)))
}
