// Module declarations in dependency order
pub mod utils;
pub mod core;
pub mod processing;
pub mod commands;

// Public exports for external consumers
pub use self::core::{AssetConfig, CopyMarkers, CropRect, EncodeOptions, OptimizationResult, RunnerConfig, Tool, TransformOptions};
pub use self::utils::{ToolError, ToolResult};
pub use self::processing::{BinaryRegistry, BinarySource, CJpeg, JpegTran, KillHandle, Platform, ProcessRunner, RunResult, RunStatus, encode, encode_with};
pub use self::processing::mozjpeg::{ImageInput, ImageOutput};

// The command-line entry point lives in main.rs.
