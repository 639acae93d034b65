//! jpegtran facade: lossless JPEG transforms (optimize, progressive, crop).

use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::core::{AssetConfig, CopyMarkers, CropRect, RunnerConfig, Tool, TransformOptions};
use crate::processing::binwrap::{BinaryRegistry, KillHandle, ProcessRunner};
use crate::utils::{ToolResult, validate_crop};
use super::io::{ImageInput, ImageOutput, wire_input, wire_output};
use super::read_version;

/// Wraps the `jpegtran` transformer.
pub struct JpegTran<'io> {
    runner: ProcessRunner<'io>,
    config: RunnerConfig,
    options: TransformOptions,
    input: Option<ImageInput<'io>>,
    output: Option<ImageOutput<'io>>,
}

impl<'io> JpegTran<'io> {
    pub fn new() -> ToolResult<Self> {
        Self::with_config(&AssetConfig::default(), RunnerConfig::default())
    }

    pub fn with_config(assets: &AssetConfig, config: RunnerConfig) -> ToolResult<Self> {
        let registry = BinaryRegistry::for_tool(Tool::JpegTran, assets)?;
        Ok(Self::with_registry(Arc::new(registry), config))
    }

    pub fn with_registry(registry: Arc<BinaryRegistry>, config: RunnerConfig) -> Self {
        Self {
            runner: ProcessRunner::with_config(registry, &config),
            config,
            options: TransformOptions::default(),
            input: None,
            output: None,
        }
    }

    pub fn input_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.input = Some(ImageInput::file(path));
        self
    }

    pub fn input(&mut self, reader: impl AsyncRead + Send + Unpin + 'io) -> &mut Self {
        self.input = Some(ImageInput::reader(reader));
        self
    }

    pub fn output_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.output = Some(ImageOutput::file(path));
        self
    }

    pub fn output(&mut self, writer: impl AsyncWrite + Send + Unpin + 'io) -> &mut Self {
        self.output = Some(ImageOutput::writer(writer));
        self
    }

    pub fn optimize(&mut self, optimize: bool) -> &mut Self {
        self.options.optimize = optimize;
        self
    }

    pub fn progressive(&mut self, progressive: bool) -> &mut Self {
        self.options.progressive = progressive;
        self
    }

    /// Crop to `width`x`height` starting at (`x`, `y`).
    pub fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) -> &mut Self {
        self.options.crop = Some(CropRect::new(x, y, width, height));
        self
    }

    /// Copy no extra markers; strips comments and all metadata.
    pub fn copy_none(&mut self) -> &mut Self {
        self.options.copy = CopyMarkers::None;
        self
    }

    /// Copy comment markers only.
    pub fn copy_comments(&mut self) -> &mut Self {
        self.options.copy = CopyMarkers::Comments;
        self
    }

    /// Copy every extra marker (Exif, thumbnails untransformed, ...).
    pub fn copy_all(&mut self) -> &mut Self {
        self.options.copy = CopyMarkers::All;
        self
    }

    pub fn set_options(&mut self, options: TransformOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Restores default options (optimize on, baseline, no crop, copy none).
    pub fn reset(&mut self) -> &mut Self {
        self.options = TransformOptions::default();
        self
    }

    pub fn kill_handle(&self) -> KillHandle {
        self.runner.kill_handle()
    }

    /// Runs jpegtran with the configured options, input and output.
    pub async fn run(&mut self) -> ToolResult<()> {
        self.runner.reset();
        let outcome = self.run_once().await;
        self.runner.reset();
        outcome
    }

    async fn run_once(&mut self) -> ToolResult<()> {
        self.runner.apply_config(&self.config);
        push_transform_args(&mut self.runner, &self.options)?;
        wire_output(&mut self.runner, self.output.take())?;
        wire_input(&mut self.runner, self.input.take())?;
        self.runner.run(Vec::<String>::new()).await?.check()
    }

    /// jpegtran version banner, line terminators removed.
    pub async fn version(&mut self) -> ToolResult<String> {
        self.runner.reset();
        self.runner.apply_config(&self.config);
        let outcome = read_version(&mut self.runner).await;
        self.runner.reset();
        outcome
    }

    #[cfg(test)]
    fn planned_args(&mut self) -> ToolResult<Vec<String>> {
        self.runner.reset();
        push_transform_args(&mut self.runner, &self.options)?;
        wire_output(&mut self.runner, self.output.take())?;
        wire_input(&mut self.runner, self.input.take())?;
        let args = self
            .runner
            .arguments()
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        self.runner.reset();
        Ok(args)
    }
}

fn push_transform_args(runner: &mut ProcessRunner<'_>, options: &TransformOptions) -> ToolResult<()> {
    if options.optimize {
        runner.flag("-optimize");
    }
    if options.progressive {
        runner.flag("-progressive");
    }
    if let Some(crop) = &options.crop {
        validate_crop(crop)?;
        runner.arg("-crop", [crop.to_geometry()]);
    }
    runner.arg("-copy", [options.copy.as_arg()]);
    Ok(())
}
