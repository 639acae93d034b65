//! cjpeg facade: encode images to JPEG with mozjpeg.

use std::path::PathBuf;
use std::sync::Arc;
use image::DynamicImage;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::core::{AssetConfig, EncodeOptions, RunnerConfig, Tool};
use crate::processing::binwrap::{BinaryRegistry, KillHandle, ProcessRunner};
use crate::utils::ToolResult;
use super::io::{ImageInput, ImageOutput, wire_input, wire_output};
use super::read_version;

/// Wraps the `cjpeg` encoder.
///
/// Input and output are consumed by [`run`](Self::run); options stay until
/// [`reset`](Self::reset).
pub struct CJpeg<'io> {
    runner: ProcessRunner<'io>,
    config: RunnerConfig,
    options: EncodeOptions,
    input: Option<ImageInput<'io>>,
    output: Option<ImageOutput<'io>>,
}

impl<'io> CJpeg<'io> {
    /// Uses the embedded binaries and default run settings.
    pub fn new() -> ToolResult<Self> {
        Self::with_config(&AssetConfig::default(), RunnerConfig::default())
    }

    pub fn with_config(assets: &AssetConfig, config: RunnerConfig) -> ToolResult<Self> {
        let registry = BinaryRegistry::for_tool(Tool::CJpeg, assets)?;
        Ok(Self::with_registry(Arc::new(registry), config))
    }

    /// Shares an already built registry.
    pub fn with_registry(registry: Arc<BinaryRegistry>, config: RunnerConfig) -> Self {
        Self {
            runner: ProcessRunner::with_config(registry, &config),
            config,
            options: EncodeOptions::default(),
            input: None,
            output: None,
        }
    }

    /// Image file to convert.
    pub fn input_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.input = Some(ImageInput::file(path));
        self
    }

    /// Encoded image bytes piped through stdin.
    pub fn input(&mut self, reader: impl AsyncRead + Send + Unpin + 'io) -> &mut Self {
        self.input = Some(ImageInput::reader(reader));
        self
    }

    /// Decoded image, re-encoded losslessly enough (quality 100) for cjpeg to read.
    pub fn input_image(&mut self, image: &'io DynamicImage) -> &mut Self {
        self.input = Some(ImageInput::Image(image));
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

    /// Compression factor 0-100 (values above 100 are clamped). Tool default is 75.
    pub fn quality(&mut self, quality: u32) -> &mut Self {
        self.options = self.options.clone().with_quality(quality);
        self
    }

    /// Optimize entropy encoding parameters: slightly smaller files, slower encode.
    pub fn optimize(&mut self, optimize: bool) -> &mut Self {
        self.options.optimize = optimize;
        self
    }

    pub fn set_options(&mut self, options: EncodeOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Restores default options.
    pub fn reset(&mut self) -> &mut Self {
        self.options = EncodeOptions::default();
        self
    }

    pub fn kill_handle(&self) -> KillHandle {
        self.runner.kill_handle()
    }

    /// Runs cjpeg with the configured options, input and output.
    pub async fn run(&mut self) -> ToolResult<()> {
        self.runner.reset();
        let outcome = self.run_once().await;
        self.runner.reset();
        outcome
    }

    async fn run_once(&mut self) -> ToolResult<()> {
        self.runner.apply_config(&self.config);
        push_encode_args(&mut self.runner, &self.options);
        wire_output(&mut self.runner, self.output.take())?;
        wire_input(&mut self.runner, self.input.take())?;
        self.runner.run(Vec::<String>::new()).await?.check()
    }

    /// cjpeg version banner, line terminators removed.
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
        push_encode_args(&mut self.runner, &self.options);
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

fn push_encode_args(runner: &mut ProcessRunner<'_>, options: &EncodeOptions) {
    if let Some(quality) = options.quality {
        runner.arg("-quality", [quality.to_string()]);
    }
    if options.optimize {
        runner.flag("-optimize");
    }
}
