// Command-line entry point. The library API lives in lib.rs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use mozjpeg_runner::commands::{
    EncodeTask, TransformTask, check_output_paths, encode_images, tool_version, transform_image,
};
use mozjpeg_runner::core::config::{ENV_BIN_DIR, ENV_TIMEOUT_MS};
use mozjpeg_runner::{
    AssetConfig, BinaryRegistry, CopyMarkers, CropRect, EncodeOptions, OptimizationResult, RunnerConfig, Tool,
    TransformOptions,
};

/// Run the embedded mozjpeg tools without installing them.
#[derive(Parser, Debug)]
#[command(name = "mozjpeg-runner", version)]
#[command(about = "Encode and losslessly transform JPEGs with embedded mozjpeg binaries")]
struct Args {
    /// Kill the tool if it runs longer than this many milliseconds (0 disables)
    #[arg(long, global = true, env = ENV_TIMEOUT_MS)]
    timeout_ms: Option<u64>,

    /// Log every tool invocation at info level
    #[arg(long, global = true)]
    debug: bool,

    /// Directory with extra binaries (`<tool>`, `<os>/<tool>`, `<os>/<arch>/<tool>`)
    #[arg(long, global = true, env = ENV_BIN_DIR)]
    bin_dir: Option<PathBuf>,

    /// Ignore the binaries compiled into this executable
    #[arg(long, global = true)]
    no_embedded: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode images (PPM, BMP, TGA, JPEG or PNG) to JPEG with cjpeg
    Encode {
        /// Source images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (single input only)
        #[arg(short, long, conflicts_with = "out_dir")]
        output: Option<PathBuf>,

        /// Write outputs into this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Compression quality 0-100 (cjpeg default is 75)
        #[arg(short, long)]
        quality: Option<u32>,

        /// Optimize entropy encoding parameters
        #[arg(long)]
        optimize: bool,

        /// Maximum number of concurrent cjpeg processes
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Losslessly transform a JPEG with jpegtran
    Transform {
        /// Source JPEG
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Skip entropy optimization
        #[arg(long)]
        no_optimize: bool,

        /// Write a progressive JPEG
        #[arg(long)]
        progressive: bool,

        /// Crop region as WxH+X+Y
        #[arg(long, value_parser = parse_crop)]
        crop: Option<CropRect>,

        /// Extra markers to keep
        #[arg(long, value_enum, default_value_t = CopyArg::None)]
        copy: CopyArg,
    },

    /// Print the version banner of an embedded tool
    Version {
        #[arg(value_enum, default_value_t = ToolArg::Cjpeg)]
        tool: ToolArg,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CopyArg {
    None,
    Comments,
    All,
}

impl From<CopyArg> for CopyMarkers {
    fn from(arg: CopyArg) -> Self {
        match arg {
            CopyArg::None => CopyMarkers::None,
            CopyArg::Comments => CopyMarkers::Comments,
            CopyArg::All => CopyMarkers::All,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ToolArg {
    Cjpeg,
    Jpegtran,
}

impl From<ToolArg> for Tool {
    fn from(arg: ToolArg) -> Self {
        match arg {
            ToolArg::Cjpeg => Tool::CJpeg,
            ToolArg::Jpegtran => Tool::JpegTran,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let (assets, config) = load_config(&args)?;
    debug!("Asset config: {:?}", assets);

    match args.command {
        Command::Encode { inputs, output, out_dir, quality, optimize, jobs } => {
            if output.is_some() && inputs.len() > 1 {
                bail!("--output takes a single input; use --out-dir for several");
            }

            let mut options = EncodeOptions::default().with_optimize(optimize);
            if let Some(quality) = quality {
                options = options.with_quality(quality);
            }

            let tasks = plan_encode(inputs, output, out_dir.as_deref(), &options)?;

            let registry = Arc::new(
                BinaryRegistry::for_tool(Tool::CJpeg, &assets).context("Failed to prepare cjpeg")?,
            );
            let jobs = jobs.unwrap_or_else(|| {
                std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
            });

            info!("Encoding {} image(s)", tasks.len());
            let results = encode_images(registry, &config, tasks, jobs).await;
            report(&results, args.json)?;

            let failed = results.iter().filter(|r| !r.success).count();
            if failed > 0 {
                bail!("{} of {} image(s) failed", failed, results.len());
            }
        }

        Command::Transform { input, output, no_optimize, progressive, crop, copy } => {
            let task = TransformTask {
                input_path: input,
                output_path: output,
                options: TransformOptions {
                    optimize: !no_optimize,
                    progressive,
                    crop,
                    copy: copy.into(),
                },
            };

            let registry = Arc::new(
                BinaryRegistry::for_tool(Tool::JpegTran, &assets).context("Failed to prepare jpegtran")?,
            );
            let result = transform_image(registry, &config, &task)
                .await
                .with_context(|| format!("Failed to transform {}", task.input_path.display()))?;
            report(std::slice::from_ref(&result), args.json)?;
        }

        Command::Version { tool } => {
            let tool = Tool::from(tool);
            let banner = tool_version(tool, &assets, &config).await?;
            if args.json {
                println!("{}", serde_json::json!({ "tool": tool, "version": banner }));
            } else {
                println!("{}: {}", tool, banner);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Environment first, then command-line flags on top.
fn load_config(args: &Args) -> Result<(AssetConfig, RunnerConfig)> {
    let mut assets = AssetConfig::from_env()?;
    let mut config = RunnerConfig::from_env()?;

    if args.bin_dir.is_some() {
        assets.bin_dir = args.bin_dir.clone();
    }
    if args.no_embedded {
        assets.use_embedded = false;
    }
    if args.timeout_ms.is_some() {
        config.timeout_ms = args.timeout_ms;
    }
    config.debug |= args.debug;

    Ok((assets, config))
}

/// One task per input. Fails before anything runs if two inputs map to the
/// same output or an output would replace one of the inputs.
fn plan_encode(
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    out_dir: Option<&Path>,
    options: &EncodeOptions,
) -> Result<Vec<EncodeTask>> {
    let tasks: Vec<EncodeTask> = inputs
        .into_iter()
        .map(|input| EncodeTask {
            output_path: output.clone().unwrap_or_else(|| output_for(&input, out_dir)),
            input_path: input,
            options: options.clone(),
        })
        .collect();

    check_output_paths(&tasks).context("Refusing to encode")?;
    Ok(tasks)
}

/// `photo.png` -> `photo.jpg`; a JPEG source gets a `-mozjpeg` suffix instead of being overwritten.
fn output_for(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let stem = input.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();

    let candidate = dir.join(format!("{stem}.jpg"));
    if candidate == input {
        dir.join(format!("{stem}-mozjpeg.jpg"))
    } else {
        candidate
    }
}

fn parse_crop(value: &str) -> Result<CropRect, String> {
    let invalid = || format!("invalid crop '{value}', expected WxH+X+Y");

    let (size, offset) = value.split_once('+').ok_or_else(invalid)?;
    let (width, height) = size.split_once('x').ok_or_else(invalid)?;
    let (x, y) = offset.split_once('+').ok_or_else(invalid)?;

    let number = |s: &str| s.trim().parse::<u32>().map_err(|_| invalid());
    Ok(CropRect::new(number(x)?, number(y)?, number(width)?, number(height)?))
}

fn report(results: &[OptimizationResult], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    for result in results {
        match &result.error {
            Some(error) => println!("{}: failed: {}", result.original_path, error),
            None => println!(
                "{} -> {}: {} -> {} bytes, saved {} ({:.1}%)",
                result.original_path,
                result.optimized_path,
                result.original_size,
                result.optimized_size,
                result.saved_bytes,
                result.compression_ratio,
            ),
        }
    }
    Ok(())
}
