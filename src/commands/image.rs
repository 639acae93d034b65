//! Command handlers behind the `mozjpeg-runner` CLI.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::core::{AssetConfig, EncodeOptions, OptimizationResult, RunnerConfig, Tool, TransformOptions};
use crate::processing::{BinaryRegistry, CJpeg, JpegTran};
use crate::utils::{
    ToolError, ToolResult, ValidationError, format_from_extension, get_file_size, validate_input_path,
};

/// One cjpeg job: source image, JPEG destination and encoder options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeTask {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub options: EncodeOptions,
}

/// One jpegtran job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformTask {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub options: TransformOptions,
}

/// Encodes a single image file to JPEG.
///
/// Formats cjpeg reads natively are passed by path. Anything else (PNG) is
/// decoded on a blocking thread and fed to cjpeg over stdin.
pub async fn encode_image(
    registry: Arc<BinaryRegistry>,
    config: &RunnerConfig,
    task: &EncodeTask,
) -> ToolResult<OptimizationResult> {
    validate_input_path(&task.input_path)?;
    let format = format_from_extension(&task.input_path)?;
    debug!("Encoding {} ({:?})", task.input_path.display(), format);

    let decoded: DynamicImage;
    let mut cjpeg = CJpeg::with_registry(registry, config.clone());
    cjpeg.set_options(task.options.clone()).output_file(&task.output_path);

    if format.is_native_cjpeg_input() {
        cjpeg.input_file(&task.input_path);
    } else {
        let path = task.input_path.clone();
        decoded = tokio::task::spawn_blocking(move || image::open(path))
            .await
            .map_err(|e| ToolError::io(format!("Decode task panicked: {e}")))??;
        cjpeg.input_image(&decoded);
    }

    cjpeg.run().await?;
    sizes(&task.input_path, &task.output_path).await
}

/// Rejects a batch where two tasks write the same file or a task writes
/// over the source of any task.
pub fn check_output_paths(tasks: &[EncodeTask]) -> ToolResult<()> {
    let key = |path: &Path| std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let inputs: HashSet<PathBuf> = tasks.iter().map(|t| key(&t.input_path)).collect();

    let mut outputs = HashSet::with_capacity(tasks.len());
    for task in tasks {
        let output = key(&task.output_path);
        if inputs.contains(&output) {
            return Err(ValidationError::option(format!(
                "Output {} would overwrite an input image",
                task.output_path.display()
            ))
            .into());
        }
        if !outputs.insert(output) {
            return Err(ValidationError::option(format!(
                "More than one input would be written to {}",
                task.output_path.display()
            ))
            .into());
        }
    }
    Ok(())
}

/// Encodes every task, running at most `jobs` cjpeg processes at once.
///
/// Returns one result per task in input order; failures are reported in the
/// result instead of aborting the batch. Callers should run
/// [`check_output_paths`] first, since tasks run concurrently.
pub async fn encode_images(
    registry: Arc<BinaryRegistry>,
    config: &RunnerConfig,
    tasks: Vec<EncodeTask>,
    jobs: usize,
) -> Vec<OptimizationResult> {
    let total = tasks.len();
    debug!("Encoding {} images with up to {} jobs", total, jobs.max(1));

    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let paths: Vec<_> = tasks
        .iter()
        .map(|t| (t.input_path.clone(), t.output_path.clone()))
        .collect();

    let mut set = JoinSet::new();
    for (index, task) in tasks.into_iter().enumerate() {
        let registry = Arc::clone(&registry);
        let semaphore = Arc::clone(&semaphore);
        let config = config.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let outcome = encode_image(registry, &config, &task).await;
            (index, outcome)
        });
    }

    let mut results: Vec<Option<OptimizationResult>> = vec![None; total];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, Ok(result))) => results[index] = Some(result),
            Ok((index, Err(e))) => {
                let (input, output) = &paths[index];
                warn!("Encoding failed for {}: {}", input.display(), e);
                results[index] = Some(failed(input, output, e.to_string()));
            }
            Err(e) => warn!("Encode task panicked: {}", e),
        }
    }

    results
        .into_iter()
        .zip(paths)
        .map(|(result, (input, output))| {
            result.unwrap_or_else(|| failed(&input, &output, "task did not complete"))
        })
        .collect()
}

/// Losslessly transforms a JPEG file with jpegtran.
pub async fn transform_image(
    registry: Arc<BinaryRegistry>,
    config: &RunnerConfig,
    task: &TransformTask,
) -> ToolResult<OptimizationResult> {
    let mut tran = JpegTran::with_registry(registry, config.clone());
    tran.set_options(task.options.clone())
        .input_file(&task.input_path)
        .output_file(&task.output_path);
    tran.run().await?;
    sizes(&task.input_path, &task.output_path).await
}

/// Version banner of the embedded `tool`.
pub async fn tool_version(tool: Tool, assets: &AssetConfig, config: &RunnerConfig) -> ToolResult<String> {
    match tool {
        Tool::CJpeg => CJpeg::with_config(assets, config.clone())?.version().await,
        Tool::JpegTran => JpegTran::with_config(assets, config.clone())?.version().await,
    }
}

async fn sizes(input: &Path, output: &Path) -> ToolResult<OptimizationResult> {
    let original_size = get_file_size(input).await?;
    let optimized_size = get_file_size(output).await?;
    Ok(OptimizationResult::from_sizes(
        input.to_string_lossy(),
        output.to_string_lossy(),
        original_size,
        optimized_size,
    ))
}

fn failed(input: &Path, output: &Path, error: impl Into<String>) -> OptimizationResult {
    OptimizationResult::failed(input.to_string_lossy(), output.to_string_lossy(), error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_registry() -> Arc<BinaryRegistry> {
        Arc::new(BinaryRegistry::new("cjpeg"))
    }

    #[tokio::test]
    async fn encode_rejects_missing_input() {
        let task = EncodeTask {
            input_path: "/no/such/image.ppm".into(),
            output_path: "/tmp/out.jpg".into(),
            options: EncodeOptions::default(),
        };
        let err = encode_image(empty_registry(), &RunnerConfig::default(), &task)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn batch_reports_one_result_per_task() {
        let dir = tempfile::tempdir().unwrap();
        let unknown = dir.path().join("notes.txt");
        std::fs::write(&unknown, b"hello").unwrap();

        let tasks = vec![
            EncodeTask {
                input_path: dir.path().join("missing.bmp"),
                output_path: dir.path().join("a.jpg"),
                options: EncodeOptions::default(),
            },
            EncodeTask {
                input_path: unknown.clone(),
                output_path: dir.path().join("b.jpg"),
                options: EncodeOptions::default(),
            },
        ];

        let results = encode_images(empty_registry(), &RunnerConfig::default(), tasks, 4).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success && r.error.is_some()));
        assert_eq!(results[1].original_path, unknown.to_string_lossy());
    }

    fn task(input: &str, output: &str) -> EncodeTask {
        EncodeTask {
            input_path: input.into(),
            output_path: output.into(),
            options: EncodeOptions::default(),
        }
    }

    #[test]
    fn distinct_outputs_are_accepted() {
        let tasks = [task("a/photo.png", "out/a-photo.jpg"), task("b/photo.png", "out/b-photo.jpg")];
        assert!(check_output_paths(&tasks).is_ok());
        assert!(check_output_paths(&[]).is_ok());
    }

    #[test]
    fn shared_output_is_rejected() {
        let tasks = [task("a/photo.png", "out/photo.jpg"), task("b/photo.png", "out/photo.jpg")];
        let err = check_output_paths(&tasks).unwrap_err();
        assert!(matches!(err, ToolError::Validation(ValidationError::Option(_))));
        assert!(err.to_string().contains("out/photo.jpg"));
    }

    #[test]
    fn output_over_another_input_is_rejected() {
        let tasks = [task("dir/photo.png", "dir/photo.jpg"), task("dir/photo.jpg", "dir/photo-mozjpeg.jpg")];
        let err = check_output_paths(&tasks).unwrap_err();
        assert!(err.to_string().contains("overwrite"));
    }

    #[test]
    fn relative_and_dotted_paths_compare_equal() {
        let tasks = [task("a.png", "out/a.jpg"), task("b.png", "./out/a.jpg")];
        assert!(check_output_paths(&tasks).is_err());
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let results = encode_images(empty_registry(), &RunnerConfig::default(), Vec::new(), 0).await;
        assert!(results.is_empty());
    }
}
