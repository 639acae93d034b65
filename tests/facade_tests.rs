#![cfg(unix)]
//! Facade tests against `mozjpeg-standin`, a look-alike that validates the
//! cjpeg/jpegtran argument list and copies its JPEG input to the output.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, Rgb, RgbImage};
use mozjpeg_runner::commands::{EncodeTask, TransformTask, encode_image, transform_image};
use mozjpeg_runner::processing::mozjpeg::encode_interchange;
use mozjpeg_runner::{
    BinaryRegistry, BinarySource, CJpeg, EncodeOptions, JpegTran, RunnerConfig, ToolError, TransformOptions,
    encode_with,
};

fn standin(name: &str) -> Arc<BinaryRegistry> {
    let bytes = std::fs::read(env!("CARGO_BIN_EXE_mozjpeg-standin")).unwrap();
    Arc::new(BinaryRegistry::new(name).with_source(BinarySource::new(bytes)))
}

fn cjpeg<'io>() -> CJpeg<'io> {
    CJpeg::with_registry(standin("cjpeg"), RunnerConfig::default())
}

fn jpegtran<'io>() -> JpegTran<'io> {
    JpegTran::with_registry(standin("jpegtran"), RunnerConfig::default())
}

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

#[tokio::test]
async fn version_drops_line_terminators() {
    assert_eq!(cjpeg().version().await.unwrap(), "stand-in mozjpeg version 4.1built today");
    assert_eq!(jpegtran().version().await.unwrap(), "stand-in mozjpeg version 4.1built today");
}

#[tokio::test]
async fn encode_streams_into_writer() {
    let source = gradient(48, 32);
    let options = EncodeOptions::default().with_quality(60).with_optimize(true);

    let mut out = Vec::new();
    encode_with(standin("cjpeg"), &mut out, &source, Some(&options)).await.unwrap();
    assert_eq!(out, encode_interchange(&source).unwrap());

    let mut defaults = Vec::new();
    encode_with(standin("cjpeg"), &mut defaults, &source, None).await.unwrap();
    assert_eq!(defaults, out);
}

#[tokio::test]
async fn jpegtran_streams_reader_to_writer() {
    let jpeg = encode_interchange(&gradient(64, 64)).unwrap();
    let mut out = Vec::new();
    {
        let mut tran = jpegtran();
        tran.progressive(true)
            .crop(8, 8, 16, 16)
            .copy_all()
            .input(Cursor::new(jpeg.clone()))
            .output(&mut out);
        tran.run().await.unwrap();
    }
    assert_eq!(out, jpeg);
}

#[tokio::test]
async fn input_file_and_outfile_are_wired_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.jpg");
    let output = dir.path().join("out.jpg");
    let jpeg = encode_interchange(&gradient(20, 10)).unwrap();
    std::fs::write(&input, &jpeg).unwrap();

    let mut cjpeg = cjpeg();
    cjpeg.quality(90).optimize(true).input_file(&input).output_file(&output);
    cjpeg.run().await.unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), jpeg);

    let copied = dir.path().join("copied.jpg");
    let mut tran = jpegtran();
    tran.copy_comments().input_file(&output).output_file(&copied);
    tran.run().await.unwrap();
    assert_eq!(std::fs::read(&copied).unwrap(), jpeg);
}

#[tokio::test]
async fn tool_failure_carries_trimmed_stderr() {
    let mut tran = jpegtran();
    tran.input(&b"definitely not a jpeg"[..]).output(Vec::new());
    match tran.run().await {
        Err(ToolError::NonZeroExit { code, stderr }) => {
            assert_eq!(code, Some(1));
            assert_eq!(stderr, "mozjpeg-standin: Not a JPEG file");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn facade_is_reusable_after_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = gradient(16, 16);
    let mut cjpeg = cjpeg();

    for i in 0..2 {
        let output = dir.path().join(format!("{i}.jpg"));
        cjpeg.input_image(&source).output_file(&output);
        cjpeg.run().await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), encode_interchange(&source).unwrap());
    }
}

#[tokio::test]
async fn encode_command_decodes_png_sources() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("in.jpg");
    let source = gradient(40, 30);
    source.save(&input).unwrap();

    let task = EncodeTask {
        input_path: input,
        output_path: output.clone(),
        options: EncodeOptions::default().with_quality(85),
    };
    let result = encode_image(standin("cjpeg"), &RunnerConfig::default(), &task).await.unwrap();

    assert!(result.success);
    assert_eq!(std::fs::read(&output).unwrap(), encode_interchange(&source).unwrap());
    assert_eq!(result.optimized_size, std::fs::metadata(&output).unwrap().len());
}

#[tokio::test]
async fn transform_command_reports_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("src.jpg");
    let output = dir.path().join("dst.jpg");
    std::fs::write(&input, encode_interchange(&gradient(24, 24)).unwrap()).unwrap();

    let task = TransformTask {
        input_path: input,
        output_path: output,
        options: TransformOptions::default(),
    };
    let result = transform_image(standin("jpegtran"), &RunnerConfig::default(), &task).await.unwrap();

    assert!(result.success);
    assert!(result.original_size > 0);
    assert_eq!(result.original_size, result.optimized_size);
    assert_eq!(result.saved_bytes, 0);
}
