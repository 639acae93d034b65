//! Input/output wiring shared by the mozjpeg facades.

use std::io::Cursor;
use std::path::PathBuf;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::processing::binwrap::{InputStream, OutputSink, ProcessRunner};
use crate::utils::{ToolError, ToolResult, validate_input_path, validate_output_path};

/// Quality used when an in-memory image is handed to cjpeg as JPEG.
const INTERCHANGE_QUALITY: u8 = 100;

/// Where a facade reads its source image from.
pub enum ImageInput<'io> {
    /// Passed as the positional path argument
    File(PathBuf),
    /// Piped to stdin
    Reader(InputStream<'io>),
    /// Re-encoded as a maximum-quality JPEG and piped to stdin
    Image(&'io DynamicImage),
}

impl<'io> ImageInput<'io> {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn reader(reader: impl AsyncRead + Send + Unpin + 'io) -> Self {
        Self::Reader(Box::new(reader))
    }
}

/// Where a facade writes its result to.
pub enum ImageOutput<'io> {
    /// Passed as `-outfile <path>`
    File(PathBuf),
    /// Stdout streamed into the writer
    Writer(OutputSink<'io>),
}

impl<'io> ImageOutput<'io> {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn writer(writer: impl AsyncWrite + Send + Unpin + 'io) -> Self {
        Self::Writer(Box::new(writer))
    }
}

/// Adds `-outfile` or installs the stdout sink. Must run before [`wire_input`]
/// so the positional input path stays last.
pub(crate) fn wire_output<'io>(
    runner: &mut ProcessRunner<'io>,
    output: Option<ImageOutput<'io>>,
) -> ToolResult<()> {
    match output {
        Some(ImageOutput::File(path)) => {
            validate_output_path(&path)?;
            runner.arg("-outfile", [path.as_os_str()]);
        }
        Some(ImageOutput::Writer(writer)) => {
            runner.set_stdout_sink(writer);
        }
        None => return Err(ToolError::config("undefined output")),
    }
    Ok(())
}

/// Adds the positional input path or installs the stdin source.
pub(crate) fn wire_input<'io>(
    runner: &mut ProcessRunner<'io>,
    input: Option<ImageInput<'io>>,
) -> ToolResult<()> {
    match input {
        Some(ImageInput::File(path)) => {
            validate_input_path(&path)?;
            runner.flag(&path);
        }
        Some(ImageInput::Reader(reader)) => {
            runner.set_stdin(reader);
        }
        Some(ImageInput::Image(image)) => {
            let encoded = encode_interchange(image)?;
            debug!(
                "Re-encoded {}x{} image as {} byte JPEG for stdin",
                image.width(),
                image.height(),
                encoded.len()
            );
            runner.set_stdin(Cursor::new(encoded));
        }
        None => return Err(ToolError::config("undefined input")),
    }
    Ok(())
}

/// Encodes `image` as a quality-100 JPEG in memory.
pub fn encode_interchange(image: &DynamicImage) -> ToolResult<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, INTERCHANGE_QUALITY);
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image.write_with_encoder(encoder)?,
        // JPEG has no alpha or 16-bit channels
        other => DynamicImage::ImageRgb8(other.to_rgb8()).write_with_encoder(encoder)?,
    }
    Ok(buf)
}
