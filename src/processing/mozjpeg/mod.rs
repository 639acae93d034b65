// src/processing/mozjpeg/mod.rs

//! Facades over the embedded mozjpeg tools.
//!
//! Each facade turns its options into an ordered argument list (flags first,
//! `-outfile`, then the positional input), wires stdin/stdout, and delegates
//! to a [`ProcessRunner`] that it resets after every run.

mod cjpeg;
mod encode;
mod io;
mod jpegtran;

pub use cjpeg::CJpeg;
pub use encode::{encode, encode_with};
pub use io::{ImageInput, ImageOutput, encode_interchange};
pub use jpegtran::JpegTran;

use crate::processing::binwrap::ProcessRunner;
use crate::utils::ToolResult;

/// Runs the binary with `-version` and returns stderr without line terminators.
pub(crate) async fn read_version(runner: &mut ProcessRunner<'_>) -> ToolResult<String> {
    let result = runner.run(["-version"]).await?;
    result.check()?;
    Ok(result.stderr_lossy().replace(['\n', '\r'], ""))
}
