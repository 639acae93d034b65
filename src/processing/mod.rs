pub mod binwrap;
pub mod mozjpeg;

pub use binwrap::{BinaryRegistry, BinarySource, KillHandle, Platform, ProcessRunner, RunResult, RunStatus};
pub use mozjpeg::{CJpeg, JpegTran, encode, encode_with};
