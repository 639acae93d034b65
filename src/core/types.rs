//! Core types for tool options and results.

use std::fmt;
use serde::{Deserialize, Serialize};

/// The mozjpeg tools this crate knows how to embed and drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// JPEG encoder
    CJpeg,
    /// Lossless JPEG transformer
    JpegTran,
}

impl Tool {
    /// Binary name as it appears in the asset table (without `.exe`)
    pub fn binary_name(&self) -> &'static str {
        match self {
            Self::CJpeg => "cjpeg",
            Self::JpegTran => "jpegtran",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Options for the cjpeg encoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// Compression factor 0-100; `None` leaves the tool default (75)
    pub quality: Option<u8>,
    /// Optimize entropy encoding parameters
    pub optimize: bool,
}

impl EncodeOptions {
    /// Sets quality, clamping anything above 100 down to 100.
    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = Some(quality.min(100) as u8);
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }
}

/// Rectangular region for lossless cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// jpegtran geometry: `WxH+X+Y`
    pub fn to_geometry(&self) -> String {
        format!("{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Which extra markers jpegtran copies from the source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyMarkers {
    /// Drop comments and all other metadata
    #[default]
    None,
    /// Keep comment markers only
    Comments,
    /// Keep every extra marker (Exif, JFIF thumbnails, ...)
    All,
}

impl CopyMarkers {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Comments => "comments",
            Self::All => "all",
        }
    }
}

/// Options for the jpegtran transformer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOptions {
    /// Optimize entropy encoding parameters (on by default)
    pub optimize: bool,
    /// Write a progressive JPEG
    pub progressive: bool,
    /// Crop region, if any
    pub crop: Option<CropRect>,
    /// Marker copy policy
    pub copy: CopyMarkers,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            progressive: false,
            crop: None,
            copy: CopyMarkers::None,
        }
    }
}

/// Result of running a tool from file to file.
///
/// Contains the original and output file information along with
/// compression statistics.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    /// Path to the original input file
    pub original_path: String,
    /// Path to the written output file
    pub optimized_path: String,
    /// Original file size in bytes
    pub original_size: u64,
    /// Output file size in bytes
    pub optimized_size: u64,
    /// Whether the run succeeded
    pub success: bool,
    /// Error message if the run failed
    pub error: Option<String>,
    /// Bytes saved (can be negative if file grew)
    #[serde(rename = "savedBytes")]
    pub saved_bytes: i64,
    /// Compression ratio as a percentage
    #[serde(rename = "compressionRatio")]
    pub compression_ratio: f64,
}

impl OptimizationResult {
    pub fn from_sizes(
        original_path: impl Into<String>,
        optimized_path: impl Into<String>,
        original_size: u64,
        optimized_size: u64,
    ) -> Self {
        let saved_bytes = original_size as i64 - optimized_size as i64;
        let compression_ratio = if original_size == 0 {
            0.0
        } else {
            saved_bytes as f64 / original_size as f64 * 100.0
        };

        Self {
            original_path: original_path.into(),
            optimized_path: optimized_path.into(),
            original_size,
            optimized_size,
            success: true,
            error: None,
            saved_bytes,
            compression_ratio,
        }
    }

    /// A failed run; sizes are zero so batch totals stay meaningful.
    pub fn failed(
        original_path: impl Into<String>,
        optimized_path: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            original_path: original_path.into(),
            optimized_path: optimized_path.into(),
            original_size: 0,
            optimized_size: 0,
            success: false,
            error: Some(error.into()),
            saved_bytes: 0,
            compression_ratio: 0.0,
        }
    }
}
