use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use crate::utils::ToolError;

/// Image formats the CLI knows how to feed to cjpeg.
///
/// cjpeg reads PPM/PGM, BMP, Targa and (mozjpeg builds) JPEG directly.
/// Everything else is decoded in-process and re-encoded before piping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    JPEG,
    PPM,
    BMP,
    TGA,
    PNG,
}

impl ImageFormat {
    /// Get file extensions associated with this format
    pub fn extensions(&self) -> &[&str] {
        match self {
            Self::JPEG => &["jpg", "jpeg"],
            Self::PPM => &["ppm", "pgm", "pnm"],
            Self::BMP => &["bmp"],
            Self::TGA => &["tga"],
            Self::PNG => &["png"],
        }
    }

    /// Check if the extension matches this format
    pub fn matches_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.extensions().contains(&ext.as_str())
    }

    /// Whether cjpeg can read this format straight from a path argument
    pub fn is_native_cjpeg_input(&self) -> bool {
        !matches!(self, Self::PNG)
    }
}

impl FromStr for ImageFormat {
    type Err = ToolError;

    fn from_str(ext: &str) -> Result<Self, Self::Err> {
        let ext = ext.to_lowercase();
        [Self::JPEG, Self::PPM, Self::BMP, Self::TGA, Self::PNG]
            .into_iter()
            .find(|format| format.matches_extension(&ext))
            .ok_or_else(|| ToolError::format(format!("Unsupported image format: {}", ext)))
    }
}

/// Get format from file extension
pub fn format_from_extension(path: &Path) -> Result<ImageFormat, ToolError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ToolError::format(
            format!("File has no extension: {}", path.display())
        ))?;

    ImageFormat::from_str(ext)
}
