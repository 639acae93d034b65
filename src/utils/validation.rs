use std::path::Path;
use crate::core::CropRect;
use crate::utils::{ToolResult, ValidationError};

/// Validates that the input path exists and is a regular file
pub fn validate_input_path(path: &Path) -> ToolResult<()> {
    if !path.exists() {
        return Err(ValidationError::path_not_found(path).into());
    }

    if !path.is_file() {
        return Err(ValidationError::not_a_file(path).into());
    }

    Ok(())
}

/// Validates that the output file can be created in its parent directory
pub fn validate_output_path(path: &Path) -> ToolResult<()> {
    if let Some(parent) = path.parent() {
        // A bare file name has an empty parent, meaning the working directory
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(ValidationError::missing_dir(parent).into());
        }
    }

    if path.is_dir() {
        return Err(ValidationError::not_a_file(path).into());
    }

    Ok(())
}

/// Validates a crop rectangle before it is turned into a `-crop` argument
pub fn validate_crop(crop: &CropRect) -> ToolResult<()> {
    if crop.width == 0 || crop.height == 0 {
        return Err(ValidationError::option(format!(
            "Crop region must be non-empty, got {}x{}",
            crop.width, crop.height
        ))
        .into());
    }

    Ok(())
}
