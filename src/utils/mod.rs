pub mod error;
pub mod validation;
pub mod formats;
pub mod fs;

pub use error::{PathError, ToolError, ToolResult, ValidationError};
pub use validation::{validate_crop, validate_input_path, validate_output_path};
pub use formats::{ImageFormat, format_from_extension};
pub use fs::get_file_size;
