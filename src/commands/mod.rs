//! Command handlers for the CLI.
//!
//! - [`encode_image`] / [`encode_images`]: Encode images to JPEG with cjpeg
//! - [`check_output_paths`]: Reject batches whose outputs collide
//! - [`transform_image`]: Lossless jpegtran transforms
//! - [`tool_version`]: Version banner of an embedded tool

mod image;

pub use self::image::*;
