use std::sync::Arc;
use image::DynamicImage;
use tokio::io::AsyncWrite;
use crate::core::{EncodeOptions, RunnerConfig};
use crate::processing::binwrap::BinaryRegistry;
use crate::utils::ToolResult;
use super::CJpeg;

/// Encodes `image` into `writer` as JPEG using the embedded cjpeg.
///
/// `None` keeps cjpeg's defaults (quality 75, no optimization).
pub async fn encode<W>(writer: &mut W, image: &DynamicImage, options: Option<&EncodeOptions>) -> ToolResult<()>
where
    W: AsyncWrite + Send + Unpin,
{
    let mut cjpeg = CJpeg::new()?;
    encode_on(&mut cjpeg, writer, image, options).await
}

/// Same as [`encode`], with the cjpeg binary taken from `registry`.
pub async fn encode_with<W>(
    registry: Arc<BinaryRegistry>,
    writer: &mut W,
    image: &DynamicImage,
    options: Option<&EncodeOptions>,
) -> ToolResult<()>
where
    W: AsyncWrite + Send + Unpin,
{
    let mut cjpeg = CJpeg::with_registry(registry, RunnerConfig::default());
    encode_on(&mut cjpeg, writer, image, options).await
}

async fn encode_on<'io, W>(
    cjpeg: &mut CJpeg<'io>,
    writer: &'io mut W,
    image: &'io DynamicImage,
    options: Option<&EncodeOptions>,
) -> ToolResult<()>
where
    W: AsyncWrite + Send + Unpin,
{
    if let Some(options) = options {
        cjpeg.set_options(options.clone());
    }
    cjpeg.input_image(image).output(writer).run().await
}
