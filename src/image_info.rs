//! Local image inspection: decode the upload and report its geometry.

use anyhow::{Context, Result};
use image::{ColorType, ImageFormat};

/// PNG colour type 3 in the IHDR chunk: palette-indexed pixels.
const PNG_INDEXED_COLOR: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub mode: String,
}

/// `true` for any `image/*` content type.
pub fn is_image_content_type(content_type: &str) -> bool {
    content_type.starts_with("image/")
}

/// Decode `data` (format guessed from magic bytes) and report width, height and mode.
pub fn inspect_image(data: &[u8]) -> Result<ImageInfo> {
    let format = image::guess_format(data).context("unrecognized image format")?;
    let img = image::load_from_memory_with_format(data, format)
        .context("corrupt image data")?;

    // The decoder expands palettes, so indexed sources are recognised from the container.
    let mode = if is_indexed(data, format) {
        "P".to_string()
    } else {
        color_mode(img.color())
    };

    Ok(ImageInfo {
        width: img.width(),
        height: img.height(),
        mode,
    })
}

fn is_indexed(data: &[u8], format: ImageFormat) -> bool {
    match format {
        ImageFormat::Gif => true,
        // 8-byte signature, IHDR length + tag, width, height, bit depth, colour type
        ImageFormat::Png => {
            data.len() > 25 && &data[12..16] == b"IHDR" && data[25] == PNG_INDEXED_COLOR
        }
        _ => false,
    }
}

/// Short pixel-mode label in the customary `L` / `LA` / `RGB` / `RGBA` vocabulary.
fn color_mode(color: ColorType) -> String {
    let mode = match color {
        ColorType::L8 => "L",
        ColorType::L16 => "I;16",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        other => return format!("{:?}", other),
    };
    mode.to_string()
}
