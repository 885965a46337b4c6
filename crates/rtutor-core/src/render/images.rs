use std::io::Cursor;

use base64::engine::{general_purpose::STANDARD, Engine};
use image::{ImageFormat, RgbaImage};

use super::{escape_html, LINE_BREAK};
use crate::error::{Result, TutorError};
use crate::{ImageEntry, RasterImage};

/// CSS class attached to every rendered plot.
pub const IMAGE_CLASS: &str = "console-img";

/// A drawing surface able to turn a bitmap into a `data:` URL.
///
/// Hosts without graphics support simply have no canvas.
pub trait Canvas: Send + Sync {
    fn to_data_url(&self, image: &RasterImage) -> Result<String>;
}

/// Encodes bitmaps as base64 PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCanvas;

impl Canvas for PngCanvas {
    fn to_data_url(&self, image: &RasterImage) -> Result<String> {
        let buffer = RgbaImage::from_raw(image.width, image.height, image.rgba.clone())
            .ok_or_else(|| {
                TutorError::Image(format!(
                    "pixel buffer of {} bytes does not fit {}x{}",
                    image.rgba.len(),
                    image.width,
                    image.height
                ))
            })?;

        let mut bytes = Cursor::new(Vec::new());
        buffer
            .write_to(&mut bytes, ImageFormat::Png)
            .map_err(|e| TutorError::Image(format!("Failed to write image: {e}")))?;

        let encoded = STANDARD.encode(bytes.into_inner());
        Ok(format!("data:image/png;base64,{encoded}"))
    }
}

/// Render bitmaps as `<img>` tags, each preceded by `<br>`.
///
/// Returns "" when there is nothing to draw or no canvas is available.
/// Entries that are not bitmaps, or fail to encode, are skipped.
pub fn render_images(images: Option<&[ImageEntry]>, canvas: Option<&dyn Canvas>) -> String {
    let (Some(images), Some(canvas)) = (images, canvas) else {
        return String::new();
    };

    let mut html = String::new();
    for image in images.iter().filter_map(ImageEntry::as_raster) {
        match canvas.to_data_url(image) {
            Ok(url) => {
                html.push_str(LINE_BREAK);
                html.push_str(&format!(
                    "<img src=\"{}\" class=\"{IMAGE_CLASS}\">",
                    escape_html(&url)
                ));
            }
            Err(e) => tracing::warn!("Skipping image {}x{}: {}", image.width, image.height, e),
        }
    }
    html
}
