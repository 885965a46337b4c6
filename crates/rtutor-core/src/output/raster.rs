use base64::engine::{general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Result, TutorError};

/// An RGBA8 bitmap produced by the interpreter, e.g. a plot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    #[serde(serialize_with = "encode_pixels", deserialize_with = "decode_pixels")]
    pub rgba: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self { width, height, rgba }
    }

    /// Decode an encoded bitmap (PNG) into raw RGBA pixels.
    pub fn from_png_bytes(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
            .map_err(|e| TutorError::Image(format!("Failed to read image: {e}")))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        Ok(Self::new(width, height, decoded.into_raw()))
    }

    /// Whether the pixel buffer matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        let expected = self.width as usize * self.height as usize * 4;
        self.width > 0 && self.height > 0 && self.rgba.len() == expected
    }
}

/// An entry of the interpreter's image list. Anything that is not a
/// bitmap is kept as-is and skipped when rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageEntry {
    Raster(RasterImage),
    Other(Value),
}

impl ImageEntry {
    pub fn as_raster(&self) -> Option<&RasterImage> {
        match self {
            ImageEntry::Raster(image) => Some(image),
            ImageEntry::Other(_) => None,
        }
    }
}

impl From<RasterImage> for ImageEntry {
    fn from(image: RasterImage) -> Self {
        ImageEntry::Raster(image)
    }
}

fn encode_pixels<S: Serializer>(rgba: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(rgba))
}

fn decode_pixels<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded).map_err(serde::de::Error::custom)
}
