mod capture;
mod payload;
mod raster;

pub use capture::{CaptureOptions, CaptureResult, OutputLine};
pub use payload::Payload;
pub use raster::{ImageEntry, RasterImage};
