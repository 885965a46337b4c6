// Domain modules
pub mod config;
pub mod error;
pub mod grading;
pub mod lesson;
pub mod output;
pub mod packages;
pub mod render;

pub use config::{InterpreterConfig, ServerConfig, TutorConfig};
pub use error::{Result, TutorError};
pub use grading::{compare_code, compare_values, normalize_code, normalize_value};
pub use lesson::{Exercise, Lesson};
pub use output::{CaptureOptions, CaptureResult, ImageEntry, OutputLine, Payload, RasterImage};
pub use packages::{required_packages, PackageList, PackageTable, DEFAULT_PACKAGES, PAGE_PACKAGES};
pub use render::{
    escape_html, escape_html_opt, escape_value, render_capture, render_images, render_text, Canvas, PngCanvas,
    LINE_BREAK,
};
