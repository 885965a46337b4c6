//! Turns interpreter results into HTML fragments.
//!
//! [`escape_html`] is the only sanitization step between interpreter or
//! learner text and the page; every untrusted string passes through it
//! before it is placed in markup.

mod escape;
mod images;
mod text;

pub use escape::{escape_html, escape_html_opt, escape_value};
pub use images::{render_images, Canvas, PngCanvas, IMAGE_CLASS};
pub use text::render_text;

/// Marker placed between rendered lines.
pub const LINE_BREAK: &str = "<br>";

/// Render a full capture: text lines followed by images.
pub fn render_capture(result: &crate::CaptureResult, canvas: Option<&dyn Canvas>) -> String {
    let mut html = render_text(Some(result.output.as_slice()));
    html.push_str(&render_images(Some(result.images.as_slice()), canvas));
    html
}
