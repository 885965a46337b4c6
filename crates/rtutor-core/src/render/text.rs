use super::{escape_html, LINE_BREAK};
use crate::OutputLine;

/// Render interpreter output lines as escaped HTML joined by `<br>`.
///
/// Absent input renders as "". Lines whose payload has no displayable text
/// still take a slot, so blank lines are preserved.
pub fn render_text(lines: Option<&[OutputLine]>) -> String {
    let Some(lines) = lines else {
        return String::new();
    };
    lines
        .iter()
        .map(|line| escape_html(&line.data.display_text()))
        .collect::<Vec<_>>()
        .join(LINE_BREAK)
}
