use serde::{Deserialize, Serialize};

use super::{ImageEntry, Payload};

/// One record emitted by the interpreter (`stdout`, `stderr`, `message`,
/// `warning`, ...).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputLine {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Payload,
}

impl OutputLine {
    pub fn new(kind: &str, data: Payload) -> Self {
        Self {
            kind: Some(kind.to_string()),
            data,
        }
    }

    pub fn stdout(text: impl Into<String>) -> Self {
        Self::new("stdout", Payload::text(text))
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self::new("stderr", Payload::text(text))
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new("warning", Payload::condition(message))
    }
}

/// Everything a captured evaluation hands back.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureResult {
    #[serde(default)]
    pub output: Vec<OutputLine>,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
}

impl CaptureResult {
    pub fn raster_count(&self) -> usize {
        self.images.iter().filter(|i| i.as_raster().is_some()).count()
    }
}

fn default_true() -> bool {
    true
}

/// Flags passed to the interpreter with every captured evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    #[serde(default)]
    pub with_autoprint: bool,
    #[serde(default = "default_true")]
    pub capture_streams: bool,
    #[serde(default = "default_true")]
    pub capture_conditions: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            with_autoprint: false,
            capture_streams: default_true(),
            capture_conditions: default_true(),
        }
    }
}
