//! An [`Interpreter`] backed by a local `Rscript` binary.
//!
//! Each capture runs in its own process and temp directory. Setup code is
//! remembered and replayed ahead of every capture, since nothing survives
//! between processes.

use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use rtutor_core::{
    CaptureOptions, CaptureResult, ImageEntry, InterpreterConfig, OutputLine, Payload, RasterImage,
};
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::RwLock;

use crate::session::{Interpreter, Result, SessionError, Shelter};

const CRAN_MIRROR: &str = "https://cloud.r-project.org";
const PLOT_PREFIX: &str = "plot";

/// Starts a condition record written to stdout by the capture script.
const CONDITION_MARK: char = '\u{1e}';
/// Separates a condition's kind from its message.
const FIELD_MARK: char = '\u{1f}';

/// Writes each line of a condition message to stdout as
/// `\036<kind>\037<line>`, keeping it in order with printed output.
const EMIT_CONDITION: &str = r#".rtutor_emit <- function(kind, text) {
  for (line in strsplit(sub("\n$", "", text), "\n", fixed = TRUE)[[1]]) cat("\036", kind, "\037", line, "\n", sep = "", file = stdout())
}
"#;

static WARNING_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Warning message(s)?:\s*$").expect("valid regex"));
static WARNING_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+: )?(?:In .*? :\s*)?(.+)$").expect("valid regex"));
static INLINE_WARNING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Warning(?: in .*? :|:)\s*(.+)$").expect("valid regex"));
static ERROR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Error(?: in .*? :|:)\s*").expect("valid regex"));

struct ProcessOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

pub struct RscriptInterpreter {
    program: String,
    timeout_ms: u32,
    prelude: RwLock<String>,
}

impl RscriptInterpreter {
    pub fn new(program: &str, timeout_ms: u32) -> Self {
        Self {
            program: program.to_string(),
            timeout_ms,
            prelude: RwLock::new(String::new()),
        }
    }

    pub fn from_config(config: &InterpreterConfig) -> Self {
        Self::new(&config.rscript_path, config.timeout_ms)
    }

    /// Run a throwaway script and report whether R exited cleanly.
    async fn run_once(&self, script: &str) -> Result<ProcessOutput> {
        let dir = TempDir::new()?;
        run_script(&self.program, dir.path(), script, self.timeout_ms).await
    }
}

#[async_trait]
impl Interpreter for RscriptInterpreter {
    async fn install_packages(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let script = format!(
            "for (pkg in c({})) if (!requireNamespace(pkg, quietly = TRUE)) install.packages(pkg, repos = {})",
            packages.iter().map(|p| r_string(p)).collect::<Vec<_>>().join(", "),
            r_string(CRAN_MIRROR),
        );
        let output = self.run_once(&script).await?;
        if !output.success {
            return Err(SessionError::PackageInstall(error_message(&output.stderr)));
        }
        Ok(())
    }

    async fn evaluate(&self, code: &str) -> Result<()> {
        let output = self.run_once(&quiet(code)).await?;
        if !output.success {
            return Err(SessionError::Evaluation(error_message(&output.stderr)));
        }
        let mut prelude = self.prelude.write().await;
        prelude.push_str(code);
        prelude.push('\n');
        tracing::debug!("Setup code accepted ({} bytes of prelude)", prelude.len());
        Ok(())
    }

    async fn open_shelter(&self) -> Result<Box<dyn Shelter>> {
        Ok(Box::new(RscriptShelter {
            program: self.program.clone(),
            timeout_ms: self.timeout_ms,
            prelude: self.prelude.read().await.clone(),
            dir: Some(TempDir::new()?),
        }))
    }
}

struct RscriptShelter {
    program: String,
    timeout_ms: u32,
    prelude: String,
    dir: Option<TempDir>,
}

#[async_trait]
impl Shelter for RscriptShelter {
    async fn capture(&mut self, code: &str, options: &CaptureOptions) -> Result<CaptureResult> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| SessionError::Spawn("shelter already purged".to_string()))?;

        let script = build_capture_script(&self.prelude, code, dir.path(), options);
        let output = run_script(&self.program, dir.path(), &script, self.timeout_ms).await?;
        if !output.success {
            return Err(SessionError::Evaluation(error_message(&output.stderr)));
        }

        let mut lines = parse_stdout(&output.stdout, options);
        lines.extend(parse_stderr(&output.stderr, options));

        Ok(CaptureResult {
            output: lines,
            images: collect_plots(dir.path()),
        })
    }

    async fn purge(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                tracing::warn!("Failed to remove shelter directory: {}", e);
            }
        }
    }
}

async fn run_script(
    program: &str,
    dir: &Path,
    script: &str,
    timeout_ms: u32,
) -> Result<ProcessOutput> {
    let path = dir.join("submission.R");
    tokio::fs::write(&path, script).await?;

    let mut cmd = Command::new(program);
    cmd.arg("--vanilla")
        .arg(&path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .current_dir(dir);

    let child = cmd
        .spawn()
        .map_err(|e| SessionError::Spawn(format!("{program}: {e}")))?;

    let timeout = Duration::from_millis(timeout_ms as u64);
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(ProcessOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(SessionError::Timeout(timeout_ms as u64)),
    }
}

/// Quote text as an R string literal.
fn r_string(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Run setup code without package start-up chatter.
fn quiet(code: &str) -> String {
    format!("invisible(suppressPackageStartupMessages({{\n{code}\n}}))\n")
}

fn build_capture_script(prelude: &str, code: &str, dir: &Path, options: &CaptureOptions) -> String {
    let plot_pattern = dir.join(format!("{PLOT_PREFIX}%03d.png"));
    let expr = if options.with_autoprint {
        format!(
            "invisible(source(exprs = parse(text = {}), local = globalenv(), print.eval = TRUE))",
            r_string(code)
        )
    } else {
        format!(
            "invisible(eval(parse(text = {}), envir = globalenv()))",
            r_string(code)
        )
    };
    let body = if options.capture_conditions {
        with_condition_handlers(&expr)
    } else {
        expr
    };

    let mut script = String::new();
    if !prelude.is_empty() {
        script.push_str(&quiet(prelude));
    }
    if options.capture_conditions {
        script.push_str(EMIT_CONDITION);
    }
    script.push_str(&format!(
        "invisible(try(png({}), silent = TRUE))\n",
        r_string(&plot_pattern.to_string_lossy())
    ));
    script.push_str(&body);
    script.push_str("\nif (dev.cur() > 1) invisible(dev.off())\n");
    script
}

/// Report messages and warnings on stdout as they are signalled, instead of
/// letting R write them to stderr (warnings only at the very end).
fn with_condition_handlers(expr: &str) -> String {
    format!(
        "withCallingHandlers(\n{expr},\n  \
         message = function(m) {{ .rtutor_emit(\"message\", conditionMessage(m)); invokeRestart(\"muffleMessage\") }},\n  \
         warning = function(w) {{ .rtutor_emit(\"warning\", conditionMessage(w)); invokeRestart(\"muffleWarning\") }}\n)"
    )
}

/// Split stdout into printed lines and the condition records interleaved
/// with them, in emission order.
fn parse_stdout(stdout: &str, options: &CaptureOptions) -> Vec<OutputLine> {
    stdout
        .lines()
        .filter_map(|line| match line.strip_prefix(CONDITION_MARK) {
            Some(record) => {
                let (kind, message) = record.split_once(FIELD_MARK).unwrap_or(("message", record));
                options
                    .capture_conditions
                    .then(|| OutputLine::new(kind, Payload::condition(message)))
            }
            None => options.capture_streams.then(|| OutputLine::stdout(line)),
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum WarningBlock {
    None,
    /// `Warning message:` announces exactly one warning on the next line.
    Single,
    /// `Warning messages:` is followed by `1: ...`, `2: ...`.
    Numbered,
}

/// Turn R's stderr into output records; `Warning` blocks become conditions
/// when conditions are captured.
fn parse_stderr(stderr: &str, options: &CaptureOptions) -> Vec<OutputLine> {
    let mut lines = Vec::new();
    let mut block = WarningBlock::None;

    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        if options.capture_conditions {
            if let Some(caps) = WARNING_HEADER.captures(line) {
                block = if caps.get(1).is_some() {
                    WarningBlock::Numbered
                } else {
                    WarningBlock::Single
                };
                continue;
            }
            if let Some(caps) = INLINE_WARNING.captures(line) {
                lines.push(OutputLine::warning(&caps[1]));
                continue;
            }
            let body = WARNING_BODY.captures(line.trim());
            match (block, body) {
                (WarningBlock::Single, Some(caps)) => {
                    block = WarningBlock::None;
                    lines.push(OutputLine::warning(&caps[2]));
                    continue;
                }
                (WarningBlock::Numbered, Some(caps)) if caps.get(1).is_some() => {
                    lines.push(OutputLine::warning(&caps[2]));
                    continue;
                }
                _ => block = WarningBlock::None,
            }
        }
        if options.capture_streams {
            lines.push(OutputLine::stderr(line));
        }
    }
    lines
}

/// The condition message of a failed run, without R's `Error in ...:` prefix.
fn error_message(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .filter(|l| l.trim() != "Execution halted")
        .collect();

    let Some(start) = lines.iter().rposition(|l| ERROR_PREFIX.is_match(l)) else {
        return stderr.trim().to_string();
    };

    let first = ERROR_PREFIX.replace(lines[start], "");
    std::iter::once(first.as_ref())
        .chain(lines[start + 1..].iter().copied())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_plots(dir: &Path) -> Vec<ImageEntry> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "png")
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(PLOT_PREFIX))
        })
        .collect();
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| {
            let bytes = std::fs::read(&path)
                .map_err(|e| tracing::warn!("Failed to read plot {}: {}", path.display(), e))
                .ok()?;
            RasterImage::from_png_bytes(&bytes)
                .map_err(|e| tracing::warn!("Failed to decode plot {}: {}", path.display(), e))
                .ok()
        })
        .map(ImageEntry::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r_string() {
        assert_eq!(r_string("plain"), "\"plain\"");
        assert_eq!(r_string("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(r_string("C:\\tmp"), "\"C:\\\\tmp\"");
    }

    #[test]
    fn test_error_message_strips_prefix() {
        assert_eq!(
            error_message("Error in filter(menu) : could not find function \"filter\"\nExecution halted\n"),
            "could not find function \"filter\""
        );
        assert_eq!(
            error_message("Error: object 'y' not found\nExecution halted\n"),
            "object 'y' not found"
        );
        assert_eq!(
            error_message("Error in eval(ei, envir) : \n  long message here\nExecution halted"),
            "long message here"
        );
        assert_eq!(error_message("Killed\n"), "Killed");
    }

    #[test]
    fn test_parse_stderr_warnings() {
        let stderr = "Warning message:\nIn log(-1) : NaNs produced\nnote: plain text\n";
        let lines = parse_stderr(stderr, &CaptureOptions::default());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].kind.as_deref(), Some("warning"));
        assert_eq!(lines[0].data.display_text(), "NaNs produced");
        assert_eq!(lines[1], OutputLine::stderr("note: plain text"));
    }

    #[test]
    fn test_parse_stderr_numbered_warnings() {
        let stderr = "Warning messages:\n1: In log(-1) : NaNs produced\n2: In sqrt(-2) : NaNs produced\ndone\n";
        let lines = parse_stderr(stderr, &CaptureOptions::default());
        assert_eq!(
            lines,
            vec![
                OutputLine::warning("NaNs produced"),
                OutputLine::warning("NaNs produced"),
                OutputLine::stderr("done"),
            ]
        );
    }

    #[test]
    fn test_parse_stderr_inline_warning() {
        let lines = parse_stderr("Warning in sqrt(-1) : NaNs produced\n", &CaptureOptions::default());
        assert_eq!(lines, vec![OutputLine::warning("NaNs produced")]);
    }

    #[test]
    fn test_parse_stderr_without_conditions() {
        let options = CaptureOptions {
            capture_conditions: false,
            ..CaptureOptions::default()
        };
        let lines = parse_stderr("Warning message:\nIn log(-1) : NaNs produced\n", &options);
        assert!(lines.iter().all(|l| matches!(l.data, Payload::Text(_))));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_capture_script_layout() {
        let dir = Path::new("/tmp/shelter");
        let script = build_capture_script("library(dplyr)\n", "1 + 1", dir, &CaptureOptions::default());
        assert!(script.starts_with("invisible(suppressPackageStartupMessages({\nlibrary(dplyr)\n"));
        assert!(script.contains("png(\"/tmp/shelter/plot%03d.png\")"));
        assert!(script.contains("eval(parse(text = \"1 + 1\"), envir = globalenv())"));
        assert!(script.trim_end().ends_with("invisible(dev.off())"));
    }

    #[test]
    fn test_parse_stdout_keeps_emission_order() {
        let stdout = "\u{1e}message\u{1f}a\n[1] 1\n\u{1e}warning\u{1f}NaNs produced\n[1] NaN\n";
        let lines = parse_stdout(stdout, &CaptureOptions::default());
        assert_eq!(
            lines,
            vec![
                OutputLine::new("message", Payload::condition("a")),
                OutputLine::stdout("[1] 1"),
                OutputLine::warning("NaNs produced"),
                OutputLine::stdout("[1] NaN"),
            ]
        );
    }

    #[test]
    fn test_parse_stdout_respects_capture_flags() {
        let stdout = "\u{1e}message\u{1f}a\n[1] 1\n";
        let quiet_streams = CaptureOptions {
            capture_streams: false,
            ..CaptureOptions::default()
        };
        assert_eq!(
            parse_stdout(stdout, &quiet_streams),
            vec![OutputLine::new("message", Payload::condition("a"))]
        );

        let no_conditions = CaptureOptions {
            capture_conditions: false,
            ..CaptureOptions::default()
        };
        assert_eq!(parse_stdout(stdout, &no_conditions), vec![OutputLine::stdout("[1] 1")]);
    }

    #[test]
    fn test_capture_script_condition_handlers() {
        let dir = Path::new("/tmp/shelter");
        let script = build_capture_script("", "message(\"a\"); print(1)", dir, &CaptureOptions::default());
        assert!(script.contains(".rtutor_emit <- function(kind, text)"));
        assert!(script.contains("withCallingHandlers(\ninvisible(eval(parse(text = "));
        assert!(script.contains("invokeRestart(\"muffleWarning\")"));

        let options = CaptureOptions {
            capture_conditions: false,
            with_autoprint: true,
            ..CaptureOptions::default()
        };
        let script = build_capture_script("", "1", dir, &options);
        assert!(!script.contains("withCallingHandlers"));
        assert!(script.contains("source(exprs = parse(text = \"1\"), local = globalenv(), print.eval = TRUE)"));
    }

    #[test]
    fn test_collect_plots_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("submission.R"), "1").unwrap();
        std::fs::write(dir.path().join("plot001.png"), b"broken").unwrap();
        assert!(collect_plots(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let interpreter = RscriptInterpreter::new("/nonexistent/Rscript", 1000);
        let err = interpreter.evaluate("1").await.unwrap_err();
        assert!(matches!(err, SessionError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_purged_shelter_rejects_capture() {
        let interpreter = RscriptInterpreter::new("/nonexistent/Rscript", 1000);
        let mut shelter = interpreter.open_shelter().await.unwrap();
        shelter.purge().await;
        shelter.purge().await;
        let err = shelter.capture("1", &CaptureOptions::default()).await.unwrap_err();
        assert!(matches!(err, SessionError::Spawn(_)));
    }
}
