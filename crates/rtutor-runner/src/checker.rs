//! The "check" workflow: grade a submission, run it, and build the console
//! feedback shown under the editor.

use std::sync::Arc;

use rtutor_core::{compare_code, escape_html, render_capture, CaptureOptions, Canvas};
use serde::{Deserialize, Serialize};

use crate::session::{capture_scoped, Interpreter};
use crate::setup::prepare_session;

const VALUE_SAVED: &str = r#"<span class="console-status-info">(Value saved)</span>"#;
const WRONG_ANSWER_NOTICE: &str = "⚠️ The code runs, but that's not what the exercise asked for.";
const MISSING_FUNCTION: &str = "could not find function";
const LOADING_TIP: &str =
    "<br><br><strong>Tip:</strong> Packages might still be loading. Wait for the ready banner!";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
    pub code: String,
    #[serde(default)]
    pub expected: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Ran and matches the expected answer.
    Success,
    /// Ran, but is not the expected answer.
    Warning,
    /// The interpreter rejected the code.
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Feedback {
    pub status: CheckStatus,
    pub correct: bool,
    pub html: String,
}

/// Wrap learner code so its value is printed (plots included) once, with the
/// value kept in `val`.
pub fn wrap_submission(code: &str) -> String {
    format!("val <- {{\n{code}\n}}\nprint(val)\ninvisible(NULL)")
}

pub struct Checker {
    interpreter: Arc<dyn Interpreter>,
    canvas: Option<Arc<dyn Canvas>>,
    options: CaptureOptions,
}

impl Checker {
    pub fn new(interpreter: Arc<dyn Interpreter>) -> Self {
        Self {
            interpreter,
            canvas: None,
            options: CaptureOptions::default(),
        }
    }

    /// Prepare `interpreter` for a page and wrap it in a checker.
    ///
    /// A failed setup is logged, not fatal: submissions still run, and a
    /// missing library shows up as a "could not find function" error with
    /// the loading tip attached.
    pub async fn prepare(
        interpreter: Arc<dyn Interpreter>,
        packages: &[String],
        install_missing: bool,
    ) -> Self {
        if let Err(e) = prepare_session(interpreter.as_ref(), packages, install_missing).await {
            tracing::warn!("Session setup failed for [{}]: {}", packages.join(", "), e);
        }
        Self::new(interpreter)
    }

    pub fn with_canvas(mut self, canvas: Arc<dyn Canvas>) -> Self {
        self.canvas = Some(canvas);
        self
    }

    pub fn with_options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }

    /// Grade and run a submission. Blank code produces no feedback.
    pub async fn check(&self, submission: &Submission) -> Option<Feedback> {
        let code = submission.code.as_str();
        if code.trim().is_empty() {
            return None;
        }

        let correct = compare_code(Some(code), submission.expected.as_deref());
        let echo = escape_html(code);
        tracing::debug!("Checking submission ({} bytes), correct={}", code.len(), correct);

        let wrapped = wrap_submission(code);
        let result = capture_scoped(self.interpreter.as_ref(), &wrapped, &self.options).await;

        let feedback = match result {
            Ok(capture) => {
                let mut output = render_capture(&capture, self.canvas.as_deref());
                if output.is_empty() && capture.images.is_empty() {
                    output = VALUE_SAVED.to_string();
                }

                if correct {
                    Feedback {
                        status: CheckStatus::Success,
                        correct,
                        html: format!(
                            "<span class=\"console-status-success\">&gt; {echo}</span><br>{output}"
                        ),
                    }
                } else {
                    Feedback {
                        status: CheckStatus::Warning,
                        correct,
                        html: format!(
                            "<span class=\"console-status-warning\">&gt; {echo}</span><br>{output}\
                             <br><br><span class=\"console-status-warning console-bold\">{WRONG_ANSWER_NOTICE}</span>"
                        ),
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Evaluation failed: {}", e);
                let mut message = escape_html(&e.to_string());
                if message.contains(MISSING_FUNCTION) {
                    message.push_str(LOADING_TIP);
                }
                Feedback {
                    status: CheckStatus::Error,
                    correct,
                    html: format!(
                        "<span class=\"console-user-code\">&gt; {echo}</span><br>\
                         <span class=\"console-status-error\">{message}</span>"
                    ),
                }
            }
        };
        Some(feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedInterpreter;
    use rtutor_core::{CaptureResult, OutputLine, RasterImage};

    fn checker(interpreter: &Arc<ScriptedInterpreter>) -> Checker {
        Checker::new(interpreter.clone())
    }

    fn submission(code: &str, expected: &str) -> Submission {
        Submission {
            code: code.to_string(),
            expected: Some(expected.to_string()),
        }
    }

    #[test]
    fn test_wrap_submission() {
        assert_eq!(
            wrap_submission("1 + 1"),
            "val <- {\n1 + 1\n}\nprint(val)\ninvisible(NULL)"
        );
    }

    #[tokio::test]
    async fn test_blank_code_is_ignored() {
        let interpreter = Arc::new(ScriptedInterpreter::default());
        let checker = checker(&interpreter);
        assert!(checker.check(&submission("  \n", "1+1")).await.is_none());
        assert_eq!(interpreter.opened(), 0);
    }

    #[tokio::test]
    async fn test_correct_answer() {
        let interpreter = Arc::new(ScriptedInterpreter::returning(CaptureResult {
            output: vec![OutputLine::stdout("[1] 2")],
            images: vec![],
        }));
        let feedback = checker(&interpreter)
            .check(&submission("1 + 1", "1+1"))
            .await
            .unwrap();

        assert_eq!(feedback.status, CheckStatus::Success);
        assert!(feedback.correct);
        assert_eq!(
            feedback.html,
            "<span class=\"console-status-success\">&gt; 1 + 1</span><br>[1] 2"
        );
        assert_eq!(interpreter.captured(), vec![wrap_submission("1 + 1")]);
        assert_eq!(interpreter.purged(), 1);
    }

    #[tokio::test]
    async fn test_wrong_answer_still_shows_output() {
        let interpreter = Arc::new(ScriptedInterpreter::returning(CaptureResult {
            output: vec![OutputLine::stdout("[1] 3")],
            images: vec![],
        }));
        let feedback = checker(&interpreter)
            .check(&submission("1 + 2", "1+1"))
            .await
            .unwrap();

        assert_eq!(feedback.status, CheckStatus::Warning);
        assert!(!feedback.correct);
        assert!(feedback.html.contains("[1] 3"));
        assert!(feedback.html.contains(WRONG_ANSWER_NOTICE));
    }

    #[tokio::test]
    async fn test_silent_assignment() {
        let interpreter = Arc::new(ScriptedInterpreter::default());
        let feedback = checker(&interpreter)
            .check(&submission("x <- 5", "x<-5"))
            .await
            .unwrap();
        assert!(feedback.html.ends_with(VALUE_SAVED));
    }

    #[tokio::test]
    async fn test_images_without_canvas_are_not_value_saved() {
        let interpreter = Arc::new(ScriptedInterpreter::returning(CaptureResult {
            output: vec![],
            images: vec![RasterImage::new(1, 1, vec![0, 0, 0, 255]).into()],
        }));
        let feedback = checker(&interpreter)
            .check(&submission("plot(1)", "plot(1)"))
            .await
            .unwrap();
        assert!(!feedback.html.contains(VALUE_SAVED));
    }

    #[tokio::test]
    async fn test_images_with_canvas() {
        let interpreter = Arc::new(ScriptedInterpreter::returning(CaptureResult {
            output: vec![],
            images: vec![RasterImage::new(1, 1, vec![0, 0, 0, 255]).into()],
        }));
        let feedback = Checker::new(interpreter.clone())
            .with_canvas(Arc::new(rtutor_core::PngCanvas))
            .check(&submission("plot(1)", "plot(1)"))
            .await
            .unwrap();
        assert!(feedback.html.contains("<img src=\"data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_escapes_user_code_and_output() {
        let interpreter = Arc::new(ScriptedInterpreter::returning(CaptureResult {
            output: vec![OutputLine::stdout("<b>bold</b>")],
            images: vec![],
        }));
        let feedback = checker(&interpreter)
            .check(&submission("x < 3 & y > 2", "x<3&y>2"))
            .await
            .unwrap();
        assert!(feedback.html.contains("&gt; x &lt; 3 &amp; y &gt; 2"));
        assert!(feedback.html.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(!feedback.html.contains("<b>"));
    }

    #[tokio::test]
    async fn test_evaluation_error() {
        let interpreter = Arc::new(ScriptedInterpreter::failing("object 'y' not found"));
        let feedback = checker(&interpreter)
            .check(&submission("y", "x"))
            .await
            .unwrap();

        assert_eq!(feedback.status, CheckStatus::Error);
        assert!(feedback.html.contains("object &#39;y&#39; not found"));
        assert!(!feedback.html.contains("Tip:"));
        assert_eq!(interpreter.purged(), 1);
    }

    #[tokio::test]
    async fn test_missing_function_tip() {
        let interpreter = Arc::new(ScriptedInterpreter::failing(
            "could not find function \"filter\"",
        ));
        let feedback = checker(&interpreter)
            .check(&submission("filter(menu, price < 6)", "filter(menu,price<6)"))
            .await
            .unwrap();

        assert!(feedback.html.contains("could not find function &quot;filter&quot;"));
        assert!(feedback.html.contains(LOADING_TIP));
    }

    #[tokio::test]
    async fn test_checks_still_run_after_failed_setup() {
        let interpreter = Arc::new(
            ScriptedInterpreter::returning(CaptureResult {
                output: vec![OutputLine::stdout("[1] 2")],
                images: vec![],
            })
            .with_failing_setup("there is no package called 'dplyr'"),
        );
        let packages = vec!["dplyr".to_string()];
        let checker = Checker::prepare(interpreter.clone(), &packages, true).await;

        assert_eq!(interpreter.installed(), packages);
        assert!(interpreter.evaluated().is_empty());

        let feedback = checker.check(&submission("1 + 1", "1+1")).await.unwrap();
        assert_eq!(feedback.status, CheckStatus::Success);
        assert!(feedback.html.ends_with("[1] 2"));
    }

    #[tokio::test]
    async fn test_failed_setup_surfaces_loading_tip() {
        let interpreter = Arc::new(
            ScriptedInterpreter::failing("could not find function \"filter\"")
                .with_failing_setup("there is no package called 'dplyr'"),
        );
        let checker = Checker::prepare(interpreter.clone(), &["dplyr".to_string()], false).await;

        assert_eq!(interpreter.evaluated().len(), 1);
        let feedback = checker.check(&submission("filter(menu, price < 6)", "x")).await.unwrap();
        assert_eq!(feedback.status, CheckStatus::Error);
        assert!(feedback.html.contains(LOADING_TIP));
    }
}
