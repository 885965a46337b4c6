use async_trait::async_trait;
use rtutor_core::{CaptureOptions, CaptureResult};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to start interpreter: {0}")]
    Spawn(String),
    #[error("{0}")]
    Evaluation(String),
    #[error("Timeout after {0}ms")]
    Timeout(u64),
    #[error("Package install failed: {0}")]
    PackageInstall(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// An R engine the tutorial pages run code against.
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Make the given libraries available.
    async fn install_packages(&self, packages: &[String]) -> Result<()>;

    /// Run setup code (library calls, datasets) whose effects later
    /// evaluations can rely on.
    async fn evaluate(&self, code: &str) -> Result<()>;

    /// Open a scoped evaluation session. Callers must [`Shelter::purge`] it.
    async fn open_shelter(&self) -> Result<Box<dyn Shelter>>;
}

/// A scoped evaluation session holding interpreter-side resources.
#[async_trait]
pub trait Shelter: Send {
    async fn capture(&mut self, code: &str, options: &CaptureOptions) -> Result<CaptureResult>;

    /// Release everything the session allocated. Safe to call more than once.
    async fn purge(&mut self);
}

/// Evaluate `code` in a fresh shelter and release it whatever the outcome.
pub async fn capture_scoped(
    interpreter: &dyn Interpreter,
    code: &str,
    options: &CaptureOptions,
) -> Result<CaptureResult> {
    let mut shelter = interpreter.open_shelter().await?;
    let result = shelter.capture(code, options).await;
    shelter.purge().await;
    result
}
