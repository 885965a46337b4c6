//! In-memory interpreter for exercising the check workflow.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rtutor_core::{CaptureOptions, CaptureResult};

use crate::session::{Interpreter, Result, SessionError, Shelter};

#[derive(Default)]
struct Calls {
    installed: Vec<String>,
    evaluated: Vec<String>,
    captured: Vec<String>,
}

/// Returns a fixed capture result (or error) for every evaluation.
#[derive(Default)]
pub struct ScriptedInterpreter {
    result: CaptureResult,
    error: Option<String>,
    setup_error: Option<String>,
    calls: Arc<Mutex<Calls>>,
    opened: Arc<AtomicUsize>,
    purged: Arc<AtomicUsize>,
}

impl ScriptedInterpreter {
    pub fn returning(result: CaptureResult) -> Self {
        Self {
            result,
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Make install and setup evaluation fail, as when packages are missing.
    pub fn with_failing_setup(mut self, message: &str) -> Self {
        self.setup_error = Some(message.to_string());
        self
    }

    fn setup_result(&self) -> Result<()> {
        match &self.setup_error {
            Some(message) => Err(SessionError::Evaluation(message.clone())),
            None => Ok(()),
        }
    }

    pub fn installed(&self) -> Vec<String> {
        self.calls.lock().unwrap().installed.clone()
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.calls.lock().unwrap().evaluated.clone()
    }

    pub fn captured(&self) -> Vec<String> {
        self.calls.lock().unwrap().captured.clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn purged(&self) -> usize {
        self.purged.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Interpreter for ScriptedInterpreter {
    async fn install_packages(&self, packages: &[String]) -> Result<()> {
        self.calls.lock().unwrap().installed.extend_from_slice(packages);
        self.setup_result()
    }

    async fn evaluate(&self, code: &str) -> Result<()> {
        self.calls.lock().unwrap().evaluated.push(code.to_string());
        self.setup_result()
    }

    async fn open_shelter(&self) -> Result<Box<dyn Shelter>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedShelter {
            result: self.result.clone(),
            error: self.error.clone(),
            calls: Arc::clone(&self.calls),
            purged: Arc::clone(&self.purged),
        }))
    }
}

struct ScriptedShelter {
    result: CaptureResult,
    error: Option<String>,
    calls: Arc<Mutex<Calls>>,
    purged: Arc<AtomicUsize>,
}

#[async_trait]
impl Shelter for ScriptedShelter {
    async fn capture(&mut self, code: &str, _options: &CaptureOptions) -> Result<CaptureResult> {
        self.calls.lock().unwrap().captured.push(code.to_string());
        match &self.error {
            Some(message) => Err(SessionError::Evaluation(message.clone())),
            None => Ok(self.result.clone()),
        }
    }

    async fn purge(&mut self) {
        self.purged.fetch_add(1, Ordering::SeqCst);
    }
}
