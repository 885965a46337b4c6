use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};
use crate::output::CaptureOptions;
use crate::packages::PackageTable;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TutorConfig {
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    #[serde(default)]
    pub packages: PackageTable,
    #[serde(default)]
    pub server: ServerConfig,
}

impl TutorConfig {
    /// Read a JSON config file. Sections left out keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TutorConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`TutorConfig::load`], falling back to defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interpreter.timeout_ms == 0 {
            return Err(TutorError::Config("interpreter.timeout_ms must be positive".into()));
        }
        if self.interpreter.rscript_path.trim().is_empty() {
            return Err(TutorError::Config("interpreter.rscript_path is empty".into()));
        }
        if self.packages.default.is_empty() {
            return Err(TutorError::Config("packages.default must name at least one package".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    pub rscript_path: String,
    pub timeout_ms: u32,
    pub capture: CaptureOptions,
    pub install_missing: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            rscript_path: "Rscript".to_string(),
            timeout_ms: 10_000,
            capture: CaptureOptions::default(),
            install_missing: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            static_dir: "./site".to_string(),
        }
    }
}
