use std::fmt::Write;

use crate::session::{Interpreter, Result};

/// Data frames every tutorial page works with.
pub const DATASETS: &str = include_str!("../assets/datasets.R");

/// One `library()` call per package, in order.
pub fn library_calls(packages: &[String]) -> String {
    packages
        .iter()
        .map(|pkg| format!("library({pkg})"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Code run once before any learner submission on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupScript {
    packages: Vec<String>,
    body: String,
}

impl SetupScript {
    pub fn for_packages(packages: &[String]) -> Self {
        let mut body = String::new();
        let libraries = library_calls(packages);
        if !libraries.is_empty() {
            let _ = writeln!(body, "{libraries}");
        }
        body.push_str(DATASETS);
        Self {
            packages: packages.to_vec(),
            body,
        }
    }

    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn as_str(&self) -> &str {
        &self.body
    }
}

/// Bring an interpreter to the state a page expects: libraries installed
/// (when asked to), loaded, and datasets defined.
pub async fn prepare_session(
    interpreter: &dyn Interpreter,
    packages: &[String],
    install_missing: bool,
) -> Result<()> {
    if install_missing {
        tracing::info!("Installing packages: {}", packages.join(", "));
        interpreter.install_packages(packages).await?;
    }

    let script = SetupScript::for_packages(packages);
    interpreter.evaluate(script.as_str()).await?;
    tracing::info!("Interpreter ready ({} packages loaded)", packages.len());
    Ok(())
}
