use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rtutor_core::{
    compare_code, normalize_code, render_capture, CaptureResult, PngCanvas, TutorConfig,
};
use rtutor_runner::{
    load_all_lessons, load_lesson, CheckStatus, Checker, RscriptInterpreter,
    Submission,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rtutor")]
#[command(about = "rtutor - grade and run R tutorial exercises", long_about = None)]
struct Cli {
    /// JSON config file (defaults to $RTUTOR_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the libraries a page preloads
    Packages {
        /// Page path, e.g. /wrangling.html
        page: Option<String>,
    },

    /// Print the normalized form of some code
    Normalize { code: String },

    /// Compare a submission with an expected answer
    Compare {
        code: String,
        expected: Option<String>,
    },

    /// Render a captured interpreter result (JSON) as HTML
    Render {
        file: PathBuf,

        /// Leave plots out of the output
        #[arg(long)]
        no_images: bool,
    },

    /// Run and grade a submission
    Check {
        /// Code to submit
        #[arg(long)]
        code: String,

        /// Expected answer
        #[arg(short, long, conflicts_with = "lesson")]
        expected: Option<String>,

        /// Lesson file holding the expected answer
        #[arg(short, long, requires = "exercise")]
        lesson: Option<PathBuf>,

        /// Exercise id within the lesson
        #[arg(short = 'x', long)]
        exercise: Option<String>,

        /// Page whose libraries to preload (defaults to the lesson's page)
        #[arg(short, long)]
        page: Option<String>,

        /// Output format (html, json)
        #[arg(short, long, default_value = "html")]
        output: String,
    },

    /// List lessons in a directory
    Lessons { dir: PathBuf },
}

fn load_config(path: Option<PathBuf>) -> Result<TutorConfig> {
    let path = path.or_else(|| std::env::var("RTUTOR_CONFIG").ok().map(PathBuf::from));
    let mut config = TutorConfig::load_or_default(path.as_deref())
        .with_context(|| format!("loading config {:?}", path))?;
    if let Ok(rscript) = std::env::var("RSCRIPT") {
        config.interpreter.rscript_path = rscript;
    }
    tracing::debug!("Using interpreter {}", config.interpreter.rscript_path);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Some(Commands::Packages { page }) => cmd_packages(&config, page.as_deref()),
        Some(Commands::Normalize { code }) => println!("{}", normalize_code(&code)),
        Some(Commands::Compare { code, expected }) => {
            let matched = compare_code(Some(code.as_str()), expected.as_deref());
            println!("{}", if matched { "match" } else { "no match" });
            if !matched {
                std::process::exit(1);
            }
        }
        Some(Commands::Render { file, no_images }) => cmd_render(&file, no_images)?,
        Some(Commands::Check {
            code,
            expected,
            lesson,
            exercise,
            page,
            output,
        }) => {
            cmd_check(
                &config,
                code,
                expected,
                lesson.as_deref(),
                exercise.as_deref(),
                page,
                &output,
            )
            .await?
        }
        Some(Commands::Lessons { dir }) => cmd_lessons(&config, &dir)?,
        None => run_interactive(&config).await?,
    }

    Ok(())
}

fn cmd_packages(config: &TutorConfig, page: Option<&str>) {
    for pkg in config.packages.resolve(page) {
        println!("{pkg}");
    }
}

fn cmd_render(file: &Path, no_images: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let result: CaptureResult = serde_json::from_str(&content)?;
    let canvas = PngCanvas;
    let canvas: Option<&dyn rtutor_core::Canvas> = if no_images { None } else { Some(&canvas) };
    println!("{}", render_capture(&result, canvas));
    Ok(())
}

async fn cmd_check(
    config: &TutorConfig,
    code: String,
    expected: Option<String>,
    lesson: Option<&Path>,
    exercise: Option<&str>,
    page: Option<String>,
    output_format: &str,
) -> Result<()> {
    let (expected, page) = match (lesson, exercise) {
        (Some(path), Some(id)) => {
            let lesson = load_lesson(path)?;
            let exercise = lesson
                .exercise(id)
                .with_context(|| format!("no exercise {id:?} in {}", path.display()))?;
            (Some(exercise.answer.clone()), page.or(Some(lesson.page.clone())))
        }
        _ => (expected, page),
    };

    let checker = build_checker(config, page.as_deref()).await;
    let Some(feedback) = checker.check(&Submission { code, expected }).await else {
        println!("Nothing to check: the submission is empty.");
        return Ok(());
    };

    match output_format {
        "json" => println!("{}", serde_json::to_string_pretty(&feedback)?),
        _ => {
            println!("{}", feedback.html);
            eprintln!(
                "{}",
                match feedback.status {
                    CheckStatus::Success => "correct",
                    CheckStatus::Warning => "ran, but not the expected answer",
                    CheckStatus::Error => "error",
                }
            );
        }
    }
    Ok(())
}

fn cmd_lessons(config: &TutorConfig, dir: &Path) -> Result<()> {
    let lessons = load_all_lessons(dir)?;

    println!();
    println!("{:-<70}", "");
    println!("  {:<22} {:<28} {:>5}  {}", "Page", "Title", "Qs", "Packages");
    println!("{:-<70}", "");
    for lesson in &lessons {
        println!(
            "  {:<22} {:<28} {:>5}  {}",
            lesson.page,
            lesson.title,
            lesson.exercises.len(),
            lesson.required_packages(&config.packages).join(", ")
        );
    }
    println!();
    Ok(())
}

async fn build_checker(config: &TutorConfig, page: Option<&str>) -> Checker {
    let interpreter = Arc::new(RscriptInterpreter::from_config(&config.interpreter));
    let packages = config.packages.resolve(page);
    Checker::prepare(interpreter, &packages, config.interpreter.install_missing)
        .await
        .with_canvas(Arc::new(PngCanvas))
        .with_options(config.interpreter.capture)
}

async fn run_interactive(config: &TutorConfig) -> Result<()> {
    println!();
    println!("  rtutor interactive console");
    println!("  Type R code to run it, `:page <path>` to switch pages, `:q` to quit.");
    println!();

    let mut checker = build_checker(config, None).await;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed.split_once(' ').unwrap_or((trimmed, "")) {
            (":q" | ":quit", _) => break,
            (":page", path) => {
                let page = Some(path.trim());
                checker = build_checker(config, page).await;
                println!("  Loaded: {}", config.packages.resolve(page).join(", "));
            }
            _ => {
                let submission = Submission {
                    code: trimmed.to_string(),
                    expected: None,
                };
                if let Some(feedback) = checker.check(&submission).await {
                    println!("{}", feedback.html);
                }
            }
        }
    }

    Ok(())
}
