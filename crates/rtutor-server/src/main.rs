use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rtutor_core::{
    compare_values, normalize_value, render_capture, CaptureResult, InterpreterConfig, PackageList,
    PngCanvas, TutorConfig,
};
use rtutor_runner::{Checker, Interpreter, RscriptInterpreter, Submission};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Builds the interpreter behind each prepared checker.
type InterpreterFactory = Arc<dyn Fn(&InterpreterConfig) -> Arc<dyn Interpreter> + Send + Sync>;

#[derive(Clone)]
struct AppState {
    config: Arc<TutorConfig>,
    /// One prepared checker per distinct package set.
    checkers: Arc<Mutex<HashMap<PackageList, Arc<Checker>>>>,
    /// Held for the whole of a check so only one evaluation runs at a time.
    eval_lock: Arc<Mutex<()>>,
    interpreters: InterpreterFactory,
}

impl AppState {
    fn new(config: TutorConfig) -> Self {
        Self::with_interpreters(
            config,
            Arc::new(|config: &InterpreterConfig| {
                Arc::new(RscriptInterpreter::from_config(config)) as Arc<dyn Interpreter>
            }),
        )
    }

    fn with_interpreters(config: TutorConfig, interpreters: InterpreterFactory) -> Self {
        Self {
            config: Arc::new(config),
            checkers: Arc::new(Mutex::new(HashMap::new())),
            eval_lock: Arc::new(Mutex::new(())),
            interpreters,
        }
    }

    async fn checker_for(&self, page: Option<&str>) -> Arc<Checker> {
        let packages = self.config.packages.resolve(page);
        if let Some(checker) = self.checkers.lock().await.get(&packages) {
            return Arc::clone(checker);
        }

        // Setup may spawn R and install packages; the map stays unlocked meanwhile.
        tracing::info!("Preparing interpreter for packages: {}", packages.join(", "));
        let interpreter = (self.interpreters)(&self.config.interpreter);
        let checker = Checker::prepare(
            interpreter,
            &packages,
            self.config.interpreter.install_missing,
        )
        .await
        .with_canvas(Arc::new(PngCanvas))
        .with_options(self.config.interpreter.capture);

        let mut checkers = self.checkers.lock().await;
        Arc::clone(checkers.entry(packages).or_insert_with(|| Arc::new(checker)))
    }
}

fn load_config() -> anyhow::Result<TutorConfig> {
    let path = std::env::var("RTUTOR_CONFIG").ok().map(std::path::PathBuf::from);
    let mut config = TutorConfig::load_or_default(path.as_deref())?;
    if let Ok(rscript) = std::env::var("RSCRIPT") {
        config.interpreter.rscript_path = rscript;
    }
    if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
        config.server.port = port;
    }
    if let Ok(dir) = std::env::var("STATIC_DIR") {
        config.server.static_dir = dir;
    }
    Ok(config)
}

fn app(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();

    let api_routes = Router::new()
        .route("/status", get(get_status))
        .route("/packages", get(get_packages))
        .route("/normalize", post(normalize))
        .route("/compare", post(compare))
        .route("/render", post(render))
        .route("/check", post(check))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config()?;
    let addr = format!("0.0.0.0:{}", config.server.port);
    tracing::info!("Server listening on {}", addr);
    tracing::info!("Serving static files from {}", config.server.static_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(AppState::new(config))).await?;
    Ok(())
}

#[derive(Serialize)]
struct StatusResponse {
    interpreter: String,
    default_packages: Vec<String>,
    prepared_sessions: usize,
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        interpreter: state.config.interpreter.rscript_path.clone(),
        default_packages: state.config.packages.default.clone(),
        prepared_sessions: state.checkers.lock().await.len(),
    })
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<String>,
}

async fn get_packages(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Json<PackageList> {
    Json(state.config.packages.resolve(query.page.as_deref()))
}

#[derive(Debug, Deserialize)]
struct NormalizeRequest {
    #[serde(default)]
    code: Value,
}

#[derive(Serialize)]
struct NormalizeResponse {
    normalized: String,
}

async fn normalize(Json(req): Json<NormalizeRequest>) -> Json<NormalizeResponse> {
    Json(NormalizeResponse {
        normalized: normalize_value(&req.code),
    })
}

#[derive(Debug, Deserialize)]
struct CompareRequest {
    #[serde(default)]
    code: Value,
    #[serde(default)]
    expected: Value,
}

#[derive(Serialize)]
struct CompareResponse {
    correct: bool,
}

async fn compare(Json(req): Json<CompareRequest>) -> Json<CompareResponse> {
    Json(CompareResponse {
        correct: compare_values(&req.code, &req.expected),
    })
}

#[derive(Serialize)]
struct RenderResponse {
    html: String,
}

async fn render(Json(result): Json<CaptureResult>) -> Json<RenderResponse> {
    Json(RenderResponse {
        html: render_capture(&result, Some(&PngCanvas)),
    })
}

#[derive(Debug, Deserialize)]
struct CheckRequest {
    #[serde(flatten)]
    submission: Submission,
    page: Option<String>,
}

async fn check(State(state): State<AppState>, Json(req): Json<CheckRequest>) -> Response {
    if req.submission.code.trim().is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let checker = state.checker_for(req.page.as_deref()).await;

    let _guard = state.eval_lock.lock().await;
    match checker.check(&req.submission).await {
        Some(feedback) => Json(feedback).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
