// CNPJ X-Ray - Local UI Server
// Serves the single-page UI and streams one envelope per CNPJ over SSE

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Json,
    },
    routing::get,
    Router,
};
use clap::Parser;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cnpj_xray::{
    CnpjaClient, Orchestrator, RegistryClient, RegistryConfig, DEFAULT_API_URL,
    DEFAULT_TIMEOUT_SECS,
};

/// Envelopes buffered between the blocking batch and the SSE stream
const EVENT_BUFFER: usize = 16;

type SharedOrchestrator = Arc<Orchestrator<Box<dyn RegistryClient>>>;

/// Command-line arguments for cnpj-xray-server
#[derive(Parser, Debug)]
#[command(name = "cnpj-xray-server")]
#[command(about = "Interface web local do CNPJ X-Ray")]
#[command(version)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "CNPJ_XRAY_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8000", env = "CNPJ_XRAY_PORT")]
    port: u16,

    /// Registry base URL; the CNPJ is appended as a path segment
    #[arg(long, default_value = DEFAULT_API_URL, env = "CNPJ_XRAY_API_URL")]
    api_url: String,

    /// Registry request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, env = "CNPJ_XRAY_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// Include the validated registry record in each result (dados_brutos)
    #[arg(long)]
    raw: bool,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    orchestrator: SharedOrchestrator,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeQuery {
    /// Newline- or comma-separated CNPJs, as typed in the textarea
    #[serde(default)]
    cnpjs: String,
}

fn split_cnpjs(text: &str) -> Vec<String> {
    text.split(|c: char| c == '\n' || c == ',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/analyze?cnpjs=... - One `result` event per CNPJ, then `complete`
async fn analyze(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let cnpjs = split_cnpjs(&query.cnpjs);
    info!("Recebido pedido da interface para processar {} CNPJs.", cnpjs.len());

    let (tx, mut rx) = mpsc::channel::<String>(EVENT_BUFFER);

    if cnpjs.is_empty() {
        let empty = serde_json::json!({ "status": "error", "message": "Lista de CNPJ vazia." });
        let _ = tx.try_send(empty.to_string());
    } else {
        let orchestrator = state.orchestrator.clone();

        // The pipeline blocks on HTTP; keep it off the async workers
        tokio::task::spawn_blocking(move || {
            orchestrator.analyze_batch_until(&cnpjs, |envelope| match serde_json::to_string(envelope) {
                Ok(json) => {
                    if tx.blocking_send(json).is_err() {
                        warn!("UI disconnected; stopping batch after {}", envelope.identifier());
                        return ControlFlow::Break(());
                    }
                    ControlFlow::Continue(())
                }
                Err(e) => {
                    warn!("Failed to serialize result for {}: {}", envelope.identifier(), e);
                    ControlFlow::Continue(())
                }
            });
        });
    }

    let stream = async_stream::stream! {
        while let Some(json) = rx.recv().await {
            yield Ok(Event::default().event("result").data(json));
        }

        info!("Processamento da interface concluído.");
        yield Ok(Event::default().event("complete").data("done"));
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// GET /app.js - Serve the UI script
async fn serve_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        include_str!("../web/app.js"),
    )
}

fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/analyze", get(analyze))
        .with_state(state);

    Router::new()
        .route("/", get(serve_index))
        .route("/app.js", get(serve_script))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cnpj_xray=info,cnpj_xray_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = RegistryConfig::new(&args.api_url, Duration::from_secs(args.timeout_secs))
        .with_raw(args.raw);
    let include_raw = config.include_raw;

    // The blocking HTTP client has to be built outside the async runtime
    let client = CnpjaClient::new(config).context("Failed to build registry HTTP client")?;
    let client: Box<dyn RegistryClient> = Box::new(client);
    let orchestrator = Arc::new(Orchestrator::new(client).with_raw(include_raw));

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(serve(format!("{}:{}", args.host, args.port), AppState { orchestrator }))
}

async fn serve(addr: String, state: AppState) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 Server running on http://{}", addr);
    info!("   Press Ctrl+C to stop");

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use cnpj_xray::{Cnpj, DataSourceError};
    use serde_json::Value;
    use tower::ServiceExt;

    /// Every CNPJ resolves to the same active school
    struct SchoolRegistry;

    impl RegistryClient for SchoolRegistry {
        fn fetch(&self, _cnpj: &Cnpj) -> Result<Value, DataSourceError> {
            Ok(serde_json::json!({
                "status": { "id": 2, "text": "Ativa" },
                "company": { "name": "ESCOLA EXEMPLO LTDA", "equity": 150000 },
                "founded": "2015-03-10",
                "mainActivity": { "id": 8513900, "text": "Ensino fundamental" }
            }))
        }
    }

    fn create_app() -> Router {
        let client: Box<dyn RegistryClient> = Box::new(SchoolRegistry);
        create_router(AppState {
            orchestrator: Arc::new(Orchestrator::new(client)),
        })
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_split_cnpjs() {
        assert_eq!(
            split_cnpjs("45.954.282/0001-02\n\n  19131243000197 ,123\r\n"),
            vec!["45.954.282/0001-02", "19131243000197", "123"]
        );
        assert!(split_cnpjs(" \n , ").is_empty());
    }

    #[tokio::test]
    async fn test_health_check() {
        let (status, body) = get_body(create_app(), "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"success":true,"data":"OK"}"#);
    }

    #[tokio::test]
    async fn test_index_served() {
        let (status, body) = get_body(create_app(), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("cnpj-input"));
    }

    #[tokio::test]
    async fn test_analyze_streams_each_result_then_complete() {
        let (status, body) =
            get_body(create_app(), "/api/analyze?cnpjs=45.954.282%2F0001-02%0A123%0A%0A").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.matches("event: result").count(), 2);

        let success = body.find(r#""status":"success""#).unwrap();
        let failure = body.find(r#""message":"CNPJ inválido.""#).unwrap();
        let complete = body.find("event: complete").unwrap();
        assert!(success < failure);
        assert!(failure < complete);
    }

    #[tokio::test]
    async fn test_analyze_empty_list() {
        let (_, body) = get_body(create_app(), "/api/analyze?cnpjs=").await;

        assert!(body.contains("Lista de CNPJ vazia."));
        assert!(body.contains("event: complete"));
    }
}
