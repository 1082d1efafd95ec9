mod api;

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api::{QueryRequest, QueryResponse};
use graphrag_core::catalog::OptionEntry;
use graphrag_core::config::Settings;
use graphrag_core::llm::Brain;
use graphrag_core::runtime::{Exclusive, ExecutionBackend, HttpBackend, RemoteOption};
use graphrag_core::{Catalog, Coordinator};

// Read-only per process; shared across concurrent requests.
#[derive(Clone)]
struct AppState {
    coordinator: Arc<Coordinator>,
    catalog: Arc<Catalog>,
}

fn init_logging(level: tracing::Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Settings & Logging
    let settings = Settings::from_env()?;
    init_logging(settings.log_level);

    info!("Gateway initializing...");

    // 2. Initialize The Brain
    let brain = Brain::new(&settings.llm).context("failed to build completion client")?;
    match brain.say_hello().await {
        Ok(msg) => info!("Brain status: {}", msg),
        Err(e) => error!("Brain is configured but unresponsive: {}", e),
    }

    // 3. Load The Catalog
    let catalog = Arc::new(Catalog::standard().context("operation catalog is inconsistent")?);
    info!("Loaded {} operations.", catalog.len());

    // 4. Connect The Backend
    let http = HttpBackend::new(&settings.backend).context("failed to build backend client")?;
    match http.options().await {
        Ok(remote) => {
            for problem in menu_drift(&catalog, &remote) {
                warn!("Option menu drift: {}", problem);
            }
        }
        Err(e) => warn!("Could not read backend option menu: {}", e),
    }
    let backend: Arc<dyn ExecutionBackend> = if settings.backend.exclusive {
        info!("Backend calls serialized");
        Arc::new(Exclusive::new(http))
    } else {
        Arc::new(http)
    };

    // 5. Build Router & Serve
    let coordinator = Arc::new(Coordinator::new(catalog.clone(), Arc::new(brain), backend));
    let app = router(AppState { coordinator, catalog });

    let listener = TcpListener::bind(settings.bind_addr.as_str())
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    info!("Gateway listening on {}", settings.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/options", get(list_options))
        .route("/query", post(submit_query))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// Ids the service offers that the catalog lacks, and vice versa.
fn menu_drift(catalog: &Catalog, remote: &[RemoteOption]) -> Vec<String> {
    let local: BTreeSet<u32> = catalog.describe().iter().map(|op| op.id).collect();
    let served: BTreeSet<u32> = remote.iter().map(|o| o.id).collect();

    let mut problems: Vec<String> = local
        .difference(&served)
        .map(|id| format!("option {id} is in the catalog but not served by the backend"))
        .collect();
    problems.extend(
        served
            .difference(&local)
            .map(|id| format!("option {id} is served by the backend but not in the catalog")),
    );
    problems
}

// --- HANDLERS ---

async fn health_check() -> &'static str {
    "Gateway: Operational"
}

async fn list_options(State(state): State<AppState>) -> Json<Vec<OptionEntry>> {
    Json(state.catalog.options())
}

async fn submit_query(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Json<QueryResponse> {
    info!("Query received ({} chars)", payload.query.len());
    let outcome = state.coordinator.handle(&payload.query).await;
    info!("Query finished: {}", outcome.kind());
    Json(outcome.into())
}
