use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Router};
use tower_http::cors::CorsLayer;

use sheetchat::stream::RelayConfig;
use sheetchat::upstream::CompletionClient;
use sheetchat::{handlers, middleware, session::SessionStore, AppState};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_logging().expect("Failed to initialize logging");

    // Initialize the completion client if an API key is provided
    let completions = match std::env::var("UPSTREAM_API_KEY").ok() {
        Some(api_key) if !api_key.is_empty() => {
            let mut client = CompletionClient::new(api_key);
            if let Ok(base_url) = std::env::var("UPSTREAM_API_URL") {
                client = client.with_base_url(base_url);
            }
            if let Ok(model) = std::env::var("UPSTREAM_MODEL") {
                client = client.with_model(model);
            }
            tracing::info!("Completion client ready (model: {})", client.model());
            Some(client)
        }
        _ => {
            tracing::warn!("UPSTREAM_API_KEY not found. Analysis turns will be rejected.");
            tracing::info!("To enable analysis, set: UPSTREAM_API_KEY and optionally UPSTREAM_API_URL, UPSTREAM_MODEL");
            None
        }
    };

    let relay = RelayConfig {
        idle_timeout: std::env::var("UPSTREAM_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| RelayConfig::default().idle_timeout),
    };
    tracing::info!("Relay idle timeout: {}s", relay.idle_timeout.as_secs());

    let shared_state = Arc::new(AppState {
        completions,
        sessions: SessionStore::new(),
        relay,
    });

    let app = Router::new()
        .merge(handlers::ui::ui_routes())
        .merge(handlers::chat::chat_routes())
        .merge(handlers::upload::upload_routes())
        .route("/api/status", axum::routing::get(api_status))
        .layer(axum::middleware::from_fn(
            middleware::logging::request_logging_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(Extension(shared_state));

    let port = std::env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(3000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("Failed to bind server port");
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
}

// Logging configuration: human-readable by default, JSON when LOG_FORMAT=json
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,sheetchat=trace,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,sheetchat=info,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("📊 SheetChat starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log level: {}", log_level);

    Ok(())
}

// API Status endpoint
async fn api_status(
    Extension(state): Extension<Arc<AppState>>,
) -> axum::response::Json<serde_json::Value> {
    use serde_json::json;

    let upstream_status = if state.completions.is_some() {
        "configured"
    } else {
        "not_configured"
    };

    axum::response::Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "completion_api": upstream_status,
        },
        "sessions": state.sessions.len().await,
        "endpoints": {
            "status": "/api/status",
            "chat": "/api/chat",
            "upload": "/api/upload",
        }
    }))
}
