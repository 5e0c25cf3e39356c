//! Application startup and lifecycle management.

use axum::middleware::from_fn;
use axum::{
    routing::{get, patch, post},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    tracing::{make_request_span, request_id_middleware},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::handlers;
use crate::services::{init_metrics, AdjustmentPolicy, CostsBackend, HttpCostsBackend, ReviewService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub reviews: Arc<ReviewService>,
}

impl AppState {
    pub fn new(backend: Arc<dyn CostsBackend>, policy: AdjustmentPolicy) -> Self {
        Self {
            reviews: Arc::new(ReviewService::new(backend, policy)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/projects/:project_id/review",
            post(handlers::review::load_review)
                .get(handlers::review::get_review)
                .delete(handlers::review::discard_review),
        )
        .route(
            "/projects/:project_id/review/adjust",
            post(handlers::review::adjust),
        )
        .route(
            "/projects/:project_id/review/fields",
            patch(handlers::review::edit_fields),
        )
        .route("/projects/:project_id/review/save", post(handlers::review::save))
        .route("/projects/:project_id/review/reset", post(handlers::review::reset))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        init_metrics();

        let backend = HttpCostsBackend::new(&settings.backend);
        tracing::info!(
            base_url = %settings.backend.base_url,
            timeout_secs = ?settings.backend.timeout_secs,
            "Costs backend configured"
        );

        let policy = AdjustmentPolicy {
            scale_tax_rate: settings.adjustment.scale_tax_rate,
        };
        let state = AppState::new(Arc::new(backend), policy);

        let address = format!("{}:{}", settings.server.host, settings.server.port);
        let listener = TcpListener::bind(&address).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!(port = self.port, "Listening");
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
