//! # funkhaus-observability
//!
//! Observability-Crate fuer Funkhaus:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured JSON Logging via tracing-subscriber
//! - Request-Timing Middleware

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, FunkhausMetrics, Momentaufnahme, StatistikQuelle};
pub use middleware::{request_timing_layer, timing_middleware};

use std::sync::Arc;

use axum::Router;

/// Router mit `/metrics` und `/health`, inklusive Timing-Middleware
pub fn observability_router(
    metriken: FunkhausMetrics,
    quelle: Arc<dyn StatistikQuelle>,
    health: HealthState,
) -> Router {
    Router::new()
        .merge(metrics_router(metriken.clone(), quelle))
        .merge(health_router(health))
        .layer(axum::middleware::from_fn_with_state(
            metriken,
            timing_middleware,
        ))
}
