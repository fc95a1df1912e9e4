pub mod error;
pub mod simulators;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::warn;

use crate::{config::ServerConfig, facade::ControlFacade};

#[derive(Clone)]
pub struct AppState {
    pub facade: ControlFacade,
}

impl AppState {
    pub fn new(facade: ControlFacade) -> Self {
        Self { facade }
    }
}

pub fn router(state: AppState, cfg: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/config", get(simulators::get_config))
        .route("/config/reset", post(simulators::reset_config))
        .route("/simulator", post(simulators::create_simulator))
        .route(
            "/simulator/:id",
            get(simulators::get_simulator).delete(simulators::delete_simulator),
        )
        .route("/simulator/:id/serial-number", post(simulators::set_serial_number))
        .route("/simulator/:id/brand", post(simulators::set_brand))
        .route("/simulator/:id/simulation-type", post(simulators::set_simulation_type))
        .route("/simulator/:id/simulation-state", post(simulators::set_simulation_state))
        .route("/simulator/:id/voltage", post(simulators::set_voltage))
        .route("/simulator/:id/current", post(simulators::set_current))
        .route("/simulator/:id/power", post(simulators::set_power))
        .with_state(state);

    if cfg.enable_cors {
        match cfg.cors_origin.parse::<HeaderValue>() {
            Ok(origin) => {
                let cors = CorsLayer::new()
                    .allow_origin(origin)
                    .allow_methods([Method::GET, Method::POST, Method::DELETE])
                    .allow_headers([header::CONTENT_TYPE])
                    .allow_credentials(true);
                router = router.layer(cors);
            }
            Err(e) => warn!(origin = %cfg.cors_origin, error = %e, "invalid CORS origin, CORS disabled"),
        }
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
