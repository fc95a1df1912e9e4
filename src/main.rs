use anyhow::Result;
use power_meter_simulator::{api, config, telemetry, ControlFacade, SimulatorRegistry};
use config::Config;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;
    telemetry::init_tracing(&cfg.logging)?;

    let registry = Arc::new(SimulatorRegistry::new(cfg.registry_settings()));
    let facade = ControlFacade::new(registry.clone());
    let app = api::router(api::AppState::new(facade), &cfg.server);

    let addr = cfg.server.socket_addr()?;

    if cfg.server.host == "0.0.0.0" {
        warn!("Server binding to 0.0.0.0 - simulator control is reachable from the network");
    }

    info!(
        %addr,
        tick_ms = cfg.simulation.tick_millis,
        ports = cfg.ports.count,
        "starting power meter simulator"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    registry.shutdown().await;
    warn!("shutdown complete");
    Ok(())
}
