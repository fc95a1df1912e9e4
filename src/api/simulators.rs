use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{error::ApiError, AppState};
use crate::domain::ValueDomain;
use crate::facade::{CreatedSimulator, MeterData, SimulatorConfig};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn success() -> Json<Self> {
        Json(Self {
            status: "success".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSimulatorRequest {
    protocol: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerialNumberRequest {
    serial_number: String,
}

#[derive(Debug, Deserialize)]
pub struct BrandRequest {
    brand: String,
}

#[derive(Debug, Deserialize)]
pub struct SimulationTypeRequest {
    #[serde(rename = "type")]
    simulation_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStateRequest {
    is_running: bool,
}

#[derive(Debug, Deserialize)]
pub struct ValuesRequest {
    values: Vec<f64>,
}

/// GET /config - configuration of every simulator
pub async fn get_config(State(st): State<AppState>) -> Json<SimulatorConfig> {
    Json(st.facade.config())
}

/// POST /config/reset - remove every simulator
pub async fn reset_config(State(st): State<AppState>) -> Json<StatusResponse> {
    st.facade.reset().await;
    StatusResponse::success()
}

/// POST /simulator - create a simulator
pub async fn create_simulator(
    State(st): State<AppState>,
    Json(req): Json<CreateSimulatorRequest>,
) -> Result<Json<CreatedSimulator>, ApiError> {
    Ok(Json(st.facade.create_simulator(&req.protocol)?))
}

/// GET /simulator/:id - live readings and settings
pub async fn get_simulator(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MeterData>, ApiError> {
    Ok(Json(st.facade.meter_data(&id)?))
}

/// DELETE /simulator/:id
pub async fn delete_simulator(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    st.facade.remove_simulator(&id).await?;
    Ok(StatusResponse::success())
}

pub async fn set_serial_number(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SerialNumberRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    st.facade.set_serial_number(&id, &req.serial_number)?;
    Ok(StatusResponse::success())
}

pub async fn set_brand(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<BrandRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    st.facade.set_brand(&id, &req.brand)?;
    Ok(StatusResponse::success())
}

pub async fn set_simulation_type(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SimulationTypeRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    st.facade.set_simulation_type(&id, &req.simulation_type)?;
    Ok(StatusResponse::success())
}

pub async fn set_simulation_state(
    State(st): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SimulationStateRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    st.facade.set_simulation_state(&id, req.is_running).await?;
    Ok(StatusResponse::success())
}

pub async fn set_voltage(
    st: State<AppState>,
    id: Path<String>,
    req: Json<ValuesRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    set_values(st, id, ValueDomain::Voltage, req)
}

pub async fn set_current(
    st: State<AppState>,
    id: Path<String>,
    req: Json<ValuesRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    set_values(st, id, ValueDomain::Current, req)
}

pub async fn set_power(
    st: State<AppState>,
    id: Path<String>,
    req: Json<ValuesRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    set_values(st, id, ValueDomain::Power, req)
}

fn set_values(
    State(st): State<AppState>,
    Path(id): Path<String>,
    domain: ValueDomain,
    Json(req): Json<ValuesRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    st.facade.set_values(&id, domain.as_ref(), &req.values)?;
    Ok(StatusResponse::success())
}
