//! Entry point for the transport layer. Validates raw request values, drives
//! the registry and converts snapshots into the external data shape.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::debug;

use crate::domain::{
    is_valid_serial_number, Brand, Protocol, SimulationType, ValueDomain,
    SERIAL_NUMBER_MAX_DIGITS,
};
use crate::error::{SimResult, SimulatorError};
use crate::registry::SimulatorRegistry;
use crate::simulation::{InstanceSnapshot, PhaseTriple};

/// Decimal places readings are reported with
const READING_DECIMALS: i32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedSimulator {
    pub id: String,
    pub port: String,
}

/// Live view of one meter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterData {
    pub voltage: PhaseTriple,
    pub current: PhaseTriple,
    pub power: PhaseTriple,
    pub serial_number: String,
    pub brand: Brand,
    pub port: String,
    pub is_running: bool,
    pub simulation_type: SimulationType,
    pub id: String,
    pub protocol: Protocol,
}

impl From<InstanceSnapshot> for MeterData {
    fn from(s: InstanceSnapshot) -> Self {
        Self {
            voltage: s.voltage.rounded(READING_DECIMALS),
            current: s.current.rounded(READING_DECIMALS),
            power: s.power.rounded(READING_DECIMALS),
            serial_number: s.serial_number,
            brand: s.brand,
            port: s.port,
            is_running: s.is_running,
            simulation_type: s.simulation_type,
            id: s.id,
            protocol: s.protocol,
        }
    }
}

/// Configuration entry of one meter, without readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    pub id: String,
    pub protocol: Protocol,
    pub serial_number: String,
    pub brand: Brand,
    pub port: String,
    pub is_running: bool,
    pub simulation_type: SimulationType,
}

impl From<InstanceSnapshot> for InstanceConfig {
    fn from(s: InstanceSnapshot) -> Self {
        Self {
            id: s.id,
            protocol: s.protocol,
            serial_number: s.serial_number,
            brand: s.brand,
            port: s.port,
            is_running: s.is_running,
            simulation_type: s.simulation_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub instances: Vec<InstanceConfig>,
}

#[derive(Clone)]
pub struct ControlFacade {
    registry: Arc<SimulatorRegistry>,
}

impl ControlFacade {
    pub fn new(registry: Arc<SimulatorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SimulatorRegistry> {
        &self.registry
    }

    pub fn create_simulator(&self, protocol: &str) -> SimResult<CreatedSimulator> {
        let protocol: Protocol = parse_choice("protocol", protocol)?;
        let instance = self.registry.add(protocol)?;
        Ok(CreatedSimulator {
            id: instance.id().to_string(),
            port: instance.port().to_string(),
        })
    }

    pub async fn remove_simulator(&self, id: &str) -> SimResult<()> {
        self.registry.remove(id).await
    }

    pub fn meter_data(&self, id: &str) -> SimResult<MeterData> {
        Ok(self.registry.get(id)?.read().into())
    }

    pub fn all_meter_data(&self) -> Vec<MeterData> {
        self.registry.list().into_iter().map(MeterData::from).collect()
    }

    pub fn config(&self) -> SimulatorConfig {
        SimulatorConfig {
            instances: self
                .registry
                .list()
                .into_iter()
                .map(InstanceConfig::from)
                .collect(),
        }
    }

    pub fn set_serial_number(&self, id: &str, serial: &str) -> SimResult<()> {
        if !is_valid_serial_number(serial) {
            debug!(id = %id, serial = %serial, "rejected serial number");
            return Err(SimulatorError::invalid(format!(
                "Serial number must be 1 to {SERIAL_NUMBER_MAX_DIGITS} digits, got {serial:?}"
            )));
        }
        self.registry.get(id)?.set_serial_number(serial);
        Ok(())
    }

    pub fn set_brand(&self, id: &str, brand: &str) -> SimResult<()> {
        let brand: Brand = parse_choice("brand", brand)?;
        self.registry.get(id)?.set_brand(brand);
        Ok(())
    }

    pub fn set_simulation_type(&self, id: &str, profile: &str) -> SimResult<()> {
        let profile: SimulationType = parse_choice("simulation type", profile)?;
        self.registry.get(id)?.set_profile(profile);
        Ok(())
    }

    pub async fn set_simulation_state(&self, id: &str, running: bool) -> SimResult<()> {
        self.registry.set_running(id, running).await
    }

    /// Overwrite the voltage, current or power triple of a meter
    pub fn set_values(&self, id: &str, domain: &str, values: &[f64]) -> SimResult<()> {
        let domain: ValueDomain = parse_choice("value domain", domain)?;
        let triple = PhaseTriple::from_slice(values).ok_or_else(|| {
            SimulatorError::invalid(format!(
                "Expected exactly 3 {domain} values, got {}",
                values.len()
            ))
        })?;
        let max = self.registry.profile().override_max(domain);
        if triple
            .to_array()
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0 || *v > max)
        {
            return Err(SimulatorError::invalid(format!(
                "{domain} values must be between 0 and {max}"
            )));
        }
        if !self.registry.get(id)?.override_readings(domain, triple) {
            return Err(SimulatorError::invalid(format!(
                "{domain} values produce readings out of range"
            )));
        }
        Ok(())
    }

    pub async fn reset(&self) {
        self.registry.reset().await;
    }

    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}

fn parse_choice<T>(kind: &str, raw: &str) -> SimResult<T>
where
    T: FromStr + IntoEnumIterator + Display,
{
    T::from_str(raw).map_err(|_| {
        let allowed: Vec<String> = T::iter().map(|v| v.to_string()).collect();
        debug!(kind = %kind, value = %raw, "rejected enum value");
        SimulatorError::invalid(format!(
            "Invalid {kind}: {raw}. Must be one of: {}",
            allowed.join(", ")
        ))
    })
}
