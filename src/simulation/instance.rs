//! # Simulator Instance
//!
//! One simulated meter: identity, configuration and present readings, plus the
//! Stopped/Running state machine that decides whether [`SimulatorInstance::tick`]
//! recomputes anything.
//!
//! Every mutation and every tick goes through the instance's own lock, so a
//! tick's read-modify-write of the readings is never interleaved with a
//! concurrent setter on the same meter.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

use super::phase_model::{NoiseSource, PhaseModel};
use super::three_phase::{PhaseReadings, PhaseTriple};
use crate::domain::{generated_serial_number, Brand, Protocol, SimulationType, ValueDomain};

/// Point-in-time copy of a meter's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSnapshot {
    pub id: String,
    pub protocol: Protocol,
    pub serial_number: String,
    pub brand: Brand,
    pub port: String,
    pub is_running: bool,
    pub simulation_type: SimulationType,
    pub voltage: PhaseTriple,
    pub current: PhaseTriple,
    pub power: PhaseTriple,
    pub updated_at: DateTime<Utc>,
}

impl InstanceSnapshot {
    pub fn readings(&self) -> PhaseReadings {
        PhaseReadings {
            voltage: self.voltage,
            current: self.current,
            power: self.power,
        }
    }
}

/// Where the current run (or profile segment) started from
#[derive(Debug, Clone, Copy)]
struct RunAnchor {
    origin: Instant,
    baseline: PhaseReadings,
}

struct InstanceState {
    serial_number: String,
    brand: Brand,
    profile: SimulationType,
    readings: PhaseReadings,
    /// `Some` while running
    run: Option<RunAnchor>,
    noise: Box<dyn NoiseSource>,
    updated_at: DateTime<Utc>,
}

impl InstanceState {
    fn reanchor(&mut self, now: Instant) {
        if let Some(anchor) = self.run.as_mut() {
            anchor.origin = now;
            anchor.baseline = self.readings;
        }
    }
}

pub struct SimulatorInstance {
    id: String,
    protocol: Protocol,
    port: String,
    model: Arc<PhaseModel>,
    state: Mutex<InstanceState>,
}

impl std::fmt::Debug for SimulatorInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatorInstance")
            .field("id", &self.id)
            .field("protocol", &self.protocol)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl SimulatorInstance {
    /// New stopped meter on `port`: steady profile, default brand, nominal readings
    pub fn create(
        protocol: Protocol,
        port: impl Into<String>,
        model: Arc<PhaseModel>,
        noise: Box<dyn NoiseSource>,
    ) -> Self {
        let uuid = Uuid::new_v4();
        let readings = model.params().nominal_readings();
        Self {
            id: uuid.to_string(),
            protocol,
            port: port.into(),
            state: Mutex::new(InstanceState {
                serial_number: generated_serial_number(uuid.as_u128() as u64),
                brand: Brand::default(),
                profile: SimulationType::default(),
                readings,
                run: None,
                noise,
                updated_at: Utc::now(),
            }),
            model,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().run.is_some()
    }

    pub fn profile(&self) -> SimulationType {
        self.state.lock().profile
    }

    pub fn readings(&self) -> PhaseReadings {
        self.state.lock().readings
    }

    pub fn set_serial_number(&self, serial: impl Into<String>) {
        self.state.lock().serial_number = serial.into();
    }

    pub fn set_brand(&self, brand: Brand) {
        self.state.lock().brand = brand;
    }

    pub fn set_profile(&self, profile: SimulationType) {
        self.set_profile_at(profile, Instant::now());
    }

    /// Switch profile; a running meter ramps from its readings at `now`
    pub fn set_profile_at(&self, profile: SimulationType, now: Instant) {
        let mut st = self.state.lock();
        if st.profile == profile {
            return;
        }
        st.profile = profile;
        st.reanchor(now);
        debug!(id = %self.id, profile = %profile, "simulation profile changed");
    }

    pub(crate) fn set_running(&self, running: bool) -> bool {
        self.set_running_at(running, Instant::now())
    }

    /// Transition Stopped/Running; returns whether the state changed
    ///
    /// Starting anchors the run at `now` with the current readings as baseline
    /// so restarted meters continue from where they froze.
    pub(crate) fn set_running_at(&self, running: bool, now: Instant) -> bool {
        let mut st = self.state.lock();
        match (st.run.is_some(), running) {
            (false, true) => {
                st.run = Some(RunAnchor {
                    origin: now,
                    baseline: st.readings,
                });
                true
            }
            (true, false) => {
                st.run = None;
                true
            }
            _ => false,
        }
    }

    /// Recompute readings for `now`; no-op while stopped
    pub fn tick(&self, now: Instant) -> bool {
        let mut st = self.state.lock();
        let Some(anchor) = st.run else {
            return false;
        };

        let elapsed = now.saturating_duration_since(anchor.origin);
        let profile = st.profile;
        let readings = self.model.compute(
            profile,
            anchor.baseline.voltage,
            anchor.baseline.current,
            elapsed,
            st.noise.as_mut(),
        );
        st.readings = readings;
        st.updated_at = Utc::now();

        trace!(
            id = %self.id,
            profile = %profile,
            elapsed_ms = elapsed.as_millis() as u64,
            voltage_l1 = readings.voltage.l1,
            current_l1 = readings.current.l1,
            power_l1 = readings.power.l1,
            "tick"
        );
        true
    }

    pub fn override_readings(&self, domain: ValueDomain, values: PhaseTriple) -> bool {
        self.override_readings_at(domain, values, Instant::now())
    }

    /// Operator override of one domain's triple
    ///
    /// Voltage or current overrides recompute power; a power override is stored
    /// as given. A running meter continues from the overridden values. Returns
    /// `false` and leaves the meter untouched when the result is not finite.
    pub fn override_readings_at(
        &self,
        domain: ValueDomain,
        values: PhaseTriple,
        now: Instant,
    ) -> bool {
        let mut st = self.state.lock();
        let current = st.readings;
        let next = match domain {
            ValueDomain::Voltage => PhaseReadings::from_voltage_current(values, current.current),
            ValueDomain::Current => PhaseReadings::from_voltage_current(current.voltage, values),
            ValueDomain::Power => PhaseReadings {
                power: values,
                ..current
            },
        };
        if !next.is_finite() {
            debug!(id = %self.id, domain = %domain, "override rejected, readings not finite");
            return false;
        }
        st.readings = next;
        st.updated_at = Utc::now();
        st.reanchor(now);
        debug!(id = %self.id, domain = %domain, "readings overridden");
        true
    }

    pub fn read(&self) -> InstanceSnapshot {
        let st = self.state.lock();
        InstanceSnapshot {
            id: self.id.clone(),
            protocol: self.protocol,
            serial_number: st.serial_number.clone(),
            brand: st.brand,
            port: self.port.clone(),
            is_running: st.run.is_some(),
            simulation_type: st.profile,
            voltage: st.readings.voltage,
            current: st.readings.current,
            power: st.readings.power,
            updated_at: st.updated_at,
        }
    }
}
