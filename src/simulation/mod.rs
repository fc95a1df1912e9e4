//! # Meter Simulation Module
//!
//! Produces the live readings of simulated three-phase power meters.
//!
//! ## Components
//!
//! - **Three-phase values**: per-phase voltage/current/power triples
//! - **Phase model**: pure waveform math for the steady, fluctuating, overload and brownout profiles
//! - **Instance**: one meter's identity, configuration and Stopped/Running state machine
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use power_meter_simulator::domain::SimulationType;
//! use power_meter_simulator::simulation::{PhaseModel, PhaseTriple, SequenceNoise};
//!
//! let model = PhaseModel::default();
//! let readings = model.compute(
//!     SimulationType::Overload,
//!     PhaseTriple::balanced(230.0),
//!     PhaseTriple::balanced(1.0),
//!     Duration::from_secs(5),
//!     &mut SequenceNoise::silent(),
//! );
//!
//! assert!(readings.current.l1 > 1.0);
//! assert!(readings.voltage.l1 <= model.params().overload_voltage_cap());
//! ```
//!
//! Meters are started and stopped through the registry, which owns their
//! tick tasks.

pub mod instance;
pub mod phase_model;
pub mod three_phase;

pub use instance::{InstanceSnapshot, SimulatorInstance};
pub use phase_model::{NoiseSource, PhaseModel, ProfileParams, RngNoise, SequenceNoise};
pub use three_phase::{PhaseReadings, PhaseTriple};
