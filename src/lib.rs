//! Fleet of simulated three-phase power meters.
//!
//! [`registry::SimulatorRegistry`] owns the meters and their tick tasks,
//! [`simulation`] generates the readings and [`facade::ControlFacade`] is the
//! validated entry point used by the HTTP layer in [`api`].

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod facade;
pub mod registry;
pub mod simulation;
pub mod telemetry;

pub use error::{SimResult, SimulatorError};
pub use facade::ControlFacade;
pub use registry::SimulatorRegistry;
