//! # 3-Phase Measurement Values
//!
//! A simulated meter reports one value per phase (L1, L2, L3) for each of its
//! three electrical domains: voltage, current and active power.
//!
//! ## Conventions
//!
//! - Nominal voltage: 230V phase-to-neutral
//! - Power is computed per phase as V × I (unit power factor approximation)
//! - Values are always finite; producers must never store NaN or infinity

use serde::{Deserialize, Serialize};

/// Per-phase values for one electrical domain, ordered L1, L2, L3
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct PhaseTriple {
    pub l1: f64,
    pub l2: f64,
    pub l3: f64,
}

impl PhaseTriple {
    pub fn new(l1: f64, l2: f64, l3: f64) -> Self {
        Self { l1, l2, l3 }
    }

    /// Same value on every phase
    pub fn balanced(value: f64) -> Self {
        Self::new(value, value, value)
    }

    /// Build from a slice holding exactly three values
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [l1, l2, l3] => Some(Self::new(*l1, *l2, *l3)),
            _ => None,
        }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.l1, self.l2, self.l3]
    }

    /// Apply `f` to each phase independently
    pub fn map(self, mut f: impl FnMut(f64) -> f64) -> Self {
        Self::new(f(self.l1), f(self.l2), f(self.l3))
    }

    /// Combine two triples phase by phase
    pub fn zip_with(self, other: PhaseTriple, mut f: impl FnMut(f64, f64) -> f64) -> Self {
        Self::new(
            f(self.l1, other.l1),
            f(self.l2, other.l2),
            f(self.l3, other.l3),
        )
    }

    /// Per-phase product, used for P = V × I
    pub fn product(self, other: PhaseTriple) -> Self {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn max_phase(&self) -> f64 {
        self.l1.max(self.l2).max(self.l3)
    }

    pub fn min_phase(&self) -> f64 {
        self.l1.min(self.l2).min(self.l3)
    }

    pub fn is_finite(&self) -> bool {
        self.l1.is_finite() && self.l2.is_finite() && self.l3.is_finite()
    }

    /// Round every phase to `decimals` places for presentation
    pub fn rounded(self, decimals: i32) -> Self {
        let scale = 10f64.powi(decimals);
        self.map(|v| (v * scale).round() / scale)
    }
}

impl From<[f64; 3]> for PhaseTriple {
    fn from(values: [f64; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }
}

impl From<PhaseTriple> for [f64; 3] {
    fn from(triple: PhaseTriple) -> Self {
        triple.to_array()
    }
}

/// One complete set of meter readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseReadings {
    pub voltage: PhaseTriple,
    pub current: PhaseTriple,
    pub power: PhaseTriple,
}

impl PhaseReadings {
    /// Readings derived from voltage and current, power = V × I per phase
    pub fn from_voltage_current(voltage: PhaseTriple, current: PhaseTriple) -> Self {
        Self {
            voltage,
            current,
            power: voltage.product(current),
        }
    }

    /// Balanced readings at the given nominal voltage and current
    pub fn nominal(voltage_v: f64, current_a: f64) -> Self {
        Self::from_voltage_current(
            PhaseTriple::balanced(voltage_v),
            PhaseTriple::balanced(current_a),
        )
    }

    pub fn is_finite(&self) -> bool {
        self.voltage.is_finite() && self.current.is_finite() && self.power.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_triple() {
        let t = PhaseTriple::balanced(230.0);
        assert_eq!(t.to_array(), [230.0, 230.0, 230.0]);
        assert_eq!(t.max_phase(), t.min_phase());
    }

    #[test]
    fn test_from_slice_requires_three_values() {
        assert!(PhaseTriple::from_slice(&[1.0, 2.0, 3.0]).is_some());
        assert!(PhaseTriple::from_slice(&[1.0, 2.0]).is_none());
        assert!(PhaseTriple::from_slice(&[1.0, 2.0, 3.0, 4.0]).is_none());
    }

    #[test]
    fn test_power_is_per_phase_product() {
        let readings = PhaseReadings::from_voltage_current(
            PhaseTriple::new(230.0, 231.0, 229.0),
            PhaseTriple::new(1.0, 2.0, 3.0),
        );
        assert_eq!(readings.power.to_array(), [230.0, 462.0, 687.0]);
    }

    #[test]
    fn test_rounding() {
        let t = PhaseTriple::new(230.123, 1.005_1, 229.999);
        let r = t.rounded(2);
        assert!((r.l1 - 230.12).abs() < 1e-9);
        assert!((r.l2 - 1.01).abs() < 1e-9);
        assert!((r.l3 - 230.0).abs() < 1e-9);
    }

    #[test]
    fn test_serializes_as_array() {
        let json = serde_json::to_string(&PhaseTriple::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0]");
        let back: PhaseTriple = serde_json::from_str("[4.0,5.0,6.0]").unwrap();
        assert_eq!(back, PhaseTriple::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_non_finite_detected() {
        assert!(!PhaseTriple::new(1.0, f64::NAN, 3.0).is_finite());
        assert!(!PhaseReadings::nominal(f64::INFINITY, 1.0).is_finite());
        assert!(PhaseReadings::nominal(230.0, 1.0).is_finite());
    }
}
