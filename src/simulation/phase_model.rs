//! # Phase Model
//!
//! Pure waveform generation for a single meter tick. Given the selected
//! simulation profile, the run baseline (readings at the moment the run started
//! or the profile was switched) and the time elapsed since then, produce the
//! next voltage/current/power triples.
//!
//! ## Profiles
//!
//! - **Steady**: baseline with independent ±jitter per phase (sensor noise)
//! - **Fluctuating**: baseline × (1 + A·sin(2πt/T)) plus jitter
//! - **Overload**: baseline × (1 + r)^t, capped at nominal × ceiling factor
//! - **Brownout**: baseline × (1 − r)^t, floored at nominal × floor factor
//!
//! Ramping profiles carry no jitter so they stay monotonic. At `t = 0` every
//! profile returns the baseline (plus jitter where applicable), which keeps
//! restarted runs continuous with their frozen readings.
//!
//! Randomness is never drawn from a global source: callers hand in a
//! [`NoiseSource`], which tests replace with a fixed sequence.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::time::Duration;
use validator::Validate;

use super::three_phase::{PhaseReadings, PhaseTriple};
use crate::domain::{SimulationType, ValueDomain};

/// Source of jitter samples, uniformly distributed in `[-1.0, 1.0]`
pub trait NoiseSource: Send {
    fn next_unit(&mut self) -> f64;
}

/// Production noise backed by a (possibly seeded) `StdRng`
pub struct RngNoise {
    rng: StdRng,
    dist: Uniform<f64>,
}

impl RngNoise {
    /// Seeded for reproducibility, or from OS entropy when `seed` is `None`
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            dist: Uniform::new_inclusive(-1.0, 1.0),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Some(seed))
    }
}

impl NoiseSource for RngNoise {
    fn next_unit(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }
}

/// Replays a fixed sequence of samples, cycling when exhausted
#[derive(Debug, Clone)]
pub struct SequenceNoise {
    samples: Vec<f64>,
    pos: usize,
}

impl SequenceNoise {
    pub fn new(samples: Vec<f64>) -> Self {
        Self { samples, pos: 0 }
    }

    /// No jitter at all
    pub fn silent() -> Self {
        Self::new(vec![0.0])
    }
}

impl NoiseSource for SequenceNoise {
    fn next_unit(&mut self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sample = self.samples[self.pos % self.samples.len()];
        self.pos = self.pos.wrapping_add(1);
        sample.clamp(-1.0, 1.0)
    }
}

/// Constants parameterizing the four simulation profiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProfileParams {
    /// Nominal phase-to-neutral voltage (V)
    #[validate(range(min = 0.0, max = 100_000.0))]
    pub nominal_voltage_v: f64,
    /// Nominal phase current (A)
    #[validate(range(min = 0.0, max = 10_000.0))]
    pub nominal_current_a: f64,
    /// Jitter bound as a fraction of the baseline (0.01 = ±1%)
    #[validate(range(min = 0.0, max = 0.5))]
    pub jitter_fraction: f64,
    /// Relative amplitude of the fluctuating swing
    #[validate(range(min = 0.0, max = 0.5))]
    pub fluctuation_amplitude: f64,
    /// Period of the fluctuating swing (s)
    #[validate(range(min = 0.001))]
    pub fluctuation_period_secs: f64,
    /// Compound growth per second while overloaded (0.01 = 1%/s)
    #[validate(range(min = 0.0, max = 1.0))]
    pub overload_ramp_per_sec: f64,
    /// Overload voltage cap as a multiple of nominal
    #[validate(range(min = 1.0, max = 10.0))]
    pub overload_voltage_ceiling: f64,
    /// Overload current cap as a multiple of nominal
    #[validate(range(min = 1.0, max = 10.0))]
    pub overload_current_ceiling: f64,
    /// Compound decay per second during a brownout
    #[validate(range(min = 0.0, max = 0.99))]
    pub brownout_ramp_per_sec: f64,
    /// Brownout voltage floor as a fraction of nominal
    #[validate(range(min = 0.0, max = 1.0))]
    pub brownout_voltage_floor: f64,
    /// Brownout current floor as a fraction of nominal
    #[validate(range(min = 0.0, max = 1.0))]
    pub brownout_current_floor: f64,
    /// Largest operator-written voltage as a multiple of nominal
    #[validate(range(min = 1.0, max = 1000.0))]
    pub override_voltage_limit: f64,
    /// Largest operator-written current as a multiple of nominal
    #[validate(range(min = 1.0, max = 1000.0))]
    pub override_current_limit: f64,
}

impl Default for ProfileParams {
    fn default() -> Self {
        Self {
            nominal_voltage_v: 230.0, // European grid
            nominal_current_a: 1.0,
            jitter_fraction: 0.01,
            fluctuation_amplitude: 0.05,
            fluctuation_period_secs: 60.0,
            overload_ramp_per_sec: 0.01,
            overload_voltage_ceiling: 1.10,
            overload_current_ceiling: 1.50,
            brownout_ramp_per_sec: 0.01,
            brownout_voltage_floor: 0.80,
            brownout_current_floor: 0.80,
            override_voltage_limit: 2.0,
            override_current_limit: 100.0,
        }
    }
}

impl ProfileParams {
    /// Readings a freshly created meter starts from
    pub fn nominal_readings(&self) -> PhaseReadings {
        PhaseReadings::nominal(self.nominal_voltage_v, self.nominal_current_a)
    }

    pub fn overload_voltage_cap(&self) -> f64 {
        self.nominal_voltage_v * self.overload_voltage_ceiling
    }

    pub fn overload_current_cap(&self) -> f64 {
        self.nominal_current_a * self.overload_current_ceiling
    }

    pub fn brownout_voltage_min(&self) -> f64 {
        self.nominal_voltage_v * self.brownout_voltage_floor
    }

    pub fn brownout_current_min(&self) -> f64 {
        self.nominal_current_a * self.brownout_current_floor
    }

    /// Upper bound for an operator override of `domain`
    pub fn override_max(&self, domain: ValueDomain) -> f64 {
        let voltage = self.nominal_voltage_v * self.override_voltage_limit;
        let current = self.nominal_current_a * self.override_current_limit;
        match domain {
            ValueDomain::Voltage => voltage,
            ValueDomain::Current => current,
            ValueDomain::Power => voltage * current,
        }
    }
}

/// Stateless waveform generator
#[derive(Debug, Clone, Default)]
pub struct PhaseModel {
    params: ProfileParams,
}

impl PhaseModel {
    pub fn new(params: ProfileParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ProfileParams {
        &self.params
    }

    /// Readings for one tick, `elapsed` after the run baseline was captured
    ///
    /// Base values must be finite and non-negative.
    pub fn compute(
        &self,
        profile: SimulationType,
        base_voltage: PhaseTriple,
        base_current: PhaseTriple,
        elapsed: Duration,
        noise: &mut dyn NoiseSource,
    ) -> PhaseReadings {
        let t = elapsed.as_secs_f64();
        let p = &self.params;

        let (voltage, current) = match profile {
            SimulationType::Steady => (
                self.jitter(base_voltage, noise),
                self.jitter(base_current, noise),
            ),
            SimulationType::Fluctuating => {
                let swing = 1.0 + p.fluctuation_amplitude * self.oscillation(t);
                (
                    self.jitter(base_voltage.map(|v| v * swing), noise),
                    self.jitter(base_current.map(|i| i * swing), noise),
                )
            }
            SimulationType::Overload => (
                ramp_up(base_voltage, p.overload_ramp_per_sec, t, p.overload_voltage_cap()),
                ramp_up(base_current, p.overload_ramp_per_sec, t, p.overload_current_cap()),
            ),
            SimulationType::Brownout => (
                ramp_down(base_voltage, p.brownout_ramp_per_sec, t, p.brownout_voltage_min()),
                ramp_down(base_current, p.brownout_ramp_per_sec, t, p.brownout_current_min()),
            ),
        };

        PhaseReadings::from_voltage_current(voltage, current)
    }

    /// Sinusoid in [-1, 1], zero at t = 0
    fn oscillation(&self, t: f64) -> f64 {
        (TAU * t / self.params.fluctuation_period_secs).sin()
    }

    fn jitter(&self, base: PhaseTriple, noise: &mut dyn NoiseSource) -> PhaseTriple {
        let bound = self.params.jitter_fraction;
        base.map(|v| (v * (1.0 + bound * noise.next_unit())).max(0.0))
    }
}

/// Compound growth capped at `cap`; a base already above the cap is held
fn ramp_up(base: PhaseTriple, rate: f64, t: f64, cap: f64) -> PhaseTriple {
    base.map(|b| {
        if b <= 0.0 || b >= cap || rate <= 0.0 {
            return b;
        }
        // past the crossing time the power term may overflow
        let t_cap = (cap / b).ln() / rate.ln_1p();
        if t >= t_cap {
            cap
        } else {
            (b * (1.0 + rate).powf(t)).min(cap)
        }
    })
}

/// Compound decay floored at `floor`; a base already below the floor is held
fn ramp_down(base: PhaseTriple, rate: f64, t: f64, floor: f64) -> PhaseTriple {
    base.map(|b| {
        if b <= floor || rate <= 0.0 {
            return b;
        }
        let decay = (1.0 - rate).powf(t);
        (b * decay).max(floor)
    })
}
