//! Body state: the metabolic side of the organism.
//!
//! Energy is the single currency every self-change and every utterance is
//! paid from. It drifts back toward the configured maximum while the
//! process idles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OS resource snapshot, as produced by a sampler.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub disk_free: u64,
    pub disk_total: u64,
    pub ram_free: u64,
    pub ram_total: u64,
    /// CPU utilization in [0,1].
    pub cpu_util: f64,
}

impl ResourceSnapshot {
    pub fn disk_free_gb(&self) -> f64 {
        self.disk_free as f64 / 1e9
    }

    pub fn ram_free_gb(&self) -> f64 {
        self.ram_free as f64 / 1e9
    }
}

/// Exponential moving average for round-trip latency, α = 0.15.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatencyEma {
    pub ms: f64,
    alpha: f64,
    primed: bool,
}

impl Default for LatencyEma {
    fn default() -> Self {
        Self {
            ms: 0.0,
            alpha: 0.15,
            primed: false,
        }
    }
}

impl LatencyEma {
    pub fn observe(&mut self, lat_ms: f64) {
        if !lat_ms.is_finite() || lat_ms < 0.0 {
            return;
        }
        if self.primed {
            self.ms = (1.0 - self.alpha) * self.ms + self.alpha * lat_ms;
        } else {
            self.ms = lat_ms;
            self.primed = true;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyState {
    /// Current energy in [0, energy_max].
    pub energy: f64,
    /// Web requests made in the current hour window.
    pub web_count_hour: u32,
    /// No self-changes before this instant.
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl BodyState {
    pub fn full(energy_max: f64) -> Self {
        Self {
            energy: energy_max.max(0.0),
            web_count_hour: 0,
            cooldown_until: None,
        }
    }

    /// Normalized energy.
    pub fn energy01(&self, energy_max: f64) -> f64 {
        if energy_max <= 0.0 {
            return 0.0;
        }
        (self.energy / energy_max).clamp(0.0, 1.0)
    }

    /// Regenerate toward the maximum. Default rate is +0.02/s.
    pub fn drift(&mut self, energy_max: f64, regen_per_sec: f64, dt_secs: f64) {
        if dt_secs <= 0.0 {
            return;
        }
        self.energy = (self.energy + regen_per_sec * dt_secs).clamp(0.0, energy_max.max(0.0));
    }

    /// Debit energy with a hard floor at 0.
    pub fn debit(&mut self, cost: f64) {
        if cost.is_finite() && cost > 0.0 {
            self.energy = (self.energy - cost).max(0.0);
        }
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.map(|t| now < t).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_drift_saturates_at_max() {
        let mut body = BodyState::full(100.0);
        body.debit(10.0);
        body.drift(100.0, 0.02, 1000.0);
        assert!((body.energy - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_debit_floors_at_zero() {
        let mut body = BodyState::full(10.0);
        body.debit(25.0);
        assert_eq!(body.energy, 0.0);
        body.debit(f64::NAN); // ignored
        assert_eq!(body.energy, 0.0);
    }

    #[test]
    fn test_latency_ema_primes_then_smooths() {
        let mut ema = LatencyEma::default();
        ema.observe(1000.0);
        assert!((ema.ms - 1000.0).abs() < 1e-9);
        ema.observe(2000.0);
        // (1-0.15)*1000 + 0.15*2000 = 1150
        assert!((ema.ms - 1150.0).abs() < 1e-6);
    }

    #[test]
    fn test_cooldown_window() {
        let now = Utc::now();
        let mut body = BodyState::full(100.0);
        assert!(!body.in_cooldown(now));
        body.cooldown_until = Some(now + ChronoDuration::seconds(30));
        assert!(body.in_cooldown(now));
        assert!(!body.in_cooldown(now + ChronoDuration::seconds(31)));
    }
}
