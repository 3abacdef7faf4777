//! Bounded affect scalars with homeostatic decay.
//!
//! Every affect is a value in [0,1] with a registered definition: a
//! baseline it reconverges to, a decay rate, and a coupling term that pulls
//! it up (or down) as body energy drains. No LLM is involved anywhere in
//! this loop.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::body::BodyState;
use crate::epigenome::Epigenome;

pub fn clamp01(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Registered definition of one affect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AffectDef {
    pub baseline: f64,
    pub decay_per_sec: f64,
    /// Added per second scaled by (1 − energy/energyMax). Negative couplings
    /// model affects that sag when the body runs low.
    pub energy_coupling: f64,
}

impl AffectDef {
    pub fn new(baseline: f64, decay_per_sec: f64, energy_coupling: f64) -> Self {
        Self {
            baseline: clamp01(baseline),
            decay_per_sec,
            energy_coupling,
        }
    }
}

/// Mapping affect name → intensity. Extensible at runtime: setting an
/// unknown name registers it implicitly; the tick only moves affects that
/// have a definition in the epigenome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffectState {
    values: BTreeMap<String, f64>,
}

impl AffectState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed every defined affect at its baseline.
    pub fn from_defs(epi: &Epigenome) -> Self {
        let mut s = Self::default();
        for (name, def) in &epi.affect_defs {
            s.values.insert(name.clone(), clamp01(def.baseline));
        }
        s
    }

    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, name: &str, v: f64) {
        self.values.insert(name.to_string(), clamp01(v));
    }

    /// Nudge an affect by a delta, clamped.
    pub fn add(&mut self, name: &str, delta: f64) {
        let v = self.get(name);
        self.set(name, v + delta);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// One homeostatic step over every defined affect:
/// `v ← v + (baseline − v)·clamp01(decayPerSec·Δt) + (1 − energy01)·coupling·Δt`
pub fn tick_affects(body: &BodyState, aff: &mut AffectState, epi: &Epigenome, dt_secs: f64) {
    if dt_secs <= 0.0 {
        return;
    }
    let energy01 = body.energy01(epi.energy_max());
    for (name, def) in &epi.affect_defs {
        let v = aff.get(name);
        let pull = (def.baseline - v) * clamp01(def.decay_per_sec * dt_secs);
        let couple = (1.0 - energy01) * def.energy_coupling * dt_secs;
        aff.set(name, v + pull + couple);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epigenome::Epigenome;

    fn full_body(epi: &Epigenome) -> BodyState {
        BodyState::full(epi.energy_max())
    }

    #[test]
    fn test_set_clamps() {
        let mut aff = AffectState::new();
        aff.set("pain", 3.0);
        assert_eq!(aff.get("pain"), 1.0);
        aff.set("pain", -1.0);
        assert_eq!(aff.get("pain"), 0.0);
        aff.set("pain", f64::NAN);
        assert_eq!(aff.get("pain"), 0.0);
    }

    #[test]
    fn test_decay_toward_baseline() {
        let epi = Epigenome::default();
        let body = full_body(&epi);
        let mut aff = AffectState::from_defs(&epi);
        aff.set("fear", 0.9);
        for _ in 0..200 {
            tick_affects(&body, &mut aff, &epi, 1.0);
        }
        // Fear baseline is 0.0; with full energy the coupling term vanishes.
        assert!(aff.get("fear") < 0.05, "fear={}", aff.get("fear"));
    }

    #[test]
    fn test_energy_coupling_raises_unwell() {
        let epi = Epigenome::default();
        let mut body = full_body(&epi);
        body.debit(epi.energy_max()); // drained
        let mut aff = AffectState::from_defs(&epi);
        let before = aff.get("unwell");
        tick_affects(&body, &mut aff, &epi, 5.0);
        assert!(aff.get("unwell") > before);
    }

    #[test]
    fn test_unknown_affect_registered_on_set() {
        let mut aff = AffectState::new();
        assert_eq!(aff.get("awe"), 0.0);
        aff.set("awe", 0.4);
        assert!((aff.get("awe") - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_tick_keeps_bounds() {
        let epi = Epigenome::default();
        let mut body = full_body(&epi);
        body.debit(epi.energy_max());
        let mut aff = AffectState::from_defs(&epi);
        // Huge dt must not push anything out of [0,1].
        tick_affects(&body, &mut aff, &epi, 1e6);
        for (_, v) in aff.iter() {
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
