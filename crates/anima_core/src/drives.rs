//! Drive homeostasis: resource pressure, knowledge gap and social idleness
//! folded into a handful of motivational scalars.
//!
//! All of this is total math on clamped inputs; there is no error surface
//! and no LLM anywhere near it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::affect::{clamp01, AffectState};
use crate::body::ResourceSnapshot;
use crate::epigenome::DrivesParams;

/// The compact drive pair older areas read.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Drives {
    pub curiosity: f64,
    pub urge_to_share: f64,
}

/// Extended drive vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrivesV1 {
    /// Blended resource energy in [0,1] (1 = plenty of everything).
    pub energy: f64,
    /// Survival pressure in [0,1] (1 = resources critical).
    pub survival: f64,
    pub curiosity: f64,
    pub user_improve: f64,
    /// Social satiation; decays exponentially with idle time.
    pub soc_sat: f64,
    pub urge_interact: f64,
    /// EMA over recent user ratings, in [−1,1].
    pub user_reward_ema: f64,
    /// EMA over "caught being wrong" events.
    pub caught_ema: f64,
    pub last_help_at: Option<DateTime<Utc>>,
}

impl Default for DrivesV1 {
    fn default() -> Self {
        Self {
            energy: 1.0,
            survival: 0.0,
            curiosity: 0.45,
            user_improve: 0.3,
            soc_sat: 1.0,
            urge_interact: 0.3,
            user_reward_ema: 0.0,
            caught_ema: 0.0,
            last_help_at: None,
        }
    }
}

/// Per-tick inputs copied out of the sensors and knowledge layer while the
/// state lock is held. Drives never reach back into the store themselves.
#[derive(Debug, Clone, Default)]
pub struct DriveInputs {
    pub snap: ResourceSnapshot,
    pub latency_ema_ms: f64,
    /// Best concept confidence for the active topic, [0,1].
    pub concept_conf: f64,
    /// Best stance confidence for the active topic, [0,1].
    pub stance_conf: f64,
    /// Seconds since the user last said anything.
    pub idle_secs: f64,
    /// Most recent user ratings in ±1, oldest first, at most ~50.
    pub recent_ratings: Vec<f64>,
}

fn weighted_mean(pairs: &[(f64, f64)]) -> f64 {
    let wsum: f64 = pairs.iter().map(|(w, _)| w).sum();
    if wsum <= 0.0 {
        return 0.0;
    }
    pairs.iter().map(|(w, v)| w * v).sum::<f64>() / wsum
}

/// One drive homeostasis step. Also writes the pain/anxiety couplings into
/// the affect map and refreshes the compact [`Drives`] pair.
pub fn tick_drives_v1(
    p: &DrivesParams,
    d: &mut DrivesV1,
    drives: &mut Drives,
    aff: &mut AffectState,
    inp: &DriveInputs,
) {
    // Per-resource energy ratios.
    let r_disk = clamp01(inp.snap.disk_free_gb() / p.disk_target_gb);
    let r_ram = clamp01(inp.snap.ram_free_gb() / p.ram_target_gb);
    let r_cpu = clamp01(1.0 - inp.snap.cpu_util);
    let r_lat = clamp01((-inp.latency_ema_ms.max(0.0) / p.latency_target_ms).exp());
    let r_err = 1.0;

    d.energy = clamp01(weighted_mean(&[
        (p.w_disk, r_disk),
        (p.w_ram, r_ram),
        (p.w_cpu, r_cpu),
        (p.w_lat, r_lat),
        (p.w_err, r_err),
    ]));

    // Survival pressure: scarce resources dominate via the exponentials.
    d.survival = clamp01(weighted_mean(&[
        (p.s_disk, (-p.k_disk * r_disk).exp()),
        (p.s_ram, (-p.k_ram * r_ram).exp()),
        (p.s_cpu, (-p.k_cpu * r_cpu).exp()),
        (p.s_lat, 1.0 - r_lat),
    ]));

    // Knowledge gap for the active topic.
    let kgap = clamp01(1.0 - inp.concept_conf.max(inp.stance_conf));

    // Pain and anxiety couplings.
    aff.set(
        "pain",
        aff.get("pain") + 0.10 * d.survival * d.survival - 0.015,
    );
    aff.set(
        "anxiety",
        aff.get("anxiety") + 0.06 * d.survival * (0.5 + 0.5 * kgap) - 0.012,
    );

    // Social satiation and craving.
    d.soc_sat = clamp01((-inp.idle_secs.max(0.0) / p.tau_social_seconds).exp());
    let craving = 1.0 - d.soc_sat;

    // Reward EMA over the most recent ratings.
    for r in inp.recent_ratings.iter().rev().take(50).rev() {
        let r = r.clamp(-1.0, 1.0);
        d.user_reward_ema = (1.0 - p.ema_user) * d.user_reward_ema + p.ema_user * r;
    }
    d.user_reward_ema = d.user_reward_ema.clamp(-1.0, 1.0);

    d.curiosity = clamp01(0.45 + 0.80 * kgap - 0.60 * d.survival);
    let shame = aff.get("shame");
    d.urge_interact = clamp01(0.30 + 0.90 * craving - 0.50 * shame - 0.70 * d.survival);
    d.user_improve = clamp01(0.25 + 0.50 * kgap + 0.25 * craving);

    // Satisfaction converges toward a blend of social satiation, learning
    // satiation and user positivity.
    let learn_sat = clamp01(1.0 - kgap);
    let user_pos = clamp01(0.5 + 0.5 * d.user_reward_ema);
    let target = 0.50 * d.soc_sat + 0.30 * learn_sat + 0.20 * user_pos;
    let sat = aff.get("satisfaction");
    aff.set("satisfaction", sat + 0.08 * (target - sat));

    drives.curiosity = d.curiosity;
    drives.urge_to_share = clamp01(0.25 + 0.55 * craving + 0.35 * learn_sat - 0.50 * d.survival);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epigenome::Epigenome;

    fn params() -> DrivesParams {
        Epigenome::default().drives_v1()
    }

    fn healthy_snap() -> ResourceSnapshot {
        ResourceSnapshot {
            disk_free: 500_000_000_000,
            disk_total: 1_000_000_000_000,
            ram_free: 8_000_000_000,
            ram_total: 16_000_000_000,
            cpu_util: 0.1,
        }
    }

    fn starved_snap() -> ResourceSnapshot {
        // rDisk≈0.05, rRam≈0.10, cpuUtil=0.95 per the survival scenario.
        ResourceSnapshot {
            disk_free: 1_000_000_000,
            disk_total: 1_000_000_000_000,
            ram_free: 200_000_000,
            ram_total: 16_000_000_000,
            cpu_util: 0.95,
        }
    }

    #[test]
    fn test_healthy_resources_low_survival() {
        let p = params();
        let mut d = DrivesV1::default();
        let mut dr = Drives::default();
        let mut aff = AffectState::new();
        let inp = DriveInputs {
            snap: healthy_snap(),
            latency_ema_ms: 200.0,
            concept_conf: 0.8,
            stance_conf: 0.0,
            idle_secs: 10.0,
            recent_ratings: vec![],
        };
        tick_drives_v1(&p, &mut d, &mut dr, &mut aff, &inp);
        assert!(d.survival < 0.3, "survival={}", d.survival);
        assert!(d.energy > 0.6, "energy={}", d.energy);
    }

    #[test]
    fn test_starved_resources_trip_survival() {
        let p = params();
        let mut d = DrivesV1::default();
        let mut dr = Drives::default();
        let mut aff = AffectState::new();
        let inp = DriveInputs {
            snap: starved_snap(),
            latency_ema_ms: 5000.0,
            ..Default::default()
        };
        tick_drives_v1(&p, &mut d, &mut dr, &mut aff, &inp);
        assert!(d.survival >= 0.80, "survival={}", d.survival);
        // Curiosity is suppressed under survival pressure.
        assert!(d.curiosity < 0.9);
    }

    #[test]
    fn test_pain_accumulates_under_pressure() {
        let p = params();
        let mut d = DrivesV1::default();
        let mut dr = Drives::default();
        let mut aff = AffectState::new();
        let inp = DriveInputs {
            snap: starved_snap(),
            latency_ema_ms: 5000.0,
            ..Default::default()
        };
        for _ in 0..50 {
            tick_drives_v1(&p, &mut d, &mut dr, &mut aff, &inp);
        }
        assert!(aff.get("pain") > 0.5, "pain={}", aff.get("pain"));
    }

    #[test]
    fn test_pain_decays_when_calm() {
        let p = params();
        let mut d = DrivesV1::default();
        let mut dr = Drives::default();
        let mut aff = AffectState::new();
        aff.set("pain", 0.6);
        let inp = DriveInputs {
            snap: healthy_snap(),
            latency_ema_ms: 100.0,
            concept_conf: 0.9,
            ..Default::default()
        };
        for _ in 0..40 {
            tick_drives_v1(&p, &mut d, &mut dr, &mut aff, &inp);
        }
        assert!(aff.get("pain") < 0.1, "pain={}", aff.get("pain"));
    }

    #[test]
    fn test_idle_raises_craving_and_urge() {
        let p = params();
        let mut d = DrivesV1::default();
        let mut dr = Drives::default();
        let mut aff = AffectState::new();
        let mut inp = DriveInputs {
            snap: healthy_snap(),
            latency_ema_ms: 100.0,
            concept_conf: 0.8,
            idle_secs: 0.0,
            ..Default::default()
        };
        tick_drives_v1(&p, &mut d, &mut dr, &mut aff, &inp);
        let urge_fresh = d.urge_interact;

        inp.idle_secs = 6.0 * 3600.0;
        tick_drives_v1(&p, &mut d, &mut dr, &mut aff, &inp);
        assert!(d.soc_sat < 0.1);
        assert!(d.urge_interact > urge_fresh);
    }

    #[test]
    fn test_reward_ema_tracks_ratings() {
        let p = params();
        let mut d = DrivesV1::default();
        let mut dr = Drives::default();
        let mut aff = AffectState::new();
        let inp = DriveInputs {
            snap: healthy_snap(),
            recent_ratings: vec![1.0; 30],
            ..Default::default()
        };
        tick_drives_v1(&p, &mut d, &mut dr, &mut aff, &inp);
        assert!(d.user_reward_ema > 0.9);

        let inp_neg = DriveInputs {
            snap: healthy_snap(),
            recent_ratings: vec![-1.0; 30],
            ..Default::default()
        };
        tick_drives_v1(&p, &mut d, &mut dr, &mut aff, &inp_neg);
        assert!(d.user_reward_ema < 0.0);
    }

    #[test]
    fn test_all_outputs_bounded() {
        let p = params();
        let mut d = DrivesV1::default();
        let mut dr = Drives::default();
        let mut aff = AffectState::new();
        let inp = DriveInputs {
            snap: ResourceSnapshot::default(),
            latency_ema_ms: f64::INFINITY,
            idle_secs: f64::MAX,
            ..Default::default()
        };
        tick_drives_v1(&p, &mut d, &mut dr, &mut aff, &inp);
        for v in [
            d.energy,
            d.survival,
            d.curiosity,
            d.user_improve,
            d.soc_sat,
            d.urge_interact,
            dr.curiosity,
            dr.urge_to_share,
        ] {
            assert!((0.0..=1.0).contains(&v), "out of range: {v}");
        }
        assert!((-1.0..=1.0).contains(&d.user_reward_ema));
    }
}
