//! The somatic tick: body drift → drives → affects → survival gate, over
//! the shared scalar groups.
//!
//! One process-wide async mutex guards the groups. Tick and request tasks
//! both lock it, copy the scalars they need, and release it before any
//! blocking call (DB, LLM, web).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use anima_core::{
    tick_affects, tick_drives_v1, AffectState, BodyState, DriveInputs, Drives, DrivesV1,
    Epigenome, LatencyEma, ResourceSnapshot, Workspace,
};

/// Knowledge-layer inputs the tick cannot compute itself; the caller reads
/// them from the store before locking.
#[derive(Debug, Clone, Default)]
pub struct TickInputs {
    pub snap: ResourceSnapshot,
    pub concept_conf: f64,
    pub stance_conf: f64,
    pub recent_ratings: Vec<f64>,
}

/// All in-memory scalar groups of the organism.
#[derive(Debug, Clone)]
pub struct Soma {
    pub body: BodyState,
    pub affects: AffectState,
    pub drives: Drives,
    pub drives_v1: DrivesV1,
    pub workspace: Workspace,
    pub latency: LatencyEma,
    pub last_user_at: DateTime<Utc>,
}

pub type SharedSoma = Arc<Mutex<Soma>>;

impl Soma {
    pub fn new(epi: &Epigenome) -> Self {
        Self {
            body: BodyState::full(epi.energy_max()),
            affects: AffectState::from_defs(epi),
            drives: Drives::default(),
            drives_v1: DrivesV1::default(),
            workspace: Workspace::new(),
            latency: LatencyEma::default(),
            last_user_at: Utc::now(),
        }
    }

    pub fn shared(epi: &Epigenome) -> SharedSoma {
        Arc::new(Mutex::new(Self::new(epi)))
    }

    /// One serial somatic step. Pure in-memory; the caller holds the lock.
    pub fn tick(&mut self, epi: &Epigenome, inp: &TickInputs, dt: Duration, now: DateTime<Utc>) {
        let dt_secs = dt.as_secs_f64();

        self.body
            .drift(epi.energy_max(), epi.energy_regen_per_sec(), dt_secs);

        let idle_secs = (now - self.last_user_at).num_milliseconds().max(0) as f64 / 1000.0;
        let drive_inputs = DriveInputs {
            snap: inp.snap,
            latency_ema_ms: self.latency.ms,
            concept_conf: inp.concept_conf,
            stance_conf: inp.stance_conf,
            idle_secs,
            recent_ratings: inp.recent_ratings.clone(),
        };
        tick_drives_v1(
            &epi.drives_v1(),
            &mut self.drives_v1,
            &mut self.drives,
            &mut self.affects,
            &drive_inputs,
        );

        tick_affects(&self.body, &mut self.affects, epi, dt_secs);

        // Kernel gating, then hints for areas and the request path.
        self.workspace.apply_survival_gate(self.drives_v1.survival);
        self.workspace.energy_hint = self.body.energy01(epi.energy_max());
        self.workspace.drives_energy_deficit = 1.0 - self.drives_v1.energy;
        self.workspace.social_craving = 1.0 - self.drives_v1.soc_sat;
        self.workspace.urge_interact_hint = self.drives_v1.urge_interact;
        self.workspace.latency_ema_ms = self.latency.ms;
        self.workspace.resource_hint = format!(
            "disk_free_gb={:.1} ram_free_gb={:.2} cpu={:.0}% survival={:.2}",
            inp.snap.disk_free_gb(),
            inp.snap.ram_free_gb(),
            inp.snap.cpu_util * 100.0,
            self.drives_v1.survival
        );

        tracing::trace!(
            energy = self.body.energy,
            survival = self.drives_v1.survival,
            curiosity = self.drives_v1.curiosity,
            "somatic tick"
        );
    }

    /// Mark user activity (resets social idleness) and fold the observed
    /// round-trip latency into the EMA.
    pub fn note_user_turn(&mut self, now: DateTime<Utc>, latency_ms: Option<f64>) {
        self.last_user_at = now;
        if let Some(ms) = latency_ms {
            self.latency.observe(ms);
        }
    }
}
