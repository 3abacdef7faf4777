//! The epigenome: a versioned configuration tree parametrizing every other
//! component.
//!
//! Module params are untyped JSON; call sites never see raw values. Typed
//! accessors clamp to documented bounds on read, so a hand-edited or
//! evolution-mutated document can never push a scalar out of range.
//! Mutation happens only through JSON merge-patch (objects merge
//! recursively, arrays replace, null deletes).

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::affect::AffectDef;
use crate::error::CoreError;

fn default_true() -> bool {
    true
}

/// One configurable module: a type tag, an enable switch and untyped params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Module {
    fn new(kind: &str, params: Value) -> Self {
        let params = match params {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        Self {
            kind: kind.to_string(),
            enabled: true,
            params,
        }
    }
}

/// The whole document. Lives as one JSON file, reloaded on startup and
/// re-persisted after evolution or an explicit patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epigenome {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub modules: BTreeMap<String, Module>,
    #[serde(default)]
    pub affect_defs: BTreeMap<String, AffectDef>,
}

impl Default for Epigenome {
    fn default() -> Self {
        let mut epi = Self {
            version: 1,
            modules: BTreeMap::new(),
            affect_defs: BTreeMap::new(),
        };
        epi.ensure_defaults();
        epi
    }
}

// ============================================================================
// RFC 7386 merge patch
// ============================================================================

/// Apply a JSON merge patch in place: objects merge recursively, arrays
/// replace, null deletes the key.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(patch_obj) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            let obj = target.as_object_mut().expect("just coerced to object");
            for (k, v) in patch_obj {
                if v.is_null() {
                    obj.remove(k);
                } else {
                    merge_patch(obj.entry(k.clone()).or_insert(Value::Null), v);
                }
            }
        }
        _ => *target = patch.clone(),
    }
}

// ============================================================================
// Load / save / patch
// ============================================================================

impl Epigenome {
    /// Load the document from `path`. A missing file is not an error: the
    /// defaults are initialized and persisted. Malformed JSON is a Config
    /// error — the process must not run on a half-parsed genome.
    pub fn load_or_init<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if !path.exists() {
            let epi = Epigenome::default();
            epi.save(path)?;
            tracing::info!("epigenome initialized at {}", path.display());
            return Ok(epi);
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("read {}: {e}", path.display())))?;
        let mut epi: Epigenome = serde_json::from_str(&content)
            .map_err(|e| CoreError::Config(format!("parse {}: {e}", path.display())))?;
        epi.ensure_defaults();
        Ok(epi)
    }

    /// Persist atomically: write a temp file next to the target, then rename.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CoreError> {
        let path = path.as_ref();
        let body = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("serialize epigenome: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body)
            .map_err(|e| CoreError::Config(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| CoreError::Config(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }

    /// Apply a merge patch and return the patched genome. The receiver is
    /// untouched; callers swap the result in after the self-change gate has
    /// allowed the mutation.
    pub fn apply_merge_patch(&self, patch_bytes: &[u8]) -> Result<Epigenome, CoreError> {
        let patch: Value = serde_json::from_slice(patch_bytes)
            .map_err(|e| CoreError::Invalid(format!("merge patch is not JSON: {e}")))?;
        let mut doc = serde_json::to_value(self)
            .map_err(|e| CoreError::Invalid(format!("serialize epigenome: {e}")))?;
        merge_patch(&mut doc, &patch);
        let mut patched: Epigenome = serde_json::from_value(doc)
            .map_err(|e| CoreError::Invalid(format!("patched epigenome is malformed: {e}")))?;
        patched.version = self.version + 1;
        patched.ensure_defaults();
        Ok(patched)
    }

    /// Add every missing module with its documented defaults, and every
    /// missing affect definition. Idempotent: running it on a complete
    /// document changes nothing.
    pub fn ensure_defaults(&mut self) {
        for (name, module) in default_modules() {
            self.modules.entry(name.to_string()).or_insert(module);
        }
        for (name, def) in default_affect_defs() {
            self.affect_defs.entry(name.to_string()).or_insert(def);
        }
        if self.version == 0 {
            self.version = 1;
        }
    }
}

// ============================================================================
// Raw param readers (always clamped)
// ============================================================================

impl Epigenome {
    fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn module_enabled(&self, name: &str) -> bool {
        self.module(name).map(|m| m.enabled).unwrap_or(false)
    }

    /// Numeric param with clamping. Missing module/key yields the default
    /// (NotConfigured is not an error).
    pub fn num(&self, module: &str, key: &str, default: f64, lo: f64, hi: f64) -> f64 {
        let v = self
            .module(module)
            .and_then(|m| m.params.get(key))
            .and_then(Value::as_f64)
            .unwrap_or(default);
        if v.is_finite() {
            v.clamp(lo, hi)
        } else {
            default
        }
    }

    pub fn int(&self, module: &str, key: &str, default: i64, lo: i64, hi: i64) -> i64 {
        let v = self
            .module(module)
            .and_then(|m| m.params.get(key))
            .and_then(Value::as_i64)
            .unwrap_or(default);
        v.clamp(lo, hi)
    }

    pub fn flag(&self, module: &str, key: &str, default: bool) -> bool {
        self.module(module)
            .and_then(|m| m.params.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    pub fn text(&self, module: &str, key: &str, default: &str) -> String {
        self.module(module)
            .and_then(|m| m.params.get(key))
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    pub fn array(&self, module: &str, key: &str) -> Vec<Value> {
        self.module(module)
            .and_then(|m| m.params.get(key))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    /// Write one param. Creates the module if it is missing. Used by
    /// auto-tuning; autonomous bulk mutation goes through merge patches and
    /// the self-change gate instead.
    pub fn set_param(&mut self, module: &str, key: &str, value: Value) {
        let m = self
            .modules
            .entry(module.to_string())
            .or_insert_with(|| Module::new(module, json!({})));
        m.params.insert(key.to_string(), value);
    }
}

// ============================================================================
// Typed accessors
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct MemoryParams {
    pub context_turns: i64,
    pub consolidate_every_events: i64,
    pub detail_half_life_days: f64,
    pub detail_top_k: i64,
    pub pain_ms: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct DrivesParams {
    pub disk_target_gb: f64,
    pub ram_target_gb: f64,
    pub latency_target_ms: f64,
    // energy blend weights
    pub w_disk: f64,
    pub w_ram: f64,
    pub w_cpu: f64,
    pub w_lat: f64,
    pub w_err: f64,
    // survival pressure exponents and weights
    pub k_disk: f64,
    pub k_ram: f64,
    pub k_cpu: f64,
    pub s_disk: f64,
    pub s_ram: f64,
    pub s_cpu: f64,
    pub s_lat: f64,
    pub tau_social_seconds: f64,
    pub ema_user: f64,
    pub help_min_interval_seconds: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoutParams {
    pub min_curiosity: f64,
    pub max_per_hour: i64,
    pub min_interval_seconds: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct DaydreamParams {
    pub enabled: bool,
    pub min_curiosity: f64,
    pub min_energy: f64,
    pub interval_seconds: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct IntentNbParams {
    pub alpha: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct InfoGateParams {
    pub min_info: f64,
    pub stopword_ratio: f64,
    pub warmup_min_docs: i64,
    pub stopword_min_df: i64,
    pub idf_threshold: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct EvolutionParams {
    pub interval_hours: f64,
    pub window_hours: f64,
    pub fork_count: i64,
    pub drift: f64,
    pub w_reward: f64,
    pub w_evidence: f64,
    pub w_cost: f64,
    pub w_spam: f64,
    pub w_coherence: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct AxiomLearningParams {
    pub interval_seconds: i64,
    pub web_interval_seconds: i64,
    pub max_items_per_run: i64,
    pub min_confidence: f64,
}

/// One intent router rule as shipped in the epigenome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRule {
    pub name: String,
    pub intent: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub regex: Vec<String>,
}

/// One semantic-memory rule (read or write) as shipped in the epigenome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticRuleCfg {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub predicate: String,
    /// Write rules: object template with `$1..$9` capture substitution.
    #[serde(default)]
    pub object: String,
    #[serde(default = "SemanticRuleCfg::default_confidence")]
    pub confidence: f64,
    #[serde(default = "SemanticRuleCfg::default_salience")]
    pub salience: f64,
    #[serde(default = "SemanticRuleCfg::default_half_life")]
    pub half_life_days: f64,
    #[serde(default)]
    pub source: String,
    /// Read rules: reply template with `{{object}}` substitution.
    #[serde(default)]
    pub answer_found: String,
    #[serde(default)]
    pub answer_missing: String,
    /// Write rules: acknowledgement reply.
    #[serde(default)]
    pub reply: String,
}

impl SemanticRuleCfg {
    fn default_confidence() -> f64 {
        0.9
    }
    fn default_salience() -> f64 {
        0.7
    }
    fn default_half_life() -> f64 {
        365.0
    }
}

#[derive(Debug, Clone)]
pub struct SemanticMemoryParams {
    pub max_reads: i64,
    pub max_writes: i64,
    pub read_rules: Vec<SemanticRuleCfg>,
    pub write_rules: Vec<SemanticRuleCfg>,
}

impl Epigenome {
    pub fn heartbeat_interval(&self) -> Duration {
        let ms = self.int("heartbeat", "interval_ms", 500, 50, 60_000);
        Duration::from_millis(ms as u64)
    }

    pub fn energy_max(&self) -> f64 {
        self.num("energy", "max", 100.0, 1.0, 100_000.0)
    }

    pub fn energy_regen_per_sec(&self) -> f64 {
        self.num("energy", "regen_per_sec", 0.02, 0.0, 10.0)
    }

    pub fn say_energy_cost(&self) -> f64 {
        self.num("say_energy_cost", "cost", 0.5, 0.0, 100.0)
    }

    pub fn memory_params(&self) -> MemoryParams {
        MemoryParams {
            context_turns: self.int("memory", "context_turns", 12, 1, 200),
            consolidate_every_events: self.int("memory", "consolidate_every_events", 16, 2, 1000),
            detail_half_life_days: self.num("memory", "detail_half_life_days", 14.0, 1.0, 3650.0),
            detail_top_k: self.int("memory", "detail_top_k", 5, 1, 50),
            pain_ms: self.num("memory", "pain_ms", 2500.0, 100.0, 600_000.0),
        }
    }

    pub fn drives_v1(&self) -> DrivesParams {
        let m = "drives_v1";
        DrivesParams {
            disk_target_gb: self.num(m, "disk_target_gb", 20.0, 0.1, 100_000.0),
            ram_target_gb: self.num(m, "ram_target_gb", 2.0, 0.05, 10_000.0),
            latency_target_ms: self.num(m, "latency_target_ms", 1800.0, 10.0, 600_000.0),
            w_disk: self.num(m, "w_disk", 0.25, 0.0, 1.0),
            w_ram: self.num(m, "w_ram", 0.25, 0.0, 1.0),
            w_cpu: self.num(m, "w_cpu", 0.20, 0.0, 1.0),
            w_lat: self.num(m, "w_lat", 0.20, 0.0, 1.0),
            w_err: self.num(m, "w_err", 0.10, 0.0, 1.0),
            k_disk: self.num(m, "k_disk", 3.0, 0.0, 20.0),
            k_ram: self.num(m, "k_ram", 3.0, 0.0, 20.0),
            k_cpu: self.num(m, "k_cpu", 2.0, 0.0, 20.0),
            s_disk: self.num(m, "s_disk", 0.3, 0.0, 1.0),
            s_ram: self.num(m, "s_ram", 0.3, 0.0, 1.0),
            s_cpu: self.num(m, "s_cpu", 0.2, 0.0, 1.0),
            s_lat: self.num(m, "s_lat", 0.2, 0.0, 1.0),
            tau_social_seconds: self.num(m, "tau_social_seconds", 5400.0, 60.0, 604_800.0),
            ema_user: self.num(m, "ema_user", 0.12, 0.001, 1.0),
            help_min_interval_seconds: self.int(m, "help_min_interval_seconds", 1800, 30, 604_800),
        }
    }

    pub fn scout_params(&self) -> ScoutParams {
        ScoutParams {
            min_curiosity: self.num("scout", "min_curiosity", 0.55, 0.0, 1.0),
            max_per_hour: self.int("scout", "max_per_hour", 6, 0, 1000),
            min_interval_seconds: self.int("scout", "min_interval_seconds", 900, 10, 604_800),
        }
    }

    pub fn daydream_params(&self) -> DaydreamParams {
        DaydreamParams {
            enabled: self.module_enabled("daydream") && self.flag("daydream", "enabled", true),
            min_curiosity: self.num("daydream", "min_curiosity", 0.6, 0.0, 1.0),
            min_energy: self.num("daydream", "min_energy", 0.35, 0.0, 1.0),
            interval_seconds: self.int("daydream", "interval_seconds", 600, 10, 604_800),
        }
    }

    pub fn intent_nb_params(&self) -> IntentNbParams {
        IntentNbParams {
            alpha: self.num("intent_nb", "alpha", 1.0, 0.001, 100.0),
            threshold: self.num("intent_nb", "threshold", 0.72, 0.0, 1.0),
        }
    }

    pub fn info_gate_params(&self) -> InfoGateParams {
        InfoGateParams {
            min_info: self.num("info_gate", "min_info", 0.33, 0.0, 1.0),
            stopword_ratio: self.num("info_gate", "stopword_ratio", 0.35, 0.01, 1.0),
            warmup_min_docs: self.int("info_gate", "warmup_min_docs", 50, 0, 1_000_000),
            stopword_min_df: self.int("info_gate", "stopword_min_df", 5, 1, 1_000_000),
            idf_threshold: self.num("info_gate", "idf_threshold", 2.2, 0.0, 20.0),
        }
    }

    pub fn evolution_params(&self) -> EvolutionParams {
        let m = "evolution_tournament";
        EvolutionParams {
            interval_hours: self.num(m, "interval_hours", 24.0, 0.1, 8760.0),
            window_hours: self.num(m, "window_hours", 72.0, 1.0, 8760.0),
            fork_count: self.int(m, "fork_count", 6, 2, 16),
            drift: self.num(m, "drift", 0.15, 0.01, 1.0),
            w_reward: self.num(m, "w_reward", 1.0, 0.0, 10.0),
            w_evidence: self.num(m, "w_evidence", 0.5, 0.0, 10.0),
            w_cost: self.num(m, "w_cost", 0.4, 0.0, 10.0),
            w_spam: self.num(m, "w_spam", 0.6, 0.0, 10.0),
            w_coherence: self.num(m, "w_coherence", 0.3, 0.0, 10.0),
        }
    }

    /// Single owner of the axiom-learning defaults; nothing else reads the
    /// raw module.
    pub fn axiom_learning(&self) -> AxiomLearningParams {
        let m = "axiom_learning";
        AxiomLearningParams {
            interval_seconds: self.int(m, "interval_seconds", 21_600, 60, 2_592_000),
            web_interval_seconds: self.int(m, "web_interval_seconds", 86_400, 60, 2_592_000),
            max_items_per_run: self.int(m, "max_items_per_run", 3, 1, 50),
            min_confidence: self.num(m, "min_confidence", 0.25, 0.0, 1.0),
        }
    }

    /// Model name for a cortical area, falling back when unconfigured.
    pub fn model_for(&self, area: &str, fallback: &str) -> String {
        self.text("models", area, fallback)
    }

    pub fn min_talk_drive(&self) -> f64 {
        self.num("autonomy", "min_talk_drive", 0.7, 0.0, 1.0)
    }

    pub fn friction_threshold(&self) -> f64 {
        self.num("proposal_engine", "friction_threshold", 0.6, 0.0, 1.0)
    }

    pub fn self_change_k(&self) -> f64 {
        self.num("self_change_cost", "multiplier_k", 0.08, 0.0, 10.0)
    }

    /// Per-kind base cost override, if configured.
    pub fn self_change_cost_override(&self, kind: &str) -> Option<f64> {
        self.module("self_change_cost")
            .and_then(|m| m.params.get(kind))
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite() && *v >= 0.0)
    }

    pub fn a1_note_marker(&self) -> String {
        self.text("values", "a1_note_marker", "violates_a1")
    }

    pub fn ollama_base_url(&self) -> String {
        self.text("ollama_manager", "base_url", "http://127.0.0.1:11434")
    }

    pub fn intent_rules(&self) -> Vec<IntentRule> {
        self.array("intent_router", "rules")
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()
    }

    pub fn semantic_memory(&self) -> SemanticMemoryParams {
        let parse = |key: &str| -> Vec<SemanticRuleCfg> {
            self.array("semantic_memory", key)
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect()
        };
        SemanticMemoryParams {
            max_reads: self.int("semantic_memory", "max_reads", 2, 0, 50),
            max_writes: self.int("semantic_memory", "max_writes", 2, 0, 50),
            read_rules: parse("read_rules"),
            write_rules: parse("write_rules"),
        }
    }

    pub fn bus_order(&self) -> Vec<String> {
        self.array("cortex_bus", "order")
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_modules() -> Vec<(&'static str, Module)> {
    vec![
        ("locale", Module::new("locale", json!({ "lang": "en" }))),
        (
            "energy",
            Module::new("energy", json!({ "max": 100.0, "regen_per_sec": 0.02 })),
        ),
        (
            "utterance_filter",
            Module::new("filter", json!({ "strip_urls": true, "min_chars": 2 })),
        ),
        (
            "heartbeat",
            Module::new("heartbeat", json!({ "interval_ms": 500 })),
        ),
        (
            "auto_speak",
            Module::new("auto_speak", json!({ "min_interval_seconds": 120 })),
        ),
        (
            "memory",
            Module::new(
                "memory",
                json!({
                    "context_turns": 12,
                    "consolidate_every_events": 16,
                    "detail_half_life_days": 14.0,
                    "detail_top_k": 5,
                    "pain_ms": 2500.0
                }),
            ),
        ),
        (
            "values",
            Module::new("values", json!({ "a1_note_marker": "violates_a1" })),
        ),
        (
            "stance",
            Module::new("stance", json!({ "half_life_days": 45.0, "min_confidence": 0.2 })),
        ),
        (
            "scout",
            Module::new(
                "scout",
                json!({ "min_curiosity": 0.55, "max_per_hour": 6, "min_interval_seconds": 900 }),
            ),
        ),
        (
            "cortex_bus",
            Module::new(
                "bus",
                json!({ "order": ["daydream", "social_ping", "speak", "help_planner"] }),
            ),
        ),
        (
            "daydream",
            Module::new(
                "daydream",
                json!({
                    "enabled": true,
                    "min_curiosity": 0.6,
                    "min_energy": 0.35,
                    "interval_seconds": 600
                }),
            ),
        ),
        (
            "critic",
            Module::new("critic", json!({ "enabled": true, "min_severity": 0.5 })),
        ),
        (
            "drives_v1",
            Module::new(
                "drives",
                json!({
                    "disk_target_gb": 20.0,
                    "ram_target_gb": 2.0,
                    "latency_target_ms": 1800.0,
                    "w_disk": 0.25, "w_ram": 0.25, "w_cpu": 0.20, "w_lat": 0.20, "w_err": 0.10,
                    "k_disk": 3.0, "k_ram": 3.0, "k_cpu": 2.0,
                    "s_disk": 0.3, "s_ram": 0.3, "s_cpu": 0.2, "s_lat": 0.2,
                    "tau_social_seconds": 5400.0,
                    "ema_user": 0.12,
                    "help_min_interval_seconds": 1800
                }),
            ),
        ),
        (
            "models",
            Module::new(
                "models",
                json!({
                    "chat": "llama3.1:8b",
                    "sense_gate": "llama3.2:3b",
                    "consolidate": "llama3.1:8b",
                    "daydream": "llama3.2:3b"
                }),
            ),
        ),
        (
            "intent_nb",
            Module::new("intent_nb", json!({ "alpha": 1.0, "threshold": 0.72 })),
        ),
        (
            "info_gate",
            Module::new(
                "info_gate",
                json!({
                    "min_info": 0.33,
                    "stopword_ratio": 0.35,
                    "warmup_min_docs": 50,
                    "stopword_min_df": 5,
                    "idf_threshold": 2.2
                }),
            ),
        ),
        (
            "semantic_memory",
            Module::new(
                "semantic_memory",
                json!({ "max_reads": 2, "max_writes": 2, "read_rules": [], "write_rules": [] }),
            ),
        ),
        (
            "ollama_manager",
            Module::new(
                "ollama",
                json!({ "base_url": "http://127.0.0.1:11434", "autostart": false }),
            ),
        ),
        (
            "proposal_drive",
            Module::new("proposals", json!({ "min_interval_seconds": 3600 })),
        ),
        (
            "proposal_engine",
            Module::new("proposals", json!({ "friction_threshold": 0.6, "max_open": 8 })),
        ),
        (
            "cooldown",
            Module::new("cooldown", json!({ "base_seconds": 20 })),
        ),
        (
            "say_energy_cost",
            Module::new("energy", json!({ "cost": 0.5 })),
        ),
        (
            "intent_router",
            Module::new("router", json!({ "rules": default_intent_rules() })),
        ),
        (
            "autonomy",
            Module::new("autonomy", json!({ "min_talk_drive": 0.7 })),
        ),
        (
            "evolution_tournament",
            Module::new(
                "evolution",
                json!({
                    "interval_hours": 24.0,
                    "window_hours": 72.0,
                    "fork_count": 6,
                    "drift": 0.15,
                    "w_reward": 1.0,
                    "w_evidence": 0.5,
                    "w_cost": 0.4,
                    "w_spam": 0.6,
                    "w_coherence": 0.3
                }),
            ),
        ),
        (
            "axiom_learning",
            Module::new(
                "axioms",
                json!({
                    "interval_seconds": 21600,
                    "web_interval_seconds": 86400,
                    "max_items_per_run": 3,
                    "min_confidence": 0.25
                }),
            ),
        ),
        (
            "self_change_cost",
            Module::new("governor", json!({ "multiplier_k": 0.08 })),
        ),
    ]
}

fn default_intent_rules() -> Value {
    json!([
        {
            "name": "meta_self",
            "intent": "meta_self",
            "priority": 100,
            "contains": ["who are you", "about yourself", "your name", "what are you"],
            "regex": []
        },
        {
            "name": "research_cmd",
            "intent": "research_cmd",
            "priority": 90,
            "contains": ["research", "look up", "search the web", "find sources"],
            "regex": ["(?i)^/(research|scout)\\b"]
        },
        {
            "name": "opinion",
            "intent": "opinion",
            "priority": 80,
            "contains": ["your opinion", "what do you think", "your stance", "do you agree"],
            "regex": []
        },
        {
            "name": "external_fact",
            "intent": "external_fact",
            "priority": 70,
            "contains": ["latest", "current", "today", "news", "price of"],
            "regex": ["(?i)\\b(when|who|where|how many)\\b.+\\?"]
        },
        {
            "name": "task_tech",
            "intent": "task_tech",
            "priority": 60,
            "contains": ["code", "compile", "error", "install", "server", "api", "bug", "stack trace"],
            "regex": []
        }
    ])
}

fn default_affect_defs() -> Vec<(&'static str, AffectDef)> {
    vec![
        ("pain", AffectDef::new(0.0, 0.020, 0.050)),
        ("sorrow", AffectDef::new(0.05, 0.012, 0.030)),
        ("unwell", AffectDef::new(0.0, 0.015, 0.060)),
        ("shame", AffectDef::new(0.0, 0.010, 0.010)),
        ("fear", AffectDef::new(0.0, 0.025, 0.030)),
        ("anxiety", AffectDef::new(0.10, 0.015, 0.040)),
        ("satisfaction", AffectDef::new(0.40, 0.010, -0.030)),
    ]
}

// ============================================================================
// Tests
// ============================================================================
