//! anima — a single-process agent daemon: heartbeat-driven homeostasis,
//! an area bus for autonomous impulses, a gated decision path for user
//! turns, and a REPL for the operator.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::RwLock;
use tracing::{info, warn};

use anima_core::{Action, Epigenome, IntentMode, PolicyAction};
use anima_expression::{default_bus, CortexBus, TickContext};
use anima_limbic::{Heartbeat, Sampler, SharedSoma, Soma, SysinfoSampler, TickHandler, TickInputs};
use anima_memory::{auto_tune_memory, semantic_memory_step, tick_evolution_tournament, Store};
use anima_reasoning::{
    context_key, nb_predict_trusted, nb_train, observe_utterance, research_gate, score_utterance,
    ChatBackend, ChatMessage, IntentRouter, OllamaBackend, ResearchContext,
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "anima", about = "autonomous agent daemon")]
struct Args {
    /// Data directory for the database and epigenome.
    #[arg(long, env = "ANIMA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Run without a database (nothing persists).
    #[arg(long)]
    no_db: bool,

    /// Training dry-run: no web, no LLM, no self-change side effects.
    #[arg(long)]
    dry_run: bool,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("anima"))
        .unwrap_or_else(|| PathBuf::from("./anima-data"))
}

/// Remove bare URLs from an utterance unless the user brought one in or
/// asked for a link.
fn strip_urls(reply: &str, user_text: &str) -> String {
    let user_wants_links = ["http://", "https://", "www.", "link", "url"]
        .iter()
        .any(|m| user_text.to_lowercase().contains(m));
    if user_wants_links {
        return reply.to_string();
    }
    reply
        .split_whitespace()
        .filter(|w| {
            let lw = w.to_lowercase();
            !lw.contains("http://") && !lw.contains("https://") && !lw.starts_with("www.")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

struct OrganismTick {
    soma: SharedSoma,
    epi: Arc<RwLock<Epigenome>>,
    store: Store,
    sampler: Arc<dyn Sampler>,
    bus: Arc<CortexBus>,
    data_dir: PathBuf,
    last_evolution_check: AtomicI64,
}

#[async_trait::async_trait]
impl TickHandler for OrganismTick {
    async fn tick(&self, dt: Duration) {
        let snap = self.sampler.sample(&self.data_dir);
        let now = Utc::now();

        // Knowledge inputs are read before taking the state lock.
        let topic = { self.soma.lock().await.workspace.active_topic.clone() };
        let concept_conf = self.store.concept_confidence(&topic).await.unwrap_or(0.0);
        let stance_conf = self.store.stance_confidence(&topic).await.unwrap_or(0.0);
        let ratings = self.store.recent_ratings(50).await.unwrap_or_default();

        let inputs = TickInputs {
            snap,
            concept_conf,
            stance_conf,
            recent_ratings: ratings,
        };

        // Lock order everywhere: epigenome before soma.
        let ctx = {
            let mut epi = self.epi.write().await;
            let mut soma = self.soma.lock().await;
            soma.tick(&epi, &inputs, dt, now);

            let mut ws = soma.workspace.clone();
            let aff = soma.affects.clone();
            if auto_tune_memory(&mut epi, &mut ws, &aff) {
                soma.workspace.last_autotune_at = ws.last_autotune_at;
            }

            TickContext {
                ws: soma.workspace.clone(),
                affects: soma.affects.clone(),
                drives: soma.drives,
                drives_v1: soma.drives_v1.clone(),
                epi: Arc::new(epi.clone()),
                store: self.store.clone(),
                now,
                delta: dt,
            }
        };

        let actions = self.bus.tick(&ctx).await;
        for action in &actions {
            let _ = self
                .store
                .kv_incr(&format!("metric:action:{}", action.kind()), 1)
                .await;
            match action {
                Action::Speak { topic, .. } => {
                    println!("(anima feels like talking about {topic})");
                }
                Action::SocialPing { .. } => {
                    println!("(anima) hey — still around?");
                }
                Action::RequestHelp { message, .. } => {
                    println!("(anima) {message}");
                }
                Action::Daydream { .. } => {
                    let _ = self
                        .store
                        .log_event("mind", &ctx.ws.active_topic, "daydream", None, 0.3)
                        .await;
                }
            }
        }

        // The tournament gates itself by kv timestamp; only poll it once a
        // minute to spare the store.
        let now_s = now.timestamp();
        if now_s - self.last_evolution_check.load(Ordering::Relaxed) >= 60 {
            self.last_evolution_check.store(now_s, Ordering::Relaxed);
            let epi = self.epi.read().await.clone();
            if let Err(e) = tick_evolution_tournament(&self.store, &epi, now).await {
                warn!("evolution check failed: {e}");
            }
        }
    }
}

struct Organism {
    soma: SharedSoma,
    epi: Arc<RwLock<Epigenome>>,
    epi_path: PathBuf,
    store: Store,
    backend: Option<Arc<dyn ChatBackend>>,
}

impl Organism {
    async fn handle_user_turn(&self, text: &str) -> Result<String> {
        let started = Instant::now();
        self.store.add_message("user", "cli", text).await?;
        self.store.kv_incr("metric:turns", 1).await?;
        observe_utterance(&self.store, text).await?;

        let epi = self.epi.read().await.clone();

        let score = score_utterance(&self.store, &epi, text).await?;
        if score.low_info {
            let mut soma = self.soma.lock().await;
            soma.note_user_turn(Utc::now(), None);
            return Ok("mhm.".into());
        }

        // Rule-bound semantic memory goes first; a handled turn skips the
        // whole decision stack.
        let outcome = semantic_memory_step(&self.store, &epi, text).await?;
        if outcome.handled && !outcome.reply.is_empty() {
            self.finish_turn(text, &outcome.reply, started).await?;
            return Ok(outcome.reply);
        }

        // Intent: rules first, the online classifier may override once it
        // is confident.
        let router = IntentRouter::from_epigenome(&epi);
        let rule_intent = router.classify(text);
        nb_train(&self.store, text, rule_intent.as_str()).await?;
        let intent = match nb_predict_trusted(&self.store, &epi, text).await? {
            Some(p) => IntentMode::parse(&p.class).unwrap_or(rule_intent),
            None => rule_intent,
        };

        // Snapshot the scalar groups for the gates.
        let (topic, research_ctx, survival, craving) = {
            let mut soma = self.soma.lock().await;
            soma.workspace.note_user_text(text);
            let topic = soma.workspace.update_active_topic(text);
            (
                topic,
                ResearchContext {
                    text: text.to_string(),
                    intent,
                    web_allowed: soma.workspace.web_allowed,
                    survival_mode: soma.workspace.survival_mode,
                    training_dry_run: soma.workspace.training_dry_run,
                    concept_conf: 0.0, // filled below, off-lock
                    curiosity: soma.drives_v1.curiosity,
                    research_bias: 0.0,
                    shame: soma.affects.get("shame"),
                    fear: soma.affects.get("fear"),
                    pain: soma.affects.get("pain"),
                },
                soma.drives_v1.survival,
                soma.workspace.social_craving,
            )
        };

        let mut research_ctx = research_ctx;
        research_ctx.concept_conf = self.store.concept_confidence(&topic).await?;
        research_ctx.research_bias = self
            .store
            .preference_get("research_bias")
            .await?
            .clamp(0.0, 1.0);

        let gate = research_gate(&epi, &research_ctx, self.backend.as_deref()).await;

        let ctx_key = context_key(intent, survival, craving, Some(research_ctx.concept_conf));
        let choice = anima_reasoning::choose(&self.store, &ctx_key).await?;
        let action = if gate.do_research && choice.action == PolicyAction::DirectAnswer {
            PolicyAction::ResearchThenAnswer
        } else {
            choice.action
        };
        self.store
            .kv_incr(&format!("metric:action:{action}"), 1)
            .await?;

        {
            let mut soma = self.soma.lock().await;
            soma.workspace.plan_from_action(&topic, action);
            soma.workspace.last_policy_ctx = ctx_key.clone();
            soma.workspace.last_policy_action = action.as_str().into();
            soma.workspace.last_policy_style = choice.style.into();
            soma.workspace.last_sense_need_web = gate.do_research;
            soma.workspace.last_sense_score = gate.score;
            soma.workspace.last_sense_query = gate.query.clone();
            soma.workspace.last_sense_reason = gate.reason.clone();
        }

        let reply = self
            .compose_reply(&epi, text, &topic, action, choice.style, &gate.reason)
            .await;
        let reply = strip_urls(&reply, text);
        self.finish_turn(text, &reply, started).await?;
        Ok(reply)
    }

    async fn compose_reply(
        &self,
        epi: &Epigenome,
        text: &str,
        topic: &str,
        action: PolicyAction,
        style: &str,
        sense_reason: &str,
    ) -> String {
        if let Some(backend) = &self.backend {
            let model = epi.model_for("chat", "llama3.1:8b");
            let details = self
                .store
                .recall_details(topic, epi.memory_params().detail_top_k)
                .await
                .unwrap_or_default();
            let memory_block = details
                .iter()
                .map(|d| format!("- {}: {}", d.key, d.value))
                .collect::<Vec<_>>()
                .join("\n");
            let messages = [
                ChatMessage::system(format!(
                    "You are anima, a careful personal agent. Reply in a {style} tone. \
                     Strategy: {action}. Relevant memory:\n{memory_block}"
                )),
                ChatMessage::user(text.to_string()),
            ];
            match backend.chat(&model, &messages).await {
                Ok(reply) => return reply,
                Err(e) => warn!("chat backend failed, answering from memory: {e}"),
            }
        }
        // Degraded mode: answer from cached knowledge, surface why.
        match action {
            PolicyAction::AskClarify => "can you narrow that down a little?".to_string(),
            PolicyAction::SocialPing => "just wanted to check in.".to_string(),
            _ => format!(
                "i can't reach a language model right now ({sense_reason}); from memory, \
                 what i have on '{topic}' is limited."
            ),
        }
    }

    async fn finish_turn(&self, user_text: &str, reply: &str, started: Instant) -> Result<()> {
        let msg_id = self.store.add_message("assistant", "cli", reply).await?;
        let epi = self.epi.read().await.clone();
        let topic = {
            let mut soma = self.soma.lock().await;
            soma.note_user_turn(Utc::now(), Some(started.elapsed().as_millis() as f64));
            soma.body.debit(epi.say_energy_cost());
            soma.workspace.active_topic.clone()
        };
        self.store
            .log_event("cli", &topic, user_text, Some(msg_id), 0.5)
            .await?;

        // Episodic consolidation runs off the request path.
        if let Some(req) = self.store.needs_consolidation(&epi, &topic).await? {
            let store = self.store.clone();
            let backend = self.backend.clone();
            let model = epi.model_for("consolidate", "llama3.1:8b");
            tokio::spawn(async move {
                let summary = match &backend {
                    Some(b) => {
                        let messages = [
                            ChatMessage::system(
                                "Summarize this conversation slice in two sentences.",
                            ),
                            ChatMessage::user(req.text_block.clone()),
                        ];
                        b.chat(&model, &messages)
                            .await
                            .unwrap_or_else(|_| req.text_block.chars().take(200).collect())
                    }
                    None => req.text_block.chars().take(200).collect(),
                };
                if let Err(e) = store
                    .save_episode(&req.topic, req.start_event_id, req.end_event_id, &summary, 0.6)
                    .await
                {
                    warn!("episode save failed: {e}");
                }
            });
        }
        Ok(())
    }

    async fn status(&self) -> String {
        let soma = self.soma.lock().await;
        format!(
            "energy {:.1} | survival {:.2} | curiosity {:.2} | craving {:.2} | pain {:.2} | {} | last action: {}",
            soma.body.energy,
            soma.drives_v1.survival,
            soma.drives_v1.curiosity,
            soma.workspace.social_craving,
            soma.affects.get("pain"),
            if soma.workspace.survival_mode {
                "SURVIVAL"
            } else {
                "nominal"
            },
            if soma.workspace.last_policy_action.is_empty() {
                "-"
            } else {
                soma.workspace.last_policy_action.as_str()
            },
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("create data dir {}", data_dir.display()))?;

    let epi_path = data_dir.join("epigenome.json");
    let epi = Epigenome::load_or_init(&epi_path).map_err(|e| anyhow::anyhow!("{e}"))?;

    let store = if args.no_db {
        Store::null()
    } else {
        Store::open(data_dir.join("anima.db")).await?
    };

    let soma = Soma::shared(&epi);
    if args.dry_run {
        soma.lock().await.workspace.training_dry_run = true;
    }

    // Probe the LLM collaborator once; availability lands in the workspace.
    let backend: Option<Arc<dyn ChatBackend>> = if args.dry_run {
        None
    } else {
        let candidate = OllamaBackend::new(epi.ollama_base_url());
        match candidate.list_models().await {
            Ok(models) => {
                info!("ollama reachable with {} models", models.len());
                Some(Arc::new(candidate))
            }
            Err(e) => {
                warn!("ollama unreachable, running from memory only: {e}");
                None
            }
        }
    };
    {
        let mut s = soma.lock().await;
        s.workspace.llm_available = backend.is_some();
        s.workspace.ollama_missing = backend.is_none();
    }

    let epi = Arc::new(RwLock::new(epi));
    let bus = Arc::new(default_bus(&*epi.read().await));
    let interval = epi.read().await.heartbeat_interval();

    let handler = Arc::new(OrganismTick {
        soma: Arc::clone(&soma),
        epi: Arc::clone(&epi),
        store: store.clone(),
        sampler: Arc::new(SysinfoSampler::new()),
        bus,
        data_dir: data_dir.clone(),
        last_evolution_check: AtomicI64::new(0),
    });
    let heartbeat = Heartbeat::spawn(interval, handler);
    info!("heartbeat running every {:?}", interval);

    let organism = Organism {
        soma: Arc::clone(&soma),
        epi: Arc::clone(&epi),
        epi_path: epi_path.clone(),
        store: store.clone(),
        backend,
    };

    let mut rl = rustyline::DefaultEditor::new()?;
    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);
                match line.as_str() {
                    "quit" | "exit" => break,
                    "status" => println!("{}", organism.status().await),
                    _ => {
                        let cmd_ctx = commands::CommandContext {
                            store: &store,
                            epi: epi.as_ref(),
                            epi_path: &epi_path,
                            soma: &soma,
                        };
                        if let Some(reply) = commands::handle_command(&line, &cmd_ctx).await {
                            println!("{reply}");
                        } else {
                            match organism.handle_user_turn(&line).await {
                                Ok(reply) => println!("anima> {reply}"),
                                Err(e) => warn!("turn failed: {e}"),
                            }
                        }
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted)
            | Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                warn!("readline error: {e}");
                break;
            }
        }
    }

    info!("shutting down");
    heartbeat.stop().await;
    store.close().await;
    Ok(())
}
