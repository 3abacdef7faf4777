//! Slash-command surface of the REPL: `/ns verb [args]`, one command per
//! line, prose out. Unknown commands are ignored — the line falls through
//! to the chat path.

use std::path::Path;

use anyhow::Result;
use tokio::sync::RwLock;

use anima_core::Epigenome;
use anima_limbic::SharedSoma;
use anima_memory::{ProposalKind, ProposalStatus, Store};
use anima_reasoning::apply_train_choice;

pub struct CommandContext<'a> {
    pub store: &'a Store,
    pub epi: &'a RwLock<Epigenome>,
    pub epi_path: &'a Path,
    pub soma: &'a SharedSoma,
}

/// Handle one REPL line if it is a known command. `None` means "not a
/// command, treat as chat".
pub async fn handle_command(line: &str, ctx: &CommandContext<'_>) -> Option<String> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let ns = parts.next()?;
    let args: Vec<&str> = parts.collect();

    let result = match ns {
        "rate" => rate(ctx, &args).await,
        "caught" => caught(ctx).await,
        "schema" => proposals(ctx, ProposalKind::Schema, &args).await,
        "code" => proposals(ctx, ProposalKind::Code, &args).await,
        "thought" => thought(ctx, &args).await,
        "epi" => epigenome(ctx, &args).await,
        "pick" => pick(ctx, &args).await,
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| format!("that did not work: {e}")))
}

async fn rate(ctx: &CommandContext<'_>, args: &[&str]) -> Result<String> {
    let value = match args.first().copied() {
        Some("+1") | Some("1") | Some("up") => 1,
        Some("-1") | Some("down") => -1,
        _ => return Ok("usage: /rate +1|-1".into()),
    };
    ctx.store.add_rating(value, "").await?;
    Ok(if value > 0 {
        "noted, thanks.".into()
    } else {
        "noted. i will try to do better.".into()
    })
}

async fn caught(ctx: &CommandContext<'_>) -> Result<String> {
    ctx.store.add_caught_event("operator flagged a mistake").await?;
    let mut soma = ctx.soma.lock().await;
    soma.drives_v1.caught_ema = (0.88 * soma.drives_v1.caught_ema + 0.12).clamp(0.0, 1.0);
    soma.affects.add("shame", 0.15);
    Ok("ouch. logged it.".into())
}

fn parse_id(args: &[&str], at: usize) -> Result<i64> {
    args.get(at)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| anyhow::anyhow!("expected a numeric id"))
}

async fn proposals(ctx: &CommandContext<'_>, kind: ProposalKind, args: &[&str]) -> Result<String> {
    match args.first().copied() {
        Some("list") | None => {
            let list = ctx.store.list_proposals(kind, 10).await?;
            if list.is_empty() {
                return Ok("nothing pending.".into());
            }
            Ok(list
                .iter()
                .map(|p| format!("#{} [{}] {}", p.id, p.status.as_str(), p.title))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Some("show") => {
            let id = parse_id(args, 1)?;
            match ctx.store.get_proposal(kind, id).await? {
                Some(p) => Ok(format!("#{} [{}] {}\n{}", p.id, p.status.as_str(), p.title, p.payload)),
                None => Ok(format!("no proposal #{id}")),
            }
        }
        Some("apply") => {
            let id = parse_id(args, 1)?;
            ctx.store
                .set_proposal_status(kind, id, ProposalStatus::Applied, "applied by operator")
                .await?;
            Ok(format!("#{id} marked applied."))
        }
        Some("reject") => {
            let id = parse_id(args, 1)?;
            ctx.store
                .set_proposal_status(kind, id, ProposalStatus::Rejected, "rejected by operator")
                .await?;
            Ok(format!("#{id} rejected."))
        }
        Some("draft") if kind == ProposalKind::Code => {
            let title = args[1..].join(" ");
            if title.is_empty() {
                return Ok("usage: /code draft <title>".into());
            }
            let id = ctx.store.add_proposal(kind, &title, "").await?;
            Ok(format!("drafted code proposal #{id}."))
        }
        Some(other) => Ok(format!("unknown verb: {other}")),
    }
}

async fn thought(ctx: &CommandContext<'_>, args: &[&str]) -> Result<String> {
    match args.first().copied() {
        Some("list") | None => proposals(ctx, ProposalKind::Thought, &["list"]).await,
        Some("show") => proposals(ctx, ProposalKind::Thought, args).await,
        Some("materialize") => match args.get(1).copied() {
            Some("all") => {
                let open = ctx.store.list_proposals(ProposalKind::Thought, 50).await?;
                let mut done = 0;
                for p in open.iter().filter(|p| p.status == ProposalStatus::Proposed) {
                    if ctx.store.materialize_thought_proposal(p.id).await?.is_some() {
                        done += 1;
                    }
                }
                Ok(format!("materialized {done} thought(s)."))
            }
            _ => {
                let id = parse_id(args, 1)?;
                match ctx.store.materialize_thought_proposal(id).await? {
                    Some(new_id) => Ok(format!("thought #{id} became draft #{new_id}.")),
                    None => Ok(format!("no thought #{id}")),
                }
            }
        },
        Some(other) => Ok(format!("unknown verb: {other}")),
    }
}

async fn epigenome(ctx: &CommandContext<'_>, args: &[&str]) -> Result<String> {
    match args.first().copied() {
        Some("show") => match args.get(1) {
            Some(id_str) => {
                let id: i64 = id_str.parse()?;
                match ctx.store.get_proposal(ProposalKind::Epigenome, id).await? {
                    Some(p) => Ok(format!("#{} [{}]\n{}", p.id, p.status.as_str(), p.payload)),
                    None => Ok(format!("no epigenome proposal #{id}")),
                }
            }
            None => {
                let epi = ctx.epi.read().await;
                Ok(format!(
                    "epigenome v{} with {} modules",
                    epi.version,
                    epi.modules.len()
                ))
            }
        },
        Some("list") | None => proposals(ctx, ProposalKind::Epigenome, &["list"]).await,
        Some("apply") => {
            let id = parse_id(args, 1)?;
            let Some(p) = ctx.store.get_proposal(ProposalKind::Epigenome, id).await? else {
                return Ok(format!("no epigenome proposal #{id}"));
            };
            let patched = {
                let epi = ctx.epi.read().await;
                epi.apply_merge_patch(p.payload.as_bytes())?
            };
            patched.save(ctx.epi_path)?;
            *ctx.epi.write().await = patched;
            ctx.store
                .set_proposal_status(ProposalKind::Epigenome, id, ProposalStatus::Applied, "")
                .await?;
            Ok(format!("epigenome patch #{id} applied and persisted."))
        }
        Some("reject") => {
            let id = parse_id(args, 1)?;
            ctx.store
                .set_proposal_status(ProposalKind::Epigenome, id, ProposalStatus::Rejected, "")
                .await?;
            Ok(format!("#{id} rejected."))
        }
        Some(other) => Ok(format!("unknown verb: {other}")),
    }
}

async fn pick(ctx: &CommandContext<'_>, args: &[&str]) -> Result<String> {
    let id = parse_id(args, 0)?;
    let choice = match args.get(1).copied() {
        Some("a") => Some('a'),
        Some("b") => Some('b'),
        Some("none") => None,
        _ => return Ok("usage: /pick <trialId> a|b|none".into()),
    };
    let Some(trial) = ctx.store.get_ab_trial(id).await? else {
        return Ok(format!("no trial #{id}"));
    };
    if trial.resolved {
        return Ok(format!("trial #{id} is already resolved."));
    }
    apply_train_choice(ctx.store, &trial, choice).await?;
    Ok(match choice {
        Some(c) => format!("trial #{id}: picked {c}."),
        None => format!("trial #{id}: no preference recorded."),
    })
}
