//! Cross-module integration tests over an in-memory database.

use chrono::Utc;

use anima_core::{BodyState, Epigenome, Risk, SelfChange, Workspace};

use crate::evolution::tick_evolution_tournament;
use crate::governor::commit_self_change;
use crate::proposals::{ProposalKind, ProposalStatus};
use crate::store::Store;

#[tokio::test]
async fn test_tournament_winner_applies_as_patch() {
    let store = Store::open_in_memory().await.unwrap();
    let epi = Epigenome::default();

    tick_evolution_tournament(&store, &epi, Utc::now())
        .await
        .unwrap()
        .expect("first run is due");

    let proposal = store
        .list_proposals(ProposalKind::Epigenome, 1)
        .await
        .unwrap()
        .pop()
        .unwrap();

    // The operator applies the patch: the document stays valid, keeps all
    // required modules, and the touched knobs stay in bounds.
    let patched = epi.apply_merge_patch(proposal.payload.as_bytes()).unwrap();
    assert!(patched.modules.contains_key("autonomy"));
    let knob = patched.min_talk_drive();
    assert!((0.0..=1.0).contains(&knob));

    store
        .set_proposal_status(ProposalKind::Epigenome, proposal.id, ProposalStatus::Applied, "")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_recall_scores_monotone_non_increasing() {
    let store = Store::open_in_memory().await.unwrap();
    for i in 0..8 {
        store
            .put_memory_item("cli", "t", &format!("k{i}"), "v", 0.1 + 0.1 * i as f64, 14.0)
            .await
            .unwrap();
    }
    let details = store.recall_details("t", 5).await.unwrap();
    assert_eq!(details.len(), 5);
    for w in details.windows(2) {
        assert!(w[0].score >= w[1].score);
    }
}

#[tokio::test]
async fn test_audit_trail_survives_restart_shape() {
    // The audit table is append-only: two attempts leave exactly two rows
    // in insertion order, regardless of outcome.
    let store = Store::open_in_memory().await.unwrap();
    let epi = Epigenome::default();
    let mut body = BodyState::full(epi.energy_max());
    let ws = Workspace::new();

    let blocked = SelfChange {
        kind: "code".into(),
        target: "bus".into(),
        delta_json: "{}".into(),
        axiom_goal: 4,
        risk: Risk::Unknown,
        note: String::new(),
    };
    let allowed = SelfChange {
        kind: "concept".into(),
        target: "rust".into(),
        delta_json: r#"{"confidence":0.8}"#.into(),
        axiom_goal: 1,
        risk: Risk::Low,
        note: String::new(),
    };
    commit_self_change(&store, &epi, &mut body, &ws, &blocked)
        .await
        .unwrap();
    commit_self_change(&store, &epi, &mut body, &ws, &allowed)
        .await
        .unwrap();

    let rows = store.last_self_changes(10).await.unwrap();
    assert_eq!(rows.len(), 2);
    // Newest first: the allowed concept change.
    assert_eq!(rows[0].0, "concept");
    assert!(rows[0].2);
    assert_eq!(rows[1].0, "code");
    assert!(!rows[1].2);
}

#[tokio::test]
async fn test_null_store_whole_surface_degrades() {
    let store = Store::null();
    let epi = Epigenome::default();

    // A representative walk over the public surface: every call succeeds,
    // every read misses.
    assert!(store.get_fact("a", "b").await.unwrap().is_none());
    assert_eq!(store.log_event("cli", "t", "x", None, 0.5).await.unwrap(), 0);
    assert!(store.needs_consolidation(&epi, "t").await.unwrap().is_none());
    assert!(store.recall_details("t", 3).await.unwrap().is_empty());
    assert!(store
        .list_proposals(ProposalKind::Thought, 5)
        .await
        .unwrap()
        .is_empty());
    assert!(store.open_expand_candidates(5).await.unwrap().is_empty());
    assert_eq!(store.kv_get("anything").await.unwrap(), None);

    let mut body = BodyState::full(epi.energy_max());
    let ws = Workspace::new();
    let out = commit_self_change(
        &store,
        &epi,
        &mut body,
        &ws,
        &SelfChange {
            kind: "concept".into(),
            target: "x".into(),
            delta_json: "{}".into(),
            axiom_goal: 1,
            risk: Risk::Low,
            note: String::new(),
        },
    )
    .await
    .unwrap();
    // The gate still runs and the energy economy still applies.
    assert!(out.decision.allowed);
    assert!(body.energy < epi.energy_max());
}

#[tokio::test]
async fn test_metric_counters_by_convention() {
    let store = Store::open_in_memory().await.unwrap();
    store.kv_incr("metric:turns", 1).await.unwrap();
    store.kv_incr("metric:turns", 1).await.unwrap();
    store
        .kv_incr("metric:action:direct_answer", 1)
        .await
        .unwrap();
    assert_eq!(store.kv_get_f64("metric:turns").await.unwrap(), Some(2.0));
    assert_eq!(
        store
            .kv_get_f64("metric:action:direct_answer")
            .await
            .unwrap(),
        Some(1.0)
    );
}
