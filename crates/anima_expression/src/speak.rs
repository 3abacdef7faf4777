//! Speak area: share something about the current topic when the urge to
//! share beats the inhibition-raised threshold.

use async_trait::async_trait;

use anima_core::Action;

use crate::bus::{Area, TickContext};

pub struct SpeakArea;

#[async_trait]
impl Area for SpeakArea {
    fn name(&self) -> &'static str {
        "speak"
    }

    async fn tick(&self, ctx: &TickContext) -> anyhow::Result<Vec<Action>> {
        if !ctx.ws.autonomy_allowed {
            return Ok(Vec::new());
        }
        let topic = if !ctx.ws.active_topic.is_empty() {
            ctx.ws.active_topic.clone()
        } else if !ctx.ws.last_topic.is_empty() {
            ctx.ws.last_topic.clone()
        } else {
            return Ok(Vec::new());
        };

        let inhibition = 0.8 * ctx.affects.get("shame")
            + 0.4 * ctx.affects.get("pain")
            + 0.3 * ctx.affects.get("unwell");
        let threshold = 0.75 + 0.20 * inhibition;
        if (ctx.drives.urge_to_share) < threshold {
            return Ok(Vec::new());
        }

        Ok(vec![Action::Speak {
            reason: "urge_to_share".into(),
            topic,
            priority: ctx.drives.urge_to_share as f32,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::test_context;
    use anima_core::Epigenome;

    #[tokio::test]
    async fn test_fires_with_topic_and_urge() {
        let mut ctx = test_context(Epigenome::default());
        ctx.ws.active_topic = "fermentation".into();
        ctx.drives.urge_to_share = 0.9;
        let actions = SpeakArea.tick(&ctx).await.unwrap();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::Speak { topic, .. } => assert_eq!(topic, "fermentation"),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_topic_no_speak() {
        let mut ctx = test_context(Epigenome::default());
        ctx.drives.urge_to_share = 0.99;
        assert!(SpeakArea.tick(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inhibition_raises_threshold() {
        let mut ctx = test_context(Epigenome::default());
        ctx.ws.active_topic = "anything".into();
        ctx.drives.urge_to_share = 0.80;
        // Without inhibition 0.80 clears the 0.75 base threshold.
        assert_eq!(SpeakArea.tick(&ctx).await.unwrap().len(), 1);
        // Shame 0.5 → threshold 0.75 + 0.20·0.40 = 0.83.
        ctx.affects.set("shame", 0.5);
        assert!(SpeakArea.tick(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_last_topic() {
        let mut ctx = test_context(Epigenome::default());
        ctx.ws.last_topic = "older thing".into();
        ctx.drives.urge_to_share = 0.9;
        let actions = SpeakArea.tick(&ctx).await.unwrap();
        match &actions[0] {
            Action::Speak { topic, .. } => assert_eq!(topic, "older thing"),
            other => panic!("unexpected action {other:?}"),
        }
    }
}
