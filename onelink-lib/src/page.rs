use serde::Serialize;
use serde_json::Value;

use crate::block::{BlockId, BlockPayload, ContentBlock};
use crate::embed::{EmbedRender, PlayerCapability, TrustEngine};
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::question::Question;
use crate::reconciler::blocks_from_rows;
use crate::store::Store;

/// Everything a visitor sees at `/<slug>`
#[derive(Debug, Clone)]
pub struct PublicPage {
    pub profile: Profile,
    /// Visible blocks in display order
    pub blocks: Vec<ContentBlock>,
    /// Published questions, newest first
    pub questions: Vec<Question>,
}

/// One embed block's render decision
#[derive(Debug, Clone, Serialize)]
pub struct EmbedPlan {
    pub block_id: BlockId,
    #[serde(flatten)]
    pub render: EmbedRender,
}

impl PublicPage {
    /// Load the page for a slug; `NotFound` when no profile has it
    #[tracing::instrument(skip(store))]
    pub async fn load<S>(store: &S, slug: &str) -> Result<Self>
    where
        S: Store + ?Sized,
    {
        let profile: Profile = store
            .select_profile_by_slug(slug)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile '{}'", slug)))?
            .into();

        let (rows, questions) = futures::try_join!(
            store.select_blocks(&profile.id),
            store.select_questions(&profile.id, true),
        )?;

        let blocks = blocks_from_rows(rows)?
            .into_iter()
            .filter(|block| block.is_visible)
            .collect();

        Ok(Self {
            profile,
            blocks,
            questions,
        })
    }

    /// Render decisions for the page's embed blocks
    pub fn embed_plans(&self, engine: &TrustEngine, players: &dyn PlayerCapability) -> Vec<EmbedPlan> {
        self.blocks
            .iter()
            .filter_map(|block| match &block.payload {
                BlockPayload::Embed(embed) => Some(EmbedPlan {
                    block_id: block.id.clone(),
                    render: embed.render(engine, players),
                }),
                _ => None,
            })
            .collect()
    }

    /// JSON view of the page
    pub fn to_json(&self) -> Result<Value> {
        let blocks = self
            .blocks
            .iter()
            .map(ContentBlock::to_json)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| Error::Store(err.into()))?;

        Ok(serde_json::json!({
            "profile": self.profile,
            "blocks": blocks,
            "questions": self.questions,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::EmbedBlock;
    use crate::embed::MediaPlayers;
    use crate::profile::{ProfileDraft, ProfileService};
    use crate::question::QuestionBoard;
    use crate::reconciler::BlockReconciler;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_public_page_hides_private_content() {
        let store = Arc::new(MemoryStore::new());
        ProfileService::new(Arc::clone(&store))
            .save(
                "owner-1",
                ProfileDraft {
                    slug: Some("maker".to_string()),
                    ..ProfileDraft::default()
                },
            )
            .await
            .unwrap();

        BlockReconciler::new(Arc::clone(&store))
            .save(
                "owner-1",
                &[
                    ContentBlock::link("Shown", "https://example.com"),
                    ContentBlock::link("Hidden", "https://example.com").hidden(),
                    ContentBlock::new(BlockPayload::Embed(EmbedBlock {
                        url: "https://evil.example.com/x".to_string(),
                        ..EmbedBlock::default()
                    })),
                ],
            )
            .await
            .unwrap();

        let board = QuestionBoard::new(Arc::clone(&store));
        let answered = board.submit("owner-1", "Public?").await.unwrap();
        board.answer("owner-1", answered.id, "Yes").await.unwrap();
        board.submit("owner-1", "Still pending").await.unwrap();

        let page = PublicPage::load(store.as_ref(), "maker").await.unwrap();
        assert_eq!(page.profile.id, "owner-1");
        assert_eq!(page.blocks.len(), 2);
        assert_eq!(page.questions.len(), 1);
        assert_eq!(page.questions[0].answer_text.as_deref(), Some("Yes"));

        let plans = page.embed_plans(&TrustEngine::default(), &MediaPlayers);
        assert_eq!(plans.len(), 1);
        assert!(matches!(plans[0].render, EmbedRender::Blocked { .. }));

        let json = page.to_json().unwrap();
        assert_eq!(json["blocks"][0]["title"], "Shown");
    }

    #[tokio::test]
    async fn test_unknown_slug() {
        let store = MemoryStore::new();
        let err = PublicPage::load(&store, "nobody").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
