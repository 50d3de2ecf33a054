use serde::Serialize;

use crate::block::BlockId;
use crate::error::{Error, Result};
use crate::store::{BlockStore, ProfileStore};

/// Result of a visitor giving kudos to a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KudosOutcome {
    /// The block's counter after the increment
    pub block_kudos: u64,
    /// Profile total after the increment, when that update succeeded
    pub profile_total: Option<i64>,
    pub profile_total_updated: bool,
}

/// Add one kudos to a block and to its profile's running total.
///
/// The block counter is the result. A failure to bump the profile total is
/// logged and reported in the outcome, not returned as an error.
#[tracing::instrument(skip(store, block_id), fields(block_id = %block_id))]
pub async fn increment_kudos<S>(store: &S, profile_id: &str, block_id: &BlockId) -> Result<KudosOutcome>
where
    S: BlockStore + ProfileStore + ?Sized,
{
    let row_id = block_id
        .row_id()
        .ok_or_else(|| Error::NotFound(format!("block {}", block_id)))?;

    let block_kudos = store.increment_block_kudos(profile_id, row_id).await?;

    let profile_total = match store.increment_total_kudos(profile_id).await {
        Ok(total) => Some(total),
        Err(err) => {
            tracing::warn!(error = %err, "block kudos saved but profile total was not updated");
            None
        }
    };

    Ok(KudosOutcome {
        block_kudos,
        profile_total_updated: profile_total.is_some(),
        profile_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Fault, MemoryStore, ProfileRow};
    use serde_json::json;

    async fn store_with_block() -> (MemoryStore, BlockId) {
        let store = MemoryStore::new();
        store
            .upsert_profile(&ProfileRow {
                id: "owner-1".to_string(),
                slug: None,
                full_name: None,
                bio: None,
                avatar_url: None,
                status_message: None,
                theme_settings: json!({}),
                total_kudos: 0,
            })
            .await
            .unwrap();
        let id = store
            .put_raw_block("owner-1", "link", json!({ "title": "x", "url": "https://x.example" }), 0)
            .await;
        (store, BlockId::from_row_id(id))
    }

    #[tokio::test]
    async fn test_increments_block_and_profile() {
        let (store, block) = store_with_block().await;

        let outcome = increment_kudos(&store, "owner-1", &block).await.unwrap();
        assert_eq!(
            outcome,
            KudosOutcome {
                block_kudos: 1,
                profile_total: Some(1),
                profile_total_updated: true,
            }
        );

        let outcome = increment_kudos(&store, "owner-1", &block).await.unwrap();
        assert_eq!(outcome.block_kudos, 2);
        assert_eq!(outcome.profile_total, Some(2));
    }

    #[tokio::test]
    async fn test_profile_total_failure_is_reported() {
        let (store, block) = store_with_block().await;
        store.fail_next(Fault::IncrementTotalKudos).await;

        let outcome = increment_kudos(&store, "owner-1", &block).await.unwrap();
        assert_eq!(outcome.block_kudos, 1);
        assert!(!outcome.profile_total_updated);
        assert_eq!(outcome.profile_total, None);
    }

    #[tokio::test]
    async fn test_unknown_block() {
        let (store, _) = store_with_block().await;

        let err = increment_kudos(&store, "owner-1", &BlockId::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = increment_kudos(&store, "owner-1", &BlockId::from_row_id(999))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
