//! Block persistence: an ordered in-memory list on one side, unordered rows
//! with an explicit `display_order` on the other.
//!
//! Saving replaces the whole stored list. Order is the list order; there is no
//! per-block move in storage.

use std::sync::Arc;

use crate::block::{BlockId, BlockType, ContentBlock};
use crate::error::{SaveError, StoreError};
use crate::revision::Revision;
use crate::store::{BlockRow, BlockStore, NewBlockRow};

/// Decode stored rows, already in `display_order` order.
///
/// A row that cannot be decoded fails the whole load: dropping it here would
/// delete it on the next save.
pub(crate) fn blocks_from_rows(rows: Vec<BlockRow>) -> Result<Vec<ContentBlock>, StoreError> {
    rows.into_iter()
        .map(|row| {
            let block_type: BlockType =
                row.block_type
                    .parse()
                    .map_err(|reason: String| StoreError::Corrupt {
                        id: row.id.to_string(),
                        reason,
                    })?;

            ContentBlock::from_stored(BlockId::from_row_id(row.id), block_type, row.content)
                .map_err(|err| StoreError::Corrupt {
                    id: row.id.to_string(),
                    reason: err.to_string(),
                })
        })
        .collect()
}

/// Build rows for `blocks`, numbering `display_order` from zero.
///
/// Each row's content must decode back into its block type, otherwise the
/// saved list could not be loaded again.
fn rows_for(profile_id: &str, blocks: &[ContentBlock]) -> Result<Vec<NewBlockRow>, StoreError> {
    blocks
        .iter()
        .enumerate()
        .map(|(position, block)| -> Result<NewBlockRow, StoreError> {
            let block_type = block.block_type();
            let content = block.content()?;
            ContentBlock::from_stored(block.id.clone(), block_type, content.clone()).map_err(
                |err| StoreError::InvalidContent {
                    id: block.id.to_string(),
                    reason: err.to_string(),
                },
            )?;

            Ok(NewBlockRow {
                profile_id: profile_id.to_string(),
                block_type,
                content,
                display_order: i32::try_from(position).map_err(|_| StoreError::Corrupt {
                    id: block.id.to_string(),
                    reason: format!("position {} does not fit display_order", position),
                })?,
            })
        })
        .collect()
}

/// Loads and saves a profile's ordered block list
pub struct BlockReconciler<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for BlockReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> BlockReconciler<S>
where
    S: BlockStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The profile's blocks in display order; empty when there are none
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, profile_id: &str) -> Result<Vec<ContentBlock>, StoreError> {
        let rows = self.store.select_blocks(profile_id).await?;
        let blocks = blocks_from_rows(rows)?;
        tracing::debug!(count = blocks.len(), "blocks loaded");
        Ok(blocks)
    }

    /// Blocks plus the revision of the rows they came from
    #[tracing::instrument(skip(self))]
    pub async fn load_with_revision(
        &self,
        profile_id: &str,
    ) -> Result<(Vec<ContentBlock>, Revision), StoreError> {
        let rows = self.store.select_blocks(profile_id).await?;
        let revision = Revision::of_rows(&rows);
        let blocks = blocks_from_rows(rows)?;
        Ok((blocks, revision))
    }

    /// Replace the stored list with `blocks`, in this order.
    ///
    /// Returns the saved list with storage-assigned ids. Last writer wins.
    #[tracing::instrument(skip(self, blocks), fields(count = blocks.len()))]
    pub async fn save(
        &self,
        profile_id: &str,
        blocks: &[ContentBlock],
    ) -> Result<Vec<ContentBlock>, SaveError> {
        let rows = rows_for(profile_id, blocks).map_err(SaveError::NothingWritten)?;

        let stored = self
            .store
            .replace_blocks(profile_id, &rows)
            .await
            .inspect_err(|err| tracing::warn!(error = %err, "block save failed"))?;

        blocks_from_rows(stored).map_err(SaveError::Unreadable)
    }

    /// Like [`BlockReconciler::save`], but fails with [`SaveError::Conflict`]
    /// when the stored rows changed since `expected` was read.
    #[tracing::instrument(skip(self, expected, blocks), fields(count = blocks.len(), expected = %expected))]
    pub async fn save_if_unchanged(
        &self,
        profile_id: &str,
        expected: &Revision,
        blocks: &[ContentBlock],
    ) -> Result<(Vec<ContentBlock>, Revision), SaveError> {
        let rows = rows_for(profile_id, blocks).map_err(SaveError::NothingWritten)?;

        let stored = self
            .store
            .replace_blocks_if(profile_id, expected, &rows)
            .await
            .inspect_err(|err| tracing::warn!(error = %err, "block save failed"))?;

        let revision = Revision::of_rows(&stored);
        let saved = blocks_from_rows(stored).map_err(SaveError::Unreadable)?;
        Ok((saved, revision))
    }
}
