//! Storage seams.
//!
//! The services only talk to these traits. [`PgStore`] implements them on
//! PostgreSQL, [`MemoryStore`] in process memory for tests and demos.

mod memory;
mod postgres;

pub use memory::{Fault, MemoryStore};
pub use postgres::{PgStore, SCHEMA_SQL};

use async_trait::async_trait;
use serde_json::Value;

use crate::block::BlockType;
use crate::error::{SaveError, StoreError};
use crate::question::{Question, QuestionChange};
use crate::revision::Revision;

/// A `blocks` row as stored
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRow {
    pub id: i64,
    pub profile_id: String,
    /// Kept as text so unknown stored types surface when decoding
    pub block_type: String,
    pub content: Value,
    pub display_order: i32,
}

/// A `blocks` row about to be inserted; the backend assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewBlockRow {
    pub profile_id: String,
    pub block_type: BlockType,
    pub content: Value,
    pub display_order: i32,
}

/// A `profiles` row as stored
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRow {
    pub id: String,
    pub slug: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub status_message: Option<String>,
    pub theme_settings: Value,
    /// Ignored on upsert; only [`ProfileStore::increment_total_kudos`] changes it
    pub total_kudos: i64,
}

#[async_trait]
pub trait BlockStore: Send + Sync {
    /// All rows of a profile ordered by `display_order` ascending
    async fn select_blocks(&self, profile_id: &str) -> Result<Vec<BlockRow>, StoreError>;

    /// Delete every row of a profile, returning how many were removed
    async fn delete_blocks(&self, profile_id: &str) -> Result<u64, StoreError>;

    /// Insert rows in one request, returning them with assigned ids
    async fn insert_blocks(&self, rows: &[NewBlockRow]) -> Result<Vec<BlockRow>, StoreError>;

    /// Atomically add one to the `kudos` key of a block's content
    async fn increment_block_kudos(&self, profile_id: &str, block_id: i64)
        -> Result<u64, StoreError>;

    /// Replace every row of a profile with `rows`.
    ///
    /// The default deletes and then inserts as two separate requests, so an
    /// insert failure leaves the profile with no rows. Backends with
    /// transactions should override this.
    async fn replace_blocks(
        &self,
        profile_id: &str,
        rows: &[NewBlockRow],
    ) -> Result<Vec<BlockRow>, SaveError> {
        let deleted = self
            .delete_blocks(profile_id)
            .await
            .map_err(SaveError::NothingWritten)?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        self.insert_blocks(rows)
            .await
            .map_err(|source| SaveError::PartialWrite {
                deleted,
                attempted: rows.len(),
                source,
            })
    }

    /// Like [`BlockStore::replace_blocks`], but only when the stored rows still
    /// hash to `expected`.
    ///
    /// The default reads and then replaces without holding a lock, so it only
    /// narrows the race window.
    async fn replace_blocks_if(
        &self,
        profile_id: &str,
        expected: &Revision,
        rows: &[NewBlockRow],
    ) -> Result<Vec<BlockRow>, SaveError> {
        let current = self
            .select_blocks(profile_id)
            .await
            .map_err(SaveError::NothingWritten)?;
        let found = Revision::of_rows(&current);
        if &found != expected {
            return Err(SaveError::Conflict {
                expected: expected.clone(),
                found,
            });
        }

        self.replace_blocks(profile_id, rows).await
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn select_profile(&self, id: &str) -> Result<Option<ProfileRow>, StoreError>;

    async fn select_profile_by_slug(&self, slug: &str) -> Result<Option<ProfileRow>, StoreError>;

    /// Insert or update by id, returning the stored row
    async fn upsert_profile(&self, row: &ProfileRow) -> Result<ProfileRow, StoreError>;

    /// Add one to `total_kudos`, returning the new total
    async fn increment_total_kudos(&self, id: &str) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn insert_question(&self, profile_id: &str, text: &str)
        -> Result<Question, StoreError>;

    /// Questions of a profile, newest first
    async fn select_questions(
        &self,
        profile_id: &str,
        published_only: bool,
    ) -> Result<Vec<Question>, StoreError>;

    async fn select_question(&self, owner: &str, id: i64) -> Result<Option<Question>, StoreError>;

    /// Apply a change to a question owned by `owner`; `NotFound` otherwise
    async fn update_question(
        &self,
        owner: &str,
        id: i64,
        change: &QuestionChange,
    ) -> Result<Question, StoreError>;

    /// Delete a question owned by `owner`; `NotFound` otherwise
    async fn delete_question(&self, owner: &str, id: i64) -> Result<(), StoreError>;
}

/// Everything the facade needs from a backend
pub trait Store: BlockStore + ProfileStore + QuestionStore {}

impl<T> Store for T where T: BlockStore + ProfileStore + QuestionStore + ?Sized {}
