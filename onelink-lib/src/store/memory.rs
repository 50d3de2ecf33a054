use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{BlockRow, BlockStore, NewBlockRow, ProfileRow, ProfileStore, QuestionStore};
use crate::error::StoreError;
use crate::profile::{SLUG_CHECK_CONSTRAINT, SLUG_UNIQUE_CONSTRAINT};
use crate::question::{Question, QuestionChange};

/// Backend calls that can be made to fail once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    SelectBlocks,
    DeleteBlocks,
    InsertBlocks,
    IncrementTotalKudos,
}

#[derive(Debug, Default)]
struct State {
    blocks: Vec<BlockRow>,
    next_block_id: i64,
    profiles: BTreeMap<String, ProfileRow>,
    questions: Vec<Question>,
    next_question_id: i64,
    faults: Vec<Fault>,
}

impl State {
    fn trip(&mut self, fault: Fault) -> Result<(), StoreError> {
        match self.faults.iter().position(|f| *f == fault) {
            Some(index) => {
                self.faults.remove(index);
                Err(StoreError::Unavailable(format!("injected {:?} failure", fault)))
            }
            None => Ok(()),
        }
    }
}

/// In-process store with the same observable behaviour as the PostgreSQL one,
/// except that [`BlockStore::replace_blocks`] is not transactional.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of the given kind fail with `StoreError::Unavailable`
    pub async fn fail_next(&self, fault: Fault) {
        self.state.lock().await.faults.push(fault);
    }

    /// Insert a raw block row as if written by another client
    pub async fn put_raw_block(
        &self,
        profile_id: &str,
        block_type: &str,
        content: Value,
        display_order: i32,
    ) -> i64 {
        let mut state = self.state.lock().await;
        state.next_block_id += 1;
        let id = state.next_block_id;
        state.blocks.push(BlockRow {
            id,
            profile_id: profile_id.to_string(),
            block_type: block_type.to_string(),
            content,
            display_order,
        });
        id
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn select_blocks(&self, profile_id: &str) -> Result<Vec<BlockRow>, StoreError> {
        let mut state = self.state.lock().await;
        state.trip(Fault::SelectBlocks)?;

        let mut rows: Vec<BlockRow> = state
            .blocks
            .iter()
            .filter(|row| row.profile_id == profile_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.display_order, row.id));
        Ok(rows)
    }

    async fn delete_blocks(&self, profile_id: &str) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        state.trip(Fault::DeleteBlocks)?;

        let before = state.blocks.len();
        state.blocks.retain(|row| row.profile_id != profile_id);
        Ok((before - state.blocks.len()) as u64)
    }

    async fn insert_blocks(&self, rows: &[NewBlockRow]) -> Result<Vec<BlockRow>, StoreError> {
        let mut state = self.state.lock().await;
        state.trip(Fault::InsertBlocks)?;

        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            state.next_block_id += 1;
            inserted.push(BlockRow {
                id: state.next_block_id,
                profile_id: row.profile_id.clone(),
                block_type: row.block_type.as_str().to_string(),
                content: row.content.clone(),
                display_order: row.display_order,
            });
        }
        state.blocks.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn increment_block_kudos(
        &self,
        profile_id: &str,
        block_id: i64,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let row = state
            .blocks
            .iter_mut()
            .find(|row| row.id == block_id && row.profile_id == profile_id)
            .ok_or_else(|| StoreError::NotFound(format!("block {}", block_id)))?;

        if !row.content.is_object() {
            row.content = Value::Object(Map::new());
        }
        let kudos = row.content.get("kudos").and_then(Value::as_u64).unwrap_or(0) + 1;
        if let Value::Object(content) = &mut row.content {
            content.insert("kudos".to_string(), Value::from(kudos));
        }
        Ok(kudos)
    }
}

/// Mirrors the `profiles_slug_check` constraint
fn slug_passes_check(slug: &str) -> bool {
    slug.len() >= 4
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn select_profile(&self, id: &str) -> Result<Option<ProfileRow>, StoreError> {
        Ok(self.state.lock().await.profiles.get(id).cloned())
    }

    async fn select_profile_by_slug(&self, slug: &str) -> Result<Option<ProfileRow>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .profiles
            .values()
            .find(|profile| profile.slug.as_deref() == Some(slug))
            .cloned())
    }

    async fn upsert_profile(&self, row: &ProfileRow) -> Result<ProfileRow, StoreError> {
        let mut state = self.state.lock().await;

        if let Some(slug) = row.slug.as_deref() {
            if !slug_passes_check(slug) {
                return Err(StoreError::CheckViolation {
                    constraint: SLUG_CHECK_CONSTRAINT.to_string(),
                });
            }
            let taken = state
                .profiles
                .values()
                .any(|other| other.id != row.id && other.slug.as_deref() == Some(slug));
            if taken {
                return Err(StoreError::UniqueViolation {
                    constraint: SLUG_UNIQUE_CONSTRAINT.to_string(),
                });
            }
        }

        let total_kudos = state
            .profiles
            .get(&row.id)
            .map(|existing| existing.total_kudos)
            .unwrap_or(0);
        let stored = ProfileRow {
            total_kudos,
            ..row.clone()
        };
        state.profiles.insert(row.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn increment_total_kudos(&self, id: &str) -> Result<i64, StoreError> {
        let mut state = self.state.lock().await;
        state.trip(Fault::IncrementTotalKudos)?;

        let profile = state
            .profiles
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", id)))?;
        profile.total_kudos += 1;
        Ok(profile.total_kudos)
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn insert_question(&self, profile_id: &str, text: &str) -> Result<Question, StoreError> {
        let mut state = self.state.lock().await;
        state.next_question_id += 1;
        let question = Question {
            id: state.next_question_id,
            profile_id: profile_id.to_string(),
            question_text: text.to_string(),
            answer_text: None,
            is_published: false,
            created_at: Utc::now(),
        };
        state.questions.push(question.clone());
        Ok(question)
    }

    async fn select_questions(
        &self,
        profile_id: &str,
        published_only: bool,
    ) -> Result<Vec<Question>, StoreError> {
        let state = self.state.lock().await;
        let mut questions: Vec<Question> = state
            .questions
            .iter()
            .filter(|q| q.profile_id == profile_id && (!published_only || q.is_published))
            .cloned()
            .collect();
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(questions)
    }

    async fn select_question(&self, owner: &str, id: i64) -> Result<Option<Question>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .questions
            .iter()
            .find(|q| q.id == id && q.profile_id == owner)
            .cloned())
    }

    async fn update_question(
        &self,
        owner: &str,
        id: i64,
        change: &QuestionChange,
    ) -> Result<Question, StoreError> {
        let mut state = self.state.lock().await;
        let question = state
            .questions
            .iter_mut()
            .find(|q| q.id == id && q.profile_id == owner)
            .ok_or_else(|| StoreError::NotFound(format!("question {}", id)))?;

        if let Some(answer) = &change.answer_text {
            question.answer_text = Some(answer.clone());
        }
        if let Some(published) = change.is_published {
            question.is_published = published;
        }
        Ok(question.clone())
    }

    async fn delete_question(&self, owner: &str, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let before = state.questions.len();
        state.questions.retain(|q| !(q.id == id && q.profile_id == owner));
        if state.questions.len() == before {
            return Err(StoreError::NotFound(format!("question {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockType;
    use crate::error::SaveError;
    use serde_json::json;

    fn new_row(profile_id: &str, order: i32) -> NewBlockRow {
        NewBlockRow {
            profile_id: profile_id.to_string(),
            block_type: BlockType::Link,
            content: json!({ "title": format!("#{order}"), "url": "https://example.com" }),
            display_order: order,
        }
    }

    #[tokio::test]
    async fn test_rows_are_scoped_by_profile() {
        let store = MemoryStore::new();
        store.insert_blocks(&[new_row("a", 0), new_row("b", 0)]).await.unwrap();

        assert_eq!(store.select_blocks("a").await.unwrap().len(), 1);
        assert_eq!(store.delete_blocks("a").await.unwrap(), 1);
        assert!(store.select_blocks("a").await.unwrap().is_empty());
        assert_eq!(store.select_blocks("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_default_replace_can_partially_write() {
        let store = MemoryStore::new();
        store.insert_blocks(&[new_row("a", 0), new_row("a", 1)]).await.unwrap();
        store.fail_next(Fault::InsertBlocks).await;

        let err = store
            .replace_blocks("a", &[new_row("a", 0)])
            .await
            .unwrap_err();
        match err {
            SaveError::PartialWrite {
                deleted, attempted, ..
            } => {
                assert_eq!(deleted, 2);
                assert_eq!(attempted, 1);
            }
            other => panic!("expected a partial write, got {other:?}"),
        }
        assert!(store.select_blocks("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_faults_fire_once() {
        let store = MemoryStore::new();
        store.fail_next(Fault::SelectBlocks).await;
        assert!(store.select_blocks("a").await.is_err());
        assert!(store.select_blocks("a").await.is_ok());
    }

    #[tokio::test]
    async fn test_kudos_increment_adds_key() {
        let store = MemoryStore::new();
        let id = store
            .put_raw_block("a", "link", json!({ "title": "x" }), 0)
            .await;

        assert_eq!(store.increment_block_kudos("a", id).await.unwrap(), 1);
        assert_eq!(store.increment_block_kudos("a", id).await.unwrap(), 2);
        assert!(matches!(
            store.increment_block_kudos("b", id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_slug_constraints() {
        let store = MemoryStore::new();
        let row = |id: &str, slug: &str| ProfileRow {
            id: id.to_string(),
            slug: Some(slug.to_string()),
            full_name: None,
            bio: None,
            avatar_url: None,
            status_message: None,
            theme_settings: json!({}),
            total_kudos: 0,
        };

        store.upsert_profile(&row("a", "maker")).await.unwrap();
        // Re-saving your own slug is fine
        store.upsert_profile(&row("a", "maker")).await.unwrap();

        let err = store.upsert_profile(&row("b", "maker")).await.unwrap_err();
        assert_eq!(err.constraint(), Some(SLUG_UNIQUE_CONSTRAINT));

        let err = store.upsert_profile(&row("b", "Maker")).await.unwrap_err();
        assert_eq!(err.constraint(), Some(SLUG_CHECK_CONSTRAINT));
    }
}
