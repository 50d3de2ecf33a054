//! "Ask me anything": anonymous questions, answered and published by the owner.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::error::{Result, ValidationError};
use crate::store::QuestionStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub id: i64,
    pub profile_id: String,
    pub question_text: String,
    pub answer_text: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields to change on a question; `None` leaves the field alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionChange {
    pub answer_text: Option<String>,
    pub is_published: Option<bool>,
}

impl QuestionChange {
    pub fn is_empty(&self) -> bool {
        self.answer_text.is_none() && self.is_published.is_none()
    }
}

/// Question operations for visitors and for the profile owner
pub struct QuestionBoard<S: ?Sized> {
    store: Arc<S>,
}

impl<S> QuestionBoard<S>
where
    S: QuestionStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Submit an anonymous question to a profile
    #[tracing::instrument(skip(self, text))]
    pub async fn submit(&self, profile_id: &str, text: &str) -> Result<Question> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyQuestion.into());
        }

        let question = self.store.insert_question(profile_id, text).await?;
        tracing::debug!(question_id = question.id, "question submitted");
        Ok(question)
    }

    /// Every question sent to the owner, newest first
    pub async fn inbox(&self, owner: &str) -> Result<Vec<Question>> {
        Ok(self.store.select_questions(owner, false).await?)
    }

    /// Published questions shown on the public page, newest first
    pub async fn published(&self, profile_id: &str) -> Result<Vec<Question>> {
        Ok(self.store.select_questions(profile_id, true).await?)
    }

    /// Answer a question; answering also publishes it
    #[tracing::instrument(skip(self, text))]
    pub async fn answer(&self, owner: &str, id: i64, text: &str) -> Result<Question> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyAnswer.into());
        }

        let change = QuestionChange {
            answer_text: Some(text.to_string()),
            is_published: Some(true),
        };
        Ok(self.store.update_question(owner, id, &change).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_published(&self, owner: &str, id: i64, published: bool) -> Result<Question> {
        let change = QuestionChange {
            answer_text: None,
            is_published: Some(published),
        };
        Ok(self.store.update_question(owner, id, &change).await?)
    }

    /// Flip the published flag
    pub async fn toggle_publish(&self, owner: &str, id: i64) -> Result<Question> {
        let current = self
            .store
            .select_question(owner, id)
            .await?
            .ok_or_else(|| crate::Error::NotFound(format!("question {}", id)))?;

        self.set_published(owner, id, !current.is_published).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, owner: &str, id: i64) -> Result<()> {
        Ok(self.store.delete_question(owner, id).await?)
    }
}
