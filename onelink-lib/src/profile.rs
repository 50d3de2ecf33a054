//! Profiles and their public slugs.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result, SlugError, StoreError};
use crate::store::{ProfileRow, ProfileStore};
use crate::theme::ThemeSettings;

pub const MIN_SLUG_LEN: usize = 4;

/// Unique constraint on `profiles.slug`
pub const SLUG_UNIQUE_CONSTRAINT: &str = "profiles_slug_key";
/// Check constraint enforcing the slug format in storage
pub const SLUG_CHECK_CONSTRAINT: &str = "profiles_slug_check";

static SLUG_PATTERN: OnceLock<Regex> = OnceLock::new();

fn slug_pattern() -> &'static Regex {
    SLUG_PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_-]+$").expect("slug pattern is valid"))
}

/// Public page address: at least four of `a-z`, `0-9`, `_`, `-`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn parse(raw: &str) -> Result<Self, SlugError> {
        let len = raw.chars().count();
        if len < MIN_SLUG_LEN {
            return Err(SlugError::TooShort {
                len,
                min: MIN_SLUG_LEN,
            });
        }
        if !slug_pattern().is_match(raw) {
            return Err(SlugError::InvalidCharacters);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    /// Owner id issued by the auth provider
    pub id: String,
    pub slug: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub status_message: Option<String>,
    pub theme: ThemeSettings,
    pub total_kudos: i64,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            theme: ThemeSettings::from_value(&row.theme_settings),
            id: row.id,
            slug: row.slug,
            full_name: row.full_name,
            bio: row.bio,
            avatar_url: row.avatar_url,
            status_message: row.status_message,
            total_kudos: row.total_kudos,
        }
    }
}

/// Editable profile fields; blank strings are stored as absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileDraft {
    pub slug: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub status_message: Option<String>,
    pub theme: ThemeSettings,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

impl ProfileDraft {
    /// Check the draft and turn it into a row for `owner`
    pub fn into_row(self, owner: &str) -> Result<ProfileRow, SlugError> {
        let slug = match non_blank(&self.slug) {
            Some(raw) => Some(Slug::parse(&raw)?.into_string()),
            None => None,
        };

        Ok(ProfileRow {
            id: owner.to_string(),
            slug,
            full_name: non_blank(&self.full_name),
            bio: non_blank(&self.bio),
            avatar_url: non_blank(&self.avatar_url),
            status_message: non_blank(&self.status_message),
            theme_settings: self.theme.to_value(),
            total_kudos: 0,
        })
    }
}

impl From<&Profile> for ProfileDraft {
    fn from(profile: &Profile) -> Self {
        Self {
            slug: profile.slug.clone(),
            full_name: profile.full_name.clone(),
            bio: profile.bio.clone(),
            avatar_url: profile.avatar_url.clone(),
            status_message: profile.status_message.clone(),
            theme: profile.theme.clone(),
        }
    }
}

pub struct ProfileService<S: ?Sized> {
    store: Arc<S>,
}

impl<S> ProfileService<S>
where
    S: ProfileStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Owner's profile; `None` when it has not been created yet
    pub async fn load(&self, owner: &str) -> Result<Option<Profile>> {
        Ok(self.store.select_profile(owner).await?.map(Profile::from))
    }

    pub async fn load_by_slug(&self, slug: &str) -> Result<Option<Profile>> {
        Ok(self
            .store
            .select_profile_by_slug(slug)
            .await?
            .map(Profile::from))
    }

    /// Validate and upsert the owner's profile.
    ///
    /// Nothing is sent to storage when the slug fails the local check.
    #[tracing::instrument(skip(self, draft))]
    pub async fn save(&self, owner: &str, draft: ProfileDraft) -> Result<Profile> {
        let row = draft.into_row(owner)?;
        let slug = row.slug.clone().unwrap_or_default();

        match self.store.upsert_profile(&row).await {
            Ok(stored) => Ok(Profile::from(stored)),
            Err(StoreError::UniqueViolation { constraint })
                if constraint == SLUG_UNIQUE_CONSTRAINT =>
            {
                Err(Error::SlugTaken(slug))
            }
            Err(StoreError::CheckViolation { constraint }) if constraint == SLUG_CHECK_CONSTRAINT => {
                Err(SlugError::InvalidCharacters.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::store::MemoryStore;
    use crate::theme::ThemeId;

    #[test]
    fn test_slug_rules() {
        assert_eq!(
            Slug::parse("abc"),
            Err(SlugError::TooShort { len: 3, min: 4 })
        );
        assert_eq!(Slug::parse("abcd").unwrap().as_str(), "abcd");
        assert_eq!(Slug::parse("maker_42-x").unwrap().as_str(), "maker_42-x");
        assert_eq!(Slug::parse("My_Slug"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("with space"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("caf\u{e9}s"), Err(SlugError::InvalidCharacters));
    }

    #[test]
    fn test_draft_blank_fields_become_absent() {
        let draft = ProfileDraft {
            slug: Some("  ".to_string()),
            full_name: Some("".to_string()),
            bio: Some("Maker".to_string()),
            ..ProfileDraft::default()
        };
        let row = draft.into_row("owner-1").unwrap();
        assert_eq!(row.slug, None);
        assert_eq!(row.full_name, None);
        assert_eq!(row.bio.as_deref(), Some("Maker"));
    }

    #[tokio::test]
    async fn test_missing_profile_is_none() {
        let service = ProfileService::new(Arc::new(MemoryStore::new()));
        assert!(service.load("nobody").await.unwrap().is_none());
        assert!(service.load_by_slug("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let service = ProfileService::new(Arc::new(MemoryStore::new()));
        let draft = ProfileDraft {
            slug: Some("maker".to_string()),
            full_name: Some("Ada".to_string()),
            theme: ThemeSettings {
                theme: ThemeId::CosmicDrift,
                ..ThemeSettings::default()
            },
            ..ProfileDraft::default()
        };

        let saved = service.save("owner-1", draft).await.unwrap();
        assert_eq!(saved.slug.as_deref(), Some("maker"));

        let loaded = service.load_by_slug("maker").await.unwrap().unwrap();
        assert_eq!(loaded.id, "owner-1");
        assert_eq!(loaded.theme.theme, ThemeId::CosmicDrift);
    }

    #[tokio::test]
    async fn test_taken_slug() {
        let service = ProfileService::new(Arc::new(MemoryStore::new()));
        let draft = ProfileDraft {
            slug: Some("maker".to_string()),
            ..ProfileDraft::default()
        };
        service.save("owner-1", draft.clone()).await.unwrap();

        let err = service.save("owner-2", draft).await.unwrap_err();
        assert!(matches!(err, Error::SlugTaken(ref slug) if slug == "maker"));
    }

    #[tokio::test]
    async fn test_invalid_slug_is_rejected_locally() {
        let service = ProfileService::new(Arc::new(MemoryStore::new()));
        let draft = ProfileDraft {
            slug: Some("abc".to_string()),
            ..ProfileDraft::default()
        };

        let err = service.save("owner-1", draft).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::Slug(SlugError::TooShort { .. }))
        ));
        assert!(service.load("owner-1").await.unwrap().is_none());
    }
}
