//! OneLink core: the pieces of a link-in-bio page builder that need care.
//!
//! - [`TrustEngine`] decides whether pasted embed input may be framed.
//! - [`BlockReconciler`] stores an ordered block list as rows with a
//!   `display_order`.
//! - Profiles, questions and kudos are thin services over the [`store`]
//!   traits.
//!
//! [`OneLink`] ties them together for a signed-in owner.

pub mod auth;
pub mod block;
pub mod config;
pub mod embed;
pub mod error;
pub mod kudos;
pub mod page;
pub mod profile;
pub mod question;
pub mod reconciler;
pub mod revision;
pub mod store;
pub mod theme;
mod yaml_parser;

pub use auth::{require_user, AuthProvider, StaticAuth};
pub use block::{
    move_block, remove_block, replace_block, BlockId, BlockPayload, BlockType, ContentBlock,
    EmbedBlock, EmbedKind, GalleryBlock, GalleryImage, LinkBlock, SpotlightBlock,
};
pub use config::{Config, EmbedConfig, FrameConfig};
pub use embed::{
    AllowList, EmbedFrame, EmbedRender, FrameOptions, MediaPlayers, PlayerCapability,
    TrustEngine, TrustedEmbed,
};
pub use error::{
    EmbedError, EmbedErrorKind, Error, Result, SaveError, SlugError, StoreError, ValidationError,
};
pub use kudos::{increment_kudos, KudosOutcome};
pub use page::{EmbedPlan, PublicPage};
pub use profile::{Profile, ProfileDraft, ProfileService, Slug};
pub use question::{Question, QuestionBoard};
pub use reconciler::BlockReconciler;
pub use revision::Revision;
pub use store::{MemoryStore, PgStore, Store};
pub use theme::{FontId, StyleDescriptor, ThemeId, ThemeSettings};
pub use yaml_parser::{parse_config_file, parse_config_string, validate_config};

use std::sync::Arc;

/// Entry point for the owner dashboard and the public page
pub struct OneLink<S: ?Sized> {
    store: Arc<S>,
    engine: TrustEngine,
    players: Arc<dyn PlayerCapability>,
}

impl OneLink<PgStore> {
    /// Connect to PostgreSQL and build the trust engine from `config`
    pub async fn connect(database_url: &str, config: &Config) -> Result<Self> {
        let store = PgStore::connect(database_url).await?;
        Ok(Self::new(Arc::new(store), TrustEngine::from_config(&config.embed)))
    }
}

impl<S> OneLink<S>
where
    S: Store + ?Sized,
{
    pub fn new(store: Arc<S>, engine: TrustEngine) -> Self {
        Self {
            store,
            engine,
            players: Arc::new(MediaPlayers),
        }
    }

    /// Use a different player capability than [`MediaPlayers`]
    pub fn with_players(mut self, players: impl PlayerCapability + 'static) -> Self {
        self.players = Arc::new(players);
        self
    }

    pub fn engine(&self) -> &TrustEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn blocks(&self) -> BlockReconciler<S> {
        BlockReconciler::new(Arc::clone(&self.store))
    }

    pub fn profiles(&self) -> ProfileService<S> {
        ProfileService::new(Arc::clone(&self.store))
    }

    pub fn questions(&self) -> QuestionBoard<S> {
        QuestionBoard::new(Arc::clone(&self.store))
    }

    pub fn classify_embed(&self, raw: &str) -> Result<TrustedEmbed> {
        Ok(self.engine.classify(raw)?)
    }

    /// Build an embed block from editor input.
    ///
    /// Player-capable URLs are kept as media embeds; everything else must
    /// classify as trusted.
    pub fn embed_block(&self, raw: &str, title: Option<String>) -> Result<EmbedBlock> {
        let trimmed = raw.trim();
        if self.players.can_play(trimmed) {
            return Ok(EmbedBlock::media(trimmed, title));
        }
        Ok(EmbedBlock::iframe(&self.engine, raw, title)?)
    }

    pub fn render_embed(&self, block: &EmbedBlock) -> EmbedRender {
        block.render(&self.engine, self.players.as_ref())
    }

    pub async fn my_blocks(&self, auth: &dyn AuthProvider) -> Result<Vec<ContentBlock>> {
        let owner = require_user(auth)?;
        Ok(self.blocks().load(&owner).await?)
    }

    /// Save the owner's list; the returned blocks carry the stored ids
    pub async fn save_my_blocks(
        &self,
        auth: &dyn AuthProvider,
        blocks: &[ContentBlock],
    ) -> Result<Vec<ContentBlock>> {
        let owner = require_user(auth)?;
        Ok(self.blocks().save(&owner, blocks).await?)
    }

    pub async fn my_profile(&self, auth: &dyn AuthProvider) -> Result<Option<Profile>> {
        let owner = require_user(auth)?;
        self.profiles().load(&owner).await
    }

    pub async fn save_my_profile(
        &self,
        auth: &dyn AuthProvider,
        draft: ProfileDraft,
    ) -> Result<Profile> {
        let owner = require_user(auth)?;
        self.profiles().save(&owner, draft).await
    }

    pub async fn inbox(&self, auth: &dyn AuthProvider) -> Result<Vec<Question>> {
        let owner = require_user(auth)?;
        self.questions().inbox(&owner).await
    }

    pub async fn answer_question(
        &self,
        auth: &dyn AuthProvider,
        id: i64,
        text: &str,
    ) -> Result<Question> {
        let owner = require_user(auth)?;
        self.questions().answer(&owner, id, text).await
    }

    pub async fn toggle_question(&self, auth: &dyn AuthProvider, id: i64) -> Result<Question> {
        let owner = require_user(auth)?;
        self.questions().toggle_publish(&owner, id).await
    }

    pub async fn delete_question(&self, auth: &dyn AuthProvider, id: i64) -> Result<()> {
        let owner = require_user(auth)?;
        self.questions().delete(&owner, id).await
    }

    /// Anonymous question to the profile at `slug`
    pub async fn ask(&self, slug: &str, text: &str) -> Result<Question> {
        let profile = self
            .profiles()
            .load_by_slug(slug)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile '{}'", slug)))?;
        self.questions().submit(&profile.id, text).await
    }

    pub async fn give_kudos(&self, profile_id: &str, block_id: &BlockId) -> Result<KudosOutcome> {
        increment_kudos(self.store.as_ref(), profile_id, block_id).await
    }

    pub async fn public_page(&self, slug: &str) -> Result<PublicPage> {
        PublicPage::load(self.store.as_ref(), slug).await
    }
}
