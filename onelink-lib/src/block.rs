//! Content blocks: the units a public page is built from.
//!
//! In storage a block is a `type` column plus a JSON `content` object holding
//! every other field except the id, with camelCase keys (`isVisible`,
//! `embedType`, `kudos`). Keys this crate does not know about are carried
//! through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::embed::{EmbedRender, PlayerCapability, TrustEngine};
use crate::error::EmbedError;

/// Opaque block identifier.
///
/// Blocks created in memory get a random id; loaded blocks carry the
/// stringified storage row id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Fresh id for a block that has not been stored yet
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_row_id(id: i64) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage row id, if this id came from storage
    pub fn row_id(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for BlockId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Link,
    Spotlight,
    Gallery,
    Embed,
}

impl BlockType {
    pub const ALL: [BlockType; 4] = [
        BlockType::Link,
        BlockType::Spotlight,
        BlockType::Gallery,
        BlockType::Embed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Link => "link",
            BlockType::Spotlight => "spotlight",
            BlockType::Gallery => "gallery",
            BlockType::Embed => "embed",
        }
    }

    /// Content keys owned by the payload of this block type
    fn payload_keys(&self) -> &'static [&'static str] {
        match self {
            BlockType::Link => &["title", "url", "description", "icon"],
            BlockType::Spotlight => &["title", "description", "image", "url"],
            BlockType::Gallery => &["title", "images"],
            BlockType::Embed => &["url", "title", "embedType"],
        }
    }
}

impl FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "link" => Ok(BlockType::Link),
            "spotlight" => Ok(BlockType::Spotlight),
            "gallery" => Ok(BlockType::Gallery),
            "embed" => Ok(BlockType::Embed),
            _ => Err(format!("Invalid block type: {}", s)),
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkBlock {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotlightBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryImage {
    pub url: String,
    pub alt: String,
    pub caption: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub images: Vec<GalleryImage>,
}

/// How an embed URL was entered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedKind {
    /// A media URL meant for the player
    #[default]
    Url,
    /// A URL extracted from an iframe snippet and checked against the allow-list
    Iframe,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbedBlock {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub embed_type: EmbedKind,
}

impl EmbedBlock {
    /// Embed a media URL played by the player component
    pub fn media(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            url: url.into().trim().to_string(),
            title,
            embed_type: EmbedKind::Url,
        }
    }

    /// Embed from a pasted URL or iframe snippet; only trusted URLs are kept
    pub fn iframe(
        engine: &TrustEngine,
        input: &str,
        title: Option<String>,
    ) -> Result<Self, EmbedError> {
        let trusted = engine.classify(input)?;
        Ok(Self {
            url: trusted.into_string(),
            title,
            embed_type: EmbedKind::Iframe,
        })
    }

    /// Decide how this block is displayed right now
    pub fn render(&self, engine: &TrustEngine, players: &dyn PlayerCapability) -> EmbedRender {
        engine.plan_embed(&self.url, self.title.as_deref(), players)
    }
}

/// Type-specific part of a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockPayload {
    Link(LinkBlock),
    Spotlight(SpotlightBlock),
    Gallery(GalleryBlock),
    Embed(EmbedBlock),
}

impl BlockPayload {
    pub fn block_type(&self) -> BlockType {
        match self {
            BlockPayload::Link(_) => BlockType::Link,
            BlockPayload::Spotlight(_) => BlockType::Spotlight,
            BlockPayload::Gallery(_) => BlockType::Gallery,
            BlockPayload::Embed(_) => BlockType::Embed,
        }
    }

    fn to_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let value = match self {
            BlockPayload::Link(block) => serde_json::to_value(block)?,
            BlockPayload::Spotlight(block) => serde_json::to_value(block)?,
            BlockPayload::Gallery(block) => serde_json::to_value(block)?,
            BlockPayload::Embed(block) => serde_json::to_value(block)?,
        };

        match value {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    fn from_map(block_type: BlockType, map: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let value = Value::Object(map);
        Ok(match block_type {
            BlockType::Link => BlockPayload::Link(serde_json::from_value(value)?),
            BlockType::Spotlight => BlockPayload::Spotlight(serde_json::from_value(value)?),
            BlockType::Gallery => BlockPayload::Gallery(serde_json::from_value(value)?),
            BlockType::Embed => BlockPayload::Embed(serde_json::from_value(value)?),
        })
    }
}

/// One unit of public-page content
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    pub id: BlockId,
    pub is_visible: bool,
    /// Visitor appreciation counter
    pub kudos: u64,
    pub payload: BlockPayload,
    /// Stored content keys this crate does not interpret
    pub extra: Map<String, Value>,
}

impl ContentBlock {
    /// New visible block with a fresh id
    pub fn new(payload: BlockPayload) -> Self {
        Self {
            id: BlockId::new(),
            is_visible: true,
            kudos: 0,
            payload,
            extra: Map::new(),
        }
    }

    pub fn link(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(BlockPayload::Link(LinkBlock {
            title: title.into(),
            url: url.into(),
            ..LinkBlock::default()
        }))
    }

    pub fn hidden(mut self) -> Self {
        self.is_visible = false;
        self
    }

    pub fn block_type(&self) -> BlockType {
        self.payload.block_type()
    }

    /// Stored content: every field except `id` and `type`
    pub fn content(&self) -> Result<Value, serde_json::Error> {
        let mut content = self.extra.clone();
        content.extend(self.payload.to_map()?);
        content.insert("isVisible".to_string(), Value::Bool(self.is_visible));
        if self.kudos > 0 {
            content.insert("kudos".to_string(), Value::from(self.kudos));
        }

        Ok(Value::Object(content))
    }

    /// Rebuild a block from its stored type and content
    pub fn from_stored(
        id: BlockId,
        block_type: BlockType,
        content: Value,
    ) -> Result<Self, serde_json::Error> {
        let mut map = match content {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(<serde_json::Error as serde::de::Error>::custom(format!(
                    "block content must be a JSON object, got {}",
                    other
                )))
            }
        };

        map.remove("id");
        map.remove("type");
        let is_visible = map
            .remove("isVisible")
            .and_then(|value| value.as_bool())
            .unwrap_or(true);
        let kudos = map
            .remove("kudos")
            .and_then(|value| value.as_u64())
            .unwrap_or(0);

        let mut payload_map = Map::new();
        for key in block_type.payload_keys() {
            if let Some(value) = map.remove(*key) {
                payload_map.insert(key.to_string(), value);
            }
        }
        let payload = BlockPayload::from_map(block_type, payload_map)?;

        Ok(Self {
            id,
            is_visible,
            kudos,
            payload,
            extra: map,
        })
    }

    /// Flat JSON form: `{ id, type, ...content }`
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        let mut map = match self.content()? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.insert("id".to_string(), Value::String(self.id.to_string()));
        map.insert(
            "type".to_string(),
            Value::String(self.block_type().as_str().to_string()),
        );
        Ok(Value::Object(map))
    }

    /// Same type and content, ignoring ids
    pub fn same_content(&self, other: &ContentBlock) -> bool {
        self.is_visible == other.is_visible
            && self.kudos == other.kudos
            && self.payload == other.payload
            && self.extra == other.extra
    }
}

/// Move the block at `from` so it ends up at index `to`.
///
/// `to` past the end moves the block last. Returns false when `from` is out
/// of range.
pub fn move_block(blocks: &mut Vec<ContentBlock>, from: usize, to: usize) -> bool {
    if from >= blocks.len() {
        return false;
    }
    let block = blocks.remove(from);
    let to = to.min(blocks.len());
    blocks.insert(to, block);
    true
}

/// Remove the block with the given id
pub fn remove_block(blocks: &mut Vec<ContentBlock>, id: &BlockId) -> Option<ContentBlock> {
    let index = blocks.iter().position(|block| &block.id == id)?;
    Some(blocks.remove(index))
}

/// Replace the payload and visibility of the block with the given id, keeping its id
pub fn replace_block(
    blocks: &mut [ContentBlock],
    id: &BlockId,
    payload: BlockPayload,
    is_visible: bool,
) -> bool {
    match blocks.iter_mut().find(|block| &block.id == id) {
        Some(block) => {
            block.payload = payload;
            block.is_visible = is_visible;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn titles(blocks: &[ContentBlock]) -> Vec<String> {
        blocks
            .iter()
            .map(|block| match &block.payload {
                BlockPayload::Link(link) => link.title.clone(),
                _ => String::new(),
            })
            .collect()
    }

    #[test]
    fn test_block_type_parsing() {
        for block_type in BlockType::ALL {
            assert_eq!(block_type.as_str().parse::<BlockType>(), Ok(block_type));
        }
        assert!("carousel".parse::<BlockType>().is_err());
    }

    #[test]
    fn test_link_content_shape() {
        let block = ContentBlock::new(BlockPayload::Link(LinkBlock {
            title: "Blog".to_string(),
            url: "https://example.com".to_string(),
            description: Some("Posts".to_string()),
            icon: None,
        }));

        assert_eq!(
            block.content().unwrap(),
            json!({
                "title": "Blog",
                "url": "https://example.com",
                "description": "Posts",
                "isVisible": true
            })
        );
    }

    #[test]
    fn test_from_stored_reads_camel_case_fields() {
        let block = ContentBlock::from_stored(
            BlockId::from_row_id(12),
            BlockType::Embed,
            json!({
                "url": "https://codepen.io/a/embed/b",
                "title": "Pen",
                "embedType": "iframe",
                "isVisible": false,
                "kudos": 4
            }),
        )
        .unwrap();

        assert_eq!(block.id.as_str(), "12");
        assert_eq!(block.id.row_id(), Some(12));
        assert!(!block.is_visible);
        assert_eq!(block.kudos, 4);
        assert_eq!(
            block.payload,
            BlockPayload::Embed(EmbedBlock {
                url: "https://codepen.io/a/embed/b".to_string(),
                title: Some("Pen".to_string()),
                embed_type: EmbedKind::Iframe,
            })
        );
        assert!(block.extra.is_empty());
    }

    #[test]
    fn test_unknown_keys_survive_a_round_trip() {
        let stored = json!({
            "title": "Shots",
            "images": [{"url": "https://img.example.com/1.png", "alt": "one", "caption": ""}],
            "layout": "grid"
        });
        let block =
            ContentBlock::from_stored(BlockId::from_row_id(1), BlockType::Gallery, stored).unwrap();

        assert_eq!(block.extra.get("layout"), Some(&json!("grid")));
        let content = block.content().unwrap();
        assert_eq!(content["layout"], json!("grid"));
        assert_eq!(content["images"][0]["alt"], json!("one"));
        assert_eq!(content["isVisible"], json!(true));
    }

    #[test]
    fn test_missing_visibility_defaults_to_visible() {
        let block =
            ContentBlock::from_stored(BlockId::from_row_id(2), BlockType::Spotlight, json!({}))
                .unwrap();
        assert!(block.is_visible);
        assert_eq!(block.kudos, 0);
    }

    #[test]
    fn test_non_object_content_is_rejected() {
        assert!(
            ContentBlock::from_stored(BlockId::from_row_id(3), BlockType::Link, json!([1, 2]))
                .is_err()
        );
    }

    #[test]
    fn test_to_json_is_flat() {
        let block = ContentBlock::link("Home", "https://example.com");
        let value = block.to_json().unwrap();
        assert_eq!(value["type"], json!("link"));
        assert_eq!(value["id"], json!(block.id.as_str()));
        assert_eq!(value["title"], json!("Home"));
    }

    #[test]
    fn test_move_block() {
        let mut blocks = vec![
            ContentBlock::link("A", "https://a.example"),
            ContentBlock::link("B", "https://b.example"),
            ContentBlock::link("C", "https://c.example"),
        ];

        assert!(move_block(&mut blocks, 0, 1));
        assert_eq!(titles(&blocks), vec!["B", "A", "C"]);

        assert!(move_block(&mut blocks, 0, 10));
        assert_eq!(titles(&blocks), vec!["A", "C", "B"]);

        assert!(!move_block(&mut blocks, 3, 0));
    }

    #[test]
    fn test_remove_and_replace() {
        let mut blocks = vec![
            ContentBlock::link("A", "https://a.example"),
            ContentBlock::link("B", "https://b.example"),
        ];
        let id = blocks[0].id.clone();

        assert!(replace_block(
            &mut blocks,
            &id,
            BlockPayload::Link(LinkBlock {
                title: "A2".to_string(),
                url: "https://a2.example".to_string(),
                ..LinkBlock::default()
            }),
            false,
        ));
        assert_eq!(blocks[0].id, id);
        assert!(!blocks[0].is_visible);

        let removed = remove_block(&mut blocks, &id).unwrap();
        assert_eq!(titles(&[removed]), vec!["A2"]);
        assert_eq!(titles(&blocks), vec!["B"]);
        assert!(remove_block(&mut blocks, &id).is_none());
    }

    #[test]
    fn test_iframe_embed_requires_trust() {
        let engine = TrustEngine::default();
        let block = EmbedBlock::iframe(
            &engine,
            r#"<iframe src="https://codepen.io/a/embed/b"></iframe>"#,
            None,
        )
        .unwrap();
        assert_eq!(block.url, "https://codepen.io/a/embed/b");
        assert_eq!(block.embed_type, EmbedKind::Iframe);

        assert!(EmbedBlock::iframe(&engine, "https://evil.example.com/", None).is_err());
    }
}
