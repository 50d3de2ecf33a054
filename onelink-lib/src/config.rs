use serde::{Deserialize, Serialize};

use crate::embed::DEFAULT_TRUSTED_DOMAINS;

/// Default iframe width when the config does not set one
pub const DEFAULT_FRAME_WIDTH: &str = "100%";
/// Default iframe height when the config does not set one
pub const DEFAULT_FRAME_HEIGHT: &str = "400";
/// Default accessible title for embedded frames
pub const DEFAULT_FRAME_TITLE: &str = "Embedded content";

/// Root structure for the YAML configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// PostgreSQL connection URL for the backend
    /// Overridden by the DATABASE_URL environment variable or --database-url
    #[serde(default)]
    pub database_url: Option<String>,
    /// Embed trust settings
    #[serde(default)]
    pub embed: EmbedConfig,
}

/// Embed trust configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedConfig {
    /// Domains allowed inside iframes; a host matches when it equals an entry
    /// or is a subdomain of one
    /// Defaults to the built-in provider list
    #[serde(default = "default_trusted_domains")]
    pub trusted_domains: Vec<String>,
    /// Defaults for generated iframes
    #[serde(default)]
    pub frame: FrameConfig,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            trusted_domains: default_trusted_domains(),
            frame: FrameConfig::default(),
        }
    }
}

/// Defaults applied to generated iframes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameConfig {
    #[serde(default = "default_frame_width")]
    pub width: String,
    #[serde(default = "default_frame_height")]
    pub height: String,
    #[serde(default = "default_frame_title")]
    pub title: String,
    #[serde(default = "default_true")]
    pub allow_fullscreen: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: default_frame_width(),
            height: default_frame_height(),
            title: default_frame_title(),
            allow_fullscreen: true,
        }
    }
}

fn default_trusted_domains() -> Vec<String> {
    DEFAULT_TRUSTED_DOMAINS
        .iter()
        .map(|domain| domain.to_string())
        .collect()
}

fn default_frame_width() -> String {
    DEFAULT_FRAME_WIDTH.to_string()
}

fn default_frame_height() -> String {
    DEFAULT_FRAME_HEIGHT.to_string()
}

fn default_frame_title() -> String {
    DEFAULT_FRAME_TITLE.to_string()
}

fn default_true() -> bool {
    true
}
