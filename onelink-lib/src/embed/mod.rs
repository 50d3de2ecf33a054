//! Embed trust engine.
//!
//! Turns free-form embed input (a URL or a pasted `<iframe>` snippet) into a
//! single trusted URL, or rejects it. Untrusted markup is never passed
//! through: the only thing kept from pasted HTML is the iframe `src`, and
//! frames are always rebuilt from scratch by [`TrustEngine::build_frame`].

mod allow_list;
mod extract;
mod frame;
mod player;

pub use allow_list::{AllowList, DEFAULT_TRUSTED_DOMAINS};
pub use frame::{EmbedFrame, FrameOptions, FRAME_ALLOW, FRAME_REFERRER_POLICY, FRAME_SANDBOX};
pub use player::{EmbedRender, MediaPlayers, PlayerCapability};

use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

use crate::config::EmbedConfig;
use crate::error::EmbedError;
use extract::extract_iframe_src;

/// An absolute http(s) URL whose host is on the allow-list.
///
/// Only [`TrustEngine::classify`] produces these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedEmbed {
    url: Url,
}

impl TrustedEmbed {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn into_string(self) -> String {
        self.url.into()
    }
}

impl fmt::Display for TrustedEmbed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl Serialize for TrustedEmbed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.url.as_str())
    }
}

/// Stateless classifier for embed input.
///
/// Holds only the allow-list and frame defaults; safe to share across tasks.
#[derive(Debug, Clone, Default)]
pub struct TrustEngine {
    allow_list: AllowList,
    frame_defaults: FrameOptions,
}

impl TrustEngine {
    pub fn new(allow_list: AllowList) -> Self {
        Self {
            allow_list,
            frame_defaults: FrameOptions::default(),
        }
    }

    /// Build an engine from the `embed` section of the configuration
    pub fn from_config(config: &EmbedConfig) -> Self {
        Self {
            allow_list: AllowList::new(&config.trusted_domains),
            frame_defaults: FrameOptions::from(&config.frame),
        }
    }

    /// Replace the default frame options used by [`TrustEngine::plan_embed`]
    pub fn with_frame_defaults(mut self, options: FrameOptions) -> Self {
        self.frame_defaults = options;
        self
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    pub fn frame_defaults(&self) -> &FrameOptions {
        &self.frame_defaults
    }

    /// Classify raw embed input.
    ///
    /// A trimmed input that parses as an absolute URL is the candidate.
    /// Anything else is read as HTML and the first iframe's `src` becomes the
    /// candidate. The candidate must be an absolute http(s) URL whose host is
    /// on the allow-list.
    pub fn classify(&self, raw: &str) -> Result<TrustedEmbed, EmbedError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmbedError::NoUrlFound);
        }

        let candidate = match Url::parse(trimmed) {
            Ok(url) => url,
            Err(_) => {
                // Not a direct URL, look for an iframe
                let src = extract_iframe_src(trimmed).ok_or(EmbedError::NoUrlFound)?;
                Url::parse(&src).map_err(|err| EmbedError::InvalidUrl {
                    candidate: src.clone(),
                    reason: err.to_string(),
                })?
            }
        };

        self.check(candidate)
    }

    /// True when `url` is an absolute http(s) URL on the allow-list
    pub fn is_trusted(&self, url: &str) -> bool {
        Url::parse(url.trim())
            .ok()
            .map(|url| self.check(url).is_ok())
            .unwrap_or(false)
    }

    /// Describe a sandboxed iframe for a URL that already passed [`classify`].
    ///
    /// Trust is checked again against the current allow-list, so rows stored
    /// under a wider list are refused here.
    ///
    /// [`classify`]: TrustEngine::classify
    pub fn build_frame(&self, url: &str, options: &FrameOptions) -> Result<EmbedFrame, EmbedError> {
        let parsed = Url::parse(url.trim()).map_err(|err| EmbedError::InvalidUrl {
            candidate: url.to_string(),
            reason: err.to_string(),
        })?;
        let trusted = self.check(parsed)?;

        Ok(EmbedFrame::new(trusted.into_string(), options))
    }

    /// Decide how a stored embed URL is displayed.
    ///
    /// Player-capable URLs go to the player without an allow-list check.
    /// Everything else must pass the allow-list to be framed.
    pub fn plan_embed(
        &self,
        url: &str,
        title: Option<&str>,
        players: &dyn PlayerCapability,
    ) -> EmbedRender {
        if players.can_play(url) {
            return EmbedRender::Player {
                url: url.trim().to_string(),
            };
        }

        let options = self.frame_defaults.clone().with_title(title);
        match self.build_frame(url, &options) {
            Ok(frame) => EmbedRender::Frame(frame),
            Err(reason) => {
                tracing::debug!(url, %reason, "embed blocked at render time");
                EmbedRender::Blocked {
                    url: url.to_string(),
                    reason,
                }
            }
        }
    }

    fn check(&self, url: Url) -> Result<TrustedEmbed, EmbedError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(EmbedError::InvalidUrl {
                candidate: url.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => {
                return Err(EmbedError::InvalidUrl {
                    candidate: url.to_string(),
                    reason: "URL has no host".to_string(),
                })
            }
        };

        if !self.allow_list.permits(host) {
            return Err(EmbedError::UntrustedDomain {
                host: host.to_string(),
            });
        }

        Ok(TrustedEmbed { url })
    }
}
