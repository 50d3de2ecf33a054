use regex::RegexSet;
use serde::Serialize;
use std::sync::OnceLock;

use super::frame::EmbedFrame;
use crate::error::EmbedError;

/// Answers whether a rich inline media player exists for a URL.
///
/// Player-capable URLs are rendered through the player instead of an iframe
/// and are not gated by the allow-list.
pub trait PlayerCapability: Send + Sync {
    fn can_play(&self, url: &str) -> bool;
}

impl<F> PlayerCapability for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn can_play(&self, url: &str) -> bool {
        self(url)
    }
}

static PLAYER_PATTERNS: OnceLock<RegexSet> = OnceLock::new();

const PATTERNS: &[&str] = &[
    // YouTube
    r"(?i)^https?://(?:www\.|m\.|music\.)?(?:youtube\.com|youtube-nocookie\.com)/(?:watch\?|embed/|shorts/|live/|playlist\?|v/)",
    r"(?i)^https?://youtu\.be/[\w-]+",
    // Vimeo
    r"(?i)^https?://(?:www\.|player\.)?vimeo\.com/(?:video/)?\d+",
    // Spotify
    r"(?i)^https?://open\.spotify\.com/(?:embed/)?(?:track|album|playlist|episode|show|artist)/\w+",
    // SoundCloud
    r"(?i)^https?://(?:www\.|m\.)?soundcloud\.com/[\w-]+/[\w-]+",
    r"(?i)^https?://on\.soundcloud\.com/\w+",
    // Twitch
    r"(?i)^https?://(?:www\.|clips\.|m\.)?twitch\.tv/[\w-]+",
    // Dailymotion
    r"(?i)^https?://(?:www\.)?dailymotion\.com/video/\w+",
    r"(?i)^https?://dai\.ly/\w+",
    // Facebook video
    r"(?i)^https?://(?:www\.|m\.)?facebook\.com/.+/videos/\d+",
    r"(?i)^https?://fb\.watch/\w+",
    // Mixcloud
    r"(?i)^https?://(?:www\.)?mixcloud\.com/[^/]+/[^/]+",
    // Wistia
    r"(?i)^https?://[\w-]+\.(?:wistia\.(?:com|net)|wi\.st)/(?:medias|embed)/",
    // Vidyard
    r"(?i)^https?://(?:[\w-]+\.)?vidyard\.com/(?:watch/)?[\w-]+",
    // Direct media files
    r"(?i)^https?://[^?#]+\.(?:mp4|webm|ogv|ogg|mov|m4v|mp3|wav|m4a|flac|aac|oga|m3u8|mpd)(?:[?#].*)?$",
];

/// Recognises the providers a typical web media player component supports
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaPlayers;

impl PlayerCapability for MediaPlayers {
    fn can_play(&self, url: &str) -> bool {
        PLAYER_PATTERNS
            .get_or_init(|| RegexSet::new(PATTERNS).expect("player URL patterns are valid"))
            .is_match(url.trim())
    }
}

/// How the public page should display an embed block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "render", rename_all = "snake_case")]
pub enum EmbedRender {
    /// Hand the URL to the media player
    Player { url: String },
    /// Show the sandboxed iframe
    Frame(EmbedFrame),
    /// Refuse to display; the URL is not trusted (any more)
    Blocked {
        url: String,
        #[serde(serialize_with = "serialize_reason")]
        reason: EmbedError,
    },
}

fn serialize_reason<S>(reason: &EmbedError, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(reason)
}
