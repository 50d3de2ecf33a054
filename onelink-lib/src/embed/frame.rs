use maud::html;
use serde::Serialize;

use crate::config::{FrameConfig, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_TITLE, DEFAULT_FRAME_WIDTH};

/// Browser features granted to embedded frames.
/// Camera, microphone and geolocation are never granted.
pub const FRAME_ALLOW: &[&str] = &[
    "accelerometer",
    "autoplay",
    "clipboard-write",
    "encrypted-media",
    "gyroscope",
    "picture-in-picture",
    "web-share",
];

/// Sandbox tokens applied to embedded frames
pub const FRAME_SANDBOX: &[&str] = &[
    "allow-scripts",
    "allow-same-origin",
    "allow-popups",
    "allow-popups-to-escape-sandbox",
    "allow-presentation",
    "allow-forms",
];

pub const FRAME_REFERRER_POLICY: &str = "strict-origin-when-cross-origin";

/// Caller-provided presentation options for a generated iframe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOptions {
    pub width: String,
    pub height: String,
    pub title: String,
    pub allow_fullscreen: bool,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_FRAME_WIDTH.to_string(),
            height: DEFAULT_FRAME_HEIGHT.to_string(),
            title: DEFAULT_FRAME_TITLE.to_string(),
            allow_fullscreen: true,
        }
    }
}

impl From<&FrameConfig> for FrameOptions {
    fn from(config: &FrameConfig) -> Self {
        Self {
            width: config.width.clone(),
            height: config.height.clone(),
            title: config.title.clone(),
            allow_fullscreen: config.allow_fullscreen,
        }
    }
}

impl FrameOptions {
    /// Same options with a different accessible title; blank titles keep the default
    pub fn with_title(mut self, title: Option<&str>) -> Self {
        if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
            self.title = title.to_string();
        }
        self
    }
}

/// A sandboxed iframe for a URL that passed the trust check.
///
/// Only [`crate::TrustEngine::build_frame`] creates these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedFrame {
    src: String,
    width: String,
    height: String,
    title: String,
    allow_fullscreen: bool,
}

impl EmbedFrame {
    pub(crate) fn new(src: String, options: &FrameOptions) -> Self {
        Self {
            src,
            width: options.width.clone(),
            height: options.height.clone(),
            title: options.title.clone(),
            allow_fullscreen: options.allow_fullscreen,
        }
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn width(&self) -> &str {
        &self.width
    }

    pub fn height(&self) -> &str {
        &self.height
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn allow_fullscreen(&self) -> bool {
        self.allow_fullscreen
    }

    pub fn allow(&self) -> String {
        FRAME_ALLOW.join("; ")
    }

    pub fn sandbox(&self) -> String {
        FRAME_SANDBOX.join(" ")
    }

    /// Render the frame as escaped HTML
    pub fn to_html(&self) -> String {
        html! {
            iframe
                src=(self.src)
                width=(self.width)
                height=(self.height)
                frameborder="0"
                allow=(self.allow())
                sandbox=(self.sandbox())
                title=(self.title)
                loading="lazy"
                referrerpolicy=(FRAME_REFERRER_POLICY)
                allowfullscreen[self.allow_fullscreen] {}
        }
        .into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_carries_restrictions() {
        let frame = EmbedFrame::new(
            "https://www.youtube.com/embed/abc".to_string(),
            &FrameOptions::default(),
        );
        let markup = frame.to_html();

        assert!(markup.starts_with("<iframe"));
        assert!(markup.contains(r#"src="https://www.youtube.com/embed/abc""#));
        assert!(markup.contains(r#"width="100%""#));
        assert!(markup.contains(r#"height="400""#));
        assert!(markup.contains(r#"loading="lazy""#));
        assert!(markup.contains(r#"referrerpolicy="strict-origin-when-cross-origin""#));
        assert!(markup.contains(r#"title="Embedded content""#));
        assert!(markup.contains("allowfullscreen"));
        assert!(!markup.contains("camera"));
        assert!(!markup.contains("microphone"));
        assert!(!markup.contains("geolocation"));
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let options = FrameOptions::default().with_title(Some(r#"My "best" <clip>"#));
        let frame = EmbedFrame::new("https://vimeo.com/1?a=1&b=2".to_string(), &options);
        let markup = frame.to_html();

        assert!(markup.contains("a=1&amp;b=2"));
        assert!(markup.contains("My &quot;best&quot; &lt;clip&gt;"));
    }

    #[test]
    fn test_blank_title_keeps_default() {
        let options = FrameOptions::default().with_title(Some("   "));
        assert_eq!(options.title, DEFAULT_FRAME_TITLE);
    }

    #[test]
    fn test_fullscreen_can_be_disabled() {
        let options = FrameOptions {
            allow_fullscreen: false,
            ..FrameOptions::default()
        };
        let frame = EmbedFrame::new("https://codepen.io/x/embed/y".to_string(), &options);
        assert!(!frame.to_html().contains("allowfullscreen"));
    }
}
