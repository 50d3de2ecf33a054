//! Closed theme and font catalogue.
//!
//! Stored theme settings are a free-form JSON bag; the ids inside it are
//! mapped onto a fixed table of style descriptors here. Unknown ids fall back
//! to the default theme and font.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeId {
    EtherealGlass,
    NeoBrutalist,
    CosmicDrift,
    ArtDeco,
    ZenGarden,
    #[default]
    #[serde(other)]
    Default,
}

impl ThemeId {
    pub const ALL: [ThemeId; 6] = [
        ThemeId::Default,
        ThemeId::EtherealGlass,
        ThemeId::NeoBrutalist,
        ThemeId::CosmicDrift,
        ThemeId::ArtDeco,
        ThemeId::ZenGarden,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeId::Default => "default",
            ThemeId::EtherealGlass => "ethereal-glass",
            ThemeId::NeoBrutalist => "neo-brutalist",
            ThemeId::CosmicDrift => "cosmic-drift",
            ThemeId::ArtDeco => "art-deco",
            ThemeId::ZenGarden => "zen-garden",
        }
    }

    /// Parse a stored id; anything unknown is the default theme
    pub fn from_id(id: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|theme| theme.as_str() == id)
            .unwrap_or_default()
    }

    pub fn style(&self) -> &'static StyleDescriptor {
        match self {
            ThemeId::Default => &DEFAULT_STYLE,
            ThemeId::EtherealGlass => &ETHEREAL_GLASS,
            ThemeId::NeoBrutalist => &NEO_BRUTALIST,
            ThemeId::CosmicDrift => &COSMIC_DRIFT,
            ThemeId::ArtDeco => &ART_DECO,
            ThemeId::ZenGarden => &ZEN_GARDEN,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontId {
    Roboto,
    Poppins,
    Playfair,
    Mono,
    EtherDisplay,
    EtherUi,
    BrutalDisplay,
    BrutalUi,
    CosmicDisplay,
    CosmicUi,
    DecoDisplay,
    DecoUi,
    ZenDisplay,
    ZenUi,
    #[default]
    #[serde(other)]
    Inter,
}

impl FontId {
    /// Style token for the font family
    pub fn class(&self) -> &'static str {
        match self {
            FontId::Inter | FontId::Roboto | FontId::Poppins => "font-sans",
            FontId::Playfair => "font-serif",
            FontId::Mono => "font-mono",
            FontId::EtherDisplay => "font-ether-display",
            FontId::EtherUi => "font-ether-ui",
            FontId::BrutalDisplay => "font-brutal-display",
            FontId::BrutalUi => "font-brutal-ui",
            FontId::CosmicDisplay => "font-cosmic-display",
            FontId::CosmicUi => "font-cosmic-ui",
            FontId::DecoDisplay => "font-deco-display",
            FontId::DecoUi => "font-deco-ui",
            FontId::ZenDisplay => "font-zen-display",
            FontId::ZenUi => "font-zen-ui",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub background: &'static str,
    pub primary: &'static str,
    pub text: &'static str,
}

/// Style tokens for one theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleDescriptor {
    pub palette: Palette,
    pub display_font: &'static str,
    pub ui_font: &'static str,
    pub page: &'static str,
    pub card: &'static str,
    pub text_primary: &'static str,
    pub text_secondary: &'static str,
    pub heading: &'static str,
    pub button: &'static str,
    pub link: &'static str,
}

static DEFAULT_STYLE: StyleDescriptor = StyleDescriptor {
    palette: Palette {
        background: "#FDF6E3",
        primary: "#40B5A1",
        text: "#36454F",
    },
    display_font: "font-serif",
    ui_font: "font-mono",
    page: "bg-parchment",
    card: "bg-parchment border-2 border-ink shadow-sharp",
    text_primary: "text-charcoal font-mono",
    text_secondary: "text-ink font-mono",
    heading: "text-charcoal font-serif",
    button: "bg-verdigris text-parchment font-mono shadow-sharp-sm",
    link: "bg-parchment border-2 border-ink shadow-sharp text-charcoal font-mono",
};

static ETHEREAL_GLASS: StyleDescriptor = StyleDescriptor {
    palette: Palette {
        background: "#E8F1F2",
        primary: "#8E44AD",
        text: "#2C3E50",
    },
    display_font: "font-ether-display",
    ui_font: "font-ether-ui",
    page: "bg-ether-bg",
    card: "bg-ether-card backdrop-blur-md border border-ether-border rounded-xl shadow-ether-glow",
    text_primary: "text-ether-text-dark font-ether-display",
    text_secondary: "text-ether-text-light font-ether-ui",
    heading: "text-ether-text-dark font-ether-display",
    button: "bg-ether-accent text-white font-ether-ui rounded-md",
    link: "bg-ether-card backdrop-blur-sm border border-ether-border rounded-lg text-ether-text-dark font-ether-ui",
};

static NEO_BRUTALIST: StyleDescriptor = StyleDescriptor {
    palette: Palette {
        background: "#222222",
        primary: "#FF6B6B",
        text: "#FFFFFF",
    },
    display_font: "font-brutal-display",
    ui_font: "font-brutal-ui",
    page: "bg-brutal-bg",
    card: "bg-brutal-surface border-2 border-brutal-border rounded-brutal-none shadow-brutal-sharp",
    text_primary: "text-brutal-text-main font-brutal-ui",
    text_secondary: "text-brutal-text-secondary font-brutal-ui",
    heading: "text-brutal-text-main font-brutal-display uppercase",
    button: "bg-brutal-accent text-brutal-bg font-brutal-ui rounded-brutal-none font-bold",
    link: "bg-brutal-surface border-2 border-brutal-border rounded-brutal-none text-brutal-text-main font-brutal-ui",
};

static COSMIC_DRIFT: StyleDescriptor = StyleDescriptor {
    palette: Palette {
        background: "#1A0033",
        primary: "#00FFFF",
        text: "#E0E0FF",
    },
    display_font: "font-cosmic-display",
    ui_font: "font-cosmic-ui",
    page: "bg-gradient-to-br from-cosmic-start via-cosmic-mid to-cosmic-end",
    card: "bg-cosmic-card rounded-lg border border-cosmic-mid/50 shadow-cosmic-glow",
    text_primary: "text-cosmic-text-light font-cosmic-ui",
    text_secondary: "text-cosmic-text-dark font-cosmic-ui",
    heading: "text-cosmic-text-light font-cosmic-display",
    button: "bg-cosmic-accent text-cosmic-start font-cosmic-display rounded-full",
    link: "bg-cosmic-card rounded-md border border-cosmic-mid/70 text-cosmic-text-light font-cosmic-ui",
};

static ART_DECO: StyleDescriptor = StyleDescriptor {
    palette: Palette {
        background: "#1E282D",
        primary: "#DAA520",
        text: "#F5F5F5",
    },
    display_font: "font-deco-display",
    ui_font: "font-deco-ui",
    page: "bg-deco-bg",
    card: "bg-deco-surface border-4 border-deco-text-gold rounded-md shadow-deco-frame",
    text_primary: "text-deco-text-main font-deco-ui",
    text_secondary: "text-deco-text-silver font-deco-ui",
    heading: "text-deco-text-gold font-deco-display",
    button: "bg-deco-accent-sapphire text-deco-text-gold font-deco-ui rounded-sm",
    link: "bg-deco-surface border border-deco-accent-emerald text-deco-text-main font-deco-ui",
};

static ZEN_GARDEN: StyleDescriptor = StyleDescriptor {
    palette: Palette {
        background: "#F4F4EB",
        primary: "#6B8E23",
        text: "#3C403D",
    },
    display_font: "font-zen-display",
    ui_font: "font-zen-ui",
    page: "bg-zen-bg",
    card: "bg-zen-surface border border-zen-border rounded-xl shadow-zen-soft",
    text_primary: "text-zen-text-dark font-zen-ui",
    text_secondary: "text-zen-text-muted font-zen-ui",
    heading: "text-zen-text-dark font-zen-display",
    button: "bg-zen-accent-green text-white font-zen-ui rounded-full",
    link: "bg-zen-surface border border-zen-border rounded-lg text-zen-text-dark font-zen-ui",
};

/// The `theme_settings` bag stored on a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSettings {
    #[serde(default)]
    pub theme: ThemeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<FontId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThemeSettings {
    /// Read a stored bag without failing; malformed known keys are dropped
    pub fn from_value(value: &Value) -> Self {
        if value.is_null() {
            return Self::default();
        }

        match serde_json::from_value::<ThemeSettings>(value.clone()) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring malformed theme settings");
                let mut extra = match value {
                    Value::Object(map) => map.clone(),
                    _ => Map::new(),
                };
                for key in ["theme", "font", "primaryColor", "backgroundColor", "textColor"] {
                    extra.remove(key);
                }
                let theme = value
                    .get("theme")
                    .and_then(Value::as_str)
                    .map(ThemeId::from_id)
                    .unwrap_or_default();
                Self {
                    theme,
                    extra,
                    ..Self::default()
                }
            }
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    pub fn style(&self) -> &'static StyleDescriptor {
        self.theme.style()
    }

    /// Theme palette with the stored colour overrides applied
    pub fn effective_palette(&self) -> (String, String, String) {
        let palette = &self.style().palette;
        (
            self.background_color
                .clone()
                .unwrap_or_else(|| palette.background.to_string()),
            self.primary_color
                .clone()
                .unwrap_or_else(|| palette.primary.to_string()),
            self.text_color
                .clone()
                .unwrap_or_else(|| palette.text.to_string()),
        )
    }

    pub fn font_class(&self) -> &'static str {
        self.font.unwrap_or_default().class()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_theme_ids() {
        for theme in ThemeId::ALL {
            assert_eq!(ThemeId::from_id(theme.as_str()), theme);
        }
        assert_eq!(ThemeId::from_id("vaporwave"), ThemeId::Default);
    }

    #[test]
    fn test_settings_parse_and_preserve_unknown_keys() {
        let settings = ThemeSettings::from_value(&json!({
            "theme": "art-deco",
            "font": "deco-display",
            "primaryColor": "#123456",
            "buttonShape": "pill"
        }));

        assert_eq!(settings.theme, ThemeId::ArtDeco);
        assert_eq!(settings.font, Some(FontId::DecoDisplay));
        assert_eq!(settings.font_class(), "font-deco-display");
        assert_eq!(settings.extra.get("buttonShape"), Some(&json!("pill")));

        let stored = settings.to_value();
        assert_eq!(stored["theme"], json!("art-deco"));
        assert_eq!(stored["primaryColor"], json!("#123456"));
        assert_eq!(stored["buttonShape"], json!("pill"));
    }

    #[test]
    fn test_unknown_ids_fall_back() {
        let settings = ThemeSettings::from_value(&json!({ "theme": "vaporwave", "font": "comic" }));
        assert_eq!(settings.theme, ThemeId::Default);
        assert_eq!(settings.font_class(), "font-sans");
    }

    #[test]
    fn test_ids_deserialize_with_fallback() {
        let theme: ThemeId = serde_json::from_value(json!("cosmic-drift")).unwrap();
        assert_eq!(theme, ThemeId::CosmicDrift);
        let theme: ThemeId = serde_json::from_value(json!("vaporwave")).unwrap();
        assert_eq!(theme, ThemeId::Default);
        let font: FontId = serde_json::from_value(json!("comic")).unwrap();
        assert_eq!(font, FontId::Inter);

        assert_eq!(serde_json::to_value(ThemeId::Default).unwrap(), json!("default"));
        assert_eq!(serde_json::to_value(FontId::Inter).unwrap(), json!("inter"));

        let settings = ThemeSettings::from_value(&json!({ "theme": "vaporwave", "font": "comic" }));
        assert_eq!(settings.font, Some(FontId::Inter));
        assert_eq!(settings.to_value()["theme"], json!("default"));
    }

    #[test]
    fn test_malformed_settings_do_not_fail() {
        let settings = ThemeSettings::from_value(&json!({ "theme": "zen-garden", "primaryColor": 7 }));
        assert_eq!(settings.theme, ThemeId::ZenGarden);
        assert_eq!(settings.primary_color, None);

        assert_eq!(ThemeSettings::from_value(&Value::Null), ThemeSettings::default());
    }

    #[test]
    fn test_overrides_win_over_palette() {
        let settings = ThemeSettings {
            theme: ThemeId::NeoBrutalist,
            text_color: Some("#000000".to_string()),
            ..ThemeSettings::default()
        };
        let (background, primary, text) = settings.effective_palette();
        assert_eq!(background, "#222222");
        assert_eq!(primary, "#FF6B6B");
        assert_eq!(text, "#000000");
    }
}
