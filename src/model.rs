//! Durable reading state: locations, settings and the persisted record.
//!
//! A [`Location`] is the only thing that survives a session. Pages are never
//! stored; a restored `Location::Page` is re-clamped against a fresh
//! pagination before it is shown.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Smallest accepted font scale, in percent.
pub const FONT_SCALE_MIN: u16 = 90;
/// Largest accepted font scale, in percent.
pub const FONT_SCALE_MAX: u16 = 150;
/// Font scale used when nothing else is configured.
pub const FONT_SCALE_DEFAULT: u16 = 100;

/// Durable pointer to the reader's position.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// Reflowed text: 0-based chapter and page within that chapter.
    Page {
        /// 0-based chapter index.
        chapter: usize,
        /// 0-based page index under the settings it was produced with.
        page: usize,
    },
    /// Flowing document: opaque position token owned by the rendering surface.
    Token {
        /// Document-native position (CFI-like).
        token: String,
    },
}

impl Location {
    /// First page of the first chapter.
    pub const fn start() -> Self {
        Location::Page {
            chapter: 0,
            page: 0,
        }
    }

    /// Chapter index, when this is a paged location.
    pub fn chapter(&self) -> Option<usize> {
        match self {
            Location::Page { chapter, .. } => Some(*chapter),
            Location::Token { .. } => None,
        }
    }

    /// Position token, when this is a document location.
    pub fn token(&self) -> Option<&str> {
        match self {
            Location::Token { token } => Some(token),
            Location::Page { .. } => None,
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::start()
    }
}

/// Color theme identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Theme {
    /// Light background.
    #[default]
    Light,
    /// Dark background.
    Dark,
    /// Warm paper tone.
    Beige,
    /// Dark brown night tone.
    Brown,
}

impl Theme {
    /// Parse a theme name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "beige" => Some(Theme::Beige),
            "brown" => Some(Theme::Brown),
            _ => None,
        }
    }

    /// Lowercase name as stored.
    pub fn name(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Beige => "beige",
            Theme::Brown => "brown",
        }
    }
}

/// User-tunable reader settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Font scale in percent, kept within `[FONT_SCALE_MIN, FONT_SCALE_MAX]`.
    pub font_scale: u16,
    /// Color theme.
    pub theme: Theme,
    /// Whether the description/info panel is collapsed.
    pub panel_collapsed: bool,
    /// Whether the one-time swipe hint has been dismissed.
    pub hint_shown: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font_scale: FONT_SCALE_DEFAULT,
            theme: Theme::Light,
            panel_collapsed: false,
            hint_shown: false,
        }
    }
}

impl Settings {
    /// Copy with a font scale clamped into the accepted range.
    pub fn with_font_scale(mut self, percent: u16) -> Self {
        self.font_scale = percent.clamp(FONT_SCALE_MIN, FONT_SCALE_MAX);
        self
    }

    /// Copy with another theme.
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// Copy with the panel toggle set.
    pub fn with_panel_collapsed(mut self, collapsed: bool) -> Self {
        self.panel_collapsed = collapsed;
        self
    }

    /// Same settings with the font scale forced into range.
    pub fn normalized(self) -> Self {
        self.with_font_scale(self.font_scale)
    }

    /// True when switching from `self` to `other` can change page boundaries.
    ///
    /// Theme counts: it reaches the adapter through
    /// [`FontConfig`](crate::FontConfig) since themes may swap the font face.
    /// The panel counts because it changes the container the host reports.
    /// The hint flag does not.
    pub fn affects_layout(&self, other: &Settings) -> bool {
        self.font_scale != other.font_scale
            || self.theme != other.theme
            || self.panel_collapsed != other.panel_collapsed
    }
}

/// Serialized `{location, settings}` pair written to a backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceRecord {
    /// Last read location.
    pub location: Location,
    /// Settings in effect when the location was produced. Absent for records
    /// written by clients that only stored a position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

impl PersistenceRecord {
    /// Record carrying both location and settings.
    pub fn new(location: Location, settings: Settings) -> Self {
        Self {
            location,
            settings: Some(settings),
        }
    }

    /// Record carrying only a location.
    pub fn location_only(location: Location) -> Self {
        Self {
            location,
            settings: None,
        }
    }

    /// Serialize to the JSON string stored in backends.
    pub fn encode(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a stored value.
    ///
    /// Accepts the JSON record, a bare 1-based chapter number, or a raw
    /// document position token.
    pub fn decode(raw: &str) -> Result<Self, StoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StoreError::Corrupt("empty value".to_string()));
        }
        if trimmed.starts_with('{') {
            return Ok(serde_json::from_str(trimmed)?);
        }
        if let Ok(chapter_number) = trimmed.parse::<u64>() {
            let chapter = chapter_number.saturating_sub(1) as usize;
            return Ok(Self::location_only(Location::Page { chapter, page: 0 }));
        }
        Ok(Self::location_only(Location::Token {
            token: trimmed.to_string(),
        }))
    }
}
