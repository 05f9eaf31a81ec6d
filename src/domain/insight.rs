//! Pipeline inputs supplied by the surrounding application.
//!
//! An [`Insight`] seeds the article; a [`CreationConfig`] drives both
//! generation stages. Both are read-only for the duration of a run.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Topic insight that seeds content generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    /// Working title of the topic
    #[serde(default)]
    pub title: String,

    /// Title proposed by the insight source (may be empty)
    #[serde(default)]
    pub suggested_title: String,

    /// Target direction of the piece
    #[serde(default)]
    pub direction: String,

    /// Intended readership
    #[serde(default)]
    pub audience: String,

    /// Angle the article should take
    #[serde(default)]
    pub angle: String,
}

impl Insight {
    /// Create an insight with only a title
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Title the article should be written under
    pub fn headline(&self) -> &str {
        if self.suggested_title.trim().is_empty() {
            &self.title
        } else {
            &self.suggested_title
        }
    }
}

/// Settings for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationConfig {
    /// Model used for article text and placement analysis
    #[serde(default)]
    pub text_model: String,

    /// Model used for illustrations (provider default if not set)
    #[serde(default)]
    pub image_model: Option<String>,

    /// When false the run completes right after text generation
    #[serde(default = "default_enable_images")]
    pub enable_images: bool,

    #[serde(default)]
    pub style: ContentStyle,

    /// Target length of the article in characters
    #[serde(default = "default_length_hint")]
    pub length_hint: u32,

    #[serde(default)]
    pub tone: Tone,

    #[serde(default)]
    pub custom_requirements: Option<String>,
}

fn default_enable_images() -> bool {
    true
}

fn default_length_hint() -> u32 {
    1500
}

impl Default for CreationConfig {
    fn default() -> Self {
        Self {
            text_model: String::new(),
            image_model: None,
            enable_images: default_enable_images(),
            style: ContentStyle::default(),
            length_hint: default_length_hint(),
            tone: Tone::default(),
            custom_requirements: None,
        }
    }
}

/// Visual and editorial style of the article.
///
/// Serialized as the display tag (e.g. `专业严谨`). Unrecognized tags are kept
/// as [`ContentStyle::Unknown`] and treated as professional downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ContentStyle {
    #[default]
    Professional,
    Casual,
    Storytelling,
    DataDriven,
    Creative,
    Unknown(String),
}

impl ContentStyle {
    /// Wire/display tag for this style
    pub fn tag(&self) -> &str {
        match self {
            Self::Professional => "专业严谨",
            Self::Casual => "轻松活泼",
            Self::Storytelling => "故事叙述",
            Self::DataDriven => "数据驱动",
            Self::Creative => "创意艺术",
            Self::Unknown(tag) => tag,
        }
    }

    /// Parse a display tag; never fails
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "专业严谨" | "professional" => Self::Professional,
            "轻松活泼" | "casual" => Self::Casual,
            "故事叙述" | "storytelling" => Self::Storytelling,
            "数据驱动" | "data" => Self::DataDriven,
            "创意艺术" | "creative" => Self::Creative,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ContentStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Serialize for ContentStyle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for ContentStyle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

/// Voice of the article
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Formal,
    Friendly,
    Humorous,
    Inspiring,
}

impl Tone {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Formal => "正式、客观",
            Self::Friendly => "亲切、自然",
            Self::Humorous => "幽默、风趣",
            Self::Inspiring => "激励、鼓舞人心",
        }
    }
}
