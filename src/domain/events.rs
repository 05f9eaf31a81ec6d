//! Progress events emitted to the pipeline observer.
//!
//! Each event serializes to a single JSON object with a `type` discriminator,
//! so a run can be streamed or recorded as newline-delimited JSON.

use serde::{Deserialize, Serialize};

use super::article::FinalArticle;
use super::image::ImageResult;

/// One unit of the live progress protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Stage/percentage transition
    Stage {
        stage: u8,
        message: String,
        progress: u8,
    },

    /// Free-text narration, advisory only
    Thinking { content: String },

    Title { content: String },

    Summary { content: String },

    /// Placement analysis finished
    Analysis {
        paragraphs: usize,
        #[serde(rename = "suggestedImages")]
        suggested_images: usize,
    },

    /// Image lifecycle for one placement (index = input order)
    Image {
        index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        status: ImageStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Fully assembled article body
    Content { content: String },

    /// Terminal success
    Complete { data: CompletePayload },

    /// Terminal failure
    Error { error: String },
}

impl ProgressEvent {
    pub fn stage(stage: u8, message: impl Into<String>, progress: u8) -> Self {
        Self::Stage {
            stage,
            message: message.into(),
            progress: progress.min(100),
        }
    }

    pub fn thinking(content: impl Into<String>) -> Self {
        Self::Thinking {
            content: content.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    pub fn image_generating(index: usize, prompt: &str) -> Self {
        Self::Image {
            index,
            prompt: Some(prompt.to_string()),
            url: None,
            status: ImageStatus::Generating,
            error: None,
        }
    }

    /// Terminal image event for a finished result
    pub fn image_finished(result: &ImageResult) -> Self {
        if result.success {
            Self::Image {
                index: result.placement_index,
                prompt: Some(result.prompt.clone()),
                url: Some(result.display_url()),
                status: ImageStatus::Success,
                error: None,
            }
        } else {
            Self::Image {
                index: result.placement_index,
                prompt: Some(result.prompt.clone()),
                url: Some(result.image_url.clone()),
                status: ImageStatus::Failed,
                error: result.error.clone(),
            }
        }
    }

    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Discriminator as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stage { .. } => "stage",
            Self::Thinking { .. } => "thinking",
            Self::Title { .. } => "title",
            Self::Summary { .. } => "summary",
            Self::Analysis { .. } => "analysis",
            Self::Image { .. } => "image",
            Self::Content { .. } => "content",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }
}

/// Lifecycle status of one image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Generating,
    Success,
    Failed,
}

/// Payload of the terminal `complete` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletePayload {
    pub content: FinalArticle,
    pub images: Vec<ImageResult>,
}
