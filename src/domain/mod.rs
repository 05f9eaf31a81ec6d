//! Domain types for the quill pipeline.
//!
//! This module contains the core data structures:
//! - Insight / CreationConfig: pipeline inputs
//! - Article / FinalArticle: generated text
//! - PlacementPlan: where illustrations go
//! - ImageResult: per-placement illustration outcome
//! - ProgressEvent: the observer protocol

pub mod article;
pub mod events;
pub mod image;
pub mod insight;
pub mod placement;

// Re-export commonly used types
pub use article::{Article, FinalArticle};
pub use events::{CompletePayload, ImageStatus, ProgressEvent};
pub use image::{
    ImageGenerationResult, ImageRequest, ImageResult, ImageSize, DEFAULT_PLACEHOLDER_URL,
};
pub use insight::{ContentStyle, CreationConfig, Insight, Tone};
pub use placement::{
    Placement, PlacementPlan, PlacementSource, MAX_SUGGESTED_IMAGES, MIN_SUGGESTED_IMAGES,
};
