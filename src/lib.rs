//! quill - Insight-to-illustrated-article generation pipeline
//!
//! Turns a content insight into a finished article with AI-generated
//! illustrations spliced in at recommended paragraphs.
//!
//! # Architecture
//!
//! A run moves through four stages, each reported as progress events:
//! - Text generation: title, summary and body from the text model
//! - Placement analysis: where illustrations belong, with an index-based
//!   fallback when the model's answer is unusable
//! - Image generation: bounded-concurrency batch with retries; failures
//!   become placeholders instead of aborting the run
//! - Assembly: illustrations inserted after their paragraphs
//!
//! # Modules
//!
//! - `adapters`: External capabilities (text model, image model, asset storage)
//! - `core`: Pipeline logic (Orchestrator, ImageClient, Placement, Prompt, RunLog)
//! - `domain`: Data structures (Insight, Article, PlacementPlan, ProgressEvent)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Generate an article, streaming progress as JSON lines
//! quill generate --insight insight.yaml --creation creation.yaml
//!
//! # Replay a recorded run
//! quill runs show <run-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use core::{ContentPipeline, ImageClient, PipelineError, PipelineOutcome, ProgressEmitter};
pub use domain::{
    CompletePayload, ContentStyle, CreationConfig, FinalArticle, ImageResult, Insight,
    PlacementPlan, ProgressEvent,
};
