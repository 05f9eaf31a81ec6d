//! Core pipeline logic.
//!
//! This module contains:
//! - Prompt: image prompt synthesis, validation and optimization
//! - Placement: placement parsing, heuristic fallback and analysis
//! - ImageClient: retrying, batching image generation
//! - Assembler: splicing illustrations into the text
//! - Orchestrator: the four-stage pipeline
//! - RunLog: append-only per-run event log

pub mod article;
pub mod assembler;
pub mod error;
pub mod extract;
pub mod image_client;
pub mod orchestrator;
pub mod placement;
pub mod progress;
pub mod prompt;
pub mod run_log;

// Re-export commonly used types
pub use article::{parse_article_response, ArticleParse};
pub use assembler::{assemble, image_markup, split_paragraphs, ImageInsertion};
pub use error::PipelineError;
pub use image_client::{BatchSettings, BatchUpdate, ImageClient, RetryPolicy, Sleeper, TokioSleeper};
pub use orchestrator::{ContentPipeline, PipelineOutcome, PipelineStage};
pub use placement::{default_placement, parse_placement_response, PlacementAnalyzer, PlacementParse};
pub use progress::ProgressEmitter;
pub use prompt::{classify_scene, optimize, synthesize, validate, PromptIssue, PromptValidation, SceneType};
pub use run_log::{RecordedEvent, RunLog};
