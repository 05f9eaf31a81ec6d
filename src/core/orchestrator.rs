//! Main orchestrator for content generation runs.
//!
//! Drives the four stages in strict order, fans image generation out
//! through the [`ImageClient`] batch and reports every observable state
//! change as a [`ProgressEvent`]. A run ends with exactly one `complete`
//! or `error` event, or with silence if it was cancelled.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::TextGenerator;
use crate::domain::{
    Article, CompletePayload, CreationConfig, FinalArticle, ImageRequest, ImageResult, ImageSize,
    Insight, PlacementPlan, ProgressEvent,
};

use super::article::{article_prompts, parse_article_response, ArticleParse};
use super::assembler::{assemble, image_markup, ImageInsertion};
use super::error::PipelineError;
use super::image_client::{BatchUpdate, ImageClient};
use super::placement::PlacementAnalyzer;
use super::progress::ProgressEmitter;
use super::prompt::{classify_scene, synthesize};

/// Pipeline state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    TextGeneration,
    PlacementAnalysis,
    ImageGeneration,
    Assembly,
    Complete,
    Failed,
}

impl PipelineStage {
    /// Stage number on the progress protocol (terminal states have none)
    pub fn number(self) -> Option<u8> {
        match self {
            Self::TextGeneration => Some(1),
            Self::PlacementAnalysis => Some(2),
            Self::ImageGeneration => Some(3),
            Self::Assembly => Some(4),
            Self::Complete | Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// `stage` event for one of the four working stages
    pub fn event(self, message: impl Into<String>, progress: u8) -> ProgressEvent {
        debug_assert!(!self.is_terminal(), "terminal stages report complete or error");
        ProgressEvent::stage(self.number().unwrap_or_default(), message, progress)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed(CompletePayload),
    /// Unrecoverable error while `stage` was running
    Failed {
        stage: PipelineStage,
        error: PipelineError,
    },
    /// Cancelled while `stage` was running; nothing terminal was emitted
    Cancelled { stage: PipelineStage },
}

/// Content generation pipeline
pub struct ContentPipeline {
    text_generator: Arc<dyn TextGenerator>,
    image_client: ImageClient,
    image_size: ImageSize,
    request_timeout: Duration,
}

impl ContentPipeline {
    pub fn new(text_generator: Arc<dyn TextGenerator>, image_client: ImageClient) -> Self {
        Self {
            text_generator,
            image_client,
            image_size: ImageSize::default(),
            request_timeout: Duration::from_secs(180),
        }
    }

    /// Timeout for each text-generation call
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_image_size(mut self, size: ImageSize) -> Self {
        self.image_size = size;
        self
    }

    /// Execute one run, reporting progress through `emitter`
    #[instrument(skip_all, fields(title = %insight.title, images = config.enable_images))]
    pub async fn run(
        &self,
        insight: &Insight,
        config: &CreationConfig,
        emitter: &ProgressEmitter,
    ) -> PipelineOutcome {
        info!("Starting content pipeline");

        match self.drive(insight, config, emitter).await {
            Ok(payload) => {
                info!(
                    images = payload.images.len(),
                    placeholders = payload.images.iter().filter(|i| i.is_placeholder).count(),
                    "Content pipeline completed"
                );
                emitter.emit(ProgressEvent::Complete {
                    data: payload.clone(),
                });
                PipelineOutcome::Completed(payload)
            }
            Err((stage, PipelineError::Cancelled)) => {
                warn!(?stage, "Content pipeline cancelled");
                PipelineOutcome::Cancelled { stage }
            }
            Err((stage, error)) => {
                error!(?stage, error = %error, "Content pipeline failed");
                emitter.emit(ProgressEvent::error(error.to_string()));
                PipelineOutcome::Failed { stage, error }
            }
        }
    }

    async fn drive(
        &self,
        insight: &Insight,
        config: &CreationConfig,
        emitter: &ProgressEmitter,
    ) -> Result<CompletePayload, (PipelineStage, PipelineError)> {
        validate_inputs(insight, config).map_err(during(PipelineStage::TextGeneration))?;

        let article = self
            .generate_article(insight, config, emitter)
            .await
            .map_err(during(PipelineStage::TextGeneration))?;

        if !config.enable_images {
            emitter.emit(ProgressEvent::Content {
                content: article.body_text.clone(),
            });
            return Ok(CompletePayload {
                content: FinalArticle::text_only(&article),
                images: Vec::new(),
            });
        }

        let plan = self
            .analyze_placements(&article, config, emitter)
            .await
            .map_err(during(PipelineStage::PlacementAnalysis))?;
        let (plan, images) = self
            .generate_images(plan, config, emitter)
            .await
            .map_err(during(PipelineStage::ImageGeneration))?;
        check_cancelled(emitter).map_err(during(PipelineStage::Assembly))?;
        Ok(self.assemble_article(&article, &plan, images, emitter))
    }

    /// Stage 1: article text
    async fn generate_article(
        &self,
        insight: &Insight,
        config: &CreationConfig,
        emitter: &ProgressEmitter,
    ) -> Result<Article, PipelineError> {
        check_cancelled(emitter)?;
        emitter.emit(PipelineStage::TextGeneration.event("正在生成文章内容", 0));
        emitter.emit(ProgressEvent::thinking(format!(
            "围绕「{}」构思文章结构",
            insight.headline()
        )));

        let (system, user) = article_prompts(insight, config);
        let call = tokio::time::timeout(
            self.request_timeout,
            self.text_generator
                .generate(&config.text_model, &system, &user),
        );

        let raw = match guarded(emitter, call).await? {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(PipelineError::TextGeneration(format!("{:#}", e))),
            Err(_) => {
                return Err(PipelineError::Timeout {
                    stage: "text generation",
                    timeout: self.request_timeout,
                })
            }
        };
        debug!(chars = raw.chars().count(), "Received article response");

        let article = match parse_article_response(&raw) {
            ArticleParse::Ok(article) => article,
            ArticleParse::ParseError(reason) => return Err(PipelineError::ArticleParse(reason)),
        };

        emitter.emit(ProgressEvent::Title {
            content: article.title.clone(),
        });
        emitter.emit(ProgressEvent::Summary {
            content: article.summary.clone(),
        });
        emitter.emit(PipelineStage::TextGeneration.event("文章内容生成完成", 100));

        Ok(article)
    }

    /// Stage 2: where the illustrations go
    async fn analyze_placements(
        &self,
        article: &Article,
        config: &CreationConfig,
        emitter: &ProgressEmitter,
    ) -> Result<PlacementPlan, PipelineError> {
        check_cancelled(emitter)?;
        emitter.emit(PipelineStage::PlacementAnalysis.event("正在分析配图位置", 0));

        let analyzer = PlacementAnalyzer::new(
            self.text_generator.clone(),
            config.text_model.clone(),
            self.request_timeout,
        );
        let plan = guarded(emitter, analyzer.analyze(&article.body_text, &config.style)).await?;

        emitter.emit(ProgressEvent::Analysis {
            paragraphs: plan.total_paragraphs,
            suggested_images: plan.suggested_image_count,
        });
        emitter.emit(PipelineStage::PlacementAnalysis.event("配图位置分析完成", 100));

        Ok(plan)
    }

    /// Stage 3: one terminal image result per placement
    async fn generate_images(
        &self,
        mut plan: PlacementPlan,
        config: &CreationConfig,
        emitter: &ProgressEmitter,
    ) -> Result<(PlacementPlan, Vec<ImageResult>), PipelineError> {
        check_cancelled(emitter)?;
        emitter.emit(PipelineStage::ImageGeneration.event("正在生成配图", 0));

        for placement in plan.placements.iter_mut() {
            let prompt = synthesize(placement, &config.style);
            debug!(
                paragraph = placement.paragraph_index,
                scene = ?classify_scene(&placement.visual_keywords),
                "Synthesized image prompt"
            );
            placement.prompt = Some(prompt);
        }

        let requests: Vec<ImageRequest> = plan
            .placements
            .iter()
            .map(|p| ImageRequest::new(p.prompt.clone().unwrap_or_default()).with_size(self.image_size))
            .collect();
        let total = requests.len();

        if total == 0 {
            emitter.emit(PipelineStage::ImageGeneration.event("没有需要生成的配图", 100));
            return Ok((plan, Vec::new()));
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let batch = self.image_client.generate_batch(requests, Some(tx));
        tokio::pin!(batch);

        let mut finished = 0usize;
        let mut forward = |update: BatchUpdate| match update {
            BatchUpdate::Started { index, prompt } => {
                emitter.emit(ProgressEvent::image_generating(index, &prompt));
            }
            BatchUpdate::Finished(result) => {
                finished += 1;
                emitter.emit(ProgressEvent::image_finished(&result));
                emitter.emit(PipelineStage::ImageGeneration.event(
                    format!("已完成 {}/{} 张配图", finished, total),
                    (finished * 100 / total) as u8,
                ));
            }
        };

        let cancel = emitter.cancellation().clone();
        let images = loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                Some(update) = rx.recv() => forward(update),
                images = &mut batch => break images,
            }
        };
        while let Ok(update) = rx.try_recv() {
            forward(update);
        }

        Ok((plan, images))
    }

    /// Stage 4: splice illustrations into the text
    fn assemble_article(
        &self,
        article: &Article,
        plan: &PlacementPlan,
        images: Vec<ImageResult>,
        emitter: &ProgressEmitter,
    ) -> CompletePayload {
        emitter.emit(PipelineStage::Assembly.event("正在整合图文内容", 0));

        let insertions: Vec<ImageInsertion> = plan
            .placements
            .iter()
            .zip(&images)
            .map(|(placement, image)| {
                let alt = if placement.paragraph_summary.trim().is_empty() {
                    &placement.scene_description
                } else {
                    &placement.paragraph_summary
                };
                ImageInsertion::new(
                    placement.paragraph_index,
                    image_markup(alt, &image.display_url()),
                )
            })
            .collect();

        let content_with_images = assemble(&article.body_text, &insertions);
        let content = FinalArticle::new(article, content_with_images);

        emitter.emit(ProgressEvent::Content {
            content: content.content_with_images.clone(),
        });
        emitter.emit(PipelineStage::Assembly.event("图文内容整合完成", 100));

        CompletePayload { content, images }
    }
}

fn validate_inputs(insight: &Insight, config: &CreationConfig) -> Result<(), PipelineError> {
    if insight.headline().trim().is_empty() {
        return Err(PipelineError::InvalidInput(
            "insight title is required".to_string(),
        ));
    }
    if config.text_model.trim().is_empty() {
        return Err(PipelineError::InvalidInput(
            "creation config must name a text model".to_string(),
        ));
    }
    Ok(())
}

fn check_cancelled(emitter: &ProgressEmitter) -> Result<(), PipelineError> {
    if emitter.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

/// Tag an error with the stage it ended
fn during(stage: PipelineStage) -> impl FnOnce(PipelineError) -> (PipelineStage, PipelineError) {
    move |error| (stage, error)
}

/// Await `fut` unless the run is cancelled first
async fn guarded<F: Future>(emitter: &ProgressEmitter, fut: F) -> Result<F::Output, PipelineError> {
    tokio::select! {
        _ = emitter.cancellation().cancelled() => Err(PipelineError::Cancelled),
        output = fut => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_numbers() {
        assert_eq!(PipelineStage::TextGeneration.number(), Some(1));
        assert_eq!(PipelineStage::Assembly.number(), Some(4));
        assert_eq!(PipelineStage::Complete.number(), None);
        assert!(PipelineStage::Failed.is_terminal());
        assert!(!PipelineStage::ImageGeneration.is_terminal());
    }

    #[test]
    fn test_stage_event_carries_stage_number() {
        assert_eq!(
            PipelineStage::PlacementAnalysis.event("正在分析配图位置", 0),
            ProgressEvent::stage(2, "正在分析配图位置", 0)
        );
        assert_eq!(
            PipelineStage::Assembly.event("图文内容整合完成", 100),
            ProgressEvent::stage(4, "图文内容整合完成", 100)
        );
    }

    #[test]
    fn test_validate_inputs() {
        let config = CreationConfig {
            text_model: "gpt-4o".to_string(),
            ..Default::default()
        };
        assert!(validate_inputs(&Insight::with_title("标题"), &config).is_ok());
        assert!(matches!(
            validate_inputs(&Insight::default(), &config),
            Err(PipelineError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_inputs(&Insight::with_title("标题"), &CreationConfig::default()),
            Err(PipelineError::InvalidInput(_))
        ));
    }
}
