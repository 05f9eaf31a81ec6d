//! Illustration placement analysis.
//!
//! A model is asked which paragraphs deserve an image and why. Its response
//! goes through [`parse_placement_response`], which returns a tagged result
//! instead of failing; anything unusable falls back to the deterministic
//! [`default_placement`] heuristic, so [`PlacementAnalyzer::analyze`] always
//! yields a plan.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::adapters::TextGenerator;
use crate::domain::{ContentStyle, Placement, PlacementPlan, PlacementSource};

use super::assembler::split_paragraphs;
use super::extract::first_json_object;

/// Paragraphs at or below this length are ignored by the heuristic
const HEURISTIC_MIN_PARAGRAPH_CHARS: usize = 50;

const HEURISTIC_SCENE: &str = "与段落主题相关的概念性场景，简洁的构图";
const HEURISTIC_EMOTION: &str = "专业";

/// Reasoning attached to every heuristic placement
pub const HEURISTIC_REASONING: &str =
    "positioned by paragraph index, no content analysis available";

/// Outcome of parsing a placement response
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementParse {
    Ok(PlacementPlan),
    ParseError(String),
}

impl PlacementParse {
    pub fn ok(self) -> Option<PlacementPlan> {
        match self {
            Self::Ok(plan) => Some(plan),
            Self::ParseError(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlan {
    total_paragraphs: Option<i64>,
    suggested_image_count: Option<i64>,
    placements: Option<Vec<RawPlacement>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlacement {
    paragraph_index: i64,
    #[serde(default)]
    paragraph_summary: String,
    #[serde(default)]
    scene_description: String,
    #[serde(default)]
    visual_keywords: Vec<String>,
    #[serde(default)]
    emotion: String,
    #[serde(default)]
    reasoning: String,
}

/// Parse and validate a model's placement response.
///
/// `paragraph_count` is the number of paragraphs actually present in the
/// article; when zero, the model's own `totalParagraphs` bounds the indices.
pub fn parse_placement_response(raw: &str, paragraph_count: usize) -> PlacementParse {
    let Some(object) = first_json_object(raw) else {
        return PlacementParse::ParseError("no JSON object in response".to_string());
    };

    let parsed: RawPlan = match serde_json::from_str(object) {
        Ok(parsed) => parsed,
        Err(e) => return PlacementParse::ParseError(format!("invalid placement JSON: {}", e)),
    };

    let (Some(model_total), Some(suggested), Some(raw_placements)) = (
        parsed.total_paragraphs,
        parsed.suggested_image_count,
        parsed.placements,
    ) else {
        return PlacementParse::ParseError(
            "missing totalParagraphs, suggestedImageCount or placements".to_string(),
        );
    };

    let total = if paragraph_count > 0 {
        paragraph_count
    } else {
        usize::try_from(model_total).unwrap_or(0)
    };
    if total == 0 {
        return PlacementParse::ParseError("article has no paragraphs".to_string());
    }
    if raw_placements.is_empty() {
        return PlacementParse::ParseError("placement list is empty".to_string());
    }

    let mut seen = HashSet::new();
    let mut placements = Vec::with_capacity(raw_placements.len());
    for p in raw_placements {
        let index = match usize::try_from(p.paragraph_index) {
            Ok(index) if index < total => index,
            _ => {
                return PlacementParse::ParseError(format!(
                    "paragraph index {} outside 0..{}",
                    p.paragraph_index, total
                ))
            }
        };
        if !seen.insert(index) {
            return PlacementParse::ParseError(format!("duplicate paragraph index {}", index));
        }

        placements.push(Placement {
            paragraph_index: index,
            paragraph_summary: p.paragraph_summary,
            scene_description: p.scene_description,
            visual_keywords: p.visual_keywords,
            emotion: p.emotion,
            reasoning: p.reasoning,
            prompt: None,
            source: PlacementSource::Model,
        });
    }

    let suggested = usize::try_from(suggested).unwrap_or(0);
    PlacementParse::Ok(PlacementPlan {
        total_paragraphs: total,
        suggested_image_count: PlacementPlan::clamp_image_count(suggested),
        placements,
    })
}

/// Evenly spaced placements by paragraph index, without content analysis.
///
/// Candidates are paragraphs longer than 50 characters (all non-empty
/// paragraphs if none qualify). With `n` candidates the plan suggests
/// `clamp(n / 3, 2, 5)` images at candidate positions
/// `min(step * (i + 1), n - 1)` where `step = n / count`. Short articles can
/// therefore yield repeated indices; they are kept and illustrated side by side.
pub fn default_placement(article_text: &str) -> PlacementPlan {
    let paragraphs = split_paragraphs(article_text);

    let mut candidates: Vec<usize> = paragraphs
        .iter()
        .enumerate()
        .filter(|(_, p)| p.chars().count() > HEURISTIC_MIN_PARAGRAPH_CHARS)
        .map(|(i, _)| i)
        .collect();
    if candidates.is_empty() {
        candidates = (0..paragraphs.len()).collect();
    }

    let n = candidates.len();
    let count = PlacementPlan::clamp_image_count(n / 3);

    let placements = if n == 0 {
        Vec::new()
    } else {
        let step = n / count;
        (0..count)
            .map(|i| {
                let position = (step * (i + 1)).min(n - 1);
                let index = candidates[position];
                Placement {
                    paragraph_index: index,
                    paragraph_summary: summarize_paragraph(&paragraphs[index]),
                    scene_description: HEURISTIC_SCENE.to_string(),
                    visual_keywords: Vec::new(),
                    emotion: HEURISTIC_EMOTION.to_string(),
                    reasoning: HEURISTIC_REASONING.to_string(),
                    prompt: None,
                    source: PlacementSource::Heuristic,
                }
            })
            .collect()
    };

    PlacementPlan {
        total_paragraphs: paragraphs.len(),
        suggested_image_count: count,
        placements,
    }
}

fn summarize_paragraph(paragraph: &str) -> String {
    let summary: String = paragraph.chars().take(30).collect();
    if paragraph.chars().count() > 30 {
        format!("{}…", summary)
    } else {
        summary
    }
}

fn placement_prompts(paragraphs: &[String], style: &ContentStyle) -> (String, String) {
    let system = "你是一名资深的图文编辑，擅长判断文章中哪些段落最需要配图。\
                  只输出一个 JSON 对象，不要输出其他内容。"
        .to_string();

    let numbered: Vec<String> = paragraphs
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{}] {}", i, p))
        .collect();

    let user = format!(
        "文章风格：{}\n共 {} 个段落（编号从 0 开始）：\n\n{}\n\n\
         请挑选 2 到 5 个最适合配图的段落，返回 JSON：\n\
         {{\"totalParagraphs\": 段落数, \"suggestedImageCount\": 建议配图数, \
         \"placements\": [{{\"paragraphIndex\": 编号, \"paragraphSummary\": \"段落概要\", \
         \"sceneDescription\": \"画面描述\", \"visualKeywords\": [\"关键词\"], \
         \"emotion\": \"情绪\", \"reasoning\": \"理由\"}}]}}",
        style,
        paragraphs.len(),
        numbered.join("\n\n")
    );

    (system, user)
}

/// Model-backed placement analysis with heuristic fallback
pub struct PlacementAnalyzer {
    generator: Arc<dyn TextGenerator>,
    model: String,
    timeout: Duration,
}

impl PlacementAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            generator,
            model: model.into(),
            timeout,
        }
    }

    /// Analyze an article; never fails
    #[instrument(skip(self, article_text), fields(model = %self.model))]
    pub async fn analyze(&self, article_text: &str, style: &ContentStyle) -> PlacementPlan {
        let paragraphs = split_paragraphs(article_text);
        let (system, user) = placement_prompts(&paragraphs, style);

        let response = tokio::time::timeout(
            self.timeout,
            self.generator.generate(&self.model, &system, &user),
        )
        .await;

        let raw = match response {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error = %e, "Placement model call failed, using heuristic");
                return default_placement(article_text);
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Placement model call timed out, using heuristic");
                return default_placement(article_text);
            }
        };

        match parse_placement_response(&raw, paragraphs.len()) {
            PlacementParse::Ok(plan) => {
                info!(
                    placements = plan.placements.len(),
                    suggested = plan.suggested_image_count,
                    "Placement analysis succeeded"
                );
                plan
            }
            PlacementParse::ParseError(reason) => {
                warn!(%reason, "Unusable placement response, using heuristic");
                debug!(response = %raw, "Rejected placement response");
                default_placement(article_text)
            }
        }
    }
}
