//! Illustration placement recommendations.

use serde::{Deserialize, Serialize};

/// Lowest number of illustrations a plan may suggest
pub const MIN_SUGGESTED_IMAGES: usize = 2;

/// Highest number of illustrations a plan may suggest
pub const MAX_SUGGESTED_IMAGES: usize = 5;

/// Where and why the article should be illustrated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementPlan {
    pub total_paragraphs: usize,

    /// Always within [`MIN_SUGGESTED_IMAGES`, `MAX_SUGGESTED_IMAGES`]
    pub suggested_image_count: usize,

    pub placements: Vec<Placement>,
}

impl PlacementPlan {
    /// Clamp a suggested image count into the allowed range
    pub fn clamp_image_count(count: usize) -> usize {
        count.clamp(MIN_SUGGESTED_IMAGES, MAX_SUGGESTED_IMAGES)
    }
}

/// A recommendation to illustrate one paragraph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// 0-based paragraph index in the article body
    pub paragraph_index: usize,

    #[serde(default)]
    pub paragraph_summary: String,

    #[serde(default)]
    pub scene_description: String,

    #[serde(default)]
    pub visual_keywords: Vec<String>,

    #[serde(default)]
    pub emotion: String,

    #[serde(default)]
    pub reasoning: String,

    /// Image prompt, filled in after placement analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Whether the placement came from the model or the index heuristic
    #[serde(default)]
    pub source: PlacementSource,
}

/// Origin of a placement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementSource {
    /// Derived from a content-aware model response
    #[default]
    Model,

    /// Positioned by paragraph index only; lower confidence
    Heuristic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_image_count() {
        assert_eq!(PlacementPlan::clamp_image_count(0), 2);
        assert_eq!(PlacementPlan::clamp_image_count(3), 3);
        assert_eq!(PlacementPlan::clamp_image_count(12), 5);
    }

    #[test]
    fn test_placement_defaults_from_sparse_json() {
        let placement: Placement = serde_json::from_str(r#"{"paragraphIndex": 2}"#).unwrap();
        assert_eq!(placement.paragraph_index, 2);
        assert!(placement.visual_keywords.is_empty());
        assert_eq!(placement.prompt, None);
        assert_eq!(placement.source, PlacementSource::Model);
    }
}
