//! Placement Integration Tests
//!
//! The analyzer never fails: unusable model output and timeouts both
//! produce the deterministic index-based plan.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedText, StalledText};
use quill::core::{default_placement, PlacementAnalyzer};
use quill::domain::{ContentStyle, PlacementSource, MAX_SUGGESTED_IMAGES, MIN_SUGGESTED_IMAGES};

fn article(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| format!("第{}段。{}", i, "这一段讨论远程办公对团队协作、沟通效率以及个人成长带来的长期影响，并给出具体的案例。"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[tokio::test]
async fn test_malformed_responses_fall_back_deterministically() {
    let text = article(9);
    let expected = default_placement(&text);

    let responses = [
        "我认为第三段最适合配图。",
        "{\"totalParagraphs\": 9, \"suggestedImageCount\": 3, \"placements\": []}",
        "{\"totalParagraphs\": 9, \"suggestedImageCount\": 3, \"placements\": [{\"paragraphIndex\": 12}]}",
        "{\"totalParagraphs\": 9, \"suggestedImageCount\": 3, \"placements\": [{\"paragraphIndex\": 2}, {\"paragraphIndex\": 2}]}",
        "{\"totalParagraphs\": 9, \"suggestedImageCount\": 3, \"placements\": [{\"paragraphIndex\": -1}]}",
    ];

    for response in responses {
        let analyzer = PlacementAnalyzer::new(
            ScriptedText::new(vec![Ok(response.to_string())]),
            "gpt-4o",
            Duration::from_secs(5),
        );
        let plan = analyzer.analyze(&text, &ContentStyle::Professional).await;
        assert_eq!(plan, expected, "response: {}", response);
    }

    let indices: Vec<usize> = expected.placements.iter().map(|p| p.paragraph_index).collect();
    assert_eq!(indices, vec![3, 6, 8]);
}

#[tokio::test]
async fn test_model_failure_falls_back() {
    let text = article(6);
    let analyzer = PlacementAnalyzer::new(
        ScriptedText::new(vec![Err("HTTP 503".to_string())]),
        "gpt-4o",
        Duration::from_secs(5),
    );

    let plan = analyzer.analyze(&text, &ContentStyle::Casual).await;
    assert_eq!(plan, default_placement(&text));
    assert!(plan.placements.iter().all(|p| p.source == PlacementSource::Heuristic));
}

#[tokio::test]
async fn test_timeout_falls_back() {
    let text = article(6);
    let analyzer = PlacementAnalyzer::new(Arc::new(StalledText), "gpt-4o", Duration::from_millis(50));

    let plan = analyzer.analyze(&text, &ContentStyle::Storytelling).await;
    assert_eq!(plan, default_placement(&text));
}

#[tokio::test]
async fn test_valid_response_is_used() {
    let text = article(4);
    let response = r#"分析如下：
{"totalParagraphs": 4, "suggestedImageCount": 2, "placements": [
  {"paragraphIndex": 1, "paragraphSummary": "协作", "sceneDescription": "白板前讨论的团队", "visualKeywords": ["团队", "白板"], "emotion": "积极"},
  {"paragraphIndex": 3, "paragraphSummary": "成长", "sceneDescription": "窗边阅读的人", "visualKeywords": ["人物"], "emotion": "安静"}
]}"#;
    let analyzer = PlacementAnalyzer::new(
        ScriptedText::new(vec![Ok(response.to_string())]),
        "gpt-4o",
        Duration::from_secs(5),
    );

    let plan = analyzer.analyze(&text, &ContentStyle::Professional).await;
    assert_eq!(plan.total_paragraphs, 4);
    assert_eq!(plan.placements.len(), 2);
    assert_eq!(plan.placements[0].scene_description, "白板前讨论的团队");
    assert!(plan.placements.iter().all(|p| p.source == PlacementSource::Model));
}

#[test]
fn test_heuristic_count_always_clamped() {
    for paragraphs in 0..40 {
        let plan = default_placement(&article(paragraphs));

        assert!(plan.suggested_image_count >= MIN_SUGGESTED_IMAGES);
        assert!(plan.suggested_image_count <= MAX_SUGGESTED_IMAGES);
        assert_eq!(plan.total_paragraphs, paragraphs);
        assert!(plan.placements.iter().all(|p| p.paragraph_index < paragraphs.max(1)));

        if paragraphs == 0 {
            assert!(plan.placements.is_empty());
        } else {
            assert_eq!(plan.placements.len(), plan.suggested_image_count);
        }
    }
}
