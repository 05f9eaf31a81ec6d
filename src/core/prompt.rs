//! Image prompt synthesis, validation and optimization.
//!
//! Synthesis is pure: the same placement and style always produce the same
//! prompt, with no network involved.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ContentStyle, Placement};

const MIN_PROMPT_CHARS: usize = 20;
const MAX_PROMPT_CHARS: usize = 500;
const MIN_CJK_RATIO: f64 = 0.5;

const QUALITY_TAIL: &str = "high-detail, professional photography";
const QUALITY_SUFFIX: &str = "高清画质，细节丰富";
const STYLE_SUFFIX: &str = "专业摄影风格";

/// Broad category of the scene an illustration depicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneType {
    Person,
    Data,
    Process,
    Atmosphere,
    Concept,
}

const PERSON_KEYWORDS: &[&str] = &[
    "人物", "人", "团队", "领导", "用户", "客户", "员工", "创业者", "person", "people", "team",
];
const DATA_KEYWORDS: &[&str] = &[
    "数据", "图表", "增长", "统计", "趋势", "指标", "chart", "data", "growth",
];
const PROCESS_KEYWORDS: &[&str] = &[
    "流程", "步骤", "方法", "过程", "路径", "框架", "process", "workflow", "steps",
];
const ATMOSPHERE_KEYWORDS: &[&str] = &[
    "氛围", "场景", "环境", "城市", "自然", "光线", "夜晚", "atmosphere", "scene",
];

/// Classify a scene by its visual keywords; the first matching category wins
pub fn classify_scene(visual_keywords: &[String]) -> SceneType {
    let categories: [(SceneType, &[&str]); 4] = [
        (SceneType::Person, PERSON_KEYWORDS),
        (SceneType::Data, DATA_KEYWORDS),
        (SceneType::Process, PROCESS_KEYWORDS),
        (SceneType::Atmosphere, ATMOSPHERE_KEYWORDS),
    ];

    let keywords: Vec<String> = visual_keywords.iter().map(|k| k.to_lowercase()).collect();

    categories
        .iter()
        .find(|(_, set)| {
            keywords
                .iter()
                .any(|k| set.iter().any(|token| k.contains(token)))
        })
        .map(|(scene, _)| *scene)
        .unwrap_or(SceneType::Concept)
}

/// Visual modifier for a content style; unknown styles use the professional one
pub fn style_modifier(style: &ContentStyle) -> &'static str {
    match style {
        ContentStyle::Casual => "明亮活泼的插画风格，温暖色调，轻松愉快",
        ContentStyle::Storytelling => "电影感叙事画面，柔和光影，富有情感张力",
        ContentStyle::DataDriven => "现代信息图风格，清晰的几何元素，科技蓝色调",
        ContentStyle::Creative => "创意艺术风格，大胆配色，富有想象力的构图",
        ContentStyle::Professional | ContentStyle::Unknown(_) => {
            "商务专业风格，简洁构图，冷色调，干净的背景"
        }
    }
}

/// Build the image prompt for a placement
pub fn synthesize(placement: &Placement, style: &ContentStyle) -> String {
    let mood = if placement.emotion.trim().is_empty() {
        String::new()
    } else {
        format!("{}的氛围", placement.emotion.trim())
    };

    format!(
        "{}, {}, {}, {}",
        placement.scene_description.trim(),
        mood,
        style_modifier(style),
        QUALITY_TAIL
    )
}

/// A reason a prompt is unfit for generation
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum PromptIssue {
    #[error("prompt is too short ({actual} < {min} characters)")]
    TooShort { actual: usize, min: usize },

    #[error("prompt is too long ({actual} > {max} characters)")]
    TooLong { actual: usize, max: usize },

    #[error("prompt has no recognizable subject")]
    MissingSubject,

    #[error("prompt has no style or mood description")]
    MissingStyle,

    #[error("prompt has no quality description")]
    MissingQuality,

    #[error("prompt contains banned word '{word}'")]
    BannedWord { word: String },

    #[error("prompt is only {percent}% CJK characters")]
    LowCjkRatio { percent: u8 },
}

/// Result of validating a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptValidation {
    pub valid: bool,
    pub issues: Vec<PromptIssue>,
}

const SUBJECT_TOKENS: &[&str] = &[
    "人", "团队", "场景", "画面", "办公", "城市", "产品", "数据", "图表", "界面", "桌", "手",
    "建筑", "街道", "自然", "山", "海", "天空", "屏幕", "书",
];
const STYLE_TOKENS: &[&str] = &[
    "风格", "氛围", "色调", "光影", "光线", "质感", "插画", "摄影", "style", "mood",
];
const QUALITY_TOKENS: &[&str] = &[
    "高清", "细节", "高质量", "精细", "4k", "8k", "high-detail", "high quality",
];
const BANNED_WORDS: &[&str] = &["暴力", "血腥", "色情", "裸露", "恐怖", "毒品", "nsfw", "gore"];

fn contains_any(text: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| text.contains(t))
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x20000..=0x2A6DF | 0xF900..=0xFAFF)
}

/// Share of CJK characters among non-whitespace characters
fn cjk_ratio(text: &str) -> f64 {
    let (cjk, total) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(cjk, total), c| {
            (cjk + usize::from(is_cjk(c)), total + 1)
        });
    if total == 0 {
        0.0
    } else {
        cjk as f64 / total as f64
    }
}

/// Check a hand-written prompt against the generation rules
pub fn validate(prompt: &str) -> PromptValidation {
    let mut issues = Vec::new();
    let text = prompt.trim();
    let lower = text.to_lowercase();
    let length = text.chars().count();

    if length < MIN_PROMPT_CHARS {
        issues.push(PromptIssue::TooShort {
            actual: length,
            min: MIN_PROMPT_CHARS,
        });
    }
    if length > MAX_PROMPT_CHARS {
        issues.push(PromptIssue::TooLong {
            actual: length,
            max: MAX_PROMPT_CHARS,
        });
    }
    if !contains_any(&lower, SUBJECT_TOKENS) {
        issues.push(PromptIssue::MissingSubject);
    }
    if !contains_any(&lower, STYLE_TOKENS) {
        issues.push(PromptIssue::MissingStyle);
    }
    if !contains_any(&lower, QUALITY_TOKENS) {
        issues.push(PromptIssue::MissingQuality);
    }
    if let Some(word) = BANNED_WORDS.iter().find(|w| lower.contains(*w)) {
        issues.push(PromptIssue::BannedWord {
            word: word.to_string(),
        });
    }

    let ratio = cjk_ratio(text);
    if ratio < MIN_CJK_RATIO {
        issues.push(PromptIssue::LowCjkRatio {
            percent: (ratio * 100.0).round() as u8,
        });
    }

    PromptValidation {
        valid: issues.is_empty(),
        issues,
    }
}

fn separator_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*[,，]+(?:\s*[,，]+)*\s*").expect("separator pattern is valid"))
}

/// Fill in missing quality and style descriptions and tidy separators
pub fn optimize(prompt: &str) -> String {
    let mut text = prompt.trim().to_string();
    let lower = text.to_lowercase();

    if !contains_any(&lower, QUALITY_TOKENS) {
        text.push('，');
        text.push_str(QUALITY_SUFFIX);
    }
    if !contains_any(&lower, STYLE_TOKENS) {
        text.push('，');
        text.push_str(STYLE_SUFFIX);
    }

    let collapsed = separator_runs().replace_all(&text, "，");
    collapsed
        .trim_matches(|c: char| c == '，' || c == ',' || c.is_whitespace())
        .to_string()
}
