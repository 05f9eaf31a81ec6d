//! Article text produced by the pipeline.

use serde::{Deserialize, Serialize};

/// Characters read per minute for reading-time estimates
const READING_CHARS_PER_MINUTE: usize = 300;

/// Article produced by the text-generation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,

    pub summary: String,

    /// Paragraphs separated by a blank line; paragraph order is significant
    pub body_text: String,
}

/// Finished article handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalArticle {
    pub title: String,

    pub summary: String,

    /// Body text without illustrations
    pub content_text: String,

    /// Body text with one image block after each illustrated paragraph
    pub content_with_images: String,

    /// Character count of `content_text`
    pub word_count: usize,

    pub reading_time_minutes: usize,
}

impl FinalArticle {
    /// Build the final article from the generated text and its illustrated form
    pub fn new(article: &Article, content_with_images: String) -> Self {
        Self {
            title: article.title.clone(),
            summary: article.summary.clone(),
            content_text: article.body_text.clone(),
            content_with_images,
            word_count: word_count(&article.body_text),
            reading_time_minutes: reading_time_minutes(&article.body_text),
        }
    }

    /// Final article for a run without illustrations
    pub fn text_only(article: &Article) -> Self {
        Self::new(article, article.body_text.clone())
    }
}

/// Length of the article text in characters
pub fn word_count(text: &str) -> usize {
    text.chars().count()
}

/// Estimated reading time, rounded up
pub fn reading_time_minutes(text: &str) -> usize {
    word_count(text).div_ceil(READING_CHARS_PER_MINUTE)
}
