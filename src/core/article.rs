//! Text-generation stage: prompt construction and response parsing.

use serde::Deserialize;

use crate::domain::{Article, CreationConfig, Insight};

use super::extract::first_json_object;

/// Outcome of parsing the article response
#[derive(Debug, Clone, PartialEq)]
pub enum ArticleParse {
    Ok(Article),
    ParseError(String),
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    title: Option<String>,
    summary: Option<String>,
    content: Option<String>,
}

/// Parse the model's article response.
///
/// The first balanced `{...}` block must carry non-empty `title`, `summary`
/// and `content` strings.
pub fn parse_article_response(raw: &str) -> ArticleParse {
    let Some(object) = first_json_object(raw) else {
        return ArticleParse::ParseError("response contains no JSON object".to_string());
    };

    let parsed: RawArticle = match serde_json::from_str(object) {
        Ok(parsed) => parsed,
        Err(e) => return ArticleParse::ParseError(format!("invalid article JSON: {}", e)),
    };

    let mut missing = Vec::new();
    let title = non_empty(parsed.title, "title", &mut missing);
    let summary = non_empty(parsed.summary, "summary", &mut missing);
    let content = non_empty(parsed.content, "content", &mut missing);

    if !missing.is_empty() {
        return ArticleParse::ParseError(format!(
            "article JSON is missing {}",
            missing.join(", ")
        ));
    }

    ArticleParse::Ok(Article {
        title,
        summary,
        body_text: content.replace("\r\n", "\n").trim().to_string(),
    })
}

fn non_empty(value: Option<String>, field: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => {
            missing.push(field);
            String::new()
        }
    }
}

/// System and user prompts for the article call
pub fn article_prompts(insight: &Insight, config: &CreationConfig) -> (String, String) {
    let system = "你是一名专业的内容创作者。根据给定的选题洞察撰写完整文章，\
                  只输出一个 JSON 对象：{\"title\": \"标题\", \"summary\": \"摘要\", \
                  \"content\": \"正文，段落之间用空行分隔\"}。"
        .to_string();

    let mut user = format!(
        "选题：{}\n方向：{}\n目标读者：{}\n切入角度：{}\n写作风格：{}\n语气：{}\n目标字数：约 {} 字",
        insight.headline(),
        insight.direction,
        insight.audience,
        insight.angle,
        config.style,
        config.tone.describe(),
        config.length_hint,
    );

    if let Some(extra) = config
        .custom_requirements
        .as_deref()
        .filter(|r| !r.trim().is_empty())
    {
        user.push_str("\n额外要求：");
        user.push_str(extra.trim());
    }

    (system, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_article_with_prose() {
        let raw = "下面是文章：\n{\"title\": \"AI 写作\", \"summary\": \"概述\", \"content\": \"第一段\\r\\n\\r\\n第二段\"}";
        let ArticleParse::Ok(article) = parse_article_response(raw) else {
            panic!("expected article");
        };
        assert_eq!(article.title, "AI 写作");
        assert_eq!(article.body_text, "第一段\n\n第二段");
    }

    #[test]
    fn test_parse_article_missing_fields() {
        let result = parse_article_response(r#"{"title": "只有标题", "summary": ""}"#);
        assert_eq!(
            result,
            ArticleParse::ParseError("article JSON is missing summary, content".to_string())
        );
    }

    #[test]
    fn test_parse_article_without_json() {
        assert!(matches!(
            parse_article_response("服务繁忙，请稍后再试"),
            ArticleParse::ParseError(_)
        ));
    }

    #[test]
    fn test_prompts_include_insight_and_requirements() {
        let insight = Insight {
            title: "远程办公".to_string(),
            suggested_title: String::new(),
            direction: "效率".to_string(),
            audience: "管理者".to_string(),
            angle: "工具选择".to_string(),
        };
        let config = CreationConfig {
            custom_requirements: Some("包含三个案例".to_string()),
            ..Default::default()
        };

        let (_, user) = article_prompts(&insight, &config);
        assert!(user.contains("远程办公"));
        assert!(user.contains("管理者"));
        assert!(user.contains("专业严谨"));
        assert!(user.ends_with("额外要求：包含三个案例"));
    }
}
