//! # 提示词构建
//!
//! 把帖子表单（正文、标题、风格、画幅）转换为发给生成服务的提示词。
//! 提示词固定包含三段：风格美术指导、内容描述、版面约束（预留 Logo 角位，不生成其他文字与 Logo）。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ProviderError;
use crate::compositor::{Corner, VisualStyle};

pub const MAX_MESSAGE_CHARS: usize = 500;
pub const MAX_HEADLINE_CHARS: usize = 120;

/// 画幅比例。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:5")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Story,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait => "4:5",
            Self::Landscape => "16:9",
            Self::Story => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "1:1" => Ok(Self::Square),
            "4:5" => Ok(Self::Portrait),
            "16:9" => Ok(Self::Landscape),
            "9:16" => Ok(Self::Story),
            other => Err(ProviderError::Validation(format!(
                "未知画幅：{}（可选：1:1 / 4:5 / 16:9 / 9:16）",
                other
            ))),
        }
    }
}

/// 帖子表单。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRequest {
    pub message: String,
    #[serde(default)]
    pub headline: Option<String>,
    pub style: VisualStyle,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

/// 发给生成服务的请求。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
}

fn art_direction(style: VisualStyle) -> &'static str {
    match style {
        VisualStyle::Isometric => {
            "Isometric 3D illustration, clean geometric shapes, soft studio lighting, \
             pastel corporate palette, subtle long shadows, crisp edges."
        }
        VisualStyle::NewYorkCartoon => {
            "Single-panel editorial cartoon in the style of a classic New York magazine: \
             black ink line art, cross-hatching, light watercolor wash on off-white paper, witty and understated."
        }
        VisualStyle::MinimalistLinkedin => {
            "Minimalist flat illustration for a professional social feed: generous negative space, \
             two or three muted brand-friendly colors, simple iconography, calm and confident."
        }
    }
}

/// 校验表单并生成提示词。`logo_corner` 对应最终 Logo 的角位，提示模型保持该区域干净。
pub fn build_prompt(post: &PostRequest, logo_corner: Corner) -> Result<PromptRequest, ProviderError> {
    let message = post.message.trim();
    if message.is_empty() {
        return Err(ProviderError::Validation("message 不能为空".to_string()));
    }
    let message_chars = message.chars().count();
    if message_chars > MAX_MESSAGE_CHARS {
        return Err(ProviderError::Validation(format!(
            "message 不能超过 {} 个字符：{}",
            MAX_MESSAGE_CHARS, message_chars
        )));
    }

    let headline = post
        .headline
        .as_deref()
        .map(str::trim)
        .filter(|headline| !headline.is_empty());
    if let Some(headline) = headline {
        let headline_chars = headline.chars().count();
        if headline_chars > MAX_HEADLINE_CHARS {
            return Err(ProviderError::Validation(format!(
                "headline 不能超过 {} 个字符：{}",
                MAX_HEADLINE_CHARS, headline_chars
            )));
        }
    }

    let mut prompt = String::with_capacity(message.len() + 512);
    prompt.push_str(art_direction(post.style));
    prompt.push_str("\n\nIllustrate this post: ");
    prompt.push_str(message);
    match headline {
        Some(headline) => {
            prompt.push_str("\n\nRender this headline legibly in the image: \"");
            prompt.push_str(headline);
            prompt.push_str("\". Do not add any other text.");
        }
        None => prompt.push_str("\n\nDo not render any text."),
    }
    prompt.push_str(&format!(
        "\n\nKeep the {} corner free of important detail; a logo will be placed there. \
         Do not draw any logos or watermarks.",
        logo_corner.as_str().replace('-', " ")
    ));

    Ok(PromptRequest {
        prompt,
        aspect_ratio: post.aspect_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(message: &str, headline: Option<&str>) -> PostRequest {
        PostRequest {
            message: message.to_string(),
            headline: headline.map(str::to_string),
            style: VisualStyle::NewYorkCartoon,
            aspect_ratio: AspectRatio::Portrait,
        }
    }

    #[test]
    fn prompt_carries_style_message_headline_and_corner() {
        let request = build_prompt(&post("We shipped dark mode", Some("Lights out")), Corner::BottomRight)
            .expect("build prompt failed");

        assert!(request.prompt.contains("New York"));
        assert!(request.prompt.contains("We shipped dark mode"));
        assert!(request.prompt.contains("\"Lights out\""));
        assert!(request.prompt.contains("bottom right corner"));
        assert_eq!(request.aspect_ratio, AspectRatio::Portrait);
    }

    #[test]
    fn blank_headline_means_no_text() {
        let request = build_prompt(&post("Hiring!", Some("   ")), Corner::TopRight).expect("build prompt failed");

        assert!(request.prompt.contains("Do not render any text."));
    }

    #[test]
    fn limits_are_counted_in_characters() {
        let long = "字".repeat(MAX_MESSAGE_CHARS);
        assert!(build_prompt(&post(&long, None), Corner::BottomLeft).is_ok());

        let too_long = "字".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            build_prompt(&post(&too_long, None), Corner::BottomLeft),
            Err(ProviderError::Validation(_))
        ));
        assert!(build_prompt(&post("  ", None), Corner::BottomLeft).is_err());

        let headline = "h".repeat(MAX_HEADLINE_CHARS + 1);
        assert!(build_prompt(&post("ok", Some(&headline)), Corner::BottomLeft).is_err());
    }

    #[test]
    fn aspect_ratio_parses_and_defaults_to_square() {
        assert_eq!("16:9".parse::<AspectRatio>().ok(), Some(AspectRatio::Landscape));
        assert!("3:2".parse::<AspectRatio>().is_err());

        let parsed: PostRequest =
            serde_json::from_str(r#"{"message":"m","style":"isometric"}"#).expect("parse failed");
        assert_eq!(parsed.aspect_ratio, AspectRatio::Square);
    }
}
