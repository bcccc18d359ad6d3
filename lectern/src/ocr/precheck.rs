use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::PrecheckConfig;
use crate::error::{LecternError, Result};

/// Outcome of the pre-capture gate.
#[derive(Clone, Debug, PartialEq)]
pub enum PrecheckVerdict {
    /// Continue the pipeline, optionally with a prompt tuned to the scene.
    Proceed { suggested_prompt: Option<String> },
    /// Stop before the OCR request. `reason` is recorded and spoken.
    Skip { reason: String },
}

/// Decides whether a frame is worth sending to the OCR backend.
///
/// The gate is advisory: a precheck that fails internally must not block the
/// pipeline, so [`evaluate`](SkipPrecheck::evaluate) is infallible and folds
/// its own errors into a plain `Proceed`.
#[async_trait]
pub trait SkipPrecheck: Send + Sync {
    async fn evaluate(&self, image_bytes: &[u8]) -> PrecheckVerdict;

    fn is_enabled(&self) -> bool;
}

/// No-op gate used when prechecking is switched off.
#[derive(Clone, Debug, Default)]
pub struct DisabledPrecheck;

#[async_trait]
impl SkipPrecheck for DisabledPrecheck {
    async fn evaluate(&self, _image_bytes: &[u8]) -> PrecheckVerdict {
        PrecheckVerdict::Proceed {
            suggested_prompt: None,
        }
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Vision-model gate: asks a chat-completions endpoint whether the frame
/// contains readable text before paying for the OCR round trip.
#[derive(Clone, Debug)]
pub struct VisionPrecheck {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// What the model must answer with. Anything that does not parse as this is
/// treated as a failed precheck, which means: proceed.
#[derive(Debug, Deserialize)]
struct PrecheckReply {
    has_text: bool,
    #[serde(default)]
    scene_type: Option<String>,
    #[serde(default)]
    suggested_prompt: Option<String>,
}

const PRECHECK_INSTRUCTION: &str = "Look at this image and answer with strict JSON only, no prose: \
{\"has_text\": <true if the image contains readable text>, \
\"scene_type\": \"<one or two words describing the scene>\", \
\"suggested_prompt\": <an OCR prompt tailored to this kind of document, or null>}";

impl VisionPrecheck {
    pub fn new(config: &PrecheckConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| LecternError::Validation("API key required for precheck".to_string()))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LecternError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model: config.model.clone(),
        })
    }

    async fn ask_model(&self, image_bytes: &[u8]) -> Result<String> {
        let base64_image = STANDARD.encode(image_bytes);
        let data_url = format!("data:image/jpeg;base64,{base64_image}");

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: PRECHECK_INSTRUCTION.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: 256,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LecternError::Remote {
                code: status.as_u16(),
                message: format!("Precheck request failed: {status} - {body}"),
            });
        }

        let chat_response: ChatResponse = resp.json().await.map_err(|e| {
            LecternError::Remote {
                code: 200,
                message: format!("Failed to parse precheck response: {e}"),
            }
        })?;

        chat_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| LecternError::Remote {
                code: 200,
                message: "No response from precheck model".to_string(),
            })
    }
}

#[async_trait]
impl SkipPrecheck for VisionPrecheck {
    async fn evaluate(&self, image_bytes: &[u8]) -> PrecheckVerdict {
        let content = match self.ask_model(image_bytes).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(error = %e, "Precheck failed, proceeding without it");
                return PrecheckVerdict::Proceed {
                    suggested_prompt: None,
                };
            }
        };

        match parse_reply(&content) {
            Some(reply) if !reply.has_text => {
                let scene = reply.scene_type.unwrap_or_else(|| "unknown".to_string());
                PrecheckVerdict::Skip {
                    reason: format!("frame contains no text (scene type: {scene})"),
                }
            }
            Some(reply) => PrecheckVerdict::Proceed {
                suggested_prompt: reply
                    .suggested_prompt
                    .filter(|p| !p.trim().is_empty()),
            },
            None => {
                tracing::warn!(reply = %content, "Precheck reply was not valid JSON, proceeding");
                PrecheckVerdict::Proceed {
                    suggested_prompt: None,
                }
            }
        }
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

fn parse_reply(content: &str) -> Option<PrecheckReply> {
    serde_json::from_str(strip_code_fence(content)).ok()
}

/// Models frequently wrap JSON in a markdown fence despite instructions.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrecheckConfig;

    fn create_test_config() -> PrecheckConfig {
        PrecheckConfig {
            enabled: true,
            api_key: None,
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 15,
        }
    }

    #[test]
    fn test_vision_precheck_requires_api_key() {
        let result = VisionPrecheck::new(&create_test_config());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key required"));
    }

    #[test]
    fn test_vision_precheck_with_api_key() {
        let mut config = create_test_config();
        config.api_key = Some("test-key".to_string());
        let client = VisionPrecheck::new(&config).unwrap();
        assert!(client.base_url.contains("openai"));
        assert!(client.is_enabled());
    }

    #[test]
    fn test_custom_base_url() {
        let mut config = create_test_config();
        config.api_key = Some("test-key".to_string());
        config.base_url = Some("https://custom.api.com/v1".to_string());
        let client = VisionPrecheck::new(&config).unwrap();
        assert_eq!(client.base_url, "https://custom.api.com/v1");
    }

    #[tokio::test]
    async fn test_disabled_precheck_always_proceeds() {
        let gate = DisabledPrecheck;
        assert!(!gate.is_enabled());
        let verdict = gate.evaluate(b"anything").await;
        assert_eq!(
            verdict,
            PrecheckVerdict::Proceed {
                suggested_prompt: None
            }
        );
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_reply_skip_shape() {
        let reply =
            parse_reply(r#"{"has_text": false, "scene_type": "empty desk"}"#).unwrap();
        assert!(!reply.has_text);
        assert_eq!(reply.scene_type.as_deref(), Some("empty desk"));
        assert!(reply.suggested_prompt.is_none());
    }

    #[test]
    fn test_parse_reply_proceed_with_prompt() {
        let reply = parse_reply(
            r#"{"has_text": true, "scene_type": "receipt", "suggested_prompt": "Read this receipt line by line."}"#,
        )
        .unwrap();
        assert!(reply.has_text);
        assert_eq!(
            reply.suggested_prompt.as_deref(),
            Some("Read this receipt line by line.")
        );
    }

    #[test]
    fn test_parse_reply_garbage_is_none() {
        assert!(parse_reply("Sure! The image shows a cat.").is_none());
    }
}
