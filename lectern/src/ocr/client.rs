use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::{LecternError, Result};

/// Retries after the first attempt. The backend contract allows exactly one.
const MAX_RETRIES: u32 = 1;

/// Client for the remote recognition backend.
///
/// The wire contract is a single POST of `{image, prompt?}` answered by
/// `{status, text?, error?}`. A transient failure (connect error, request
/// timeout, 5xx) is retried once after a short backoff; any 4xx response is
/// treated as a permanent rejection and never retried.
#[derive(Clone, Debug)]
pub struct OcrClient {
    client: Client,
    api_url: String,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    status: String,
    text: Option<String>,
    error: Option<String>,
}

impl OcrClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LecternError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// Submit a processed frame and return the recognized text.
    pub async fn submit(&self, image_bytes: &[u8], prompt: Option<&str>) -> Result<String> {
        let base64_image = STANDARD.encode(image_bytes);
        let request = OcrRequest {
            image: &base64_image,
            prompt,
        };

        let mut last_error: Option<LecternError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay_ms = 100 * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let response = self.client.post(&self.api_url).json(&request).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Self::extract_text(resp).await;
                    }

                    let body = resp.text().await.unwrap_or_default();
                    let remote = LecternError::Remote {
                        code: status.as_u16(),
                        message: if body.is_empty() {
                            status.to_string()
                        } else {
                            truncate_detail(&body)
                        },
                    };

                    if status.is_server_error() && attempt < MAX_RETRIES {
                        tracing::warn!(code = status.as_u16(), "OCR backend error, retrying once");
                        last_error = Some(remote);
                        continue;
                    }

                    return Err(remote);
                }
                Err(e) => {
                    let mapped = self.map_transport_error(e);
                    if attempt < MAX_RETRIES {
                        tracing::warn!(error = %mapped, "OCR request failed, retrying once");
                        last_error = Some(mapped);
                        continue;
                    }
                    return Err(mapped);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| LecternError::Internal("OCR submission failed after retry".into())))
    }

    fn map_transport_error(&self, e: reqwest::Error) -> LecternError {
        if e.is_timeout() {
            LecternError::BackendTimeout(self.timeout_secs)
        } else {
            LecternError::BackendConnection(e.to_string())
        }
    }

    async fn extract_text(resp: reqwest::Response) -> Result<String> {
        let parsed: OcrResponse = resp.json().await.map_err(|e| LecternError::Remote {
            code: 200,
            message: format!("Failed to parse backend response: {e}"),
        })?;

        match parsed.status.as_str() {
            "completed" => {
                let text = parsed.text.unwrap_or_default();
                if text.trim().is_empty() {
                    // A 200 with no text is useless to the listener; surface it.
                    return Err(LecternError::Remote {
                        code: 200,
                        message: "Backend returned an empty result".to_string(),
                    });
                }
                Ok(text)
            }
            other => Err(LecternError::Remote {
                code: 200,
                message: parsed
                    .error
                    .unwrap_or_else(|| format!("Backend reported status '{other}'")),
            }),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

fn truncate_detail(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &body[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn create_test_config() -> BackendConfig {
        BackendConfig {
            api_url: "http://127.0.0.1:5000/ocr".to_string(),
            prompt: "<image>\nFree OCR.".to_string(),
            request_timeout_secs: 30,
        }
    }

    #[test]
    fn test_client_construction() {
        let client = OcrClient::new(&create_test_config()).unwrap();
        assert_eq!(client.api_url(), "http://127.0.0.1:5000/ocr");
    }

    #[test]
    fn test_request_omits_absent_prompt() {
        let request = OcrRequest {
            image: "aGVsbG8=",
            prompt: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["image"], "aGVsbG8=");
        assert!(json.get("prompt").is_none());
    }

    #[test]
    fn test_request_includes_prompt() {
        let request = OcrRequest {
            image: "aGVsbG8=",
            prompt: Some("Read the page"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["prompt"], "Read the page");
    }

    #[test]
    fn test_response_parses_minimal_error_shape() {
        let parsed: OcrResponse =
            serde_json::from_str(r#"{"status":"error","error":"model overloaded"}"#).unwrap();
        assert_eq!(parsed.status, "error");
        assert!(parsed.text.is_none());
        assert_eq!(parsed.error.as_deref(), Some("model overloaded"));
    }

    #[test]
    fn test_base64_encoding() {
        let bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        let encoded = STANDARD.encode(&bytes);
        assert_eq!(encoded, "/9j/4A==");
    }

    #[test]
    fn test_truncate_detail_short_body() {
        assert_eq!(truncate_detail("short"), "short");
    }

    #[test]
    fn test_truncate_detail_long_body() {
        let body = "x".repeat(500);
        let out = truncate_detail(&body);
        assert!(out.chars().count() <= 201);
        assert!(out.ends_with('…'));
    }
}
