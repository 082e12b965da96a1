use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::llm::post_json;
use crate::llm::types::{EnvelopeText, ImageProvider, ProviderError, TextProvider, TextRequest};
use crate::utils::timing::log_provider_timing;

const PROVIDER: &str = "gemini";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
        #[serde(default)]
        thought: Option<bool>,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

fn decode_response(body: &Value) -> Result<GeminiResponse, String> {
    if !body.is_object() {
        return Err("response body is not a JSON object".to_string());
    }
    GeminiResponse::deserialize(body).map_err(|err| format!("unexpected response shape: {err}"))
}

/// Concatenates the text parts of the first candidate, skipping thought parts.
pub fn unwrap_generate_content(body: &Value) -> EnvelopeText {
    let response = match decode_response(body) {
        Ok(response) => response,
        Err(detail) => return EnvelopeText::Malformed(detail),
    };

    let Some(candidates) = response.candidates else {
        let detail = match response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            Some(reason) => format!("missing candidates (prompt blocked: {reason})"),
            None => "missing candidates".to_string(),
        };
        return EnvelopeText::Malformed(detail);
    };
    let Some(candidate) = candidates.into_iter().next() else {
        return EnvelopeText::Empty;
    };
    let Some(content) = candidate.content else {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return EnvelopeText::Malformed(format!(
            "candidates[0].content is missing (finishReason: {reason})"
        ));
    };
    let Some(parts) = content.parts else {
        return EnvelopeText::Malformed("candidates[0].content.parts is missing".to_string());
    };

    // Parts are consecutive slices of one reply, so they are joined as-is.
    let text: String = parts
        .into_iter()
        .filter_map(|part| match part {
            GeminiPart::Text { text, thought } if thought != Some(true) => Some(text),
            _ => None,
        })
        .collect();

    if text.trim().is_empty() {
        EnvelopeText::Empty
    } else {
        EnvelopeText::Text(text)
    }
}

/// First inline image of any candidate, as a `data:` URL.
pub fn extract_inline_image(body: &Value) -> Option<String> {
    let response = decode_response(body).ok()?;
    for candidate in response.candidates.unwrap_or_default() {
        let parts = candidate
            .content
            .and_then(|content| content.parts)
            .unwrap_or_default();
        for part in parts {
            if let GeminiPart::InlineData { inline_data } = part {
                if inline_data.mime_type.starts_with("image/") && !inline_data.data.is_empty() {
                    return Some(format!(
                        "data:{};base64,{}",
                        inline_data.mime_type, inline_data.data
                    ));
                }
            }
        }
    }
    None
}

/// Maps a `WxH` size onto the closest aspect-ratio hint Gemini accepts.
fn aspect_ratio_for_size(size: &str) -> Option<String> {
    let (width, height) = size.trim().split_once(['x', 'X'])?;
    let width = width.trim().parse::<u32>().ok()?;
    let height = height.trim().parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    let divisor = gcd(width, height);
    Some(format!("{}:{}", width / divisor, height / divisor))
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let rest = a % b;
        a = b;
        b = rest;
    }
    a
}

#[derive(Debug, Clone)]
struct GeminiEndpoint {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiEndpoint {
    fn new(client: Client, base_url: &str, api_key: &str, timeout: Duration) -> Self {
        GeminiEndpoint {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }

    async fn generate_content(&self, model: &str, payload: &Value) -> Result<Value, ProviderError> {
        let builder = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout);
        post_json(PROVIDER, builder, payload).await
    }
}

#[derive(Debug, Clone)]
pub struct GeminiTextProvider {
    endpoint: GeminiEndpoint,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiTextProvider {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
        max_output_tokens: u32,
        timeout: Duration,
    ) -> Self {
        GeminiTextProvider {
            endpoint: GeminiEndpoint::new(client, base_url, api_key, timeout),
            model: model.to_string(),
            temperature,
            max_output_tokens,
        }
    }

    fn build_payload(&self, request: &TextRequest) -> Value {
        json!({
            "systemInstruction": { "parts": [{ "text": request.system_prompt }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.user_content }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
                "responseMimeType": "application/json",
            },
        })
    }
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<EnvelopeText, ProviderError> {
        let payload = self.build_payload(request);
        log_provider_timing(PROVIDER, &self.model, "generate_content", || async {
            let body = self.endpoint.generate_content(&self.model, &payload).await?;
            Ok(unwrap_generate_content(&body))
        })
        .await
    }
}

#[derive(Debug, Clone)]
pub struct GeminiImageProvider {
    endpoint: GeminiEndpoint,
    model: String,
    size: String,
}

impl GeminiImageProvider {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        size: &str,
        timeout: Duration,
    ) -> Self {
        GeminiImageProvider {
            endpoint: GeminiEndpoint::new(client, base_url, api_key, timeout),
            model: model.to_string(),
            size: size.to_string(),
        }
    }

    fn build_payload(&self, prompt: &str) -> Value {
        let mut generation_config = Map::new();
        generation_config.insert("responseModalities".to_string(), json!(["TEXT", "IMAGE"]));
        generation_config.insert("candidateCount".to_string(), json!(1));
        if let Some(aspect_ratio) = aspect_ratio_for_size(&self.size) {
            generation_config.insert(
                "imageConfig".to_string(),
                json!({ "aspectRatio": aspect_ratio }),
            );
        }

        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": Value::Object(generation_config),
        })
    }
}

#[async_trait]
impl ImageProvider for GeminiImageProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_image(&self, prompt: &str) -> Result<String, ProviderError> {
        let payload = self.build_payload(prompt);
        log_provider_timing(PROVIDER, &self.model, "image_generation", || async {
            let body = self.endpoint.generate_content(&self.model, &payload).await?;
            extract_inline_image(&body).ok_or_else(|| {
                warn!("Gemini image response carried no inline image");
                ProviderError::MissingImage {
                    provider: PROVIDER,
                    message: format!("no inline image data (model: {})", self.model),
                }
            })
        })
        .await
    }
}
