use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::llm::post_json;
use crate::llm::types::{EnvelopeText, ImageProvider, ProviderError, TextProvider, TextRequest};
use crate::utils::timing::log_provider_timing;

const PROVIDER: &str = "openai";

static LEADING_THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A\s*<think>.*?</think>").expect("valid think-block regex"));

#[derive(Debug, Clone)]
pub struct OpenAiChatProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiChatProvider {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        OpenAiChatProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
            max_tokens,
            timeout,
        }
    }

    fn build_payload(&self, request: &TextRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_content },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

/// Reasoning models behind OpenAI-compatible gateways may prefix the answer
/// with a `<think>` block.
fn strip_leading_reasoning(content: &str) -> &str {
    match LEADING_THINK_BLOCK.find(content) {
        Some(found) => &content[found.end()..],
        None => content,
    }
}

/// Unwraps `choices[0].message.content` from a chat completion body.
pub fn unwrap_chat_completion(body: &Value) -> EnvelopeText {
    if !body.is_object() {
        return EnvelopeText::Malformed("response body is not a JSON object".to_string());
    }
    let Some(choices) = body.get("choices") else {
        return EnvelopeText::Malformed("missing choices".to_string());
    };
    let Some(choices) = choices.as_array() else {
        return EnvelopeText::Malformed("choices is not an array".to_string());
    };
    let Some(first) = choices.first() else {
        return EnvelopeText::Empty;
    };
    let Some(message) = first.get("message").filter(|message| message.is_object()) else {
        return EnvelopeText::Malformed("choices[0].message is missing".to_string());
    };

    match message.get("content") {
        None | Some(Value::Null) => {
            if let Some(refusal) = message.get("refusal").and_then(|v| v.as_str()) {
                debug!("OpenAI completion refused: {}", refusal);
            }
            EnvelopeText::Empty
        }
        Some(Value::String(content)) => {
            let content = strip_leading_reasoning(content);
            if content.trim().is_empty() {
                EnvelopeText::Empty
            } else {
                EnvelopeText::Text(content.to_string())
            }
        }
        Some(_) => EnvelopeText::Malformed("choices[0].message.content is not a string".to_string()),
    }
}

#[async_trait]
impl TextProvider for OpenAiChatProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<EnvelopeText, ProviderError> {
        let payload = self.build_payload(request);
        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout);

        log_provider_timing(PROVIDER, &self.model, "chat_completion", || async {
            let body = post_json(PROVIDER, builder, &payload).await?;
            Ok(unwrap_chat_completion(&body))
        })
        .await
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiImageProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    size: String,
    timeout: Duration,
}

impl OpenAiImageProvider {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        size: &str,
        timeout: Duration,
    ) -> Self {
        OpenAiImageProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            size: size.to_string(),
            timeout,
        }
    }

    fn build_payload(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": self.size,
        })
    }
}

/// First image reference in an images response: `data[i].url`, or a
/// `data:` URL built from `data[i].b64_json`.
pub fn extract_image_reference(body: &Value) -> Option<String> {
    let items = body.get("data")?.as_array()?;
    for item in items {
        if let Some(url) = item.get("url").and_then(|v| v.as_str()) {
            if !url.trim().is_empty() {
                return Some(url.to_string());
            }
        }
        if let Some(data) = item.get("b64_json").and_then(|v| v.as_str()) {
            if !data.trim().is_empty() {
                return Some(format!("data:image/png;base64,{data}"));
            }
        }
    }
    None
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_image(&self, prompt: &str) -> Result<String, ProviderError> {
        let payload = self.build_payload(prompt);
        let builder = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout);

        log_provider_timing(PROVIDER, &self.model, "image_generation", || async {
            let body = post_json(PROVIDER, builder, &payload).await?;
            extract_image_reference(&body).ok_or_else(|| {
                warn!("OpenAI image response carried no image reference");
                ProviderError::MissingImage {
                    provider: PROVIDER,
                    message: format!("no url or b64_json in response (model: {})", self.model),
                }
            })
        })
        .await
    }
}
