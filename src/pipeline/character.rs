use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{text_cache_key, CachedResponse, ResponseCache};
use crate::config::CHARACTER_SYSTEM_PROMPT;
use crate::llm::{truncate_for_log, EnvelopeText, TextProvider, TextRequest};
use crate::models::CharacterDescription;
use crate::pipeline::{PipelineError, PipelineOutput};

/// A fence only counts when it wraps the whole (trimmed) reply: an opening
/// line of three backticks with an optional language tag, and a closing
/// line of three backticks.
static WRAPPING_CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A```[A-Za-z0-9_+.-]*[ \t]*\r?\n?(.*?)\s*```\z")
        .expect("valid code fence regex")
});

pub fn build_user_content(prompt: &str) -> String {
    format!("Describe: {prompt}")
}

pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match WRAPPING_CODE_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default(),
        None => trimmed,
    }
}

/// Strictly parses generated text. No repair is attempted; on failure the
/// raw text comes back inside the error.
pub fn parse_generated_text(raw: &str) -> Result<Value, PipelineError> {
    serde_json::from_str::<Value>(strip_code_fence(raw)).map_err(|err| {
        PipelineError::InvalidGeneratedFormat {
            raw: raw.to_string(),
            reason: err.to_string(),
        }
    })
}

/// The document is returned as generated; this only flags replies the
/// image pipeline will later reject.
fn warn_if_not_renderable(document: &Value) {
    let missing = match CharacterDescription::deserialize(document) {
        Ok(CharacterDescription {
            appearance: Some(appearance),
            ..
        }) => appearance.missing_fields(),
        Ok(_) => vec!["appearance"],
        Err(err) => {
            warn!("Generated document does not match the character schema: {}", err);
            return;
        }
    };
    if !missing.is_empty() {
        warn!(
            "Generated document lacks appearance fields needed for images: {}",
            missing.join(", ")
        );
    }
}

/// Text-to-structure pipeline: prompt in, character document out.
pub struct CharacterPipeline {
    provider: Arc<dyn TextProvider>,
    cache: Arc<ResponseCache>,
}

impl CharacterPipeline {
    pub fn new(provider: Arc<dyn TextProvider>, cache: Arc<ResponseCache>) -> Self {
        CharacterPipeline { provider, cache }
    }

    pub async fn generate(&self, prompt: &str) -> Result<PipelineOutput<Value>, PipelineError> {
        if prompt.trim().is_empty() {
            return Err(PipelineError::EmptyPrompt);
        }

        let key = text_cache_key(prompt);
        if let Some(CachedResponse::Character(document)) = self.cache.get(&key) {
            debug!("Character cache hit for prompt {:?}", truncate_for_log(prompt, 80));
            return Ok(PipelineOutput {
                value: document,
                from_cache: true,
            });
        }

        let request = TextRequest {
            system_prompt: CHARACTER_SYSTEM_PROMPT.to_string(),
            user_content: build_user_content(prompt),
        };
        let envelope = self.provider.generate_text(&request).await?;

        let raw = match envelope {
            EnvelopeText::Text(text) => text,
            EnvelopeText::Empty => {
                return Err(PipelineError::UpstreamEnvelope(format!(
                    "{} returned no text",
                    self.provider.name()
                )));
            }
            EnvelopeText::Malformed(detail) => {
                return Err(PipelineError::UpstreamEnvelope(format!(
                    "{} envelope: {}",
                    self.provider.name(),
                    detail
                )));
            }
        };

        let document = parse_generated_text(&raw).inspect_err(|_| {
            warn!(
                "Generated text from {} (model={}) is not valid JSON: {}",
                self.provider.name(),
                self.provider.model(),
                truncate_for_log(&raw, 500)
            );
        })?;

        warn_if_not_renderable(&document);
        self.cache
            .set(key, CachedResponse::Character(document.clone()));
        Ok(PipelineOutput {
            value: document,
            from_cache: false,
        })
    }
}
