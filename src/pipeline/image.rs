use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::{image_cache_key, CachedResponse, ResponseCache};
use crate::config::ImagePromptStyle;
use crate::llm::ImageProvider;
use crate::models::Appearance;
use crate::pipeline::{PipelineError, PipelineOutput};

const PROMPT_SUFFIX: &str = "wearing adventure gear.";

fn primary(values: &[String]) -> &str {
    values.first().map(|value| value.trim()).unwrap_or_default()
}

fn secondary(values: &[String]) -> Option<&str> {
    values
        .get(1)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Checks that `document` carries every appearance list the prompt needs.
/// Only `appearance` is inspected; other fields are passed through.
pub fn validate_document(document: &Value) -> Result<Appearance, PipelineError> {
    let appearance = document
        .get("appearance")
        .filter(|value| !value.is_null())
        .ok_or_else(|| PipelineError::InvalidInputShape("missing appearance".to_string()))?;
    let appearance = Appearance::deserialize(appearance)
        .map_err(|err| PipelineError::InvalidInputShape(format!("appearance: {err}")))?;

    let missing = appearance.missing_fields();
    if !missing.is_empty() {
        return Err(PipelineError::InvalidInputShape(format!(
            "missing or empty appearance fields: {}",
            missing.join(", ")
        )));
    }
    Ok(appearance)
}

/// Builds the image prompt by position: `hair[0] hair[1] hair`, `skin[0]
/// skin`, `eyes[0] eyes`, `height[0] tall`, `weight[0]`, `facial[0]`.
pub fn build_image_prompt(appearance: &Appearance, style: ImagePromptStyle) -> String {
    let hair = match secondary(&appearance.hair) {
        Some(color) => format!("{} {}", primary(&appearance.hair), color),
        None => primary(&appearance.hair).to_string(),
    };

    match style {
        ImagePromptStyle::Detailed => format!(
            "A person with {} hair, {} skin, {} eyes, {} tall, {}, {}, {}",
            hair,
            primary(&appearance.skin),
            primary(&appearance.eyes),
            primary(&appearance.height),
            primary(&appearance.weight),
            primary(&appearance.facial),
            PROMPT_SUFFIX
        ),
        ImagePromptStyle::Basic => format!(
            "A person with {} hair, {} skin, {}",
            primary(&appearance.hair),
            primary(&appearance.skin),
            PROMPT_SUFFIX
        ),
    }
}

/// Structure-to-image pipeline: character document in, image reference out.
pub struct ImagePipeline {
    provider: Arc<dyn ImageProvider>,
    cache: Arc<ResponseCache>,
    style: ImagePromptStyle,
}

impl ImagePipeline {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        cache: Arc<ResponseCache>,
        style: ImagePromptStyle,
    ) -> Self {
        ImagePipeline {
            provider,
            cache,
            style,
        }
    }

    pub async fn generate(&self, document: &Value) -> Result<PipelineOutput<String>, PipelineError> {
        let appearance = validate_document(document)?;

        let key = image_cache_key(document);
        if let Some(CachedResponse::ImageUrl(url)) = self.cache.get(&key) {
            debug!("Image cache hit");
            return Ok(PipelineOutput {
                value: url,
                from_cache: true,
            });
        }

        let prompt = build_image_prompt(&appearance, self.style);
        debug!(
            "Requesting image from {} (model={}): {}",
            self.provider.name(),
            self.provider.model(),
            prompt
        );
        let url = self.provider.generate_image(&prompt).await?;

        self.cache.set(key, CachedResponse::ImageUrl(url.clone()));
        Ok(PipelineOutput {
            value: url,
            from_cache: false,
        })
    }
}
