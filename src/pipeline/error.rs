use crate::llm::ProviderError;

/// Failure taxonomy shared by both pipelines.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("prompt is required")]
    EmptyPrompt,
    /// The image pipeline got a document it cannot template. No provider
    /// call was made.
    #[error("invalid character document: {0}")]
    InvalidInputShape(String),
    /// The provider answered but the envelope held no usable text.
    #[error("empty or invalid provider response: {0}")]
    UpstreamEnvelope(String),
    /// The provider answered with text that is not valid JSON.
    #[error("generated text is not valid JSON: {reason}")]
    InvalidGeneratedFormat { raw: String, reason: String },
    #[error(transparent)]
    ProviderCall(#[from] ProviderError),
}

impl PipelineError {
    /// Short label for timing logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyPrompt => "empty_prompt",
            Self::InvalidInputShape(_) => "invalid_input_shape",
            Self::UpstreamEnvelope(_) => "upstream_envelope",
            Self::InvalidGeneratedFormat { .. } => "invalid_generated_format",
            Self::ProviderCall(_) => "provider_call",
        }
    }
}
