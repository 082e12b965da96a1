use async_trait::async_trait;

/// Innermost generated text pulled out of a provider envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeText {
    Text(String),
    /// The envelope was well formed but carried no text.
    Empty,
    /// An expected nesting level was absent or had the wrong type.
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} request failed with status {status}: {message}")]
    Status {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("{provider} returned no image: {message}")]
    MissingImage {
        provider: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub system_prompt: String,
    pub user_content: String,
}

#[async_trait]
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    /// Calls the provider and unwraps its envelope. Transport and HTTP
    /// status failures are errors; everything after a response body was
    /// received is reported through `EnvelopeText`.
    async fn generate_text(&self, request: &TextRequest) -> Result<EnvelopeText, ProviderError>;
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    /// Generates a single image and returns a reference to it (an http URL
    /// or a `data:` URL).
    async fn generate_image(&self, prompt: &str) -> Result<String, ProviderError>;
}
