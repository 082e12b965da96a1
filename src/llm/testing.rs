use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::llm::types::{EnvelopeText, ImageProvider, ProviderError, TextProvider, TextRequest};

#[derive(Debug, Clone)]
pub enum FakeReply<T> {
    Ok(T),
    StatusError(u16),
}

impl<T: Clone> FakeReply<T> {
    fn resolve(&self, provider: &'static str) -> Result<T, ProviderError> {
        match self {
            Self::Ok(value) => Ok(value.clone()),
            Self::StatusError(status) => Err(ProviderError::Status {
                provider,
                status: *status,
                message: "fake upstream failure".to_string(),
            }),
        }
    }
}

/// Text provider that replays a fixed reply and records requests.
pub struct FakeTextProvider {
    reply: FakeReply<EnvelopeText>,
    calls: AtomicUsize,
    requests: Mutex<Vec<TextRequest>>,
}

impl FakeTextProvider {
    pub fn replying(reply: FakeReply<EnvelopeText>) -> Arc<Self> {
        Arc::new(FakeTextProvider {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn text(text: &str) -> Arc<Self> {
        Self::replying(FakeReply::Ok(EnvelopeText::Text(text.to_string())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<TextRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl TextProvider for FakeTextProvider {
    fn name(&self) -> &'static str {
        "fake-text"
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<EnvelopeText, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        self.reply.resolve(self.name())
    }
}

/// Image provider that replays a fixed reply and records prompts.
pub struct FakeImageProvider {
    reply: FakeReply<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeImageProvider {
    pub fn replying(reply: FakeReply<String>) -> Arc<Self> {
        Arc::new(FakeImageProvider {
            reply,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn url(url: &str) -> Arc<Self> {
        Self::replying(FakeReply::Ok(url.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ImageProvider for FakeImageProvider {
    fn name(&self) -> &'static str {
        "fake-image"
    }

    fn model(&self) -> &str {
        "fake-image-model"
    }

    async fn generate_image(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        self.reply.resolve(self.name())
    }
}
