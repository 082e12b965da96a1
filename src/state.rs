use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::config::ImagePromptStyle;
use crate::llm::{ImageProvider, TextProvider};
use crate::pipeline::{CharacterPipeline, ImagePipeline};

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ResponseCache>,
    pub characters: Arc<CharacterPipeline>,
    pub images: Arc<ImagePipeline>,
}

impl AppState {
    pub fn new(
        cache: Arc<ResponseCache>,
        text_provider: Arc<dyn TextProvider>,
        image_provider: Arc<dyn ImageProvider>,
        prompt_style: ImagePromptStyle,
    ) -> Self {
        AppState {
            characters: Arc::new(CharacterPipeline::new(text_provider, cache.clone())),
            images: Arc::new(ImagePipeline::new(
                image_provider,
                cache.clone(),
                prompt_style,
            )),
            cache,
        }
    }
}
