pub mod character;
pub mod error;
pub mod image;

pub use character::CharacterPipeline;
pub use error::PipelineError;
pub use image::ImagePipeline;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput<T> {
    pub value: T,
    pub from_cache: bool,
}
