//! External services used while composing a note.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::entity::{ImagePayload, NoteKind};

pub type GeneratedImage = ImagePayload;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("{service} timed out after {after:?}")]
    Timeout {
        service: &'static str,
        after: Duration,
    },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Decides whether input text should become a text note or an image note.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<NoteKind, ServiceError>;
}

/// Renders an icon for a prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, ServiceError>;
}

/// Always answers with the same kind.
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier(pub NoteKind);

#[async_trait]
impl Classifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> Result<NoteKind, ServiceError> {
        Ok(self.0)
    }
}

/// Returns the same image for every prompt.
#[derive(Debug, Clone)]
pub struct StaticImage(pub GeneratedImage);

#[async_trait]
impl ImageGenerator for StaticImage {
    async fn generate(&self, _prompt: &str) -> Result<GeneratedImage, ServiceError> {
        Ok(self.0.clone())
    }
}

/// Stand-in when no generator is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImageGenerator;

#[async_trait]
impl ImageGenerator for NoImageGenerator {
    async fn generate(&self, _prompt: &str) -> Result<GeneratedImage, ServiceError> {
        Err(ServiceError::Unavailable(
            "no image generator configured".to_string(),
        ))
    }
}
