//! Turning user input into note content via the classification and image
//! services, with timeouts and fallbacks.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{DEFAULT_CLASSIFY_TIMEOUT_MS, DEFAULT_GENERATE_TIMEOUT_MS};
use crate::entity::NoteKind;
use crate::services::{Classifier, GeneratedImage, ImageGenerator, ServiceError};

/// Prompt sent to the image generator for `text`.
pub fn icon_prompt(text: &str) -> String {
    format!(
        "A simple, cute, cartoon-style icon of a \"{}\". Centered on a clean, white background.",
        text
    )
}

/// Final content for a composed note.
#[derive(Debug, Clone, PartialEq)]
pub enum ComposedContent {
    Text(String),
    Image(GeneratedImage),
}

impl ComposedContent {
    pub fn kind(&self) -> NoteKind {
        match self {
            ComposedContent::Text(_) => NoteKind::Text,
            ComposedContent::Image(_) => NoteKind::Image,
        }
    }

    /// The string stored in a note's `content` field.
    pub fn into_content(self) -> String {
        match self {
            ComposedContent::Text(text) => text,
            ComposedContent::Image(image) => image.to_data_url(),
        }
    }
}

/// Something the user should be told about, without failing the operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    GenerationFailed { prompt: String, reason: ServiceError },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::GenerationFailed { reason, .. } => {
                write!(f, "Image generation failed ({}); saved as text instead", reason)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub content: ComposedContent,
    pub notice: Option<Notice>,
}

pub struct Composer<C, G> {
    classifier: C,
    generator: G,
    classify_timeout: Duration,
    generate_timeout: Duration,
}

impl<C: Classifier, G: ImageGenerator> Composer<C, G> {
    pub fn new(classifier: C, generator: G) -> Self {
        Self {
            classifier,
            generator,
            classify_timeout: Duration::from_millis(DEFAULT_CLASSIFY_TIMEOUT_MS),
            generate_timeout: Duration::from_millis(DEFAULT_GENERATE_TIMEOUT_MS),
        }
    }

    pub fn with_timeouts(mut self, classify: Duration, generate: Duration) -> Self {
        self.classify_timeout = classify;
        self.generate_timeout = generate;
        self
    }

    /// Kind of note to create for `text`. Any failure means text.
    pub async fn classify(&self, text: &str) -> NoteKind {
        let outcome = bounded(
            "classifier",
            self.classify_timeout,
            self.classifier.classify(text),
        )
        .await;
        match outcome {
            Ok(kind) => {
                info!(%kind, "input classified");
                kind
            }
            Err(e) => {
                warn!(error = %e, "classification failed, defaulting to text");
                NoteKind::Text
            }
        }
    }

    /// Produce content for `text` as `kind`. A failed image falls back to
    /// the original text and carries a notice.
    pub async fn render(&self, text: &str, kind: NoteKind) -> Composition {
        if kind == NoteKind::Text {
            return Composition {
                content: ComposedContent::Text(text.to_string()),
                notice: None,
            };
        }

        let prompt = icon_prompt(text);
        let outcome = bounded(
            "image generator",
            self.generate_timeout,
            self.generator.generate(&prompt),
        )
        .await
        .and_then(|image| {
            if image.bytes.is_empty() {
                Err(ServiceError::Malformed("empty image payload".to_string()))
            } else {
                Ok(image)
            }
        });

        match outcome {
            Ok(image) => {
                info!(bytes = image.bytes.len(), media_type = %image.media_type, "icon generated");
                Composition {
                    content: ComposedContent::Image(image),
                    notice: None,
                }
            }
            Err(reason) => {
                warn!(error = %reason, "image generation failed, falling back to text");
                Composition {
                    content: ComposedContent::Text(text.to_string()),
                    notice: Some(Notice::GenerationFailed { prompt, reason }),
                }
            }
        }
    }
}

async fn bounded<T>(
    service: &'static str,
    after: Duration,
    call: impl Future<Output = Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    tokio::time::timeout(after, call)
        .await
        .unwrap_or(Err(ServiceError::Timeout { service, after }))
}
