pub mod api;
pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;

use crate::quiz::{strings, QuizQuestion};

pub use gemini::GeminiGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("No Gemini API key configured (set {})", crate::state::API_KEY_ENV)]
    MissingApiKey,
    #[error("Gemini request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Malformed question set: {0}")]
    Malformed(String),
    #[error("Question set is empty")]
    Empty,
}

impl GatewayError {
    /// Message shown on the error screen. Every cause collapses into the same
    /// retry prompt; the detail only goes to the log.
    pub fn user_message(&self) -> &'static str {
        strings::QUESTIONS_UNAVAILABLE
    }
}

/// A generated image as it came off the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    /// base64
    pub data: String,
}

impl EncodedImage {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Remote content the quiz needs. Narration and images degrade to empty
/// content instead of failing; only the question set can fail the session.
#[async_trait]
pub trait ContentGateway: Send + Sync {
    async fn fetch_questions(&self) -> Result<Vec<QuizQuestion>, GatewayError>;

    /// base64 PCM16 mono 24kHz, or empty.
    async fn fetch_narration(&self, text: &str) -> String;

    /// Raster image with its mime type, or empty.
    async fn fetch_character_image(&self, label: &str) -> EncodedImage;
}
