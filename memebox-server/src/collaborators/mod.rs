//! External AI collaborators
//!
//! The enrichment pipeline only depends on the two traits defined here. The
//! concrete HTTP adapters live in the submodules:
//! - [`openai::OpenAiDescriptionGenerator`] - witty description per image
//! - [`vision::GoogleVisionAnalyzer`] - labels, OCR text and emotion per image

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use thiserror::Error;

pub mod openai;
pub mod vision;

pub use openai::OpenAiDescriptionGenerator;
pub use vision::GoogleVisionAnalyzer;

/// Collaborator call failures
///
/// These never fail a request: the affected record simply stays unenriched.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Description generation failed: {0}")]
    GenerationFailed(String),

    #[error("Image analysis failed: {0}")]
    AnalysisFailed(String),

    /// Collaborator is not configured (e.g. missing API key)
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Produces free-text commentary for an image
#[async_trait]
pub trait DescriptionGenerator: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> &'static str;

    /// Generate a description for `image_url` titled `title`
    ///
    /// May be slow; callers issue independent calls concurrently.
    async fn generate(&self, image_url: &str, title: &str) -> Result<String, CollaboratorError>;

    /// Whether the generator can be called at all (credentials configured)
    fn is_available(&self) -> bool {
        true
    }
}

/// Result of analyzing one image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub labels: Vec<String>,
    /// Empty when no text was found
    pub ocr_text: String,
    /// Empty when no face was detected
    pub emotion: String,
}

/// Extracts labels, OCR text and an emotion signal from an image
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, image_url: &str) -> Result<ImageAnalysis, CollaboratorError>;

    fn is_available(&self) -> bool {
        true
    }
}

type DirectRateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

fn rate_limiter(requests_per_second: u32) -> DirectRateLimiter {
    let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    governor::RateLimiter::direct(governor::Quota::per_second(per_second))
}
