//! Google Cloud Vision image analyzer
//!
//! One `images:annotate` request per image with label, text and face
//! detection. The emotion signal is the first face's joy likelihood.

use async_trait::async_trait;
use memebox_common::config::VisionConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{rate_limiter, CollaboratorError, DirectRateLimiter, ImageAnalysis, ImageAnalyzer};

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    label_annotations: Vec<LabelAnnotation>,
    full_text_annotation: Option<TextAnnotation>,
    #[serde(default)]
    face_annotations: Vec<FaceAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct LabelAnnotation {
    description: String,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaceAnnotation {
    joy_likelihood: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

pub struct GoogleVisionAnalyzer {
    client: reqwest::Client,
    config: VisionConfig,
    rate_limiter: DirectRateLimiter,
}

impl GoogleVisionAnalyzer {
    pub fn new(config: VisionConfig, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Unavailable(format!("HTTP client: {}", e)))?;
        let rate_limiter = rate_limiter(config.requests_per_second);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    fn api_key(&self) -> Option<&str> {
        self.config.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    fn endpoint(&self) -> String {
        format!("{}/images:annotate", self.config.base_url.trim_end_matches('/'))
    }
}

fn request_body(image_url: &str) -> Value {
    json!({
        "requests": [{
            "image": { "source": { "imageUri": image_url } },
            "features": [
                { "type": "LABEL_DETECTION" },
                { "type": "TEXT_DETECTION" },
                { "type": "FACE_DETECTION" }
            ]
        }]
    })
}

fn into_analysis(response: AnnotateResponse) -> Result<ImageAnalysis, CollaboratorError> {
    let image = response
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| CollaboratorError::AnalysisFailed("empty annotate response".to_string()))?;

    if let Some(status) = image.error {
        return Err(CollaboratorError::AnalysisFailed(format!(
            "API error {}: {}",
            status.code, status.message
        )));
    }

    Ok(ImageAnalysis {
        labels: image
            .label_annotations
            .into_iter()
            .map(|label| label.description)
            .collect(),
        ocr_text: image
            .full_text_annotation
            .map(|t| t.text)
            .unwrap_or_default(),
        emotion: image
            .face_annotations
            .into_iter()
            .next()
            .and_then(|face| face.joy_likelihood)
            .unwrap_or_default(),
    })
}

#[async_trait]
impl ImageAnalyzer for GoogleVisionAnalyzer {
    fn name(&self) -> &'static str {
        "GoogleVision"
    }

    async fn analyze(&self, image_url: &str) -> Result<ImageAnalysis, CollaboratorError> {
        let api_key = self
            .api_key()
            .ok_or_else(|| CollaboratorError::Unavailable("Vision API key not configured".to_string()))?;

        self.rate_limiter.until_ready().await;

        debug!(image_url, "Requesting image analysis");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&request_body(image_url))
            .send()
            .await
            .map_err(|e| CollaboratorError::AnalysisFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::AnalysisFailed(format!(
                "API error {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let annotate: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::AnalysisFailed(format!("parse error: {}", e)))?;

        into_analysis(annotate)
    }

    fn is_available(&self) -> bool {
        self.api_key().is_some()
    }
}
