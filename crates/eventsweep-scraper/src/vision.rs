//! Image-based vendor name recovery.
//!
//! Sends an image URL to a vision-capable messages API and asks for the
//! business name shown. Every failure degrades to `None`; recovery never
//! fails a source.

use std::time::Duration;

use eventsweep_core::VisionConfig;
use serde_json::{json, Value};

use crate::error::{ScraperError, VisionError};
use crate::normalize::{is_generic_name, strip_business_suffixes};

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 200;
/// Reply meaning the service could not identify a name.
const UNKNOWN_SENTINEL: &str = "UNKNOWN";

/// Extensions and host fragments that mark a URL as an image.
const IMAGE_INDICATORS: &[&str] = &[
    ".jpg",
    ".jpeg",
    ".png",
    ".gif",
    ".webp",
    "s3.amazonaws.com",
    "images.",
    "img.",
    "media.",
];

const PROMPT: &str = "Look at this food truck or restaurant logo/image. \
Extract ONLY the business name (e.g., \"Georgia's Greek\", \"Marination\", \"Paseo\"). \
Do not include words like \"Food Truck\", \"Kitchen\", \"Catering\" unless they're part of the actual business name. \
If you cannot clearly identify a business name, respond with \"UNKNOWN\". \
Respond with just the business name, nothing else.";

/// True when `reference` is an absolute http(s) URL that looks like an
/// image. Anything else is not worth a network call.
#[must_use]
pub fn is_plausible_image_ref(reference: &str) -> bool {
    let lower = reference.trim().to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://"))
        && IMAGE_INDICATORS.iter().any(|ind| lower.contains(ind))
}

/// Reads a service reply: the unknown sentinel (any case, optional trailing
/// period) and placeholders become `None`; anything else is cleaned into a
/// bare brand name.
#[must_use]
pub fn interpret_response(text: &str) -> Option<String> {
    let reply = text.trim().trim_matches('"').trim();
    let bare = reply.trim_end_matches('.');
    if bare.is_empty() || bare.eq_ignore_ascii_case(UNKNOWN_SENTINEL) || is_generic_name(bare) {
        return None;
    }
    let name = strip_business_suffixes(reply);
    (!is_generic_name(&name)).then_some(name)
}

/// Client for the image-analysis service.
#[derive(Clone)]
pub struct VisionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    /// Additional attempts after a timeout-class failure.
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for VisionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[redacted]")
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl VisionClient {
    /// Builds a client with the configured per-call timeout, two timeout
    /// retries, and a one second pause between attempts.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: &VisionConfig) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.api_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
        })
    }

    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Asks the service for the vendor name in `image_ref`.
    ///
    /// Returns `None` without a network call for implausible references,
    /// and `None` when the service declines, a non-timeout error occurs, or
    /// timeout retries run out.
    pub async fn recover(&self, image_ref: &str) -> Option<String> {
        if !is_plausible_image_ref(image_ref) {
            tracing::debug!(image_ref, "not a recognizable image URL, skipping recovery");
            return None;
        }

        let mut attempt = 0u32;
        loop {
            match self.analyze(image_ref).await {
                Ok(text) => {
                    let name = interpret_response(&text);
                    tracing::debug!(image_ref, recovered = ?name, "image analysis complete");
                    return name;
                }
                Err(err) if err.is_timeout() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        image_ref,
                        attempt,
                        max_retries = self.max_retries,
                        error = %err,
                        "image analysis timed out, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => {
                    tracing::warn!(image_ref, error = %err, "image analysis failed");
                    return None;
                }
            }
        }
    }

    async fn analyze(&self, image_ref: &str) -> Result<String, VisionError> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "image", "source": {"type": "url", "url": image_ref}},
                    {"type": "text", "text": PROMPT}
                ]
            }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VisionError::Status {
                status: status.as_u16(),
            });
        }

        let payload: Value = response.json().await?;
        payload
            .get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| blocks.iter().find_map(|b| b.get("text")))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(VisionError::MissingText)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plausible_image_refs() {
        assert!(is_plausible_image_ref("https://example.com/trucks/georgia.JPG"));
        assert!(is_plausible_image_ref(
            "https://bucket.s3.amazonaws.com/uploads/abc123"
        ));
        assert!(is_plausible_image_ref("http://images.example.com/x"));
        assert!(!is_plausible_image_ref("https://example.com/trucks/georgia"));
        assert!(!is_plausible_image_ref("/relative/logo.png"));
        assert!(!is_plausible_image_ref("data:image/png;base64,AAAA"));
        assert!(!is_plausible_image_ref(""));
    }

    #[test]
    fn unknown_sentinel_is_none() {
        assert_eq!(interpret_response("UNKNOWN"), None);
        assert_eq!(interpret_response("unknown."), None);
        assert_eq!(interpret_response("  \"Unknown\" "), None);
        assert_eq!(interpret_response(""), None);
    }

    #[test]
    fn suffixes_are_stripped_from_replies() {
        assert_eq!(
            interpret_response("Georgia's Food Truck").as_deref(),
            Some("Georgia's")
        );
        assert_eq!(
            interpret_response("Marination Kitchen LLC").as_deref(),
            Some("Marination")
        );
        assert_eq!(interpret_response("Paseo").as_deref(), Some("Paseo"));
    }
}
