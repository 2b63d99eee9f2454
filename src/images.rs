//! Host-side image fetching.
//!
//! Downloads an image over HTTP, shrinks it until its base64 form fits the
//! backend's attachment budget, and returns it as an image content block.
//! Every failure mode comes back as an error-flagged tool result so the
//! backend can read the reason instead of the turn dying.

use std::time::Duration;

use agent_backend::ToolResult;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::actions::ActionProvider;

pub const FETCH_IMAGE_TOOL: &str = "fetch_image";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_DOWNLOAD_BYTES: u64 = 10 * 1024 * 1024;
/// Budget for the base64-encoded payload handed to the backend.
const MAX_BASE64_BYTES: usize = 700 * 1024;
const JPEG_QUALITY: u8 = 85;
const RESIZE_MIN_SCALE: f64 = 0.05;
const RESIZE_MAX_ROUNDS: u32 = 10;

const SUPPORTED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, Error)]
enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("unsupported content type {0:?}")]
    UnsupportedType(String),

    #[error("image exceeds the {0} byte download limit")]
    TooLarge(u64),

    #[error("image processing failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("could not shrink image within the attachment budget")]
    BudgetExceeded,
}

/// `fetch_image` provider backed by a shared HTTP client.
pub struct ImageFetcher {
    http: reqwest::Client,
    max_base64_bytes: usize,
}

impl ImageFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            http,
            max_base64_bytes: MAX_BASE64_BYTES,
        })
    }

    async fn fetch(&self, url: &str) -> Result<(Vec<u8>, String), FetchError> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let header = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let content_type = accepted_content_type(header)?;

        if let Some(length) = response.content_length() {
            if length > MAX_DOWNLOAD_BYTES {
                return Err(FetchError::TooLarge(MAX_DOWNLOAD_BYTES));
            }
        }
        let body = response.bytes().await?;
        if body.len() as u64 > MAX_DOWNLOAD_BYTES {
            return Err(FetchError::TooLarge(MAX_DOWNLOAD_BYTES));
        }

        Ok((body.to_vec(), content_type))
    }
}

#[async_trait]
impl ActionProvider for ImageFetcher {
    fn name(&self) -> &str {
        FETCH_IMAGE_TOOL
    }

    async fn execute(&self, arguments: &Value) -> ToolResult {
        let Some(url) = arguments.get("url").and_then(Value::as_str) else {
            return ToolResult::error("no URL provided");
        };
        if url.trim().is_empty() {
            return ToolResult::error("no URL provided");
        }

        let (body, content_type) = match self.fetch(url).await {
            Ok(fetched) => fetched,
            Err(error) => {
                warn!(url, %error, "image fetch failed");
                return ToolResult::error(format!("failed to fetch image: {error}"));
            }
        };
        debug!(url, bytes = body.len(), content_type, "image downloaded");

        let (encoded_bytes, mime_type) =
            match fit_to_budget(&body, &content_type, self.max_base64_bytes) {
                Ok(fitted) => fitted,
                Err(error) => {
                    warn!(url, %error, "image could not be prepared");
                    return ToolResult::error(format!("failed to prepare image: {error}"));
                }
            };

        ToolResult::success(json!([{
            "type": "image",
            "data": BASE64.encode(&encoded_bytes),
            "mimeType": mime_type,
        }]))
    }
}

/// Strips media-type parameters and checks the result against the
/// supported decoder set.
fn accepted_content_type(header: &str) -> Result<String, FetchError> {
    let media_type = header
        .split(';')
        .next()
        .unwrap_or(header)
        .trim()
        .to_ascii_lowercase();
    if SUPPORTED_TYPES.contains(&media_type.as_str()) {
        Ok(media_type)
    } else {
        Err(FetchError::UnsupportedType(media_type))
    }
}

/// Returns bytes whose base64 form fits `max_base64_bytes`. Small images
/// pass through unchanged; larger ones are re-encoded as JPEG at
/// progressively smaller scales found by binary search.
fn fit_to_budget(
    data: &[u8],
    content_type: &str,
    max_base64_bytes: usize,
) -> Result<(Vec<u8>, String), FetchError> {
    // base64 expands 3 raw bytes into 4 characters.
    let max_raw_bytes = max_base64_bytes / 4 * 3;
    if data.len() <= max_raw_bytes {
        return Ok((data.to_vec(), content_type.to_string()));
    }

    let decoded = image::load_from_memory(data)?;
    let (width, height) = (decoded.width(), decoded.height());

    let mut low = RESIZE_MIN_SCALE;
    let mut high = 1.0_f64;
    let mut best: Option<Vec<u8>> = None;
    for _ in 0..RESIZE_MAX_ROUNDS {
        let scale = (low + high) / 2.0;
        let scaled_width = ((f64::from(width) * scale) as u32).max(1);
        let scaled_height = ((f64::from(height) * scale) as u32).max(1);

        let resized = decoded.resize(scaled_width, scaled_height, FilterType::Lanczos3);
        let mut encoded = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY);
        resized.to_rgb8().write_with_encoder(encoder)?;

        if encoded.len() <= max_raw_bytes {
            let fill = encoded.len() as f64 / max_raw_bytes as f64;
            best = Some(encoded);
            // Close enough to the budget; stop refining.
            if fill > 0.8 {
                break;
            }
            low = scale;
        } else {
            high = scale;
        }
    }

    match best {
        Some(encoded) => Ok((encoded, "image/jpeg".to_string())),
        None => Err(FetchError::BudgetExceeded),
    }
}

#[cfg(test)]
mod tests {
    use image::codecs::png::PngEncoder;
    use image::RgbImage;

    use serde_json::json;

    use super::{accepted_content_type, fit_to_budget, ImageFetcher};
    use crate::actions::ActionProvider;

    fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let pixels = RgbImage::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17)) as u8;
            image::Rgb([v, v.wrapping_mul(3), v.wrapping_add(89)])
        });
        let mut encoded = Vec::new();
        pixels
            .write_with_encoder(PngEncoder::new(&mut encoded))
            .expect("png encoding");
        encoded
    }

    #[test]
    fn small_images_pass_through_unchanged() {
        let png = noisy_png(16, 16);
        let (bytes, mime) = fit_to_budget(&png, "image/png", 700 * 1024).expect("fit");

        assert_eq!(bytes, png);
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn oversized_images_are_reencoded_within_budget() {
        let png = noisy_png(512, 512);
        let budget = 16 * 1024;
        assert!(png.len() > budget / 4 * 3);

        let (bytes, mime) = fit_to_budget(&png, "image/png", budget).expect("fit");

        assert!(bytes.len() <= budget / 4 * 3);
        assert_eq!(mime, "image/jpeg");
        image::load_from_memory(&bytes).expect("result decodes");
    }

    #[test]
    fn content_type_parameters_are_stripped_and_unknown_types_rejected() {
        assert_eq!(
            accepted_content_type("image/PNG; charset=binary").unwrap(),
            "image/png"
        );
        assert!(accepted_content_type("text/html").is_err());
        assert!(accepted_content_type("").is_err());
    }

    #[tokio::test]
    async fn missing_url_is_an_error_result() {
        let fetcher = ImageFetcher::new().expect("client");

        let result = fetcher.execute(&json!({})).await;
        assert!(result.is_error);

        let result = fetcher.execute(&json!({ "url": "  " })).await;
        assert!(result.is_error);
    }
}
