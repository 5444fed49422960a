//! Resolving an image URL to its natural dimensions.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

use posterflow_core::{PosterError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub width: u32,
    pub height: u32,
    pub mime_type: Option<String>,
}

#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Load `url` far enough to know its dimensions. Any failure is
    /// `PosterError::AssetLoad`.
    async fn load(&self, url: &str) -> Result<LoadedImage>;
}

/// Loads `http(s)` URLs over the network and `data:` URLs inline.
pub struct HttpImageLoader {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpImageLoader {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(rest) = url.strip_prefix("data:") {
            return decode_data_url(rest);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PosterError::AssetLoad(format!("Failed to download {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(PosterError::AssetLoad(format!(
                "Failed to download {url}: HTTP {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PosterError::AssetLoad(format!("Failed to read image data: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<LoadedImage> {
        let bytes = tokio::time::timeout(self.timeout, self.fetch(url))
            .await
            .map_err(|_| {
                PosterError::AssetLoad(format!(
                    "Timed out loading image after {}s",
                    self.timeout.as_secs_f64()
                ))
            })??;
        let image = read_dimensions(&bytes)?;
        debug!(width = image.width, height = image.height, "Image loaded");
        Ok(image)
    }
}

/// Decode the part of a data URL after `data:`. Only base64 payloads are
/// accepted.
fn decode_data_url(rest: &str) -> Result<Vec<u8>> {
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| PosterError::AssetLoad("Malformed data URL".into()))?;
    if !meta.ends_with(";base64") {
        return Err(PosterError::AssetLoad(
            "Only base64 data URLs are supported".into(),
        ));
    }
    base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| PosterError::AssetLoad(format!("Invalid base64 image data: {e}")))
}

pub fn read_dimensions(bytes: &[u8]) -> Result<LoadedImage> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PosterError::AssetLoad(format!("Failed to read image: {e}")))?;
    let mime_type = reader.format().map(|f| f.to_mime_type().to_string());
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| PosterError::AssetLoad(format!("Failed to decode image: {e}")))?;
    if width == 0 || height == 0 {
        return Err(PosterError::AssetLoad("Image has no area".into()));
    }
    Ok(LoadedImage {
        width,
        height,
        mime_type,
    })
}
