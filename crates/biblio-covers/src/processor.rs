//! Cover Processor pipeline: allow-list check, bounded download,
//! format detection, decode, resize-to-three-sizes (never upscaling), WebP
//! transcode, and blob upload.

use std::sync::Arc;
use std::time::Instant;

use biblio_common::Isbn13;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use tracing::{info, warn};

use crate::allow_list::HostAllowList;
use crate::blob_store::BlobStore;
use crate::error::{CoverProcessError, ProviderUrlKind};

/// Minimum/maximum acceptable download size.
const MIN_DOWNLOAD_BYTES: usize = 100;
const MAX_DOWNLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Below this size, re-encoding to WebP would likely inflate the file, so
/// the original bytes are kept instead.
const SMALL_IMAGE_THRESHOLD_BYTES: usize = 5 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverSizeTier {
    Large,
    Medium,
    Small,
}

impl CoverSizeTier {
    pub const ALL: [CoverSizeTier; 3] = [CoverSizeTier::Large, CoverSizeTier::Medium, CoverSizeTier::Small];

    fn bounds(self) -> (u32, u32) {
        match self {
            CoverSizeTier::Large => (512, 768),
            CoverSizeTier::Medium => (256, 384),
            CoverSizeTier::Small => (128, 192),
        }
    }

    pub fn key_suffix(self) -> &'static str {
        match self {
            CoverSizeTier::Large => "large",
            CoverSizeTier::Medium => "medium",
            CoverSizeTier::Small => "small",
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CoverMetrics {
    pub download_ms: u64,
    pub process_ms: u64,
    pub upload_ms: u64,
    pub total_ms: u64,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
}

pub struct CoverProcessOutcome {
    pub metrics: CoverMetrics,
    /// Blob keys written, one per size tier.
    pub keys: Vec<String>,
}

pub struct CoverProcessor {
    http: reqwest::Client,
    allow_list: HostAllowList,
    blob_store: Arc<dyn BlobStore>,
}

impl CoverProcessor {
    pub fn new(http: reqwest::Client, allow_list: HostAllowList, blob_store: Arc<dyn BlobStore>) -> Self {
        Self { http, allow_list, blob_store }
    }

    pub async fn process_cover(&self, isbn: &Isbn13, provider_url: &str) -> Result<CoverProcessOutcome, CoverProcessError> {
        let started = Instant::now();

        let url = url::Url::parse(provider_url).map_err(|err| CoverProcessError::Download(err.to_string()))?;
        if !self.allow_list.check(&url) {
            return Err(CoverProcessError::HostNotAllowed(
                url.host_str().unwrap_or("<no-host>").to_string(),
            ));
        }

        let download_started = Instant::now();
        let bytes = self.download(isbn, &url).await?;
        let download_ms = download_started.elapsed().as_millis() as u64;
        let original_bytes = bytes.len() as u64;

        let process_started = Instant::now();
        let image = image::load_from_memory(&bytes).map_err(|err| CoverProcessError::Decode(err.to_string()))?;
        let resized = resize_all_tiers(&image);
        let encoded = encode_all_tiers(resized, &bytes);
        let process_ms = process_started.elapsed().as_millis() as u64;

        let upload_started = Instant::now();
        let mut keys = Vec::with_capacity(encoded.len());
        let mut compressed_bytes = 0u64;
        for (tier, content_type, payload) in encoded {
            let extension = if content_type == "image/webp" { "webp" } else { "jpg" };
            let key = format!("isbn/{isbn}/{}.{extension}", tier.key_suffix());
            compressed_bytes += payload.len() as u64;
            self.blob_store
                .put(&key, Bytes::from(payload), content_type)
                .await
                .map_err(|err| CoverProcessError::Upload(err.to_string()))?;
            keys.push(key);
        }
        let upload_ms = upload_started.elapsed().as_millis() as u64;

        let metrics = CoverMetrics {
            download_ms,
            process_ms,
            upload_ms,
            total_ms: started.elapsed().as_millis() as u64,
            original_bytes,
            compressed_bytes,
        };

        info!(isbn = %isbn, total_ms = metrics.total_ms, compressed_bytes, "cover processed");
        Ok(CoverProcessOutcome { metrics, keys })
    }

    /// Checks whether all three size tiers are already present in blob
    /// storage, without re-downloading or re-processing anything. The
    /// upload extension depends on the source image (WebP, or the original
    /// JPEG/PNG bytes when the source was below the small-image
    /// threshold), so both possible extensions are probed per tier.
    pub async fn is_cached(&self, isbn: &Isbn13) -> Result<bool, CoverProcessError> {
        for tier in CoverSizeTier::ALL {
            let mut found = false;
            for extension in ["webp", "jpg"] {
                let key = format!("isbn/{isbn}/{}.{extension}", tier.key_suffix());
                if self
                    .blob_store
                    .exists(&key)
                    .await
                    .map_err(|err| CoverProcessError::Upload(err.to_string()))?
                {
                    found = true;
                    break;
                }
            }
            if !found {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn download(&self, isbn: &Isbn13, url: &url::Url) -> Result<Vec<u8>, CoverProcessError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|err| CoverProcessError::Download(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let kind = ProviderUrlKind::classify(url);
            if kind.is_retryable_on_auth_failure() {
                warn!(isbn = %isbn, %status, "cover source auth appears expired, retryable");
                return Err(CoverProcessError::RetryableAuthExpired { isbn: isbn.clone() });
            }
            return Err(CoverProcessError::Download(format!("auth failed: {status}")));
        }
        if !status.is_success() {
            return Err(CoverProcessError::Download(format!("unexpected status: {status}")));
        }

        let bytes = response.bytes().await.map_err(|err| CoverProcessError::Download(err.to_string()))?;
        if bytes.len() <= MIN_DOWNLOAD_BYTES || bytes.len() >= MAX_DOWNLOAD_BYTES {
            return Err(CoverProcessError::SizeOutOfBounds { size: bytes.len() });
        }

        match image::guess_format(&bytes) {
            Ok(ImageFormat::Jpeg) | Ok(ImageFormat::Png) => {}
            _ => return Err(CoverProcessError::UnsupportedFormat),
        }

        Ok(bytes.to_vec())
    }
}

/// Resizes the decoded image to each of the three bound tiers, never
/// upscaling: a source smaller than the tier's bound is kept at its
/// original dimensions for that tier.
fn resize_all_tiers(image: &DynamicImage) -> Vec<(CoverSizeTier, DynamicImage)> {
    CoverSizeTier::ALL
        .into_iter()
        .map(|tier| {
            let (max_w, max_h) = tier.bounds();
            let resized = if image.width() > max_w || image.height() > max_h {
                image.resize(max_w, max_h, image::imageops::FilterType::Lanczos3)
            } else {
                image.clone()
            };
            (tier, resized)
        })
        .collect()
}

/// Encodes each resized tier to WebP, unless the original source was below
/// the small-image threshold, in which case the original bytes are reused
/// to avoid inflating a tiny image.
fn encode_all_tiers(tiers: Vec<(CoverSizeTier, DynamicImage)>, original_bytes: &[u8]) -> Vec<(CoverSizeTier, &'static str, Vec<u8>)> {
    if original_bytes.len() < SMALL_IMAGE_THRESHOLD_BYTES {
        return tiers
            .into_iter()
            .map(|(tier, _)| (tier, "image/jpeg", original_bytes.to_vec()))
            .collect();
    }

    tiers
        .into_iter()
        .map(|(tier, image)| {
            let mut buffer = Vec::new();
            let mut cursor = std::io::Cursor::new(&mut buffer);
            match image.write_to(&mut cursor, ImageFormat::WebP) {
                Ok(()) => (tier, "image/webp", buffer),
                Err(_) => {
                    let mut fallback = Vec::new();
                    let mut cursor = std::io::Cursor::new(&mut fallback);
                    let _ = image.write_to(&mut cursor, ImageFormat::Jpeg);
                    (tier, "image/jpeg", fallback)
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(w, h, image::Rgb([10, 20, 30])))
    }

    #[test]
    fn resize_never_upscales_small_source() {
        let image = solid_image(64, 96);
        let resized = resize_all_tiers(&image);
        let small = resized.iter().find(|(tier, _)| *tier == CoverSizeTier::Small).unwrap();
        assert_eq!(small.1.width(), 64);
        assert_eq!(small.1.height(), 96);
    }

    #[test]
    fn resize_downscales_large_source_to_each_bound() {
        let image = solid_image(2000, 3000);
        let resized = resize_all_tiers(&image);
        let large = resized.iter().find(|(tier, _)| *tier == CoverSizeTier::Large).unwrap();
        assert!(large.1.width() <= 512 && large.1.height() <= 768);
    }

    #[test]
    fn small_original_keeps_original_bytes_instead_of_reencoding() {
        let image = solid_image(64, 96);
        let tiers = resize_all_tiers(&image);
        let tiny_original = vec![0u8; 1024];
        let encoded = encode_all_tiers(tiers, &tiny_original);
        assert!(encoded.iter().all(|(_, content_type, _)| *content_type == "image/jpeg"));
        assert!(encoded.iter().all(|(_, _, bytes)| bytes == &tiny_original));
    }
}
