//! Local rendering of cropped and transformed images.
//!
//! Asset fragments that are not the plain full-size image must be
//! baked to pixels before upload so the platform prints exactly what
//! the customer saw in the editor.

use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use shared::{Asset, AssetFragment, CropRectangle, MimeType, Rotation};

use crate::error::Error;

/// Quality used when re-encoding rendered fragments
const RENDER_JPEG_QUALITY: u8 = 80;

/// Renders an asset fragment to a plain uploadable asset
#[async_trait]
pub trait ImageRenderer: Send + Sync + std::fmt::Debug {
    async fn render(&self, fragment: &AssetFragment) -> Result<Asset, Error>;
}

/// Read the encoded bytes behind a local asset. Remote assets have no
/// local bytes; they are registered with the platform by URL.
pub async fn load_asset_bytes(asset: &Asset) -> Result<Bytes, Error> {
    match asset {
        Asset::File { path } => Ok(Bytes::from(tokio::fs::read(path).await?)),
        Asset::Bytes { data, .. } => Ok(data.clone()),
        Asset::Url { .. } => Err(Error::IllegalState(
            "remote assets are registered by URL, not uploaded".to_string(),
        )),
    }
}

/// CPU Renderer Implementation
///
/// Decodes with the `image` crate on a blocking thread, applies crop,
/// rotation and flips, and re-encodes as JPEG.
#[derive(Debug, Default)]
pub struct PixelRenderer;

#[async_trait]
impl ImageRenderer for PixelRenderer {
    async fn render(&self, fragment: &AssetFragment) -> Result<Asset, Error> {
        let bytes = load_asset_bytes(fragment.asset()).await?;
        let fragment = fragment.clone();
        tokio::task::spawn_blocking(move || render_fragment(&fragment, &bytes))
            .await
            .map_err(|e| Error::Render(format!("render task failed: {e}")))?
    }
}

fn render_fragment(fragment: &AssetFragment, bytes: &[u8]) -> Result<Asset, Error> {
    let decoded = image::load_from_memory(bytes).map_err(|e| Error::Render(e.to_string()))?;
    let cropped = crop_proportional(&decoded, fragment.crop());
    let oriented = orient(cropped, fragment);

    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, RENDER_JPEG_QUALITY);
    oriented
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| Error::Render(e.to_string()))?;
    Ok(Asset::from_bytes(encoded, MimeType::Jpeg))
}

/// Cut the proportional crop window out in pixel space, clamping edges
/// to the image bounds
fn crop_proportional(image: &DynamicImage, crop: &CropRectangle) -> DynamicImage {
    if crop.is_full() {
        return image.clone();
    }
    let full_width = f64::from(image.width());
    let full_height = f64::from(image.height());
    let left = (crop.left.clamp(0.0, 1.0) * full_width).round() as u32;
    let top = (crop.top.clamp(0.0, 1.0) * full_height).round() as u32;
    let right = (crop.right.clamp(0.0, 1.0) * full_width).round() as u32;
    let bottom = (crop.bottom.clamp(0.0, 1.0) * full_height).round() as u32;
    let width = right.saturating_sub(left).max(1);
    let height = bottom.saturating_sub(top).max(1);
    image.crop_imm(left, top, width, height)
}

fn orient(image: DynamicImage, fragment: &AssetFragment) -> DynamicImage {
    let rotated = match fragment.rotation() {
        Rotation::None => image,
        Rotation::Clockwise90 => image.rotate90(),
        Rotation::Clockwise180 => image.rotate180(),
        Rotation::Clockwise270 => image.rotate270(),
    };
    let flipped = if fragment.flip_horizontal() {
        rotated.fliph()
    } else {
        rotated
    };
    if fragment.flip_vertical() {
        flipped.flipv()
    } else {
        flipped
    }
}
