//! Images attached to jobs: crop/transform state and upload bookkeeping

use serde::{Deserialize, Serialize};

use crate::asset::Asset;

/// Proportional crop window over an image, each edge in `0.0..=1.0`
/// relative to the full image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRectangle {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl CropRectangle {
    /// The whole image
    pub const FULL: CropRectangle = CropRectangle {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
    };

    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        CropRectangle {
            left,
            top,
            right,
            bottom,
        }
    }

    /// A crop that covers the entire source image needs no rendering
    pub fn is_full(&self) -> bool {
        self.left <= 0.0 && self.top <= 0.0 && self.right >= 1.0 && self.bottom >= 1.0
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

impl Default for CropRectangle {
    fn default() -> Self {
        CropRectangle::FULL
    }
}

/// Clockwise rotation applied after cropping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

/// An asset plus the edits the customer made to it.
///
/// Fragments compare by value, so the same photo cropped two different
/// ways counts as two distinct fragments, while two jobs reusing the
/// identical crop share one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetFragment {
    asset: Asset,
    #[serde(default)]
    crop: CropRectangle,
    #[serde(default)]
    rotation: Rotation,
    #[serde(default)]
    flip_horizontal: bool,
    #[serde(default)]
    flip_vertical: bool,
}

impl AssetFragment {
    /// The untouched full image
    pub fn full(asset: Asset) -> Self {
        AssetFragment {
            asset,
            crop: CropRectangle::FULL,
            rotation: Rotation::None,
            flip_horizontal: false,
            flip_vertical: false,
        }
    }

    pub fn cropped(asset: Asset, crop: CropRectangle) -> Self {
        AssetFragment {
            crop,
            ..AssetFragment::full(asset)
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_flip(mut self, horizontal: bool, vertical: bool) -> Self {
        self.flip_horizontal = horizontal;
        self.flip_vertical = vertical;
        self
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    pub fn crop(&self) -> &CropRectangle {
        &self.crop
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn flip_horizontal(&self) -> bool {
        self.flip_horizontal
    }

    pub fn flip_vertical(&self) -> bool {
        self.flip_vertical
    }

    pub fn is_full_size(&self) -> bool {
        self.crop.is_full()
    }

    /// Whether the pixels must be re-encoded before upload. Remote
    /// assets are registered as-is and never rendered locally.
    pub fn needs_render(&self) -> bool {
        if self.asset.is_remote() {
            return false;
        }
        !self.is_full_size()
            || self.rotation != Rotation::None
            || self.flip_horizontal
            || self.flip_vertical
    }
}

/// Platform-side identity of an uploaded asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub asset_id: i64,
    pub preview_url: String,
}

/// An image slot in a job: the fragment to print plus the result of
/// uploading it, once that has happened.
///
/// Equality looks at the fragment only. Upload state is bookkeeping and
/// two slots showing the same photo are the same image whether or not
/// one of them has reached the platform yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadableImage {
    fragment: AssetFragment,
    uploaded: Option<UploadedAsset>,
}

impl PartialEq for UploadableImage {
    fn eq(&self, other: &Self) -> bool {
        self.fragment == other.fragment
    }
}

impl UploadableImage {
    pub fn new(fragment: AssetFragment) -> Self {
        UploadableImage {
            fragment,
            uploaded: None,
        }
    }

    /// Full-size image straight from an asset
    pub fn from_asset(asset: Asset) -> Self {
        UploadableImage::new(AssetFragment::full(asset))
    }

    pub fn fragment(&self) -> &AssetFragment {
        &self.fragment
    }

    /// Replace the fragment with the rendered output. The crop and
    /// transforms are baked into the new asset's pixels, so the slot
    /// becomes a plain full-size image of the rendered bytes.
    pub fn set_rendered_asset(&mut self, asset: Asset) {
        self.fragment = AssetFragment::full(asset);
    }

    /// Record a completed upload. The first write wins; later calls for
    /// the same slot are ignored.
    pub fn mark_as_uploaded(&mut self, asset_id: i64, preview_url: impl Into<String>) {
        if self.uploaded.is_none() {
            self.uploaded = Some(UploadedAsset {
                asset_id,
                preview_url: preview_url.into(),
            });
        }
    }

    pub fn has_been_uploaded(&self) -> bool {
        self.uploaded.is_some()
    }

    pub fn uploaded_asset_id(&self) -> Option<i64> {
        self.uploaded.as_ref().map(|u| u.asset_id)
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.uploaded.as_ref().map(|u| u.preview_url.as_str())
    }

    /// Copy upload state from another slot holding the same fragment.
    /// Used to back-fill duplicates after the deduplicated upload pass.
    pub fn adopt_upload_state(&mut self, other: &UploadableImage) {
        if self.uploaded.is_none() && self.fragment == other.fragment {
            self.uploaded = other.uploaded.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MimeType;

    fn photo(tag: &str) -> Asset {
        Asset::from_bytes(format!("pixels-{tag}").into_bytes(), MimeType::Jpeg)
    }

    #[test]
    fn full_crop_needs_no_render() {
        let fragment = AssetFragment::full(photo("a"));
        assert!(fragment.is_full_size());
        assert!(!fragment.needs_render());
    }

    #[test]
    fn needs_render_matrix() {
        let cropped =
            AssetFragment::cropped(photo("a"), CropRectangle::new(0.1, 0.1, 0.9, 0.9));
        assert!(cropped.needs_render());

        let rotated = AssetFragment::full(photo("a")).with_rotation(Rotation::Clockwise90);
        assert!(rotated.needs_render());

        let flipped = AssetFragment::full(photo("a")).with_flip(true, false);
        assert!(flipped.needs_render());

        let remote = AssetFragment::cropped(
            Asset::from_url("https://cdn.example.com/a.jpg", MimeType::Jpeg).unwrap(),
            CropRectangle::new(0.2, 0.2, 0.8, 0.8),
        );
        assert!(!remote.needs_render());
    }

    #[test]
    fn oversized_crop_counts_as_full() {
        let fragment =
            AssetFragment::cropped(photo("a"), CropRectangle::new(-0.1, 0.0, 1.2, 1.0));
        assert!(fragment.is_full_size());
    }

    #[test]
    fn equality_ignores_upload_state() {
        let mut uploaded = UploadableImage::from_asset(photo("a"));
        let fresh = UploadableImage::from_asset(photo("a"));
        uploaded.mark_as_uploaded(42, "https://previews.example.com/42");
        assert_eq!(uploaded, fresh);

        let other = UploadableImage::from_asset(photo("b"));
        assert_ne!(uploaded, other);
    }

    #[test]
    fn distinct_crops_are_distinct_images() {
        let full = UploadableImage::from_asset(photo("a"));
        let cropped = UploadableImage::new(AssetFragment::cropped(
            photo("a"),
            CropRectangle::new(0.0, 0.0, 0.5, 0.5),
        ));
        assert_ne!(full, cropped);
    }

    #[test]
    fn mark_as_uploaded_first_write_wins() {
        let mut image = UploadableImage::from_asset(photo("a"));
        image.mark_as_uploaded(1, "https://previews.example.com/1");
        image.mark_as_uploaded(2, "https://previews.example.com/2");
        assert_eq!(image.uploaded_asset_id(), Some(1));
        assert_eq!(image.preview_url(), Some("https://previews.example.com/1"));
    }

    #[test]
    fn adopt_upload_state_matches_fragment() {
        let mut source = UploadableImage::from_asset(photo("a"));
        source.mark_as_uploaded(7, "https://previews.example.com/7");

        let mut same = UploadableImage::from_asset(photo("a"));
        same.adopt_upload_state(&source);
        assert_eq!(same.uploaded_asset_id(), Some(7));

        let mut different = UploadableImage::from_asset(photo("b"));
        different.adopt_upload_state(&source);
        assert!(!different.has_been_uploaded());
    }

    #[test]
    fn rendered_asset_resets_fragment_to_full() {
        let mut image = UploadableImage::new(AssetFragment::cropped(
            photo("a"),
            CropRectangle::new(0.25, 0.25, 0.75, 0.75),
        ));
        assert!(image.fragment().needs_render());

        image.set_rendered_asset(photo("a-rendered"));
        assert!(!image.fragment().needs_render());
        assert!(image.fragment().is_full_size());
    }
}
