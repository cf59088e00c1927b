//! Asset upload pipeline.
//!
//! Remote images are registered with the platform by URL; local images
//! get signed object storage URLs in one batch and are then PUT one at
//! a time. The two halves run concurrently and either failing fails
//! the batch.

use std::future::Future;

use http::Method;
use serde_json::json;
use shared::UploadableImage;
use shared::wire::{
    RegisterAssetObject, RegisterAssetsRequest, RegisterAssetsResponse, SignedUploadResponse,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::http::{ApiClient, platform_error};
use crate::imaging::load_asset_bytes;

/// Snapshot of upload progress. Byte counts cover the image currently
/// in flight, not the whole batch; `assets_uploaded` of `assets_total`
/// tracks the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub assets_uploaded: usize,
    pub assets_total: usize,
    pub bytes_written: u64,
    pub bytes_expected: u64,
}

/// One batch of images on their way to the platform
#[derive(Debug)]
pub struct AssetUploadRequest {
    api: ApiClient,
    cancel: CancellationToken,
}

impl AssetUploadRequest {
    pub fn new(api: ApiClient) -> Self {
        AssetUploadRequest::with_cancellation(api, CancellationToken::new())
    }

    pub fn with_cancellation(api: ApiClient, cancel: CancellationToken) -> Self {
        AssetUploadRequest { api, cancel }
    }

    /// Stop the batch. In-flight transfers stop at the next await; the
    /// pending future resolves to [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Upload every image in the batch, sending a progress snapshot as
    /// each one starts and finishes. Returns the images with their
    /// platform identities filled in, in input order.
    pub async fn upload_assets(
        &self,
        images: Vec<UploadableImage>,
        progress: mpsc::UnboundedSender<UploadProgress>,
    ) -> Result<Vec<UploadableImage>, Error> {
        let mut remote = Vec::new();
        let mut local = Vec::new();
        for (index, image) in images.into_iter().enumerate() {
            if image.fragment().asset().is_remote() {
                remote.push((index, image));
            } else {
                local.push((index, image));
            }
        }

        tracing::info!(
            registrations = remote.len(),
            uploads = local.len(),
            "uploading order assets"
        );

        let (mut done, mut uploaded) = tokio::try_join!(
            self.register_remote_assets(remote),
            self.upload_asset_bytes(local, &progress),
        )?;
        done.append(&mut uploaded);
        done.sort_by_key(|(index, _)| *index);
        Ok(done.into_iter().map(|(_, image)| image).collect())
    }

    /// Register already-hosted images in one `PATCH /asset/` call. The
    /// response echoes each URL with its asset id; every requested URL
    /// must come back.
    async fn register_remote_assets(
        &self,
        mut images: Vec<(usize, UploadableImage)>,
    ) -> Result<Vec<(usize, UploadableImage)>, Error> {
        if images.is_empty() {
            return Ok(images);
        }

        let objects: Vec<RegisterAssetObject> = images
            .iter()
            .filter_map(|(_, image)| {
                let asset = image.fragment().asset();
                Some(RegisterAssetObject {
                    url: asset.url()?.to_string(),
                    client_asset: true,
                    mime_type: asset.mime_type().as_str().to_string(),
                })
            })
            .collect();
        let request = RegisterAssetsRequest { objects };

        self.ensure_active()?;
        let (status, body) = self
            .guard(
                self.api
                    .request_json(Method::PATCH, "/asset/", Some(&json!(request))),
            )
            .await?;
        if !status.is_success() {
            return Err(platform_error(status, &body));
        }

        let response: RegisterAssetsResponse = serde_json::from_value(body).map_err(|_| {
            Error::InvalidResponse("asset registration response missing objects".to_string())
        })?;

        for registered in &response.objects {
            for (_, image) in &mut images {
                if image.fragment().asset().url() == Some(registered.url.as_str()) {
                    image.mark_as_uploaded(registered.asset_id, registered.url.clone());
                }
            }
        }

        let matched = images
            .iter()
            .filter(|(_, image)| image.has_been_uploaded())
            .count();
        if matched != images.len() {
            return Err(Error::InvalidResponse(format!(
                "only registered {}/{} image URLs with the asset endpoint",
                matched,
                images.len()
            )));
        }
        Ok(images)
    }

    /// Upload local images byte-by-byte: one signing call for the whole
    /// batch, then sequential PUTs against the signed URLs
    async fn upload_asset_bytes(
        &self,
        mut images: Vec<(usize, UploadableImage)>,
        progress: &mpsc::UnboundedSender<UploadProgress>,
    ) -> Result<Vec<(usize, UploadableImage)>, Error> {
        if images.is_empty() {
            return Ok(images);
        }

        let mime_types = images
            .iter()
            .map(|(_, image)| image.fragment().asset().mime_type().as_str())
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("/asset/sign/?mime_types={mime_types}&client_asset=true");

        self.ensure_active()?;
        let (status, body) = self
            .guard(self.api.request_json(Method::GET, &path, None))
            .await?;
        if !status.is_success() {
            return Err(platform_error(status, &body));
        }

        let signed: SignedUploadResponse = serde_json::from_value(body).map_err(|_| {
            Error::InvalidResponse("signed upload response missing fields".to_string())
        })?;
        if signed.signed_requests.len() != images.len() {
            return Err(Error::InvalidResponse(format!(
                "only got {}/{} signed upload requests",
                signed.signed_requests.len(),
                images.len()
            )));
        }
        if signed.urls.len() != images.len() || signed.asset_ids.len() != images.len() {
            return Err(Error::InvalidResponse(
                "signed upload response fields are misaligned".to_string(),
            ));
        }

        let total = images.len();
        for (position, (_, image)) in images.iter_mut().enumerate() {
            self.ensure_active()?;
            let bytes = self.guard(load_asset_bytes(image.fragment().asset())).await?;
            let expected = bytes.len() as u64;
            tracing::debug!(position, total, bytes = expected, "uploading image bytes");
            let _ = progress.send(UploadProgress {
                assets_uploaded: position,
                assets_total: total,
                bytes_written: 0,
                bytes_expected: expected,
            });

            let mime_type = image.fragment().asset().mime_type();
            self.guard(
                self.api
                    .put_signed(&signed.signed_requests[position], mime_type, bytes),
            )
            .await?;
            image.mark_as_uploaded(signed.asset_ids[position], signed.urls[position].clone());

            let _ = progress.send(UploadProgress {
                assets_uploaded: position + 1,
                assets_total: total,
                bytes_written: expected,
                bytes_expected: expected,
            });
        }
        Ok(images)
    }

    fn ensure_active(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    async fn guard<T>(&self, fut: impl Future<Output = Result<T, Error>>) -> Result<T, Error> {
        match self.cancel.run_until_cancelled(fut).await {
            Some(result) => result,
            None => Err(Error::Cancelled),
        }
    }
}
