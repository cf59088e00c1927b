//! Entry point for talking to the print platform

use std::sync::Arc;
use std::time::Duration;

use shared::Order;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::http::ApiClient;
use crate::imaging::{ImageRenderer, PixelRenderer};
use crate::submission::OrderSubmission;
use crate::transport::{ApiTransport, HttpTransport};
use crate::upload::AssetUploadRequest;

/// Client for the print platform API.
///
/// Cheap to clone; clones share the underlying transport.
#[derive(Debug, Clone)]
pub struct PrintClient {
    api: ApiClient,
    renderer: Arc<dyn ImageRenderer>,
    locale: String,
}

impl PrintClient {
    /// Build a client over HTTPS with the default pixel renderer
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout))?;
        Ok(PrintClient::with_transport(Arc::new(transport), config))
    }

    /// Build a client over a custom transport. Tests inject in-memory
    /// transports here.
    pub fn with_transport(transport: Arc<dyn ApiTransport>, config: ClientConfig) -> Self {
        PrintClient {
            api: ApiClient::new(transport, &config),
            renderer: Arc::new(PixelRenderer),
            locale: config.locale,
        }
    }

    /// Swap the image renderer, e.g. for a GPU-backed one
    pub fn with_renderer(mut self, renderer: Arc<dyn ImageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Open a submission session for an order
    pub fn submission(&self, order: Order) -> OrderSubmission {
        OrderSubmission::new(
            self.api.clone(),
            self.renderer.clone(),
            self.locale.clone(),
            order,
        )
    }

    /// Standalone upload batch, for callers managing their own images
    /// outside an order session
    pub fn asset_upload_request(&self) -> AssetUploadRequest {
        AssetUploadRequest::new(self.api.clone())
    }
}
