//! Inkpress Client - order submission SDK for the print platform
//!
//! Builds print orders out of the customer's images and shepherds them
//! to the platform: rendering edited images, uploading assets, and
//! submitting the order for printing.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod imaging;
pub mod submission;
pub mod submit;
pub mod transport;
pub mod upload;

pub use client::PrintClient;
pub use config::{ClientConfig, Environment};
pub use error::Error;
pub use imaging::{ImageRenderer, PixelRenderer};
pub use submission::{OrderSubmission, SubmissionEvent};
pub use submit::SubmitOrderRequest;
pub use transport::{ApiReply, ApiRequest, ApiTransport, HttpTransport};
pub use upload::{AssetUploadRequest, UploadProgress};

// Re-export shared types for convenience
pub use shared::{
    Address, Asset, AssetFragment, CropRectangle, Job, JobKind, MimeType, Money, Order,
    OrderPricing, Product, Rotation, UploadableImage,
};
