//! Shared types for the print ordering SDK
//!
//! Order model, job variants, image assets and the wire payloads
//! exchanged with the print platform. Everything here is plain data;
//! the client crate owns the network behaviour.

pub mod address;
pub mod asset;
pub mod catalogue;
pub mod error;
pub mod image;
pub mod job;
pub mod order;
pub mod pricing;
pub mod wire;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Model re-exports (for convenient access)
pub use address::Address;
pub use asset::{Asset, MimeType};
pub use catalogue::Product;
pub use error::ModelError;
pub use image::{AssetFragment, CropRectangle, Rotation, UploadableImage, UploadedAsset};
pub use job::{DEFAULT_SHIPPING_CLASS, Job, JobKind};
pub use order::Order;
pub use pricing::{Money, OrderPricing};
