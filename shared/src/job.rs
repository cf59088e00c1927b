//! Print jobs: one product plus the images that go on it

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::address::Address;
use crate::asset::Asset;
use crate::catalogue::Product;
use crate::error::ModelError;
use crate::image::UploadableImage;
use crate::pricing::Money;

/// Standard tracked shipping
pub const DEFAULT_SHIPPING_CLASS: i32 = 1;

/// Product-specific image layout of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// A stack of individual prints. `border_text` runs parallel to
    /// `images` for products with a writable border.
    Prints {
        images: Vec<UploadableImage>,
        #[serde(default)]
        border_text: Vec<Option<String>>,
    },
    /// Bound photobook. Unfilled slots stay blank in the printed book.
    Photobook {
        front_cover: Option<UploadableImage>,
        pages: Vec<Option<UploadableImage>>,
    },
    /// Single postcard, optionally mailed directly to the recipient
    Postcard {
        front: UploadableImage,
        back: Option<UploadableImage>,
        message: Option<String>,
        recipient: Option<Address>,
    },
    /// Folded greeting card with four printable faces
    GreetingCard {
        front: Option<UploadableImage>,
        back: Option<UploadableImage>,
        inside_left: Option<UploadableImage>,
        inside_right: Option<UploadableImage>,
    },
}

/// One line item of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    id: Uuid,
    product: Product,
    /// How many copies of this job the customer ordered
    order_quantity: u32,
    /// Product options such as finish or frame colour, forwarded verbatim
    options: BTreeMap<String, String>,
    shipping_class: i32,
    kind: JobKind,
}

impl Job {
    fn with_kind(product: Product, kind: JobKind) -> Self {
        Job {
            id: Uuid::new_v4(),
            product,
            order_quantity: 1,
            options: BTreeMap::new(),
            shipping_class: DEFAULT_SHIPPING_CLASS,
            kind,
        }
    }

    pub fn prints(product: Product, images: Vec<UploadableImage>) -> Self {
        let border_text = vec![None; images.len()];
        Job::with_kind(
            product,
            JobKind::Prints {
                images,
                border_text,
            },
        )
    }

    /// Prints with per-image border text, e.g. polaroid-style captions.
    /// `border_text` is positional; `None` leaves that border blank.
    pub fn prints_with_border_text(
        product: Product,
        images: Vec<UploadableImage>,
        mut border_text: Vec<Option<String>>,
    ) -> Self {
        border_text.resize(images.len(), None);
        Job::with_kind(
            product,
            JobKind::Prints {
                images,
                border_text,
            },
        )
    }

    pub fn photobook(
        product: Product,
        front_cover: Option<UploadableImage>,
        pages: Vec<Option<UploadableImage>>,
    ) -> Self {
        Job::with_kind(product, JobKind::Photobook { front_cover, pages })
    }

    pub fn postcard(
        product: Product,
        front: UploadableImage,
        back: Option<UploadableImage>,
    ) -> Self {
        Job::with_kind(
            product,
            JobKind::Postcard {
                front,
                back,
                message: None,
                recipient: None,
            },
        )
    }

    pub fn greeting_card(
        product: Product,
        front: Option<UploadableImage>,
        back: Option<UploadableImage>,
        inside_left: Option<UploadableImage>,
        inside_right: Option<UploadableImage>,
    ) -> Self {
        Job::with_kind(
            product,
            JobKind::GreetingCard {
                front,
                back,
                inside_left,
                inside_right,
            },
        )
    }

    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        if let JobKind::Postcard { message, .. } = &mut self.kind {
            *message = Some(text.into());
        }
        self
    }

    pub fn with_recipient(mut self, address: Address) -> Self {
        if let JobKind::Postcard { recipient, .. } = &mut self.kind {
            *recipient = Some(address);
        }
        self
    }

    pub fn with_order_quantity(mut self, quantity: u32) -> Self {
        self.order_quantity = quantity.max(1);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_shipping_class(mut self, shipping_class: i32) -> Self {
        self.shipping_class = shipping_class;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn template_id(&self) -> &str {
        &self.product.template_id
    }

    pub fn order_quantity(&self) -> u32 {
        self.order_quantity
    }

    pub fn set_order_quantity(&mut self, quantity: u32) {
        self.order_quantity = quantity.max(1);
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn shipping_class(&self) -> i32 {
        self.shipping_class
    }

    pub fn set_shipping_class(&mut self, shipping_class: i32) {
        self.shipping_class = shipping_class;
    }

    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    /// Units the platform bills for one copy of this job. Prints count
    /// each image; every other product is a single unit.
    pub fn quantity(&self) -> u32 {
        match &self.kind {
            JobKind::Prints { images, .. } => images.len() as u32,
            _ => 1,
        }
    }

    /// Every image slot of the job in its printed order. `None` marks a
    /// slot the customer deliberately left blank.
    pub fn images(&self) -> Vec<Option<&UploadableImage>> {
        match &self.kind {
            JobKind::Prints { images, .. } => images.iter().map(Some).collect(),
            JobKind::Photobook { front_cover, pages } => {
                let mut slots = vec![front_cover.as_ref()];
                slots.extend(pages.iter().map(Option::as_ref));
                slots
            }
            JobKind::Postcard { front, back, .. } => {
                vec![Some(front), back.as_ref()]
            }
            JobKind::GreetingCard {
                front,
                back,
                inside_left,
                inside_right,
            } => vec![
                front.as_ref(),
                back.as_ref(),
                inside_left.as_ref(),
                inside_right.as_ref(),
            ],
        }
    }

    /// Mutable access to the occupied image slots, in the same order as
    /// [`Job::images`] with blanks skipped
    pub(crate) fn images_mut(&mut self) -> Vec<&mut UploadableImage> {
        match &mut self.kind {
            JobKind::Prints { images, .. } => images.iter_mut().collect(),
            JobKind::Photobook { front_cover, pages } => front_cover
                .iter_mut()
                .chain(pages.iter_mut().flatten())
                .collect(),
            JobKind::Postcard { front, back, .. } => {
                std::iter::once(front).chain(back.iter_mut()).collect()
            }
            JobKind::GreetingCard {
                front,
                back,
                inside_left,
                inside_right,
            } => front
                .iter_mut()
                .chain(back.iter_mut())
                .chain(inside_left.iter_mut())
                .chain(inside_right.iter_mut())
                .collect(),
        }
    }

    /// Cost of one copy in the given currency, when the product lists a
    /// price for it. Prints are billed per sheet, rounding partially
    /// filled sheets up.
    pub fn cost(&self, currency: &str) -> Option<Money> {
        let unit = self.product.cost_for_currency(currency)?;
        let sheets = match &self.kind {
            JobKind::Prints { images, .. } => {
                let per_sheet = self.product.quantity_per_sheet.max(1) as usize;
                images.len().div_ceil(per_sheet).max(1)
            }
            _ => 1,
        };
        Some(Money::new(currency, unit * Decimal::from(sheets as u64)))
    }

    /// Currencies this job can be charged in
    pub fn currencies_supported(&self) -> BTreeSet<String> {
        self.product
            .supported_currencies()
            .map(str::to_owned)
            .collect()
    }

    /// Platform payload for one copy of this job. Fails if any occupied
    /// image slot has not been uploaded yet.
    pub fn json_representation(&self) -> Result<Value, ModelError> {
        let mut body = serde_json::Map::new();
        body.insert("template_id".to_string(), json!(self.product.template_id));
        body.insert("options".to_string(), json!(self.options));

        match &self.kind {
            JobKind::Prints {
                images,
                border_text,
            } => {
                let mut assets = Vec::with_capacity(images.len());
                for image in images {
                    assets.push(json!(required_asset_id(image)?));
                }
                body.insert("assets".to_string(), Value::Array(assets));
                if border_text.iter().any(Option::is_some) {
                    body.insert("polaroid_text".to_string(), json!(border_text));
                }
            }
            JobKind::Photobook { front_cover, pages } => {
                body.insert(
                    "front_cover".to_string(),
                    optional_asset_id(front_cover.as_ref())?,
                );
                let mut page_ids = Vec::with_capacity(pages.len());
                for page in pages {
                    page_ids.push(optional_asset_id(page.as_ref())?);
                }
                body.insert("pages".to_string(), Value::Array(page_ids));
            }
            JobKind::Postcard {
                front,
                back,
                message,
                recipient,
            } => {
                body.insert("front_image".to_string(), json!(required_asset_id(front)?));
                body.insert("back_image".to_string(), optional_asset_id(back.as_ref())?);
                if let Some(message) = message {
                    body.insert("message".to_string(), json!(message));
                }
                if let Some(recipient) = recipient {
                    body.insert("shipping_address".to_string(), json!(recipient));
                }
            }
            JobKind::GreetingCard {
                front,
                back,
                inside_left,
                inside_right,
            } => {
                body.insert("front_image".to_string(), optional_asset_id(front.as_ref())?);
                body.insert("back_image".to_string(), optional_asset_id(back.as_ref())?);
                body.insert(
                    "inside_left_image".to_string(),
                    optional_asset_id(inside_left.as_ref())?,
                );
                body.insert(
                    "inside_right_image".to_string(),
                    optional_asset_id(inside_right.as_ref())?,
                );
            }
        }

        Ok(Value::Object(body))
    }
}

fn required_asset_id(image: &UploadableImage) -> Result<i64, ModelError> {
    image
        .uploaded_asset_id()
        .ok_or_else(|| ModelError::ImageNotUploaded(describe_image(image)))
}

fn optional_asset_id(image: Option<&UploadableImage>) -> Result<Value, ModelError> {
    match image {
        Some(image) => Ok(json!(required_asset_id(image)?)),
        None => Ok(Value::Null),
    }
}

fn describe_image(image: &UploadableImage) -> String {
    match image.fragment().asset() {
        Asset::File { path } => path.to_string_lossy().into_owned(),
        Asset::Url { url, .. } => url.clone(),
        Asset::Bytes { .. } => "<in-memory image>".to_string(),
    }
}
