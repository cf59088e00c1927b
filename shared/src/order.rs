//! The customer's order: jobs, shipping, payment and submission state

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::address::Address;
use crate::asset::Asset;
use crate::error::ModelError;
use crate::image::{AssetFragment, UploadableImage};
use crate::job::Job;
use crate::pricing::OrderPricing;

/// Payment references the platform accepts as proof of payment
const PROOF_OF_PAYMENT_PREFIXES: [&str; 4] = ["AP-", "PAY-", "PAUTH-", "tok_"];

/// A basket of print jobs on its way to the platform.
///
/// The order tracks its own submission lifecycle: `submitted` is the
/// in-flight latch, a receipt marks success, and `set_error` rolls a
/// receipted order back to resubmittable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    jobs: Vec<Job>,
    shipping_address: Option<Address>,
    notification_email: Option<String>,
    notification_phone: Option<String>,
    user_data: Map<String, Value>,
    additional_parameters: BTreeMap<String, String>,
    promo_code: Option<String>,
    pricing: Option<OrderPricing>,
    proof_of_payment: Option<String>,
    submitted: bool,
    last_submission_at: Option<DateTime<Utc>>,
    last_submission_error: Option<String>,
    receipt: Option<String>,
    asset_upload_complete: bool,
}

impl Order {
    pub fn new() -> Self {
        Order::default()
    }

    // ===== Jobs =====

    pub fn add_job(&mut self, job: Job) {
        self.jobs.push(job);
    }

    pub fn remove_job(&mut self, id: Uuid) -> Option<Job> {
        let index = self.jobs.iter().position(|job| job.id() == id)?;
        Some(self.jobs.remove(index))
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job_mut(&mut self, id: Uuid) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    // ===== Customer details =====

    pub fn set_shipping_address(&mut self, address: Address) {
        self.shipping_address = Some(address);
    }

    pub fn shipping_address(&self) -> Option<&Address> {
        self.shipping_address.as_ref()
    }

    /// Receipt email. Also mirrored into `user_data` so dashboard
    /// searches find the order by address.
    pub fn set_email(&mut self, email: impl Into<String>) {
        let email = email.into();
        self.user_data
            .insert("email".to_string(), json!(email.clone()));
        self.notification_email = Some(email);
    }

    pub fn notification_email(&self) -> Option<&str> {
        self.notification_email.as_deref()
    }

    pub fn set_phone(&mut self, phone: impl Into<String>) {
        let phone = phone.into();
        self.user_data
            .insert("phone".to_string(), json!(phone.clone()));
        self.notification_phone = Some(phone);
    }

    pub fn notification_phone(&self) -> Option<&str> {
        self.notification_phone.as_deref()
    }

    /// Free-form metadata stored with the order on the platform
    pub fn set_user_data_parameter(&mut self, key: impl Into<String>, value: Value) {
        self.user_data.insert(key.into(), value);
    }

    pub fn remove_user_data_parameter(&mut self, key: &str) -> Option<Value> {
        self.user_data.remove(key)
    }

    /// Extra top-level fields merged into the submission payload, used
    /// for platform features ahead of first-class support here
    pub fn set_additional_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.additional_parameters.insert(key.into(), value.into());
    }

    pub fn set_promo_code(&mut self, code: impl Into<String>) {
        self.promo_code = Some(code.into());
    }

    pub fn promo_code(&self) -> Option<&str> {
        self.promo_code.as_deref()
    }

    pub fn set_pricing(&mut self, pricing: OrderPricing) {
        self.pricing = Some(pricing);
    }

    pub fn pricing(&self) -> Option<&OrderPricing> {
        self.pricing.as_ref()
    }

    /// Record the payment reference obtained from the payment provider.
    /// Rejects references that do not look like a payment, an
    /// authorisation or a card token.
    pub fn set_proof_of_payment(&mut self, proof: impl Into<String>) -> Result<(), ModelError> {
        let proof = proof.into();
        if !PROOF_OF_PAYMENT_PREFIXES
            .iter()
            .any(|prefix| proof.starts_with(prefix))
        {
            return Err(ModelError::InvalidProofOfPayment(proof));
        }
        self.proof_of_payment = Some(proof);
        Ok(())
    }

    pub fn proof_of_payment(&self) -> Option<&str> {
        self.proof_of_payment.as_deref()
    }

    // ===== Submission lifecycle =====

    /// Latch the order as in flight. Clears the previous attempt's
    /// error so the caller sees only the outcome of this one.
    pub fn begin_submission(&mut self, at: DateTime<Utc>) {
        self.submitted = true;
        self.last_submission_at = Some(at);
        self.last_submission_error = None;
    }

    /// Record a failed attempt and make the order submittable again
    pub fn fail_submission(&mut self, message: impl Into<String>) {
        self.submitted = false;
        self.last_submission_error = Some(message.into());
    }

    /// Record the platform receipt. The order stays latched; printed
    /// orders are not resubmitted.
    pub fn complete_submission(&mut self, receipt: impl Into<String>) {
        self.receipt = Some(receipt.into());
    }

    /// Unlatch without recording an outcome, for cancelled attempts
    pub fn reset_submission(&mut self) {
        self.submitted = false;
    }

    /// The platform reported the order failed after acceptance. Drops
    /// the receipt so the order can be corrected and resubmitted.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.receipt = None;
        self.submitted = false;
        self.last_submission_error = Some(message.into());
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn is_printed(&self) -> bool {
        self.receipt.is_some()
    }

    pub fn receipt(&self) -> Option<&str> {
        self.receipt.as_deref()
    }

    pub fn set_receipt(&mut self, receipt: impl Into<String>) {
        self.receipt = Some(receipt.into());
    }

    pub fn last_submission_at(&self) -> Option<DateTime<Utc>> {
        self.last_submission_at
    }

    pub fn last_submission_error(&self) -> Option<&str> {
        self.last_submission_error.as_deref()
    }

    pub fn asset_upload_complete(&self) -> bool {
        self.asset_upload_complete
    }

    pub fn set_asset_upload_complete(&mut self, complete: bool) {
        self.asset_upload_complete = complete;
    }

    // ===== Upload pipeline support =====

    /// The distinct images that still need uploading, in first-seen
    /// order. Blank slots are skipped, already-uploaded slots are
    /// skipped, and slots showing the same image collapse to one entry.
    pub fn images_to_upload(&self) -> Vec<UploadableImage> {
        let mut unique: Vec<UploadableImage> = Vec::new();
        for job in &self.jobs {
            for image in job.images().into_iter().flatten() {
                if image.has_been_uploaded() {
                    continue;
                }
                if !unique.contains(image) {
                    unique.push(image.clone());
                }
            }
        }
        unique
    }

    /// Distinct fragments that must be rendered to pixels before they
    /// can be uploaded
    pub fn fragments_needing_render(&self) -> Vec<AssetFragment> {
        let mut fragments: Vec<AssetFragment> = Vec::new();
        for job in &self.jobs {
            for image in job.images().into_iter().flatten() {
                if image.has_been_uploaded() || !image.fragment().needs_render() {
                    continue;
                }
                if !fragments.contains(image.fragment()) {
                    fragments.push(image.fragment().clone());
                }
            }
        }
        fragments
    }

    /// Swap every slot still showing `fragment` over to its rendered
    /// asset. Must run before gathering the upload list so duplicates
    /// keep collapsing after the swap.
    pub fn apply_rendered_asset(&mut self, fragment: &AssetFragment, rendered: &Asset) {
        for job in &mut self.jobs {
            for image in job.images_mut() {
                if !image.has_been_uploaded() && image.fragment() == fragment {
                    image.set_rendered_asset(rendered.clone());
                }
            }
        }
    }

    /// Copy upload results back onto every slot showing an uploaded
    /// image, including the duplicates the upload pass collapsed
    pub fn back_fill_upload_state(&mut self, uploaded: &[UploadableImage]) {
        for job in &mut self.jobs {
            for image in job.images_mut() {
                if image.has_been_uploaded() {
                    continue;
                }
                if let Some(source) = uploaded.iter().find(|source| **source == *image) {
                    image.adopt_upload_state(source);
                }
            }
        }
    }

    pub fn all_images_uploaded(&self) -> bool {
        self.jobs.iter().all(|job| {
            job.images()
                .into_iter()
                .flatten()
                .all(UploadableImage::has_been_uploaded)
        })
    }

    // ===== Summaries =====

    /// Currencies every job in the order can be charged in
    pub fn currencies_supported(&self) -> BTreeSet<String> {
        let mut jobs = self.jobs.iter();
        let Some(first) = jobs.next() else {
            return BTreeSet::new();
        };
        let mut shared = first.currencies_supported();
        for job in jobs {
            let own = job.currencies_supported();
            shared.retain(|currency| own.contains(currency));
        }
        shared
    }

    /// Short human readable summary for order history, e.g.
    /// `5" squares, Postcards`. Every job is listed, repeats included.
    pub fn items_description(&self) -> String {
        self.jobs
            .iter()
            .map(|job| job.product().name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Copy safe to persist in order history: customer details without
    /// the job contents or transient upload state
    pub fn sanitised_copy(&self) -> Order {
        let mut copy = self.clone();
        copy.jobs.clear();
        copy.asset_upload_complete = false;
        copy
    }

    // ===== Platform payloads =====

    /// The `POST /print` payload. Every job must have finished
    /// uploading; jobs ordered in multiple copies appear once per copy.
    pub fn json_representation(&self, locale: &str) -> Result<Value, ModelError> {
        let mut jobs = Vec::new();
        for job in &self.jobs {
            let mut payload = job.json_representation()?;
            if let Some(body) = payload.as_object_mut() {
                body.insert("shipping_class".to_string(), json!(job.shipping_class()));
            }
            for _ in 0..job.order_quantity() {
                jobs.push(payload.clone());
            }
        }

        let mut user_data = self.user_data.clone();
        user_data.insert("locale".to_string(), json!(locale));

        let mut body = Map::new();
        body.insert(
            "proof_of_payment".to_string(),
            json!(self.proof_of_payment.clone().unwrap_or_default()),
        );
        body.insert(
            "receipt_email".to_string(),
            json!(self.notification_email.clone().unwrap_or_default()),
        );
        if let Some(promo_code) = &self.promo_code {
            body.insert("promo_code".to_string(), json!(promo_code));
        }
        body.insert("jobs".to_string(), Value::Array(jobs));
        body.insert("user_data".to_string(), Value::Object(user_data));
        for (key, value) in &self.additional_parameters {
            body.insert(key.clone(), json!(value));
        }
        if let Some(pricing) = &self.pricing {
            let amount = pricing.total_cost.amount.round_dp(2);
            body.insert(
                "customer_payment".to_string(),
                json!({
                    "currency": pricing.total_cost.currency,
                    "amount": amount.to_f64().unwrap_or_default(),
                }),
            );
        }
        if let Some(address) = &self.shipping_address {
            body.insert("shipping_address".to_string(), json!(address));
        }

        Ok(Value::Object(body))
    }

    /// Basket entries for cost and shipping quotes, one entry per
    /// ordered copy of each job
    pub fn basket_json(&self, country_code: &str) -> Value {
        let mut entries = Vec::new();
        for job in &self.jobs {
            let entry = json!({
                "country_code": country_code,
                "job_id": job.id().to_string(),
                "quantity": job.quantity(),
                "template_id": job.template_id(),
                "shipping_class": job.shipping_class(),
            });
            for _ in 0..job.order_quantity() {
                entries.push(entry.clone());
            }
        }
        Value::Array(entries)
    }
}
