//! Submitting a finished order for printing

use std::sync::atomic::{AtomicBool, Ordering};

use http::{Method, StatusCode};
use serde_json::Value;
use shared::Order;
use shared::wire::PrintOrderResponse;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::http::{ApiClient, platform_error};

/// Error code the platform answers with when it already received this
/// order. That response carries the original receipt and counts as
/// success, so a resubmitted order is never printed twice.
const DUPLICATE_ORDER_CODE: &str = "20";

/// Single-use `POST /print` request
#[derive(Debug)]
pub struct SubmitOrderRequest {
    api: ApiClient,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl SubmitOrderRequest {
    pub fn new(api: ApiClient) -> Self {
        SubmitOrderRequest::with_cancellation(api, CancellationToken::new())
    }

    pub fn with_cancellation(api: ApiClient, cancel: CancellationToken) -> Self {
        SubmitOrderRequest {
            api,
            cancel,
            started: AtomicBool::new(false),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Send the order and return the platform receipt. Each request
    /// value submits at most once; build a fresh one to retry.
    pub async fn submit(&self, order: &Order, locale: &str) -> Result<String, Error> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::IllegalState(
                "submit order request already used".to_string(),
            ));
        }

        let payload = order.json_representation(locale)?;
        tracing::info!(jobs = order.jobs().len(), "submitting order for printing");

        let outcome = self
            .cancel
            .run_until_cancelled(self.api.request_json(Method::POST, "/print", Some(&payload)))
            .await;
        let (status, body) = match outcome {
            Some(result) => result?,
            None => return Err(Error::Cancelled),
        };
        interpret(status, &body)
    }
}

/// Map a `POST /print` response to a receipt or an error
fn interpret(status: StatusCode, body: &Value) -> Result<String, Error> {
    let response: PrintOrderResponse = serde_json::from_value(body.clone()).unwrap_or_default();

    if status.is_success() {
        return response.print_order_id.ok_or_else(|| {
            Error::InvalidResponse("print response missing print_order_id".to_string())
        });
    }

    match response.error {
        Some(error) if error.code.eq_ignore_ascii_case(DUPLICATE_ORDER_CODE) => {
            tracing::info!("order was already received, reusing original receipt");
            response.print_order_id.ok_or_else(|| {
                Error::InvalidResponse(
                    "duplicate order response missing print_order_id".to_string(),
                )
            })
        }
        Some(error) => Err(Error::Platform {
            code: error.code,
            message: error.message,
        }),
        None => Err(platform_error(status, body)),
    }
}
