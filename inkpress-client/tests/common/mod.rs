#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use inkpress_client::{
    ApiReply, ApiRequest, ApiTransport, ClientConfig, Error, ImageRenderer, PrintClient,
};
use serde_json::{Value, json};
use shared::{Asset, AssetFragment, CropRectangle, MimeType, Product, UploadableImage};
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub body_bytes: usize,
}

impl RecordedCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// In-memory stand-in for the print platform and its object storage.
///
/// Records every request, hands out signed URLs and asset ids, and can
/// be bent into the failure shapes the client has to survive: short
/// signing responses, canned print outcomes, and gates that hold a
/// request open until the test releases it.
#[derive(Debug)]
pub struct FakePlatform {
    calls: Mutex<Vec<RecordedCall>>,
    puts_in_flight: AtomicUsize,
    pub max_concurrent_puts: AtomicUsize,
    next_asset_id: AtomicI64,
    print_response: Mutex<Option<(StatusCode, Value)>>,
    short_sign_by: AtomicUsize,
    short_register_by: AtomicUsize,
    print_gate: Mutex<Option<Arc<Notify>>>,
    puts_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(FakePlatform {
            calls: Mutex::new(Vec::new()),
            puts_in_flight: AtomicUsize::new(0),
            max_concurrent_puts: AtomicUsize::new(0),
            next_asset_id: AtomicI64::new(1000),
            print_response: Mutex::new(None),
            short_sign_by: AtomicUsize::new(0),
            short_register_by: AtomicUsize::new(0),
            print_gate: Mutex::new(None),
            puts_gate: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path_fragment: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.method == method && call.url.contains(path_fragment))
            .count()
    }

    pub fn last_print_body(&self) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|call| call.method == Method::POST && call.url.ends_with("/print"))
            .and_then(|call| call.body.clone())
    }

    pub fn set_print_response(&self, status: StatusCode, body: Value) {
        *self.print_response.lock().unwrap() = Some((status, body));
    }

    pub fn clear_print_response(&self) {
        *self.print_response.lock().unwrap() = None;
    }

    /// Answer the next signing request with `by` fewer entries than
    /// requested
    pub fn shorten_sign_response(&self, by: usize) {
        self.short_sign_by.store(by, Ordering::SeqCst);
    }

    pub fn restore_sign_response(&self) {
        self.short_sign_by.store(0, Ordering::SeqCst);
    }

    /// Echo back `by` fewer registered URLs than requested
    pub fn shorten_register_response(&self, by: usize) {
        self.short_register_by.store(by, Ordering::SeqCst);
    }

    /// Hold `POST /print` open until the returned gate is notified
    pub fn hold_print(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.print_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Hold each object storage PUT open until the returned gate is
    /// notified
    pub fn hold_puts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.puts_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    async fn handle_put(&self) -> Result<ApiReply, Error> {
        let gate = self.puts_gate.lock().unwrap().clone();
        let in_flight = self.puts_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_puts.fetch_max(in_flight, Ordering::SeqCst);
        match gate {
            Some(gate) => gate.notified().await,
            // widen the window so overlapping PUTs would be caught
            None => tokio::time::sleep(Duration::from_millis(10)).await,
        }
        self.puts_in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(reply(StatusCode::OK, json!({})))
    }

    fn handle_sign(&self, request: &ApiRequest) -> Result<ApiReply, Error> {
        let mime_types = query_param(&request.url, "mime_types").unwrap_or_default();
        let requested = if mime_types.is_empty() {
            0
        } else {
            mime_types.split(',').count()
        };
        let produced = requested.saturating_sub(self.short_sign_by.load(Ordering::SeqCst));

        let mut signed_requests = Vec::new();
        let mut urls = Vec::new();
        let mut asset_ids = Vec::new();
        for _ in 0..produced {
            let id = self.next_asset_id.fetch_add(1, Ordering::SeqCst);
            signed_requests.push(format!("https://storage.test.local/upload/{id}"));
            urls.push(format!("https://storage.test.local/asset/{id}.jpg"));
            asset_ids.push(id);
        }
        Ok(reply(
            StatusCode::OK,
            json!({
                "signed_requests": signed_requests,
                "urls": urls,
                "asset_ids": asset_ids,
            }),
        ))
    }

    fn handle_register(&self, body: Option<&Value>) -> Result<ApiReply, Error> {
        let objects = body
            .and_then(|body| body["objects"].as_array().cloned())
            .unwrap_or_default();
        let keep = objects
            .len()
            .saturating_sub(self.short_register_by.load(Ordering::SeqCst));

        let mut registered = Vec::new();
        for object in objects.iter().take(keep) {
            let id = self.next_asset_id.fetch_add(1, Ordering::SeqCst);
            registered.push(json!({
                "asset_id": id,
                "url": object["url"],
            }));
        }
        Ok(reply(StatusCode::OK, json!({ "objects": registered })))
    }

    async fn handle_print(&self) -> Result<ApiReply, Error> {
        let gate = self.print_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.print_response.lock().unwrap().clone() {
            Some((status, body)) => Ok(reply(status, body)),
            None => Ok(reply(StatusCode::OK, json!({"print_order_id": "PS-12345"}))),
        }
    }
}

#[async_trait]
impl ApiTransport for FakePlatform {
    async fn execute(&self, request: ApiRequest) -> Result<ApiReply, Error> {
        let body = request
            .body
            .as_ref()
            .and_then(|bytes| serde_json::from_slice::<Value>(bytes).ok());
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: body.clone(),
            body_bytes: request.body.as_ref().map(Bytes::len).unwrap_or(0),
        });

        if request.method == Method::PUT {
            return self.handle_put().await;
        }
        if request.method == Method::GET && request.url.contains("/asset/sign/") {
            return self.handle_sign(&request);
        }
        if request.method == Method::PATCH && request.url.ends_with("/asset/") {
            return self.handle_register(body.as_ref());
        }
        if request.method == Method::POST && request.url.ends_with("/print") {
            return self.handle_print().await;
        }
        Ok(reply(
            StatusCode::NOT_FOUND,
            json!({"error": {"message": "no such endpoint", "code": "404"}}),
        ))
    }
}

fn reply(status: StatusCode, body: Value) -> ApiReply {
    ApiReply {
        status,
        body: Bytes::from(serde_json::to_vec(&body).unwrap()),
    }
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Renderer that skips real pixel work and counts invocations
#[derive(Debug, Default)]
pub struct CountingRenderer {
    pub renders: AtomicUsize,
}

#[async_trait]
impl ImageRenderer for CountingRenderer {
    async fn render(&self, _fragment: &AssetFragment) -> Result<Asset, Error> {
        let n = self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(Asset::from_bytes(
            format!("rendered-{n}").into_bytes(),
            MimeType::Jpeg,
        ))
    }
}

// ===== Builders =====

pub fn product() -> Product {
    Product::new("squares_5x5", "5\" squares").with_quantity_per_sheet(4)
}

pub fn bytes_image(tag: &str) -> UploadableImage {
    UploadableImage::from_asset(Asset::from_bytes(
        format!("pixels-{tag}").into_bytes(),
        MimeType::Jpeg,
    ))
}

pub fn url_image(url: &str) -> UploadableImage {
    UploadableImage::from_asset(Asset::from_url(url, MimeType::Jpeg).unwrap())
}

pub fn cropped_image(tag: &str) -> UploadableImage {
    UploadableImage::new(AssetFragment::cropped(
        Asset::from_bytes(format!("pixels-{tag}").into_bytes(), MimeType::Jpeg),
        CropRectangle::new(0.1, 0.1, 0.9, 0.9),
    ))
}

pub fn client_with(platform: Arc<FakePlatform>, renderer: Arc<dyn ImageRenderer>) -> PrintClient {
    PrintClient::with_transport(
        platform,
        ClientConfig::new("ik_test_key")
            .with_endpoint("https://api.test.local/v4.0")
            .with_locale("en_GB"),
    )
    .with_renderer(renderer)
}

/// Poll until the condition holds, failing the test after two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within timeout");
}
