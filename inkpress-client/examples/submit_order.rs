//! Order Submission Example
//!
//! Builds a small prints order and submits it to the sandbox:
//! 1. Create an order from image files (or a hosted sample image)
//! 2. Watch upload progress events
//! 3. Submit and print the receipt
//!
//! Run: INKPRESS_API_KEY=ik_test_... cargo run --example submit_order -- photo1.jpg photo2.jpg

use std::sync::Arc;

use anyhow::Context;
use inkpress_client::{
    Address, Asset, ClientConfig, Job, MimeType, Order, PrintClient, Product, SubmissionEvent,
    UploadableImage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let api_key =
        std::env::var("INKPRESS_API_KEY").context("set INKPRESS_API_KEY to a sandbox key")?;

    let mut images = Vec::new();
    for path in std::env::args().skip(1) {
        images.push(UploadableImage::from_asset(Asset::from_file(path)?));
    }
    if images.is_empty() {
        println!("No images given, using a hosted sample image");
        images.push(UploadableImage::from_asset(Asset::from_url(
            "https://samples.inkpress.io/beach.jpg",
            MimeType::Jpeg,
        )?));
    }

    let product = Product::new("squares_5x5", "5\" squares").with_quantity_per_sheet(4);
    let mut order = Order::new();
    order.add_job(Job::prints(product, images));
    order.set_email("demo@example.com");
    order.set_proof_of_payment("tok_sandbox")?;
    order.set_shipping_address(Address {
        recipient_name: "Demo Customer".to_string(),
        address_line_1: "1 Print Street".to_string(),
        city: "London".to_string(),
        postcode: "N1 1AA".to_string(),
        country_code: "GBR".to_string(),
        ..Default::default()
    });

    let client = PrintClient::new(ClientConfig::sandbox(api_key).with_locale("en_GB"))?;
    let submission = Arc::new(client.submission(order));

    // Start uploading right away, like an app would while the customer
    // is still on the checkout screen
    submission.preempt_asset_upload();

    let mut events = submission.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SubmissionEvent::Progress {
                    items_percent,
                    bytes_percent,
                } => {
                    println!("  uploading: {items_percent}% of images, {bytes_percent}% of current image");
                }
                SubmissionEvent::Completed { receipt } => {
                    println!("✅ Order printed! Receipt: {receipt}");
                    break;
                }
                SubmissionEvent::Failed { message } => {
                    println!("❌ Submission failed: {message}");
                    break;
                }
            }
        }
    });

    println!("Submitting order...");
    let receipt = submission.submit_for_printing().await?;
    println!("Receipt on record: {receipt}");

    let _ = watcher.await;
    Ok(())
}
