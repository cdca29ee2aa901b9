use async_trait::async_trait;
use reqwest::multipart;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::state::FieldValue;

/// Fast-path hints enforced client-side before a file ever reaches the
/// upload gateway. The gateway remains the authority on both.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "ai", "eps"];
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub url: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitRequest {
    pub product_id: u64,
    pub quantity: u64,
    pub values: HashMap<String, FieldValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartReceipt {
    pub message: String,
    pub cart_url: String,
    pub cart_item_count: Option<u64>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Application-level rejection (`success: false` envelope).
    #[error("{message}")]
    Rejected { message: String },
    #[error("request failed: {0}")]
    Transport(reqwest::Error),
    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Transport(err)
        }
    }
}

#[async_trait]
pub trait UploadGateway: Send + Sync {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, GatewayError>;
}

#[async_trait]
pub trait CartGateway: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> Result<CartReceipt, GatewayError>;
}

/// Backend endpoints speak a `{ "success": bool, "data": { ... } }` envelope;
/// rejected requests carry `data.message`.
fn envelope_data(value: &Value) -> Result<&Value, GatewayError> {
    let success = value
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let data = value.get("data").unwrap_or(&Value::Null);
    if success {
        Ok(data)
    } else {
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Request rejected")
            .to_string();
        Err(GatewayError::Rejected { message })
    }
}

fn parse_upload_response(value: &Value, fallback_name: &str) -> Result<UploadReceipt, GatewayError> {
    let data = envelope_data(value)?;
    let url = data
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Rejected {
            message: "Malformed upload response".to_string(),
        })?;
    let display_name = data
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(fallback_name);
    Ok(UploadReceipt {
        url: url.to_string(),
        display_name: display_name.to_string(),
    })
}

fn parse_cart_response(value: &Value) -> Result<CartReceipt, GatewayError> {
    let data = envelope_data(value)?;
    let message = data
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Product added to cart")
        .to_string();
    let cart_url = data
        .get("cart_url")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let cart_item_count = data.get("cart_count").and_then(Value::as_u64);
    Ok(CartReceipt {
        message,
        cart_url,
        cart_item_count,
    })
}

/// HTTP upload gateway. The client carries an explicit request timeout so a
/// network stall surfaces as an error instead of hanging the widget.
pub struct HttpUploadGateway {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpUploadGateway {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl UploadGateway for HttpUploadGateway {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, GatewayError> {
        debug!(field = %request.field, file = %request.file_name, "uploading file");
        let part = multipart::Part::bytes(request.bytes.clone()).file_name(request.file_name.clone());
        let form = multipart::Form::new()
            .text("field", request.field.clone())
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;
        let body: Value = response.json().await?;
        parse_upload_response(&body, &request.file_name)
    }
}

/// HTTP cart gateway: form-encoded add-to-cart request carrying the product,
/// quantity, and the collected values as JSON line-item metadata.
pub struct HttpCartGateway {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpCartGateway {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl CartGateway for HttpCartGateway {
    async fn submit(&self, request: &SubmitRequest) -> Result<CartReceipt, GatewayError> {
        debug!(product_id = request.product_id, quantity = request.quantity, "adding to cart");
        let calculator_data =
            serde_json::to_string(&request.values).unwrap_or_else(|_| "{}".to_string());
        let form = [
            ("product_id", request.product_id.to_string()),
            ("quantity", request.quantity.to_string()),
            ("calculator_data", calculator_data),
        ];

        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&form)
            .send()
            .await?;
        let body: Value = response.json().await?;
        parse_cart_response(&body)
    }
}

/// Local stand-in used by the preview binary when no storefront backend is
/// configured. Uploads and submissions succeed with canned receipts.
#[derive(Default)]
pub struct DryRunGateway {
    items_added: AtomicU64,
}

impl DryRunGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UploadGateway for DryRunGateway {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, GatewayError> {
        info!(field = %request.field, file = %request.file_name, "dry-run upload");
        Ok(UploadReceipt {
            url: format!("https://preview.invalid/uploads/{}", request.file_name),
            display_name: request.file_name.clone(),
        })
    }
}

#[async_trait]
impl CartGateway for DryRunGateway {
    async fn submit(&self, request: &SubmitRequest) -> Result<CartReceipt, GatewayError> {
        let count = self.items_added.fetch_add(1, Ordering::Relaxed) + 1;
        info!(product_id = request.product_id, quantity = request.quantity, "dry-run add to cart");
        Ok(CartReceipt {
            message: "Product added to cart successfully!".to_string(),
            cart_url: "https://preview.invalid/cart".to_string(),
            cart_item_count: Some(count),
        })
    }
}
