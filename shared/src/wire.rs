//! Request and response payloads for the print platform API

use serde::{Deserialize, Deserializer, Serialize};

/// Response from `GET /asset/sign/`. The three arrays are positional:
/// entry `i` of each belongs to the same requested asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignedUploadResponse {
    #[serde(default)]
    pub signed_requests: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub asset_ids: Vec<i64>,
}

/// One already-hosted image being registered by URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAssetObject {
    pub url: String,
    pub client_asset: bool,
    pub mime_type: String,
}

/// Body of `PATCH /asset/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAssetsRequest {
    pub objects: Vec<RegisterAssetObject>,
}

/// One registered asset echoed back with its platform identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredAsset {
    pub asset_id: i64,
    pub url: String,
}

/// Response from `PATCH /asset/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterAssetsResponse {
    #[serde(default)]
    pub objects: Vec<RegisteredAsset>,
}

/// Error object the platform embeds in failure responses. Some
/// endpoints send the code as a JSON number, others as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformError {
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub code: String,
}

/// Wrapper for responses shaped `{"error": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: PlatformError,
}

/// Response from `POST /print`. Success carries `print_order_id`;
/// failures carry `error`, and the duplicate-order failure carries
/// both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrintOrderResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PlatformError>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(i64),
    }
    Ok(match Code::deserialize(deserializer)? {
        Code::Text(text) => text,
        Code::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_accepts_string_or_number() {
        let text: PlatformError =
            serde_json::from_str(r#"{"message":"duplicate","code":"20"}"#).unwrap();
        assert_eq!(text.code, "20");

        let number: PlatformError =
            serde_json::from_str(r#"{"message":"duplicate","code":20}"#).unwrap();
        assert_eq!(number.code, "20");
    }

    #[test]
    fn print_response_tolerates_missing_fields() {
        let success: PrintOrderResponse =
            serde_json::from_str(r#"{"print_order_id":"PS-1"}"#).unwrap();
        assert_eq!(success.print_order_id.as_deref(), Some("PS-1"));
        assert!(success.error.is_none());

        let empty: PrintOrderResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.print_order_id.is_none());
        assert!(empty.error.is_none());

        let duplicate: PrintOrderResponse = serde_json::from_str(
            r#"{"print_order_id":"PS-2","error":{"message":"already printed","code":20}}"#,
        )
        .unwrap();
        assert_eq!(duplicate.print_order_id.as_deref(), Some("PS-2"));
        assert_eq!(duplicate.error.unwrap().code, "20");
    }

    #[test]
    fn signed_response_defaults_to_empty_arrays() {
        let partial: SignedUploadResponse =
            serde_json::from_str(r#"{"signed_requests":["https://s3/a"]}"#).unwrap();
        assert_eq!(partial.signed_requests.len(), 1);
        assert!(partial.urls.is_empty());
        assert!(partial.asset_ids.is_empty());
    }
}
