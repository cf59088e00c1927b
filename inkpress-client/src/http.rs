//! Thin JSON client over the transport, speaking the platform's
//! conventions: `ApiKey` auth, JSON bodies, signed PUTs to object
//! storage

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::Value;
use shared::MimeType;
use shared::wire::ErrorEnvelope;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::transport::{ApiRequest, ApiTransport};

#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: Arc<dyn ApiTransport>,
    endpoint: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn ApiTransport>, config: &ClientConfig) -> Self {
        ApiClient {
            transport,
            endpoint: config.endpoint().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// JSON request against the platform API. Returns the status and
    /// the parsed body; non-JSON bodies come back as `Null` so status
    /// handling stays with the caller.
    pub async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), Error> {
        let mut request = ApiRequest::new(method, self.url(path))
            .header("Authorization", format!("ApiKey {}:", self.api_key))
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/json")
                .body(serde_json::to_vec(body)?);
        }

        let reply = self.transport.execute(request).await?;
        let value = serde_json::from_slice(&reply.body).unwrap_or(Value::Null);
        Ok((reply.status, value))
    }

    /// PUT image bytes against a pre-signed object storage URL. These
    /// go to storage directly, outside the platform endpoint, with no
    /// auth header.
    pub async fn put_signed(
        &self,
        signed_url: &str,
        mime_type: MimeType,
        body: Bytes,
    ) -> Result<(), Error> {
        let request = ApiRequest::new(Method::PUT, signed_url)
            .header("Content-Type", mime_type.as_str())
            .header("x-amz-acl", "private")
            .body(body);

        let reply = self.transport.execute(request).await?;
        if !reply.is_success() {
            return Err(Error::Transport(format!(
                "object storage rejected upload with status {}",
                reply.status
            )));
        }
        Ok(())
    }
}

/// Read a platform failure body into the matching error. Falls back to
/// a transport error when the body carries no `error` object.
pub(crate) fn platform_error(status: StatusCode, body: &Value) -> Error {
    match serde_json::from_value::<ErrorEnvelope>(body.clone()) {
        Ok(envelope) => Error::Platform {
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => Error::Transport(format!("platform returned status {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_joins_without_double_slash() {
        #[derive(Debug)]
        struct NoopTransport;

        #[async_trait::async_trait]
        impl ApiTransport for NoopTransport {
            async fn execute(
                &self,
                _request: ApiRequest,
            ) -> Result<crate::transport::ApiReply, Error> {
                Err(Error::Transport("unused".into()))
            }
        }

        let config =
            crate::config::ClientConfig::new("key").with_endpoint("http://localhost:8080/");
        let api = ApiClient::new(Arc::new(NoopTransport), &config);
        assert_eq!(api.url("/print"), "http://localhost:8080/print");
    }

    #[test]
    fn platform_error_parses_envelope() {
        let body = json!({"error": {"message": "bad key", "code": "E01"}});
        let err = platform_error(StatusCode::UNAUTHORIZED, &body);
        match err {
            Error::Platform { code, message } => {
                assert_eq!(code, "E01");
                assert_eq!(message, "bad key");
            }
            other => panic!("expected platform error, got {other:?}"),
        }
    }

    #[test]
    fn platform_error_falls_back_on_unstructured_body() {
        let err = platform_error(StatusCode::BAD_GATEWAY, &Value::Null);
        match err {
            Error::Transport(message) => assert!(message.contains("502")),
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
