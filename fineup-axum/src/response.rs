use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Outcome of one upload, in the shape Fine Uploader expects.
///
/// Field order is the wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub success: bool,
    pub error: Option<String>,
    pub prevent_retry: bool,
    /// Object key the file was stored under
    pub file_name: Option<String>,
    pub echo_agent: Option<String>,
}

impl UploadResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed<S: Into<String>>(mut self, message: S) -> Self {
        self.success = false;
        self.error = Some(message.into());
        self
    }

    /// Serialized JSON document
    pub fn to_json_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| FALLBACK_BODY.to_vec())
    }
}

const FALLBACK_BODY: &[u8] =
    br#"{"success":false,"error":"Failed to serialize upload result","preventRetry":false,"fileName":null,"echoAgent":null}"#;

const JSON_CONTENT_TYPE: &str = "application/json";
const PLAIN_TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Which response shape a client can consume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientFlavor {
    /// Reads `application/json` responses natively
    CapabilityAware,
    /// Old browser widgets that only parse text bodies (IE9 iframe transport)
    Legacy,
}

impl ClientFlavor {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::CapabilityAware => JSON_CONTENT_TYPE,
            Self::Legacy => PLAIN_TEXT_CONTENT_TYPE,
        }
    }

    /// Always 200: failures live in the body
    pub fn render(&self, result: &UploadResult) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type()))],
            result.to_json_bytes(),
        )
            .into_response()
    }
}

/// `application/json` rendering of an upload result
#[derive(Debug, Clone)]
pub struct JsonUpload(pub UploadResult);

impl IntoResponse for JsonUpload {
    fn into_response(self) -> Response {
        ClientFlavor::CapabilityAware.render(&self.0)
    }
}

/// Same JSON document labelled `text/plain` for legacy clients
#[derive(Debug, Clone)]
pub struct PlainTextUpload(pub UploadResult);

impl IntoResponse for PlainTextUpload {
    fn into_response(self) -> Response {
        ClientFlavor::Legacy.render(&self.0)
    }
}
