use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap};
use http_body_util::{BodyExt, Limited};
use tracing::Instrument;

use crate::pipeline::UploadPipeline;
use crate::response::UploadResult;

/// Default cap on a whole request body
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024 * 1024;

/// Router state shared by both upload endpoints
#[derive(Clone)]
pub struct UploadState {
    pub pipeline: Arc<UploadPipeline>,
    pub body_limit: usize,
}

impl UploadState {
    pub fn new(pipeline: UploadPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Run the pipeline over a raw request body.
    ///
    /// The limit is enforced on the stream itself so an oversized body surfaces
    /// as a failed upload rather than a 413.
    pub async fn process(&self, headers: &HeaderMap, body: Body) -> UploadResult {
        let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        let body = Limited::new(body, self.body_limit).into_data_stream();

        self.pipeline
            .process(content_type, body)
            .instrument(tracing::info_span!("upload", request_id = %request_id))
            .await
    }
}
