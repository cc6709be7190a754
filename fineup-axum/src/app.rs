use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::pipeline::UploadPipeline;
use crate::response::{JsonUpload, PlainTextUpload};
use crate::UploadState;

/// Endpoint for clients that read `application/json` responses
pub const FINE_UPLOAD_PATH: &str = "/api/photos/fineupload";

/// Endpoint for legacy clients that need a `text/plain` body
pub const FINE_UPLOAD_LEGACY_PATH: &str = "/api/photos/fineuploadie9";

/// Mixed-case spellings already baked into deployed widget configurations
const FINE_UPLOAD_ALIASES: [&str; 2] = ["/api/Photos/FineUpload", "/api/photos/FineUpload"];
const FINE_UPLOAD_LEGACY_ALIASES: [&str; 2] = ["/api/Photos/FineUploadIe9", "/api/photos/FineUploadIe9"];

async fn fine_upload(State(state): State<UploadState>, headers: HeaderMap, body: Body) -> JsonUpload {
    JsonUpload(state.process(&headers, body).await)
}

async fn fine_upload_legacy(
    State(state): State<UploadState>,
    headers: HeaderMap,
    body: Body,
) -> PlainTextUpload {
    PlainTextUpload(state.process(&headers, body).await)
}

/// Router exposing both upload endpoints and `/health`
pub fn upload_router(state: UploadState) -> Router<()> {
    let mut router = Router::new()
        .route(FINE_UPLOAD_PATH, post(fine_upload))
        .route(FINE_UPLOAD_LEGACY_PATH, post(fine_upload_legacy))
        .route("/health", get(|| async { "ok" }));
    for path in FINE_UPLOAD_ALIASES {
        router = router.route(path, post(fine_upload));
    }
    for path in FINE_UPLOAD_LEGACY_ALIASES {
        router = router.route(path, post(fine_upload_legacy));
    }

    router
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

#[derive(Clone)]
pub struct UploadApp {
    pub state: UploadState,
    pub router: Router<()>,
}

impl UploadApp {
    pub fn new(pipeline: UploadPipeline) -> Self {
        Self::from_state(UploadState::new(pipeline))
    }

    pub fn from_state(state: UploadState) -> Self {
        let router = upload_router(state.clone());
        Self { state, router }
    }

    /// Mount additional routes next to the upload endpoints
    pub fn merge(mut self, router: Router<()>) -> Self {
        self.router = self.router.merge(router);
        self
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}
