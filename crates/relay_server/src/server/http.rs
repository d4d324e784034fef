//! HTTP surface for the static asset responder.

use crate::static_files::{StaticResponder, StaticResponse};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::sync::Arc;

/// Builds the router. Every method and path goes to the static responder.
pub fn router(responder: Arc<StaticResponder>) -> Router {
    Router::new().fallback(serve_static).with_state(responder)
}

async fn serve_static(State(responder): State<Arc<StaticResponder>>, uri: Uri) -> Response {
    responder.serve(uri.path()).await.into_response()
}

impl IntoResponse for StaticResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}
