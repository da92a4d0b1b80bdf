//! Success envelopes.
//!
//! Every 2xx body is `{ "data": ... }`; errors use the `{ "error", "code" }`
//! shape from [`crate::error`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `201 Created` with the new resource in the envelope.
#[derive(Debug)]
pub struct Created<T: Serialize>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(DataResponse { data: self.0 })).into_response()
    }
}
