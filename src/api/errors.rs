use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::dto::ErrorDto;
use crate::{
    sensors::{payload::PayloadError, IngestError},
    store::StoreError,
};

#[derive(Debug)]
pub enum AppError {
    /// The request itself is unusable. Answered with 400.
    BadRequest(String),
    /// Anything the caller can't fix, storage failures included. Answered with 500.
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Internal(e) => {
                error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(ErrorDto { error: message })).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        Self::Internal(e.into())
    }
}

impl From<PayloadError> for AppError {
    fn from(e: PayloadError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Payload(e) => e.into(),
            IngestError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_errors_are_bad_requests() {
        let resp = AppError::from(PayloadError::NotAnObject).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_errors_are_internal() {
        let e = StoreError::Unavailable(sqlx::Error::PoolClosed);
        let resp = AppError::from(IngestError::Store(e)).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
