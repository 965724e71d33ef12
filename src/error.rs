//! Error handling for the application

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::bid::BidError;
use crate::estimate::EstimateError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Estimate(#[from] EstimateError),

    #[error(transparent)]
    Bid(#[from] BidError),
}

/// JSON body returned for every error
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Estimate(e) if e.is_not_found() => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Estimate(e) if e.is_conflict() => (StatusCode::CONFLICT, "conflict"),
            AppError::Estimate(_) => (StatusCode::BAD_REQUEST, "estimate_error"),
            AppError::Bid(BidError::BidItemNotFound { .. }) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Bid(_) => (StatusCode::BAD_REQUEST, "bid_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();

        // Server-side failures are logged in full and reported generically
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Database error".to_string()
            }
            other => {
                tracing::debug!("Request rejected: {}", other);
                other.to_string()
            }
        };

        let details = match &self {
            AppError::Estimate(EstimateError::InvalidMargins { errors }) => {
                Some(serde_json::json!({ "errors": errors }))
            }
            _ => None,
        };

        let body = ErrorResponse {
            error_type: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = AppError::Estimate(EstimateError::OpportunityNotFound {
            document_number: "OPP-1".to_string(),
        });
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        let err = AppError::Estimate(EstimateError::EmptyMarginUpdate);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = AppError::Estimate(EstimateError::LinkTargetIsFreight { task_id: 9 });
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);

        let err = AppError::Bid(BidError::BidItemNotFound { id: 4 });
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = AppError::Estimate(EstimateError::OutOfRange {
            field: "lines[0].quantity".to_string(),
        });
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = AppError::Bid(BidError::MarginLeavesNoPrice {
            margin_percent: rust_decimal::Decimal::ONE_HUNDRED,
        });
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_domain_errors_keep_their_message() {
        let err = AppError::from(EstimateError::NotALaborTask { task_id: 12 });
        assert!(err.to_string().contains("12"));
    }
}
