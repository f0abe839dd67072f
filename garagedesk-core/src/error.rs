use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tracing::error;

/// Domain error taxonomy for the back-office core.
///
/// Authorization and validation errors are raised before any data access;
/// the remaining kinds classify failures surfaced by the store.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No authenticated session was presented.
    #[error("authentication required")]
    Unauthorized,

    /// Authenticated, but the role is below the operation's minimum.
    #[error("insufficient privileges")]
    Forbidden,

    /// Malformed or incomplete request shape.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A requested stock deduction exceeds the available quantity.
    #[error("insufficient stock for {sku}: {available} available, {requested} requested")]
    InsufficientStock {
        sku: String,
        available: i32,
        requested: i32,
    },

    /// A disallowed invoice status change.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Duplicate unique key (SKU, email, invoice number).
    #[error("{0}")]
    Conflict(String),

    /// Failure internal to the service (hashing, token signing).
    #[error("internal error: {0}")]
    Internal(String),

    /// Underlying store operation failed for reasons opaque to the core.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Classifies a sqlx error, turning a unique-constraint violation
    /// (SQLSTATE 23505) into a `Conflict` with the given message.
    pub fn or_conflict(err: sqlx::Error, message: &str) -> AppError {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23505") {
                return AppError::Conflict(message.to_string());
            }
        }
        AppError::Database(err)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Opaque 500s keep store details out of responses.
        let message = match &self {
            AppError::Database(e) => {
                error!("Database error: {}", e);
                "internal server error".to_string()
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_names_item_and_quantities() {
        let err = AppError::InsufficientStock {
            sku: "BRK-PAD-01".to_string(),
            available: 1,
            requested: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("BRK-PAD-01"));
        assert!(msg.contains("1 available"));
        assert!(msg.contains("5 requested"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound("invoice".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
