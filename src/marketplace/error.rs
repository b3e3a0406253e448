use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use super::gate::AccessDenied;
use super::payments::GatewayError;
use super::repository::RepositoryError;
use super::vehicle::ValidationError;

/// Error taxonomy shared by every marketplace operation. Each variant maps to
/// one HTTP status and renders as `{"detail": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Gateway(GatewayError),
    #[error("{0}")]
    Internal(String),
}

impl MarketplaceError {
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::Unauthorized(detail.into())
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::Forbidden(detail.into())
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound(detail.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            MarketplaceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MarketplaceError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketplaceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MarketplaceError::Conflict(_) => StatusCode::CONFLICT,
            MarketplaceError::Gateway(_) => StatusCode::BAD_GATEWAY,
            MarketplaceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AccessDenied> for MarketplaceError {
    fn from(value: AccessDenied) -> Self {
        MarketplaceError::Forbidden(value.to_string())
    }
}

impl From<RepositoryError> for MarketplaceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict => MarketplaceError::Conflict("Record already exists".into()),
            RepositoryError::NotFound => MarketplaceError::NotFound("Record not found".into()),
            RepositoryError::Unavailable(reason) => MarketplaceError::Internal(reason),
        }
    }
}

impl From<GatewayError> for MarketplaceError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::InvalidSignature => {
                MarketplaceError::Forbidden("Invalid payment signature".into())
            }
            GatewayError::MalformedCallback(reason) => {
                MarketplaceError::Validation(ValidationError::new("response", reason))
            }
            other => MarketplaceError::Gateway(other),
        }
    }
}

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let payload = match &self {
            MarketplaceError::Validation(err) => json!({
                "detail": err.message,
                "field": err.field,
            }),
            MarketplaceError::Gateway(GatewayError::Rejected(message)) => {
                warn!(%message, "payment provider rejected checkout");
                json!({ "detail": message })
            }
            MarketplaceError::Gateway(other) => {
                warn!(error = %other, "payment provider failure");
                json!({ "detail": "Payment service unavailable" })
            }
            MarketplaceError::Internal(reason) => {
                error!(%reason, "internal marketplace error");
                json!({ "detail": "Internal server error" })
            }
            other => json!({ "detail": other.to_string() }),
        };
        (status, Json(payload)).into_response()
    }
}
