use axum::{response::IntoResponse, Json};
use std::collections::BTreeMap;

/// Field name → list of messages, serialized as the 400 response body.
pub type ValidationErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, thiserror::Error)]
pub enum TicketsError {
    #[error("Ticket not found")]
    NotFound,
    #[error("validation failed")]
    Validation(ValidationErrors),
    #[error("classification service unavailable")]
    ClassifierUnavailable,
    #[error("invalid classification response")]
    InvalidClassification,
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Connection error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

impl TicketsError {
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.insert(name.to_string(), vec![message.into()]);
        Self::Validation(errors)
    }
}

impl IntoResponse for TicketsError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        match self {
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "Ticket not found" })),
            )
                .into_response(),
            Self::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            Self::ClassifierUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "error": "Classification service unavailable",
                    "detail": "Unable to classify ticket at this time. Please select category and priority manually."
                })),
            )
                .into_response(),
            Self::InvalidClassification => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "error": "Invalid classification response",
                    "detail": "Classification service returned invalid data."
                })),
            )
                .into_response(),
            Self::Database(e) => {
                log::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
            Self::Pool(e) => {
                log::error!("Connection error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
