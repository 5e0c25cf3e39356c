use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Per-field message carried by an unprocessable request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMessage {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Unprocessable entity: {message}")]
    UnprocessableEntity {
        message: String,
        fields: Vec<FieldMessage>,
    },

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Bad Gateway: {0}")]
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            fields: Vec<FieldMessage>,
        }

        let (status, error_message, details, fields) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation error".to_string(),
                Some(err.to_string()),
                Vec::new(),
            ),
            AppError::UnprocessableEntity { message, fields } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message, None, fields)
            }
            AppError::BadRequest(err) => {
                (StatusCode::BAD_REQUEST, err.to_string(), None, Vec::new())
            }
            AppError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string(), None, Vec::new()),
            AppError::Conflict(err) => (StatusCode::CONFLICT, err.to_string(), None, Vec::new()),
            AppError::BadGateway(msg) => (
                StatusCode::BAD_GATEWAY,
                format!("Bad Gateway: {}", msg),
                None,
                Vec::new(),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
                details,
                fields,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprocessable_entity_maps_to_422() {
        let err = AppError::UnprocessableEntity {
            message: "Invalid fields".to_string(),
            fields: vec![FieldMessage {
                field: "profitMargin".to_string(),
                message: "required".to_string(),
            }],
        };

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn bad_gateway_maps_to_502() {
        let response = AppError::BadGateway("backend down".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn client_errors_keep_their_statuses() {
        let status = |err: AppError| err.into_response().status();

        assert_eq!(
            status(AppError::BadRequest(anyhow::anyhow!("bad key"))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AppError::NotFound(anyhow::anyhow!("no review"))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(AppError::Conflict(anyhow::anyhow!("busy"))),
            StatusCode::CONFLICT
        );
    }
}
