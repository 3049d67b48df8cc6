use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pricegate_core::FeatureViolation;
use serde_json::json;
use thiserror::Error;

/// Errors a prediction endpoint can answer with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Body is not JSON, or a field is missing, mistyped or out of range.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The loaded artifact could not produce a prediction.
    #[error("prediction failed: {0}")]
    Prediction(String),

    #[error("no model loaded")]
    ModelNotLoaded,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Prediction(_) => "prediction_failed",
            ApiError::ModelNotLoaded => "model_not_loaded",
        }
    }

    /// One error naming every violated field; `index` locates a batch element.
    pub fn from_violations(violations: &[FeatureViolation], index: Option<usize>) -> Self {
        let joined = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        match index {
            Some(i) => ApiError::InvalidRequest(format!("item {i}: {joined}")),
            None => ApiError::InvalidRequest(joined),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = match &self {
            ApiError::InvalidRequest(d) | ApiError::Prediction(d) => d.clone(),
            ApiError::ModelNotLoaded => "the service started without a usable model".to_string(),
        };
        let body = Json(json!({ "error": self.code(), "detail": detail }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiError::InvalidRequest("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Prediction("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::ModelNotLoaded.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn violations_are_joined_with_index() {
        let v = vec![
            FeatureViolation {
                field: "lat",
                reason: "91 outside [-90, 90]".into(),
            },
            FeatureViolation {
                field: "view",
                reason: "9 outside [0, 4]".into(),
            },
        ];
        let err = ApiError::from_violations(&v, Some(2));
        assert_eq!(
            err.to_string(),
            "invalid request: item 2: lat: 91 outside [-90, 90]; view: 9 outside [0, 4]"
        );
    }
}
