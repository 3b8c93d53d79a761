use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::store::StoreError;
use domain::VisitError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Credential not approved")]
    CredentialNotApproved,

    #[error("Credential expired")]
    CredentialExpired,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation error: {0}")]
    InvalidFields(String, Vec<ValidationDetail>),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::InvalidTransition(msg) => {
                (StatusCode::CONFLICT, "invalid_transition", msg, None)
            }
            ApiError::CredentialNotApproved => (
                StatusCode::CONFLICT,
                "credential_not_approved",
                "This visit is no longer approved".into(),
                None,
            ),
            ApiError::CredentialExpired => (
                StatusCode::GONE,
                "credential_expired",
                "This credential is not valid today".into(),
                None,
            ),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg, None),
            ApiError::InvalidFields(msg, details) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg,
                Some(details),
            ),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.".into(),
                None,
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    "Service temporarily unavailable".into(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<VisitError> for ApiError {
    fn from(err: VisitError) -> Self {
        match err {
            VisitError::Forbidden(msg) => ApiError::Forbidden(msg),
            VisitError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            VisitError::Conflict(msg) => ApiError::Conflict(msg),
            e @ VisitError::InvalidTransition { .. } => ApiError::InvalidTransition(e.to_string()),
            VisitError::NotApproved => ApiError::CredentialNotApproved,
            VisitError::Expired => ApiError::CredentialExpired,
            VisitError::Validation(msg) => ApiError::Validation(msg),
            VisitError::Storage(StoreError::Unavailable(msg)) => ApiError::ServiceUnavailable(msg),
            VisitError::Storage(StoreError::Conflict(msg)) => ApiError::Conflict(msg),
            VisitError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::InvalidFields(message, details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use validator::Validate;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_visit_error_status_mapping() {
        let cases: Vec<(VisitError, StatusCode)> = vec![
            (VisitError::forbidden("no"), StatusCode::FORBIDDEN),
            (VisitError::NotFound("Visit request"), StatusCode::NOT_FOUND),
            (VisitError::Conflict("dup".into()), StatusCode::CONFLICT),
            (
                VisitError::invalid_transition("approve", "denied"),
                StatusCode::CONFLICT,
            ),
            (VisitError::NotApproved, StatusCode::CONFLICT),
            (VisitError::Expired, StatusCode::GONE),
            (VisitError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                StoreError::Unavailable("pool timed out".into()).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                StoreError::Database("boom".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[tokio::test]
    async fn test_invalid_transition_body() {
        let response =
            ApiError::from(VisitError::invalid_transition("approve", "denied")).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_transition");
        assert_eq!(body["message"], "Cannot approve: record is denied");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_credential_error_codes() {
        let body = body_json(ApiError::from(VisitError::Expired).into_response()).await;
        assert_eq!(body["error"], "credential_expired");
        let body = body_json(ApiError::from(VisitError::NotApproved).into_response()).await;
        assert_eq!(body["error"], "credential_not_approved");
    }

    #[tokio::test]
    async fn test_internal_error_hides_message() {
        let response = ApiError::Internal("database connection failed".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[test]
    fn test_rate_limited() {
        let response = ApiError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "Reason is required"))]
        reason: String,
    }

    #[tokio::test]
    async fn test_from_validation_errors_carries_details() {
        let errors = Probe {
            reason: String::new(),
        }
        .validate()
        .unwrap_err();
        let response = ApiError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Reason is required");
        assert_eq!(body["details"][0]["field"], "reason");
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            ApiError::Unauthorized("test".into()).to_string(),
            "Unauthorized: test"
        );
        assert_eq!(ApiError::CredentialExpired.to_string(), "Credential expired");
        assert_eq!(ApiError::RateLimited.to_string(), "Rate limited");
    }
}
