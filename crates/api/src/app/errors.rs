use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use chancery_core::{AggregateId, DomainError, FileRef};
use chancery_infra::DispatchError;

/// Map a dispatch failure onto the wire error shape.
///
/// Domain rejections keep their stable `DomainError::code` string so
/// clients can branch without parsing messages. Lifecycle and financial
/// rule violations are 422: the request was well-formed, the state said no.
pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "concurrency", msg),
        DispatchError::Domain(e) => domain_error_to_response(e),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            e.to_string(),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::InvalidTransition { .. }
        | DomainError::ImmutableField(_)
        | DomainError::ImmutableApprovedArtifact(_)
        | DomainError::SignatureRequired
        | DomainError::CaseArchived
        | DomainError::OverpaymentRejected { .. }
        | DomainError::InstallmentSumMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    json_error(status, err.code(), err.to_string())
}

/// Parse a path segment as an aggregate id, or produce the 400 response.
pub fn parse_aggregate_id(id: &str, what: &str) -> Result<AggregateId, axum::response::Response> {
    id.parse::<AggregateId>().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}

/// Validate a file reference from a request body.
pub fn parse_file_ref(value: &str) -> Result<FileRef, axum::response::Response> {
    FileRef::new(value).map_err(domain_error_to_response)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": {
                "code": code,
                "message": message.into(),
            }
        })),
    )
        .into_response()
}
