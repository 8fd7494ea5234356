use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::{
    ownership::OwnershipError,
    reservation_access::AccessError,
    schedule::ScheduleError,
    store::StoreError,
    tokens::TokenError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Email or password is incorrect".into())
    }

    pub fn unauthenticated() -> Self {
        ApiError::Unauthorized("UNAUTHENTICATED", "Missing or expired access token".into())
    }

    pub fn invalid_token() -> Self {
        ApiError::Forbidden("INVALID_TOKEN", "Access token is not valid".into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", message.into())
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound("NOT_FOUND", format!("{what} not found"))
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

/// Maps a database failure onto a 500. The cause is logged, not returned.
pub fn db_error(e: sqlx::Error) -> ApiError {
    ApiError::Internal(format!("db error: {e}"))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => {
                tracing::error!(cause = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::to_error_response("INTERNAL", "Internal server error"),
                )
                    .into_response()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::validation(e.body_text())
    }
}

/* -------------------------
   Domain error mapping
--------------------------*/

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::not_found("reservation"),
            StoreError::Database(e) => db_error(e),
        }
    }
}

impl From<OwnershipError> for ApiError {
    fn from(e: OwnershipError) -> Self {
        match e {
            OwnershipError::MissingCredential => {
                ApiError::BadRequest("MISSING_CREDENTIAL", "Password is required".into())
            }
            OwnershipError::InvalidCredential => {
                ApiError::Forbidden("INVALID_CREDENTIAL", "Password is incorrect".into())
            }
            OwnershipError::Aborted(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => ApiError::unauthenticated(),
            TokenError::Invalid => ApiError::invalid_token(),
            TokenError::Encode(msg) => ApiError::Internal(format!("token encode error: {msg}")),
        }
    }
}

impl From<ScheduleError> for ApiError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::InvalidArgument(msg) => ApiError::validation(msg),
            ScheduleError::Store(e) => e.into(),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::NoMatch => ApiError::NotFound(
                "NOT_FOUND",
                "No reservation matches the given name and phone number".into(),
            ),
            AccessError::Unauthenticated => ApiError::unauthenticated(),
            AccessError::Forbidden => ApiError::Forbidden(
                "FORBIDDEN",
                "Access token is not valid for this reservation".into(),
            ),
            AccessError::Store(e) => e.into(),
            AccessError::Token(e) => e.into(),
        }
    }
}
