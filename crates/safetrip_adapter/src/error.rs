#![forbid(unsafe_code)]

use axum::async_trait;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use safetrip_os::auth::AuthenticatedUser;
use safetrip_os::{AuthError, ServiceError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::routes::SharedRuntime;

const MALFORMED_BODY: &str = "Invalid JSON payload";
const MALFORMED_QUERY: &str = "Invalid query parameters";
const INTERNAL: &str = "Internal server error";

/// Wire envelope shared by every `/api` and `/health` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiEnvelope<()> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("malformed query string: {0}")]
    MalformedQuery(String),
    #[error("Route not found")]
    RouteNotFound,
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Service(ServiceError::Auth(e))
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Service(ServiceError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Service(ServiceError::Auth(AuthError::InvalidToken)) => StatusCode::FORBIDDEN,
            ApiError::Service(ServiceError::Auth(_)) => StatusCode::UNAUTHORIZED,
            ApiError::Service(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Service(ServiceError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Service(ServiceError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MalformedBody(_) | ApiError::MalformedQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::RouteNotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Text handed to the client. Internal detail never leaves the process.
    fn public_message(&self) -> String {
        match self {
            ApiError::Service(ServiceError::Internal(_)) => INTERNAL.to_string(),
            ApiError::Service(e) => e.to_string(),
            ApiError::MalformedBody(_) => MALFORMED_BODY.to_string(),
            ApiError::MalformedQuery(_) => MALFORMED_QUERY.to_string(),
            ApiError::RouteNotFound => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::Service(ServiceError::Internal(detail)) => {
                tracing::error!(detail = %detail, "request failed");
            }
            ApiError::MalformedBody(detail) => {
                tracing::debug!(detail = %detail, "rejected request body");
            }
            ApiError::MalformedQuery(detail) => {
                tracing::debug!(detail = %detail, "rejected query string");
            }
            _ => {}
        }
        (status, Json(ApiEnvelope::failure(self.public_message()))).into_response()
    }
}

/// `Json` with its rejection folded into the API error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(rejection_to_error(rejection)),
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    ApiError::MalformedBody(rejection.body_text())
}

/// `Query` counterpart of [`ApiJson`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(query_rejection_to_error(rejection)),
        }
    }
}

fn query_rejection_to_error(rejection: QueryRejection) -> ApiError {
    ApiError::MalformedQuery(rejection.body_text())
}

/// Rewrites axum's bare 405 into the enveloped route-not-found reply.
pub async fn envelope_method_not_allowed(response: Response) -> Response {
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        ApiError::RouteNotFound.into_response()
    } else {
        response
    }
}

/// Caller resolved from the `Authorization: Bearer` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub AuthenticatedUser);

#[async_trait]
impl FromRequestParts<SharedRuntime> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        runtime: &SharedRuntime,
    ) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let user = runtime.auth.authenticate(authorization)?;
        Ok(Caller(user))
    }
}
