//! The error body returned by every endpoint.

use std::fmt;

use axum::{
    Json,
    extract::{
        Request,
        rejection::{JsonRejection, QueryRejection},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::{Serialize, ser::SerializeStruct};

use crate::store;

/// An error with an HTTP status, serialized as
/// `{"error": {"code": 404, "message": "..", "details": [..]}}`.
///
/// An operation that took effect but could not finish attaches the affected resource, which is
/// serialized next to the error as `"resource"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpError {
    code: StatusCode,
    message: String,
    details: Vec<String>,
    resource: Option<serde_json::Value>,
}

impl HttpError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
            resource: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// An internal error whose message carries the whole source chain of `err`.
    pub fn internal_from(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::internal(error_chain(err))
    }

    pub fn with_details(mut self, details: impl IntoIterator<Item = String>) -> Self {
        self.details.extend(details);
        self
    }

    pub fn with_resource(mut self, resource: serde_json::Value) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &[String] {
        &self.details
    }

    pub fn resource(&self) -> Option<&serde_json::Value> {
        self.resource.as_ref()
    }
}

/// Joins the messages of `err` and all its sources with `": "`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code.as_u16(), self.message)
    }
}

impl std::error::Error for HttpError {}

impl Serialize for HttpError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            code: u16,
            message: &'a str,
            #[serde(skip_serializing_if = "<[String]>::is_empty")]
            details: &'a [String],
        }

        let fields = 1 + usize::from(self.resource.is_some());
        let mut outer = serializer.serialize_struct("HttpError", fields)?;
        outer.serialize_field("error", &Body {
            code: self.code.as_u16(),
            message: &self.message,
            details: &self.details,
        })?;
        if let Some(resource) = &self.resource {
            outer.serialize_field("resource", resource)?;
        }
        outer.end()
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.code, Json(&self)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<store::Error> for HttpError {
    fn from(err: store::Error) -> Self {
        use store::Error;

        let code = match &err {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::AlreadyExists { .. } | Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::Invalid { .. } => StatusCode::BAD_REQUEST,
            Error::Impersonate { .. } | Error::Request { .. } | Error::Serialization { .. } => {
                return Self::internal_from(&err);
            }
        };
        Self::new(code, err.to_string())
    }
}

/// Logs server side failures together with the request URI.
///
/// Client errors are the caller's business and are not logged. A request whose future is dropped
/// because the client went away never reaches the logging statement.
pub async fn log_server_errors(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let response = next.run(request).await;

    if let Some(error) = response.extensions().get::<HttpError>() {
        if error.code.is_server_error() {
            tracing::error!(
                http.method = %method,
                http.uri = %uri,
                http.status = error.code.as_u16(),
                error.message = %error.message,
                "request failed"
            );
        }
    }
    response
}
