//! Error types shared by the routing engine and the Lambda adapter.
//!
//! # Design Decisions
//! - Dispatch errors are values that travel forward through the stack; they
//!   are `Clone` so a failed param callback can be replayed for later layers
//! - Registration errors surface synchronously from the registration call
//! - Every dispatch error maps to an HTTP status; the adapter picks the final
//!   response from it

use std::any::Any;
use std::sync::Arc;

use http::StatusCode;
use thiserror::Error;

/// Errors raised while dispatching a request.
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    /// A captured path segment could not be percent-decoded.
    #[error("Failed to decode param '{value}'")]
    MalformedParam { value: String },

    /// An error with an explicit HTTP status chosen by a handler.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// Any other error returned by a handler or param callback.
    #[error("{0}")]
    Handler(Arc<dyn std::error::Error + Send + Sync>),

    /// A handler panicked while running.
    #[error("handler panicked: {0}")]
    Panic(String),
}

impl RouteError {
    /// Wrap an arbitrary error (or message) raised by a handler.
    pub fn new<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Handler(Arc::from(err.into()))
    }

    /// Create an error that should be answered with `status`.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status the adapter should answer with when nothing claims the error.
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::MalformedParam { .. } => StatusCode::BAD_REQUEST,
            RouteError::Status { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            RouteError::Handler(_) | RouteError::Panic(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert a caught panic payload into an error value.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panic(message)
    }
}

/// Errors raised while registering middleware, routes or param callbacks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// The path template could not be compiled.
    #[error("invalid path template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// A registration call received no handlers.
    #[error("{method}() requires at least one handler")]
    MissingHandler { method: &'static str },

    /// `param()` was called with an empty parameter name.
    #[error("invalid param() call: parameter name must not be empty")]
    EmptyParamName,
}
