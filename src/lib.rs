//! Express-style request routing for Lambda proxy integrations.
//!
//! # Architecture Overview
//!
//! ```text
//!   ProxyEvent ──▶ lambda::Application ──▶ routing::Router::handle
//!                        │                        │
//!                        │            ┌───────────┼─────────────┐
//!                        │            ▼           ▼             ▼
//!                        │        middleware    Route      nested Router
//!                        │        (use_at)   (get/post…)   (mounted)
//!                        │
//!   ProxyResponse ◀──────┘  sent response │ 404 │ error status │ 504
//! ```
//!
//! Cross-cutting: `config` (TOML), `observability` (tracing, metrics),
//! `error` (dispatch and registration errors).

pub mod config;
pub mod error;
pub mod http;
pub mod lambda;
pub mod observability;
pub mod routing;

pub use config::AppConfig;
pub use error::{RegistrationError, RouteError};
pub use crate::http::{Request, Response};
pub use lambda::{Application, ProxyEvent, ProxyResponse};
pub use routing::{Flow, Handler, Outcome, ParamHandler, Route, Router, RouterOptions};
