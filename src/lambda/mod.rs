//! Lambda proxy-integration boundary.
//!
//! # Data Flow
//! ```text
//! JSON payload
//!     → event.rs (ProxyEvent)
//!     → application.rs (Request/Response, Router::handle under timeout)
//!     → event.rs (ProxyResponse)
//!     → JSON payload
//! ```

pub mod application;
pub mod event;

pub use application::Application;
pub use event::{ProxyEvent, ProxyResponse, RequestContext};
