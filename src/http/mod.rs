//! Request and response types seen by handlers.
//!
//! # Data Flow
//! ```text
//! ProxyEvent
//!     → request.rs (method, headers, query, request ID)
//!     → routing engine (rewrites path/base_path/params while dispatching)
//!     → response.rs (status, headers, body, sent flag)
//!     → ProxyResponse
//! ```

pub mod request;
pub mod response;

pub use request::{Request, X_REQUEST_ID};
pub use response::Response;
