//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (at startup):
//!     use_at / route / get / param
//!     → pattern.rs (compile template into matcher + keys)
//!     → layer.rs (pattern + handler, or pattern + Route)
//!     → router.rs (append to stack)
//!
//! Dispatch (per invocation):
//!     Router::handle(req, res)
//!     → walk stack in registration order
//!     → layer matches? run param callbacks, then
//!         route layer      → route.rs (verb-scoped loop)
//!         middleware layer → strip prefix, run handler (or nested Router)
//!     → Flow::Next / Flow::SkipRoute / Flow::Halt / Err steer the cursor
//! ```
//!
//! # Design Decisions
//! - Layers are immutable after registration; all per-request state lives
//!   in `Request` and in the loop of `Router::handle`
//! - Normal and error handlers share one stack and are told apart by their
//!   `Handler` variant
//! - Deterministic: same registration and request always take the same path

pub mod handler;
pub mod layer;
pub mod params;
pub mod pattern;
pub mod route;
pub mod router;

pub use handler::{
    BoxFuture, ErrorMiddleware, Flow, Handler, IntoHandlers, Middleware, Outcome, ParamCallback,
    ParamHandler,
};
pub use params::Params;
pub use pattern::{PathMatch, PathPattern, PathTemplate, PatternOptions};
pub use route::Route;
pub use router::{Router, RouterOptions};
