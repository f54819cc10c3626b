//! Handler traits and the continuation value they return.
//!
//! # Responsibilities
//! - Define the two handler lanes (request middleware, error middleware)
//! - Wrap plain and async closures into handlers
//! - Run a handler with panic capture, so a panicking handler behaves like
//!   one that returned an error
//!
//! # Design Decisions
//! - The lane is chosen by the constructor, never inferred
//! - Handlers return a `Flow` instead of calling a continuation; the
//!   router's loop is the only place that advances the cursor
//! - Handlers are stored behind `Arc` so one instance can be registered on
//!   several layers

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::error::RouteError;
use crate::http::{Request, Response};

/// Boxed future returned by handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler asks the engine to do next.
pub type Outcome = Result<Flow, RouteError>;

/// Continuation signal returned by a handler.
///
/// Returning `Err(RouteError)` is the error form of the continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next matching layer.
    Next,
    /// Skip the remaining handlers of the current route.
    SkipRoute,
    /// The request is finished; run nothing else.
    Halt,
}

/// A request-lane handler.
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome>;

    /// Short label used by `Router::describe`.
    fn kind(&self) -> &'static str {
        "middleware"
    }

    /// Append a description of nested layers, if any.
    fn describe_into(&self, _out: &mut String, _indent: usize) {}
}

/// An error-lane handler.
pub trait ErrorMiddleware: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        err: RouteError,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Outcome>;
}

/// A callback run for a named path parameter before the layer that
/// declared it.
pub trait ParamCallback: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        value: &'a str,
    ) -> BoxFuture<'a, Outcome>;
}

/// A handler registered on a layer, tagged with its lane.
#[derive(Clone)]
pub enum Handler {
    Middleware(Arc<dyn Middleware>),
    Error(Arc<dyn ErrorMiddleware>),
}

impl Handler {
    /// Wrap a request-lane handler.
    pub fn new(middleware: impl Middleware) -> Self {
        Handler::Middleware(Arc::new(middleware))
    }

    /// Wrap an error-lane handler.
    pub fn error(middleware: impl ErrorMiddleware) -> Self {
        Handler::Error(Arc::new(middleware))
    }

    /// Request-lane handler from a synchronous closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) -> Outcome + Send + Sync + 'static,
    {
        Self::new(FnMiddleware(f))
    }

    /// Request-lane handler from a closure returning a boxed future.
    ///
    /// ```ignore
    /// Handler::from_async(|req, res| Box::pin(async move {
    ///     res.send("hello");
    ///     Ok(Flow::Halt)
    /// }))
    /// ```
    pub fn from_async<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome>
            + Send
            + Sync
            + 'static,
    {
        Self::new(AsyncMiddleware(f))
    }

    /// Error-lane handler from a synchronous closure.
    pub fn error_fn<F>(f: F) -> Self
    where
        F: Fn(RouteError, &mut Request, &mut Response) -> Outcome + Send + Sync + 'static,
    {
        Self::error(FnErrorMiddleware(f))
    }

    /// Error-lane handler from a closure returning a boxed future.
    pub fn error_async<F>(f: F) -> Self
    where
        F: for<'a> Fn(RouteError, &'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome>
            + Send
            + Sync
            + 'static,
    {
        Self::error(AsyncErrorMiddleware(f))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Handler::Middleware(m) => m.kind(),
            Handler::Error(_) => "error handler",
        }
    }

    pub(crate) fn describe_into(&self, out: &mut String, indent: usize) {
        if let Handler::Middleware(m) = self {
            m.describe_into(out, indent);
        }
    }

    /// Run on the request lane. Error handlers are skipped.
    pub(crate) async fn run(&self, req: &mut Request, res: &mut Response) -> Outcome {
        match self {
            Handler::Middleware(m) => guard(move || m.call(req, res)).await,
            Handler::Error(_) => Ok(Flow::Next),
        }
    }

    /// Run on the error lane. Request handlers pass the error through.
    pub(crate) async fn run_error(
        &self,
        err: RouteError,
        req: &mut Request,
        res: &mut Response,
    ) -> Outcome {
        match self {
            Handler::Error(m) => guard(move || m.call(err, req, res)).await,
            Handler::Middleware(_) => Err(err),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.kind()).finish()
    }
}

/// A registered param callback.
#[derive(Clone)]
pub struct ParamHandler(Arc<dyn ParamCallback>);

impl ParamHandler {
    pub fn new(callback: impl ParamCallback) -> Self {
        Self(Arc::new(callback))
    }

    /// Param callback from a synchronous closure receiving the raw value.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response, &str) -> Outcome + Send + Sync + 'static,
    {
        Self::new(FnParam(f))
    }

    /// Param callback from a closure returning a boxed future.
    pub fn from_async<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response, &'a str) -> BoxFuture<'a, Outcome>
            + Send
            + Sync
            + 'static,
    {
        Self::new(AsyncParam(f))
    }

    pub(crate) async fn run(&self, req: &mut Request, res: &mut Response, value: &str) -> Outcome {
        let callback = &self.0;
        guard(move || callback.call(req, res, value)).await
    }
}

impl fmt::Debug for ParamHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParamHandler")
    }
}

/// Invoke a handler, turning panics (while building or polling its future)
/// into `RouteError::Panic`.
async fn guard<'a, F>(call: F) -> Outcome
where
    F: FnOnce() -> BoxFuture<'a, Outcome>,
{
    let fut = match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(fut) => fut,
        Err(payload) => return Err(RouteError::from_panic(payload)),
    };
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(RouteError::from_panic(payload)),
    }
}

struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Request, &mut Response) -> Outcome + Send + Sync + 'static,
{
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome> {
        Box::pin(async move { (self.0)(req, res) })
    }
}

struct AsyncMiddleware<F>(F);

impl<F> Middleware for AsyncMiddleware<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome> {
        (self.0)(req, res)
    }
}

struct FnErrorMiddleware<F>(F);

impl<F> ErrorMiddleware for FnErrorMiddleware<F>
where
    F: Fn(RouteError, &mut Request, &mut Response) -> Outcome + Send + Sync + 'static,
{
    fn call<'a>(
        &'a self,
        err: RouteError,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move { (self.0)(err, req, res) })
    }
}

struct AsyncErrorMiddleware<F>(F);

impl<F> ErrorMiddleware for AsyncErrorMiddleware<F>
where
    F: for<'a> Fn(RouteError, &'a mut Request, &'a mut Response) -> BoxFuture<'a, Outcome>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        err: RouteError,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Outcome> {
        (self.0)(err, req, res)
    }
}

struct FnParam<F>(F);

impl<F> ParamCallback for FnParam<F>
where
    F: Fn(&mut Request, &mut Response, &str) -> Outcome + Send + Sync + 'static,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        value: &'a str,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move { (self.0)(req, res, value) })
    }
}

struct AsyncParam<F>(F);

impl<F> ParamCallback for AsyncParam<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, &'a str) -> BoxFuture<'a, Outcome>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
        value: &'a str,
    ) -> BoxFuture<'a, Outcome> {
        (self.0)(req, res, value)
    }
}

/// Anything that flattens into an ordered list of handlers.
///
/// Implemented for a single `Handler`, a `Router` (mounting), and nested
/// `Vec`s and arrays of those.
pub trait IntoHandlers {
    fn into_handlers(self, out: &mut Vec<Handler>);
}

impl IntoHandlers for Handler {
    fn into_handlers(self, out: &mut Vec<Handler>) {
        out.push(self);
    }
}

impl<T: IntoHandlers> IntoHandlers for Vec<T> {
    fn into_handlers(self, out: &mut Vec<Handler>) {
        for item in self {
            item.into_handlers(out);
        }
    }
}

impl<T: IntoHandlers, const N: usize> IntoHandlers for [T; N] {
    fn into_handlers(self, out: &mut Vec<Handler>) {
        for item in self {
            item.into_handlers(out);
        }
    }
}

pub(crate) fn flatten(handlers: impl IntoHandlers) -> Vec<Handler> {
    let mut out = Vec::new();
    handlers.into_handlers(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn exchange() -> (Request, Response) {
        (Request::new(Method::GET, "/"), Response::new())
    }

    #[tokio::test]
    async fn test_request_lane_skips_error_handler() {
        let (mut req, mut res) = exchange();
        let handler = Handler::error_fn(|_, _, res| {
            res.send("should not run");
            Ok(Flow::Halt)
        });
        assert_eq!(handler.run(&mut req, &mut res).await.unwrap(), Flow::Next);
        assert!(!res.is_sent());
    }

    #[tokio::test]
    async fn test_error_lane_forwards_through_middleware() {
        let (mut req, mut res) = exchange();
        let handler = Handler::from_fn(|_, _| Ok(Flow::Next));
        let err = handler
            .run_error(RouteError::new("original"), &mut req, &mut res)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "original");
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let (mut req, mut res) = exchange();
        let handler = Handler::from_fn(|_, _| panic!("kaboom"));
        let err = handler.run(&mut req, &mut res).await.unwrap_err();
        assert!(matches!(err, RouteError::Panic(ref msg) if msg == "kaboom"));
    }

    #[tokio::test]
    async fn test_async_handler_can_suspend() {
        let (mut req, mut res) = exchange();
        let handler = Handler::from_async(|_req, res| {
            Box::pin(async move {
                tokio::task::yield_now().await;
                res.send("later");
                Ok(Flow::Halt)
            })
        });
        assert_eq!(handler.run(&mut req, &mut res).await.unwrap(), Flow::Halt);
        assert_eq!(res.body(), Some("later"));
    }

    #[test]
    fn test_flatten_nested() {
        let h = || Handler::from_fn(|_, _| Ok(Flow::Next));
        let handlers = flatten(vec![vec![h(), h()], vec![h()]]);
        assert_eq!(handlers.len(), 3);
        assert!(flatten(Vec::<Handler>::new()).is_empty());
    }
}
