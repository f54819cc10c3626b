//! Verb-keyed handler collection bound to one path.
//!
//! # Responsibilities
//! - Record which verbs have handlers, in registration order
//! - Run the handlers tagged with the request verb (or untagged ones)
//! - Contain `Flow::SkipRoute` so it never escapes the route
//!
//! # Design Decisions
//! - HEAD falls back to the GET handlers unless HEAD was registered
//! - A pending error only visits layers whose verb matches the request

use http::Method;

use crate::error::RouteError;
use crate::http::{Request, Response};
use crate::routing::handler::{flatten, Flow, IntoHandlers, Outcome};
use crate::routing::layer::RouteLayer;

/// Handlers registered against one path template.
#[derive(Debug)]
pub struct Route {
    path: String,
    methods: Vec<Method>,
    all: bool,
    stack: Vec<RouteLayer>,
}

impl Route {
    pub(crate) fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: Vec::new(),
            all: false,
            stack: Vec::new(),
        }
    }

    /// Template this route was registered under.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Register `handlers` for every verb.
    pub fn all(&mut self, handlers: impl IntoHandlers) -> &mut Self {
        for handler in flatten(handlers) {
            tracing::debug!(path = %self.path, "all");
            self.stack.push(RouteLayer {
                method: None,
                handler,
            });
            self.all = true;
        }
        self
    }

    /// Register `handlers` for `method`.
    pub fn method(&mut self, method: Method, handlers: impl IntoHandlers) -> &mut Self {
        for handler in flatten(handlers) {
            tracing::debug!(method = %method, path = %self.path, "route handler");
            if !self.methods.contains(&method) {
                self.methods.push(method.clone());
            }
            self.stack.push(RouteLayer {
                method: Some(method.clone()),
                handler,
            });
        }
        self
    }

    pub fn get(&mut self, handlers: impl IntoHandlers) -> &mut Self {
        self.method(Method::GET, handlers)
    }

    pub fn post(&mut self, handlers: impl IntoHandlers) -> &mut Self {
        self.method(Method::POST, handlers)
    }

    pub fn put(&mut self, handlers: impl IntoHandlers) -> &mut Self {
        self.method(Method::PUT, handlers)
    }

    pub fn delete(&mut self, handlers: impl IntoHandlers) -> &mut Self {
        self.method(Method::DELETE, handlers)
    }

    pub fn patch(&mut self, handlers: impl IntoHandlers) -> &mut Self {
        self.method(Method::PATCH, handlers)
    }

    pub fn head(&mut self, handlers: impl IntoHandlers) -> &mut Self {
        self.method(Method::HEAD, handlers)
    }

    pub fn options(&mut self, handlers: impl IntoHandlers) -> &mut Self {
        self.method(Method::OPTIONS, handlers)
    }

    pub fn trace(&mut self, handlers: impl IntoHandlers) -> &mut Self {
        self.method(Method::TRACE, handlers)
    }

    pub fn connect(&mut self, handlers: impl IntoHandlers) -> &mut Self {
        self.method(Method::CONNECT, handlers)
    }

    /// Whether this route has handlers that can serve `method`.
    pub fn handles_method(&self, method: &Method) -> bool {
        if self.all || self.methods.contains(method) {
            return true;
        }
        *method == Method::HEAD && self.methods.contains(&Method::GET)
    }

    /// Registered verbs in registration order, with HEAD implied after GET.
    pub fn supported_methods(&self) -> Vec<String> {
        let explicit_head = self.methods.contains(&Method::HEAD);
        let mut out = Vec::with_capacity(self.methods.len() + 1);
        for method in &self.methods {
            out.push(method.as_str().to_ascii_uppercase());
            if *method == Method::GET && !explicit_head {
                out.push(Method::HEAD.as_str().to_string());
            }
        }
        out
    }

    pub(crate) fn describe(&self) -> String {
        if self.all {
            let mut verbs = vec!["ALL".to_string()];
            verbs.extend(self.supported_methods());
            verbs.join(",")
        } else {
            self.supported_methods().join(",")
        }
    }

    /// Run the handlers that apply to the request verb.
    pub(crate) async fn dispatch(&self, req: &mut Request, res: &mut Response) -> Outcome {
        if self.stack.is_empty() {
            return Ok(Flow::Next);
        }

        let mut method = req.method().clone();
        if method == Method::HEAD && !self.methods.contains(&Method::HEAD) {
            method = Method::GET;
        }
        req.set_route(Some(self.path.clone()));

        let mut pending: Option<RouteError> = None;
        for layer in &self.stack {
            if let Some(tag) = &layer.method {
                if *tag != method {
                    continue;
                }
            }

            let outcome = match pending.take() {
                Some(err) => layer.handle_error(err, req, res).await,
                None => layer.handle_request(req, res).await,
            };
            match outcome {
                Ok(Flow::Next) => {}
                Ok(Flow::SkipRoute) => return Ok(Flow::Next),
                Ok(Flow::Halt) => return Ok(Flow::Halt),
                Err(err) => pending = Some(err),
            }
        }

        match pending {
            Some(err) => Err(err),
            None => Ok(Flow::Next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Handler;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str, flow: Flow) -> Handler {
        let log = log.clone();
        Handler::from_fn(move |_, _| {
            log.lock().unwrap().push(name);
            Ok(flow)
        })
    }

    #[test]
    fn test_supported_methods_order() {
        let mut route = Route::new("/users");
        route
            .post(Handler::from_fn(|_, _| Ok(Flow::Next)))
            .get(Handler::from_fn(|_, _| Ok(Flow::Next)));
        assert_eq!(route.supported_methods(), vec!["POST", "GET", "HEAD"]);

        let mut route = Route::new("/users");
        route
            .get(Handler::from_fn(|_, _| Ok(Flow::Next)))
            .head(Handler::from_fn(|_, _| Ok(Flow::Next)));
        assert_eq!(route.supported_methods(), vec!["GET", "HEAD"]);
    }

    #[test]
    fn test_handles_method() {
        let mut route = Route::new("/");
        route.get(Handler::from_fn(|_, _| Ok(Flow::Next)));
        assert!(route.handles_method(&Method::GET));
        assert!(route.handles_method(&Method::HEAD));
        assert!(!route.handles_method(&Method::POST));

        route.all(Handler::from_fn(|_, _| Ok(Flow::Next)));
        assert!(route.handles_method(&Method::DELETE));
    }

    #[tokio::test]
    async fn test_empty_route_passes() {
        let route = Route::new("/");
        let mut req = Request::new(Method::GET, "/");
        let mut res = Response::new();
        assert_eq!(route.dispatch(&mut req, &mut res).await.unwrap(), Flow::Next);
        assert_eq!(req.route(), None);
    }

    #[tokio::test]
    async fn test_only_matching_verbs_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut route = Route::new("/items");
        route
            .get(recorder(&log, "get", Flow::Next))
            .post(recorder(&log, "post", Flow::Next))
            .all(recorder(&log, "all", Flow::Next));

        let mut req = Request::new(Method::POST, "/items");
        let mut res = Response::new();
        route.dispatch(&mut req, &mut res).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["post", "all"]);
        assert_eq!(req.route(), Some("/items"));
    }

    #[tokio::test]
    async fn test_head_uses_get_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut route = Route::new("/");
        route.get(recorder(&log, "get", Flow::Halt));

        let mut req = Request::new(Method::HEAD, "/");
        let mut res = Response::new();
        assert_eq!(route.dispatch(&mut req, &mut res).await.unwrap(), Flow::Halt);
        assert_eq!(*log.lock().unwrap(), vec!["get"]);
    }

    #[tokio::test]
    async fn test_skip_route_stops_locally() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut route = Route::new("/");
        route
            .get(recorder(&log, "first", Flow::SkipRoute))
            .get(recorder(&log, "second", Flow::Halt));

        let mut req = Request::new(Method::GET, "/");
        let mut res = Response::new();
        assert_eq!(route.dispatch(&mut req, &mut res).await.unwrap(), Flow::Next);
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_error_skips_other_verbs() {
        let mut route = Route::new("/");
        route
            .get(Handler::from_fn(|_, _| Err(RouteError::new("failed"))))
            .post(Handler::error_fn(|_, _, res| {
                res.send("wrong verb");
                Ok(Flow::Halt)
            }))
            .get(Handler::error_fn(|err, _, res| {
                res.send(format!("handled {}", err));
                Ok(Flow::Halt)
            }));

        let mut req = Request::new(Method::GET, "/");
        let mut res = Response::new();
        assert_eq!(route.dispatch(&mut req, &mut res).await.unwrap(), Flow::Halt);
        assert_eq!(res.body(), Some("handled failed"));
    }

    #[tokio::test]
    async fn test_unclaimed_error_is_returned() {
        let mut route = Route::new("/");
        route
            .get(Handler::from_fn(|_, _| Err(RouteError::with_status(409, "conflict"))))
            .get(Handler::from_fn(|_, res| {
                res.send("unreachable");
                Ok(Flow::Halt)
            }));

        let mut req = Request::new(Method::GET, "/");
        let mut res = Response::new();
        let err = route.dispatch(&mut req, &mut res).await.unwrap_err();
        assert_eq!(err.status(), http::StatusCode::CONFLICT);
        assert!(!res.is_sent());
    }
}
