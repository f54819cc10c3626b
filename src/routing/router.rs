//! The router stack and its per-request dispatch loop.
//!
//! # Responsibilities
//! - Register middleware, routes, nested routers and param callbacks
//! - Walk the stack for a request in registration order
//! - Strip and restore mount prefixes around nested stacks
//! - Carry errors forward until an error handler claims them
//! - Answer `OPTIONS` from the verbs of the matching routes when nothing
//!   else responds
//!
//! # Design Decisions
//! - The stack is append-only during setup and read-only while
//!   dispatching, so one router serves concurrent invocations
//! - The loop cursor lives on the stack of `handle`; handlers steer it by
//!   returning a `Flow`
//! - `path`, `base_path` and `params` are restored when `handle` returns,
//!   whatever the outcome

use std::collections::HashMap;
use std::fmt::Write as _;

use http::Method;
use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, RouteError};
use crate::http::{Request, Response};
use crate::routing::handler::{
    flatten, BoxFuture, Flow, Handler, IntoHandlers, Middleware, Outcome, ParamHandler,
};
use crate::routing::layer::{Layer, LayerHandle};
use crate::routing::params::Params;
use crate::routing::pattern::{PathTemplate, PatternOptions};
use crate::routing::route::Route;

/// Matching behaviour shared by every layer of one router.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterOptions {
    /// `/Users` and `/users` are different paths.
    pub case_sensitive: bool,
    /// `/users/` and `/users` are different route paths.
    pub strict: bool,
    /// Expose the parent router's params to this router's handlers.
    pub merge_params: bool,
}

/// An ordered stack of middleware, routes and nested routers.
#[derive(Debug, Default)]
pub struct Router {
    stack: Vec<Layer>,
    params: HashMap<String, Vec<ParamHandler>>,
    options: RouterOptions,
}

/// Why a param callback stopped the chain for a value.
#[derive(Debug, Clone)]
enum Interrupt {
    SkipRoute,
    Error(RouteError),
}

/// Memo of the param callbacks already run for one name in one request.
#[derive(Debug)]
struct ParamCalled {
    matched: String,
    value: Option<String>,
    interrupt: Option<Interrupt>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RouterOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Register a callback for parameter `name`.
    ///
    /// Callbacks for the same name run in registration order, at most once
    /// per distinct value within one request.
    pub fn param(
        &mut self,
        name: &str,
        callback: ParamHandler,
    ) -> Result<&mut Self, RegistrationError> {
        let name = name.strip_prefix(':').unwrap_or(name);
        if name.is_empty() {
            return Err(RegistrationError::EmptyParamName);
        }
        tracing::debug!(param = %name, "param");
        self.params
            .entry(name.to_string())
            .or_default()
            .push(callback);
        Ok(self)
    }

    /// Register middleware for every path.
    pub fn use_handler(
        &mut self,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        self.use_at("/", handlers)
    }

    /// Register middleware (or mount routers) under a path prefix.
    pub fn use_at(
        &mut self,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        let template = path.into();
        let handlers = flatten(handlers);
        if handlers.is_empty() {
            return Err(RegistrationError::MissingHandler { method: "use" });
        }

        let options = PatternOptions {
            sensitive: self.options.case_sensitive,
            strict: false,
            end: false,
        };
        for handler in handlers {
            tracing::debug!(path = %template, kind = handler.kind(), "use");
            let layer = Layer::new(&template, options, LayerHandle::Handler(handler))?;
            self.stack.push(layer);
        }
        Ok(self)
    }

    /// Create a route for `path` and return it for verb registration.
    pub fn route(&mut self, path: impl Into<PathTemplate>) -> Result<&mut Route, RegistrationError> {
        let template = path.into();
        let options = PatternOptions {
            sensitive: self.options.case_sensitive,
            strict: self.options.strict,
            end: true,
        };
        tracing::debug!(path = %template, "new route");
        let route = Route::new(template.to_string());
        let layer = Layer::new(&template, options, LayerHandle::Route(route))?;
        self.stack.push(layer);

        self.stack
            .last_mut()
            .and_then(Layer::route_mut)
            .ok_or_else(|| RegistrationError::InvalidTemplate {
                template: template.to_string(),
                reason: "route layer was not registered".to_string(),
            })
    }

    /// Register `handlers` for `method` on a new route at `path`.
    pub fn method(
        &mut self,
        method: Method,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        self.add_route(Some(method), "method", path, handlers)
    }

    /// Register `handlers` for every verb on a new route at `path`.
    pub fn all(
        &mut self,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        self.add_route(None, "all", path, handlers)
    }

    pub fn get(
        &mut self,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        self.add_route(Some(Method::GET), "get", path, handlers)
    }

    pub fn post(
        &mut self,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        self.add_route(Some(Method::POST), "post", path, handlers)
    }

    pub fn put(
        &mut self,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        self.add_route(Some(Method::PUT), "put", path, handlers)
    }

    pub fn delete(
        &mut self,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        self.add_route(Some(Method::DELETE), "delete", path, handlers)
    }

    pub fn patch(
        &mut self,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        self.add_route(Some(Method::PATCH), "patch", path, handlers)
    }

    pub fn head(
        &mut self,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        self.add_route(Some(Method::HEAD), "head", path, handlers)
    }

    pub fn options(
        &mut self,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        self.add_route(Some(Method::OPTIONS), "options", path, handlers)
    }

    pub fn trace(
        &mut self,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        self.add_route(Some(Method::TRACE), "trace", path, handlers)
    }

    pub fn connect(
        &mut self,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        self.add_route(Some(Method::CONNECT), "connect", path, handlers)
    }

    fn add_route(
        &mut self,
        method: Option<Method>,
        label: &'static str,
        path: impl Into<PathTemplate>,
        handlers: impl IntoHandlers,
    ) -> Result<&mut Self, RegistrationError> {
        let handlers = flatten(handlers);
        if handlers.is_empty() {
            return Err(RegistrationError::MissingHandler { method: label });
        }
        let route = self.route(path)?;
        match method {
            Some(method) => route.method(method, handlers),
            None => route.all(handlers),
        };
        Ok(self)
    }

    /// Render the layer tree, one line per layer, nested routers indented.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_layers(&mut out, 0);
        out
    }

    fn describe_layers(&self, out: &mut String, indent: usize) {
        for layer in &self.stack {
            match layer.handle() {
                LayerHandle::Route(route) => {
                    let _ = writeln!(
                        out,
                        "{:indent$}route {} [{}]",
                        "",
                        layer.template(),
                        route.describe(),
                        indent = indent
                    );
                }
                LayerHandle::Handler(handler) => {
                    let _ = writeln!(
                        out,
                        "{:indent$}use {} ({})",
                        "",
                        layer.template(),
                        handler.kind(),
                        indent = indent
                    );
                    handler.describe_into(out, indent + 2);
                }
            }
        }
    }

    /// Dispatch `req` through the stack.
    ///
    /// Returns `Ok(Flow::Halt)` when a handler finished the request,
    /// `Ok(Flow::Next)` when the stack was exhausted (or nothing matched),
    /// and `Err` for an error no error handler claimed.
    pub async fn handle(&self, req: &mut Request, res: &mut Response) -> Outcome {
        tracing::debug!(method = %req.method(), path = %req.path(), "dispatching");

        let parent_params = req.params().clone();
        let parent_path = req.path().to_string();
        let parent_base = req.base_path().to_string();

        let outcome = self.walk(req, res, &parent_params, &parent_base).await;

        req.set_path(parent_path);
        req.set_base_path(parent_base);
        req.set_params(parent_params);
        outcome
    }

    async fn walk(
        &self,
        req: &mut Request,
        res: &mut Response,
        parent_params: &Params,
        parent_base: &str,
    ) -> Outcome {
        let mut idx = 0;
        let mut removed = String::new();
        let mut slash_added = false;
        let mut called: HashMap<String, ParamCalled> = HashMap::new();
        let mut allowed: Vec<String> = Vec::new();
        let mut pending: Option<RouteError> = None;
        let is_options = *req.method() == Method::OPTIONS;

        loop {
            if slash_added {
                let path = req.path()[1..].to_string();
                req.set_path(path);
                slash_added = false;
            }
            if !removed.is_empty() {
                req.set_base_path(parent_base.to_string());
                let path = format!("{}{}", removed, req.path());
                req.set_path(path);
                removed.clear();
            }

            let path = req.path().to_string();
            let mut found = None;
            while idx < self.stack.len() {
                let layer = &self.stack[idx];
                idx += 1;

                let matched = match layer.match_path(&path) {
                    Ok(Some(matched)) => matched,
                    Ok(None) => continue,
                    Err(err) => {
                        pending.get_or_insert(err);
                        continue;
                    }
                };

                if let Some(route) = layer.route() {
                    if pending.is_some() {
                        continue;
                    }
                    let method = req.method();
                    let handles = route.handles_method(method);
                    if !handles && is_options {
                        for verb in route.supported_methods() {
                            if !allowed.contains(&verb) {
                                allowed.push(verb);
                            }
                        }
                    }
                    if !handles && *method != Method::HEAD {
                        continue;
                    }
                }

                found = Some((layer, matched));
                break;
            }

            let Some((layer, matched)) = found else {
                break;
            };

            if let Some(route) = layer.route() {
                req.set_route(Some(route.path().to_string()));
            }
            let params = if self.options.merge_params {
                matched.params.merged_over(parent_params)
            } else {
                matched.params
            };
            req.set_params(params);

            match self.process_params(layer, &mut called, req, res).await {
                Ok(Flow::Next) => {}
                Ok(Flow::SkipRoute) => continue,
                Ok(Flow::Halt) => return Ok(Flow::Halt),
                Err(err) => {
                    pending.get_or_insert(err);
                    continue;
                }
            }

            let outcome = if layer.route().is_some() {
                layer.handle_request(req, res).await
            } else {
                let layer_path = matched.path;
                if !layer_path.is_empty() {
                    if !path.starts_with(&layer_path) {
                        continue;
                    }
                    match path[layer_path.len()..].chars().next() {
                        None | Some('/') | Some('.') => {}
                        Some(_) => continue,
                    }

                    tracing::debug!(prefix = %layer_path, "trim prefix");
                    let mut rest = path[layer_path.len()..].to_string();
                    if !rest.starts_with('/') {
                        rest.insert(0, '/');
                        slash_added = true;
                    }
                    req.set_path(rest);
                    let mount = layer_path.strip_suffix('/').unwrap_or(&layer_path);
                    req.set_base_path(format!("{}{}", parent_base, mount));
                    removed = layer_path;
                }

                match pending.take() {
                    Some(err) => layer.handle_error(err, req, res).await,
                    None => layer.handle_request(req, res).await,
                }
            };

            match outcome {
                Ok(Flow::Next) | Ok(Flow::SkipRoute) => pending = None,
                Ok(Flow::Halt) => return Ok(Flow::Halt),
                Err(err) => pending = Some(err),
            }
        }

        // Completion is deferred so it never runs ahead of other ready tasks.
        tokio::task::yield_now().await;

        if let Some(err) = pending {
            return Err(err);
        }
        if is_options && !allowed.is_empty() && !res.is_sent() {
            let body = allowed.join(",");
            res.set("Allow", &body)?;
            res.send(body);
            return Ok(Flow::Halt);
        }
        Ok(Flow::Next)
    }

    /// Run the param callbacks for the keys `layer` declares.
    async fn process_params(
        &self,
        layer: &Layer,
        called: &mut HashMap<String, ParamCalled>,
        req: &mut Request,
        res: &mut Response,
    ) -> Outcome {
        if self.params.is_empty() {
            return Ok(Flow::Next);
        }

        for name in layer.keys() {
            let Some(callbacks) = self.params.get(name) else {
                continue;
            };
            let Some(value) = req.params().get(name).map(str::to_string) else {
                continue;
            };

            if let Some(memo) = called.get(name) {
                let failed = matches!(memo.interrupt, Some(Interrupt::Error(_)));
                if memo.matched == value || failed {
                    req.params_mut().insert_raw(name.clone(), memo.value.clone());
                    match &memo.interrupt {
                        None => continue,
                        Some(Interrupt::SkipRoute) => return Ok(Flow::SkipRoute),
                        Some(Interrupt::Error(err)) => return Err(err.clone()),
                    }
                }
            }

            let mut memo = ParamCalled {
                matched: value.clone(),
                value: Some(value.clone()),
                interrupt: None,
            };
            let mut halted = false;
            for callback in callbacks {
                let outcome = callback.run(req, res, &value).await;
                memo.value = req.params().get(name).map(str::to_string);
                match outcome {
                    Ok(Flow::Next) => {}
                    Ok(Flow::SkipRoute) => {
                        memo.interrupt = Some(Interrupt::SkipRoute);
                        break;
                    }
                    Ok(Flow::Halt) => {
                        halted = true;
                        break;
                    }
                    Err(err) => {
                        memo.interrupt = Some(Interrupt::Error(err));
                        break;
                    }
                }
            }

            let interrupt = memo.interrupt.clone();
            called.insert(name.clone(), memo);
            if halted {
                return Ok(Flow::Halt);
            }
            match interrupt {
                None => {}
                Some(Interrupt::SkipRoute) => return Ok(Flow::SkipRoute),
                Some(Interrupt::Error(err)) => return Err(err),
            }
        }
        Ok(Flow::Next)
    }
}

impl Middleware for Router {
    fn call<'a>(&'a self, req: &'a mut Request, res: &'a mut Response) -> BoxFuture<'a, Outcome> {
        Box::pin(self.handle(req, res))
    }

    fn kind(&self) -> &'static str {
        "router"
    }

    fn describe_into(&self, out: &mut String, indent: usize) {
        self.describe_layers(out, indent);
    }
}

impl From<Router> for Handler {
    fn from(router: Router) -> Self {
        Handler::new(router)
    }
}

impl IntoHandlers for Router {
    fn into_handlers(self, out: &mut Vec<Handler>) {
        out.push(Handler::from(self));
    }
}
