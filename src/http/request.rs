//! Per-invocation request state.
//!
//! # Responsibilities
//! - Carry the method, headers, query and body of one invocation
//! - Hold the routing cursor fields (`path`, `base_path`, `params`, `route`)
//!   that the router rewrites while it walks nested stacks
//! - Assign a request ID as early as possible for log correlation
//!
//! # Design Decisions
//! - `original_path` is never modified
//! - Only the routing engine may move the cursor fields; handlers read them
//! - Invalid header names or values are dropped with a warning instead of
//!   failing the whole invocation

use std::collections::BTreeMap;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Extensions, Method};
use percent_encoding::percent_decode_str;
use uuid::Uuid;

use crate::error::RouteError;
use crate::lambda::ProxyEvent;
use crate::routing::Params;

/// Header used to echo the request ID back to the caller.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request side of one dispatch.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    original_path: String,
    base_path: String,
    params: Params,
    route: Option<String>,
    headers: HeaderMap,
    query: BTreeMap<String, String>,
    body: Option<String>,
    request_id: String,
    extensions: Extensions,
}

impl Request {
    /// Create a request for `method` and `url`.
    ///
    /// Anything after `?` in `url` is parsed as the query string.
    pub fn new(method: Method, url: impl AsRef<str>) -> Self {
        let url = url.as_ref();
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (url, BTreeMap::new()),
        };
        let path = if path.is_empty() { "/" } else { path };

        Self {
            method,
            path: path.to_string(),
            original_path: path.to_string(),
            base_path: String::new(),
            params: Params::new(),
            route: None,
            headers: HeaderMap::new(),
            query,
            body: None,
            request_id: Uuid::new_v4().to_string(),
            extensions: Extensions::new(),
        }
    }

    /// Build a request from an API Gateway proxy event.
    ///
    /// Fails with a 400 error when the event carries an unusable method.
    pub fn from_event(event: &ProxyEvent) -> Result<Self, RouteError> {
        let method_name = event.http_method.to_ascii_uppercase();
        let method = Method::from_bytes(method_name.as_bytes()).map_err(|_| {
            RouteError::with_status(400, format!("Invalid HTTP method '{}'", event.http_method))
        })?;

        let mut req = Request::new(method, &event.path);
        for (name, value) in &event.headers {
            req.insert_header(name, value);
        }
        for (name, values) in &event.multi_value_headers {
            if event.headers.contains_key(name) {
                continue;
            }
            for value in values {
                req.insert_header(name, value);
            }
        }
        if let Some(query) = &event.query_string_parameters {
            for (name, value) in query {
                req.query.insert(name.clone(), value.clone());
            }
        }
        req.body = event.body.clone();
        if let Some(id) = event.request_context.as_ref().and_then(|c| c.request_id.clone()) {
            req.request_id = id;
        }
        Ok(req)
    }

    /// Add a header, builder style.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.insert_header(name, value);
        self
    }

    fn insert_header(&mut self, name: &str, value: &str) {
        let name = match HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!(header = %name, "Dropping header with invalid name");
                return;
            }
        };
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(_) => tracing::warn!(header = %name, "Dropping header with invalid value"),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The part of the path not yet consumed by enclosing mounts.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path as received, never modified by routing.
    pub fn original_path(&self) -> &str {
        &self.original_path
    }

    /// The prefix consumed by enclosing mounts, without a trailing slash.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Parameters captured by the layer currently running.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Mutable parameters, so param callbacks can replace a value.
    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Shorthand for `params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Template of the route currently dispatching.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// First value of header `name` (case-insensitive).
    ///
    /// `Referer` and `Referrer` are interchangeable.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        let name = match name.as_str() {
            "referer" | "referrer" => "referer",
            other => other,
        };
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Decoded query string value.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Typed per-request storage for values shared between handlers.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub(crate) fn set_path(&mut self, path: String) {
        self.path = path;
    }

    pub(crate) fn set_base_path(&mut self, base_path: String) {
        self.base_path = base_path;
    }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    pub(crate) fn set_route(&mut self, route: Option<String>) {
        self.route = route;
    }
}

fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(name), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
