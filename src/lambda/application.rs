//! Turns a proxy event into a dispatch and the dispatch outcome into a
//! proxy response.
//!
//! # Responsibilities
//! - Build `Request`/`Response` for each invocation
//! - Bound each dispatch with the configured timeout
//! - Map the router outcome to a status: sent response, 404, error status
//!   or 504
//! - Emit the invocation span, logs and metrics
//!
//! # Design Decisions
//! - A response a handler already sent always wins over the outcome
//! - Error messages reach the caller only when `expose_errors` is set
//! - HEAD responses keep their headers but lose the body

use std::time::{Duration, Instant};

use http::{Method, StatusCode};
use tracing::Instrument;

use crate::config::AdapterConfig;
use crate::error::RouteError;
use crate::http::{Request, Response, X_REQUEST_ID};
use crate::lambda::event::{ProxyEvent, ProxyResponse};
use crate::observability::metrics;
use crate::routing::{Flow, Router};

/// A top-level router bound to adapter settings.
#[derive(Debug)]
pub struct Application {
    router: Router,
    config: AdapterConfig,
}

impl Application {
    pub fn new(router: Router, config: AdapterConfig) -> Self {
        Self { router, config }
    }

    /// Handle one proxy event.
    pub async fn invoke(&self, event: ProxyEvent) -> ProxyResponse {
        let start = Instant::now();
        let method_label = event.http_method.to_ascii_uppercase();

        let res = match Request::from_event(&event) {
            Ok(req) => {
                let span = tracing::info_span!(
                    "invocation",
                    request_id = %req.request_id(),
                    method = %req.method(),
                    path = %req.path(),
                );
                self.dispatch(req).instrument(span).await
            }
            Err(err) => {
                tracing::warn!(method = %event.http_method, error = %err, "Rejecting event");
                self.error_response(&err)
            }
        };

        metrics::record_invocation(&method_label, res.status().as_u16(), start);
        to_proxy_response(res)
    }

    /// Handle a raw Lambda payload.
    pub async fn invoke_json(
        &self,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, serde_json::Error> {
        let event: ProxyEvent = serde_json::from_value(payload)?;
        let response = self.invoke(event).await;
        serde_json::to_value(response)
    }

    /// Run `req` through the router and settle the final response.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let mut res = Response::new();
        if res.set(X_REQUEST_ID, req.request_id()).is_err() {
            tracing::debug!("Request ID is not a valid header value");
        }

        let limit = Duration::from_millis(self.config.timeout_ms);
        let outcome = tokio::time::timeout(limit, self.router.handle(&mut req, &mut res)).await;

        let mut res = match outcome {
            Err(_) if res.is_sent() => res,
            Err(_) => {
                tracing::warn!(timeout_ms = self.config.timeout_ms, "Invocation timed out");
                let mut timed_out = Response::new();
                timed_out.send_status(StatusCode::GATEWAY_TIMEOUT);
                timed_out
            }
            Ok(Ok(Flow::Halt)) => {
                if !res.is_sent() {
                    tracing::warn!("Request halted without sending a response");
                }
                res
            }
            Ok(Ok(_)) if res.is_sent() => res,
            Ok(Ok(_)) => {
                let body = match &self.config.not_found_body {
                    Some(body) => body.clone(),
                    None => format!("Cannot {} {}", req.method(), req.original_path()),
                };
                tracing::debug!("No handler responded");
                res.set_status(StatusCode::NOT_FOUND).send(body);
                res
            }
            Ok(Err(err)) if res.is_sent() => {
                tracing::warn!(error = %err, "Error after response was sent");
                res
            }
            Ok(Err(err)) => self.error_response(&err),
        };

        if *req.method() == Method::HEAD {
            res.strip_body();
        }
        res
    }

    fn error_response(&self, err: &RouteError) -> Response {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(error = %err, status = status.as_u16(), "Unhandled error");
        } else {
            tracing::warn!(error = %err, status = status.as_u16(), "Unhandled error");
        }
        metrics::record_unhandled_error(status.as_u16());

        let mut res = Response::new();
        res.set_status(status);
        if self.config.expose_errors {
            res.send(err.to_string());
        } else {
            res.send(status.canonical_reason().unwrap_or(""));
        }
        res
    }
}

fn to_proxy_response(res: Response) -> ProxyResponse {
    let (status, headers, body) = res.into_parts();
    let mut proxy = ProxyResponse {
        status_code: status.as_u16(),
        body: body.unwrap_or_default(),
        ..Default::default()
    };
    for (name, value) in headers.iter() {
        let Ok(value) = value.to_str() else {
            continue;
        };
        proxy
            .headers
            .entry(name.as_str().to_string())
            .or_insert_with(|| value.to_string());
        proxy
            .multi_value_headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(value.to_string());
    }
    proxy
}
