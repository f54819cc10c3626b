//! Shared utilities for integration tests.

use std::sync::{Arc, Mutex};

use http::Method;
use lambda_router::{Flow, Handler, Outcome, Request, Response, Router};

/// Ordered record of which handlers ran.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Middleware that records `name` and continues.
    pub fn step(&self, name: &'static str) -> Handler {
        let trace = self.clone();
        Handler::from_fn(move |_, _| {
            trace.push(name);
            Ok(Flow::Next)
        })
    }

    /// Handler that records `name` and sends it as the body.
    #[allow(dead_code)]
    pub fn reply(&self, name: &'static str) -> Handler {
        let trace = self.clone();
        Handler::from_fn(move |_, res| {
            trace.push(name);
            res.send(name);
            Ok(Flow::Halt)
        })
    }
}

/// Handler that sends `body` and finishes the request.
#[allow(dead_code)]
pub fn reply(body: &'static str) -> Handler {
    Handler::from_fn(move |_, res| {
        res.send(body);
        Ok(Flow::Halt)
    })
}

/// Dispatch a fresh request through `router`.
pub async fn dispatch(router: &Router, method: Method, url: &str) -> (Request, Response, Outcome) {
    let mut req = Request::new(method, url);
    let mut res = Response::new();
    let outcome = router.handle(&mut req, &mut res).await;
    (req, res, outcome)
}
