//! One entry of a router stack: a compiled path pattern plus what it runs.

use crate::error::{RegistrationError, RouteError};
use crate::http::{Request, Response};
use crate::routing::handler::{Flow, Handler, Outcome};
use crate::routing::pattern::{PathMatch, PathPattern, PathTemplate, PatternOptions};
use crate::routing::route::Route;

/// What a layer runs once its pattern matches.
#[derive(Debug)]
pub(crate) enum LayerHandle {
    Handler(Handler),
    Route(Route),
}

#[derive(Debug)]
pub(crate) struct Layer {
    template: String,
    pattern: PathPattern,
    handle: LayerHandle,
}

impl Layer {
    pub(crate) fn new(
        template: &PathTemplate,
        options: PatternOptions,
        handle: LayerHandle,
    ) -> Result<Self, RegistrationError> {
        Ok(Self {
            template: template.to_string(),
            pattern: PathPattern::compile(template, options)?,
            handle,
        })
    }

    pub(crate) fn template(&self) -> &str {
        &self.template
    }

    pub(crate) fn keys(&self) -> &[String] {
        self.pattern.keys()
    }

    pub(crate) fn handle(&self) -> &LayerHandle {
        &self.handle
    }

    pub(crate) fn route(&self) -> Option<&Route> {
        match &self.handle {
            LayerHandle::Route(route) => Some(route),
            LayerHandle::Handler(_) => None,
        }
    }

    pub(crate) fn route_mut(&mut self) -> Option<&mut Route> {
        match &mut self.handle {
            LayerHandle::Route(route) => Some(route),
            LayerHandle::Handler(_) => None,
        }
    }

    pub(crate) fn match_path(&self, path: &str) -> Result<Option<PathMatch>, RouteError> {
        self.pattern.match_path(path)
    }

    pub(crate) async fn handle_request(&self, req: &mut Request, res: &mut Response) -> Outcome {
        match &self.handle {
            LayerHandle::Handler(handler) => handler.run(req, res).await,
            LayerHandle::Route(route) => route.dispatch(req, res).await,
        }
    }

    pub(crate) async fn handle_error(
        &self,
        err: RouteError,
        req: &mut Request,
        res: &mut Response,
    ) -> Outcome {
        match &self.handle {
            LayerHandle::Handler(handler) => handler.run_error(err, req, res).await,
            LayerHandle::Route(_) => Err(err),
        }
    }
}

/// A route-local entry: an optional verb tag plus one handler.
#[derive(Debug)]
pub(crate) struct RouteLayer {
    pub(crate) method: Option<http::Method>,
    pub(crate) handler: Handler,
}

impl RouteLayer {
    pub(crate) async fn handle_request(&self, req: &mut Request, res: &mut Response) -> Outcome {
        self.handler.run(req, res).await
    }

    pub(crate) async fn handle_error(
        &self,
        err: RouteError,
        req: &mut Request,
        res: &mut Response,
    ) -> Outcome {
        self.handler.run_error(err, req, res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn prefix() -> PatternOptions {
        PatternOptions {
            end: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_error_handler_only_runs_on_error_lane() {
        let layer = Layer::new(
            &"/".into(),
            prefix(),
            LayerHandle::Handler(Handler::error_fn(|err, _, res| {
                res.send(format!("caught: {}", err));
                Ok(Flow::Halt)
            })),
        )
        .unwrap();

        let mut req = Request::new(Method::GET, "/");
        let mut res = Response::new();
        assert_eq!(layer.handle_request(&mut req, &mut res).await.unwrap(), Flow::Next);
        assert!(!res.is_sent());

        let outcome = layer
            .handle_error(RouteError::new("bad"), &mut req, &mut res)
            .await;
        assert_eq!(outcome.unwrap(), Flow::Halt);
        assert_eq!(res.body(), Some("caught: bad"));
    }

    #[tokio::test]
    async fn test_route_layer_dispatches_by_method() {
        let mut route = Route::new("/items");
        route.get(Handler::from_fn(|_, res| {
            res.send("items");
            Ok(Flow::Halt)
        }));
        let layer = Layer::new(
            &"/items".into(),
            PatternOptions {
                end: true,
                ..Default::default()
            },
            LayerHandle::Route(route),
        )
        .unwrap();

        let mut req = Request::new(Method::GET, "/items");
        let mut res = Response::new();
        assert_eq!(layer.handle_request(&mut req, &mut res).await.unwrap(), Flow::Halt);
        assert_eq!(res.body(), Some("items"));

        let mut req = Request::new(Method::POST, "/items");
        let mut res = Response::new();
        assert_eq!(layer.handle_request(&mut req, &mut res).await.unwrap(), Flow::Next);
        assert!(!res.is_sent());

        let outcome = layer
            .handle_error(RouteError::new("bad"), &mut req, &mut res)
            .await;
        assert!(outcome.is_err());
    }

    #[test]
    fn test_invalid_template_fails_registration() {
        let err = Layer::new(
            &"/:id(".into(),
            prefix(),
            LayerHandle::Handler(Handler::from_fn(|_, _| Ok(Flow::Next))),
        )
        .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_match_returns_values_without_storing_them() {
        let layer = Layer::new(
            &"/users/:id".into(),
            PatternOptions {
                end: true,
                ..Default::default()
            },
            LayerHandle::Handler(Handler::from_fn(|_, _| Ok(Flow::Next))),
        )
        .unwrap();
        let first = layer.match_path("/users/1").unwrap().unwrap();
        let second = layer.match_path("/users/2").unwrap().unwrap();
        assert_eq!(first.params.get("id"), Some("1"));
        assert_eq!(second.params.get("id"), Some("2"));
        assert_eq!(layer.keys(), ["id"]);
    }
}
