//! Nested routers, prefix bookkeeping and matching options.

use http::Method;
use lambda_router::routing::PathTemplate;
use lambda_router::{Flow, Handler, RouteError, Router, RouterOptions};

mod common;
use common::{dispatch, reply, Trace};

fn where_am_i(trace: &Trace, label: &'static str) -> Handler {
    let trace = trace.clone();
    Handler::from_fn(move |req, _| {
        trace.push(format!(
            "{} base={} path={} original={}",
            label,
            req.base_path(),
            req.path(),
            req.original_path()
        ));
        Ok(Flow::Next)
    })
}

#[tokio::test]
async fn test_two_level_mount() {
    let trace = Trace::new();

    let mut v1 = Router::new();
    v1.get("/items/:id", where_am_i(&trace, "item")).unwrap();

    let mut api = Router::new();
    api.use_handler(where_am_i(&trace, "api"))
        .unwrap()
        .use_at("/v1", v1)
        .unwrap()
        .use_handler(where_am_i(&trace, "api after"))
        .unwrap();

    let mut router = Router::new();
    router
        .use_at("/api", api)
        .unwrap()
        .use_handler(where_am_i(&trace, "root after"))
        .unwrap();

    let (req, _, outcome) = dispatch(&router, Method::GET, "/api/v1/items/5").await;
    assert_eq!(outcome.unwrap(), Flow::Next);
    assert_eq!(
        trace.entries(),
        vec![
            "api base=/api path=/v1/items/5 original=/api/v1/items/5",
            "item base=/api/v1 path=/items/5 original=/api/v1/items/5",
            "api after base=/api path=/v1/items/5 original=/api/v1/items/5",
            "root after base= path=/api/v1/items/5 original=/api/v1/items/5",
        ]
    );
    assert_eq!(req.path(), "/api/v1/items/5");
    assert_eq!(req.base_path(), "");
}

#[tokio::test]
async fn test_mount_with_param_prefix() {
    let trace = Trace::new();
    let mut child = Router::new();
    child.use_handler(where_am_i(&trace, "child")).unwrap();

    let mut router = Router::new();
    router.use_at("/org/:org", child).unwrap();

    dispatch(&router, Method::GET, "/org/acme/repos").await;
    assert_eq!(
        trace.entries(),
        vec!["child base=/org/acme path=/repos original=/org/acme/repos"]
    );
}

#[tokio::test]
async fn test_nested_error_reaches_parent_handler() {
    let trace = Trace::new();
    let mut child = Router::new();
    child
        .get("/fail", Handler::from_fn(|_, _| Err(RouteError::new("child failed"))))
        .unwrap()
        .use_handler(trace.step("child after"))
        .unwrap();

    let seen = trace.clone();
    let mut router = Router::new();
    router
        .use_at("/child", child)
        .unwrap()
        .use_handler(trace.step("parent after"))
        .unwrap()
        .use_handler(Handler::error_fn(move |err, req, res| {
            seen.push(format!("caught {} at {}", err, req.path()));
            res.send("handled");
            Ok(Flow::Halt)
        }))
        .unwrap();

    let (_, res, outcome) = dispatch(&router, Method::GET, "/child/fail").await;
    assert_eq!(outcome.unwrap(), Flow::Halt);
    assert_eq!(res.body(), Some("handled"));
    assert_eq!(trace.entries(), vec!["caught child failed at /child/fail"]);
}

#[tokio::test]
async fn test_unmatched_child_falls_through() {
    let mut child = Router::new();
    child.get("/known", reply("child")).unwrap();

    let mut router = Router::new();
    router
        .use_at("/child", child)
        .unwrap()
        .use_handler(reply("parent fallback"))
        .unwrap();

    let (_, res, _) = dispatch(&router, Method::GET, "/child/unknown").await;
    assert_eq!(res.body(), Some("parent fallback"));

    let (_, res, _) = dispatch(&router, Method::GET, "/child/known").await;
    assert_eq!(res.body(), Some("child"));
}

#[tokio::test]
async fn test_skip_route_in_middleware_acts_as_next() {
    let trace = Trace::new();
    let mut router = Router::new();
    router
        .use_handler(Handler::from_fn(|_, _| Ok(Flow::SkipRoute)))
        .unwrap()
        .use_handler(trace.step("next middleware"))
        .unwrap();

    let (_, _, outcome) = dispatch(&router, Method::GET, "/").await;
    assert_eq!(outcome.unwrap(), Flow::Next);
    assert_eq!(trace.entries(), vec!["next middleware"]);
}

#[tokio::test]
async fn test_options_collected_inside_mounted_router() {
    let mut child = Router::new();
    child
        .get("/items", reply("get"))
        .unwrap()
        .delete("/items", reply("delete"))
        .unwrap();

    let mut router = Router::new();
    router.use_at("/api", child).unwrap();

    let (_, res, outcome) = dispatch(&router, Method::OPTIONS, "/api/items").await;
    assert_eq!(outcome.unwrap(), Flow::Halt);
    assert_eq!(res.get("allow"), Some("GET,HEAD,DELETE"));
}

#[tokio::test]
async fn test_alternation_mount() {
    let trace = Trace::new();
    let mut router = Router::new();
    router
        .use_at(
            vec![
                PathTemplate::from("/route"),
                PathTemplate::from(vec!["/route2", "/route3"]),
            ],
            where_am_i(&trace, "alt"),
        )
        .unwrap();

    for path in ["/route", "/route3/x", "/route4"] {
        dispatch(&router, Method::GET, path).await;
    }
    assert_eq!(
        trace.entries(),
        vec![
            "alt base=/route path=/ original=/route",
            "alt base=/route3 path=/x original=/route3/x",
        ]
    );
}

#[tokio::test]
async fn test_case_sensitivity_option() {
    let mut insensitive = Router::new();
    insensitive.get("/Users", reply("users")).unwrap();
    let (_, res, _) = dispatch(&insensitive, Method::GET, "/users").await;
    assert_eq!(res.body(), Some("users"));

    let mut sensitive = Router::with_options(RouterOptions {
        case_sensitive: true,
        ..Default::default()
    });
    sensitive.get("/Users", reply("users")).unwrap();
    let (_, res, outcome) = dispatch(&sensitive, Method::GET, "/users").await;
    assert_eq!(outcome.unwrap(), Flow::Next);
    assert!(!res.is_sent());
}

#[tokio::test]
async fn test_strict_option() {
    let mut lenient = Router::new();
    lenient.get("/users", reply("users")).unwrap();
    let (_, res, _) = dispatch(&lenient, Method::GET, "/users/").await;
    assert_eq!(res.body(), Some("users"));

    let mut strict = Router::with_options(RouterOptions {
        strict: true,
        ..Default::default()
    });
    strict.get("/users", reply("users")).unwrap();
    let (_, res, _) = dispatch(&strict, Method::GET, "/users/").await;
    assert!(!res.is_sent());
}

#[tokio::test]
async fn test_wildcard_and_regex_routes() {
    let mut router = Router::new();
    router
        .get(
            "/assets/*",
            Handler::from_fn(|req, res| {
                res.send(req.param("0").unwrap_or_default().to_string());
                Ok(Flow::Halt)
            }),
        )
        .unwrap()
        .get(
            regex::Regex::new(r"^/v(?P<version>\d+)/ping$").unwrap(),
            Handler::from_fn(|req, res| {
                res.send(format!("pong v{}", req.param("version").unwrap_or_default()));
                Ok(Flow::Halt)
            }),
        )
        .unwrap();

    let (_, res, _) = dispatch(&router, Method::GET, "/assets/css/site%20main.css").await;
    assert_eq!(res.body(), Some("css/site main.css"));

    let (_, res, _) = dispatch(&router, Method::GET, "/v2/ping").await;
    assert_eq!(res.body(), Some("pong v2"));
}

#[tokio::test]
async fn test_mount_template_with_trailing_slash() {
    let trace = Trace::new();
    let mut router = Router::new();
    router.use_at("/api/", where_am_i(&trace, "mw")).unwrap();

    for path in ["/api/users", "/api", "/apis"] {
        dispatch(&router, Method::GET, path).await;
    }
    assert_eq!(
        trace.entries(),
        vec![
            "mw base=/api path=/users original=/api/users",
            "mw base=/api path=/ original=/api",
        ]
    );
}
