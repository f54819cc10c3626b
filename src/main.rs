//! Runs one proxy event through a sample application and prints the
//! proxy response.

use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use http::StatusCode;

use lambda_router::config::{load_config, AppConfig};
use lambda_router::observability::logging::init_logging;
use lambda_router::{
    Application, Flow, Handler, ParamHandler, ProxyEvent, RegistrationError, RouteError, Router,
    RouterOptions,
};
use lambda_router::routing::PathTemplate;

#[derive(Parser)]
#[command(name = "lambda-router")]
#[command(about = "Dispatch an API Gateway proxy event through the sample router", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Proxy event JSON file; read from stdin when omitted.
    #[arg(short, long)]
    event: Option<PathBuf>,

    /// Print the routing tree instead of dispatching.
    #[arg(long)]
    describe: bool,
}

/// Account loaded by the `user` param callback.
#[derive(Debug, Clone)]
struct User {
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    init_logging(&config.logging);

    tracing::info!(
        case_sensitive = config.router.case_sensitive,
        strict = config.router.strict,
        timeout_ms = config.adapter.timeout_ms,
        "Configuration loaded"
    );

    let router = build_router(config.router)?;
    if cli.describe {
        print!("{}", router.describe());
        return Ok(());
    }

    let raw = match &cli.event {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let event: ProxyEvent = serde_json::from_str(&raw)?;

    let app = Application::new(router, config.adapter);
    let response = app.invoke(event).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn build_router(options: RouterOptions) -> Result<Router, RegistrationError> {
    let mut app = Router::with_options(options);

    app.use_handler(Handler::from_fn(|req, _| {
        tracing::info!(path = %req.path(), "Incoming request");
        Ok(Flow::Next)
    }))?;

    // The first handler gives up on the route; the sibling route answers.
    let pass = Handler::from_fn(|_, _| Ok(Flow::Next));
    app.route("/test-next")?
        .get([pass, Handler::from_fn(|_, _| Ok(Flow::SkipRoute))])
        .get(Handler::from_fn(|_, res| {
            res.send("test-next");
            Ok(Flow::Halt)
        }));
    app.get(
        "/test-next",
        Handler::from_fn(|_, res| {
            res.send("test-next-skipped");
            Ok(Flow::Halt)
        }),
    )?;

    app.use_at(
        vec![
            PathTemplate::from("/route"),
            PathTemplate::from(vec!["/route2", "/route3"]),
        ],
        Handler::from_fn(|req, res| {
            res.set("X-Matched-Prefix", req.base_path())?;
            Ok(Flow::Next)
        }),
    )?;
    app.route("/route")?
        .get(Handler::from_fn(|_, res| {
            res.send("this is route in get");
            Ok(Flow::Halt)
        }))
        .post(Handler::from_fn(|_, res| {
            res.send("this is the same route in post");
            Ok(Flow::Halt)
        }))
        .head(Handler::from_fn(|_, res| {
            res.send_status(StatusCode::CREATED);
            Ok(Flow::Halt)
        }));

    app.get(
        "/send-status/:code(\\d{3})",
        Handler::from_fn(|req, res| {
            let code = req.param("code").unwrap_or_default();
            let status = code
                .parse::<u16>()
                .ok()
                .and_then(|c| StatusCode::from_u16(c).ok())
                .ok_or_else(|| RouteError::with_status(400, format!("unknown status {}", code)))?;
            res.send_status(status);
            Ok(Flow::Halt)
        }),
    )?;

    let mut api = Router::new();
    api.use_handler(Handler::from_fn(|_, res| {
        res.append("custom-header-field", "lambda-router")?;
        Ok(Flow::Next)
    }))?;
    api.get(
        "/say/:text",
        Handler::from_fn(|req, res| {
            let text = req.param("text").unwrap_or_default();
            res.send(format!("I just want to say \"{}\"", text));
            Ok(Flow::Halt)
        }),
    )?;
    app.use_at("/api", api)?;

    app.param(
        "user",
        ParamHandler::from_fn(|req, _, value| {
            if value == "nobody" {
                return Err(RouteError::with_status(404, format!("no user named {}", value)));
            }
            req.extensions_mut().insert(User {
                name: value.to_string(),
            });
            Ok(Flow::Next)
        }),
    )?;

    let mut posts = Router::with_options(RouterOptions {
        merge_params: true,
        ..options
    });
    posts.get(
        "/posts/:post",
        Handler::from_fn(|req, res| {
            let user = req
                .extensions()
                .get::<User>()
                .map(|u| u.name.clone())
                .unwrap_or_default();
            let post = req.param("post").unwrap_or_default().to_string();
            res.json(&serde_json::json!({ "user": user, "post": post }))?;
            Ok(Flow::Halt)
        }),
    )?;
    app.use_at("/users/:user", posts)?;

    app.use_handler(Handler::error_fn(|err, _, res| {
        res.set_status(err.status())
            .json(&serde_json::json!({
                "error": err.to_string(),
                "status": err.status().as_u16(),
            }))?;
        Ok(Flow::Halt)
    }))?;

    Ok(app)
}
