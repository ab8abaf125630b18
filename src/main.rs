use std::sync::Arc;
use std::time::{Duration, SystemTime};

use lantern::config::Config;
use lantern::http::cache::{self, CachePolicy};
use lantern::http::response::{Response, ResponseBuilder, StatusCode};
use lantern::provider::StaticFiles;
use lantern::routing::{Matcher, Router, handler_fn};
use lantern::server;
use regex::Regex;

fn build_router(cfg: &Config) -> anyhow::Result<Router> {
    let policy = CachePolicy::from(&cfg.cache);
    let started = SystemTime::now();
    let mut router = Router::new();

    router.path("/", |_req| {
        Ok(Some(
            ResponseBuilder::new(StatusCode::Ok)
                .content_type("text/plain; charset=utf-8")
                .body("Hello from Lantern\n")
                .build(),
        ))
    })?;

    router.path("/hello/:name", |req| {
        let name = req.param("name").unwrap_or("stranger");
        let mut resp = Response::text(StatusCode::Ok, format!("Hello, {name}!\n"));
        cache::disable_caching(&mut resp);
        Ok(Some(resp))
    })?;

    // Cached with an expiry etag: clients revalidate only after max-age.
    let about_policy = policy.clone();
    router.path("/about", move |req| {
        cache::respond(req, None, started, &about_policy, || {
            Ok(Response::text(StatusCode::Ok, "Lantern HTTP/1.x engine\n"))
        })
        .map(Some)
    })?;

    router.route(
        Matcher::predicate(|req| req.param("redirect").is_some()),
        handler_fn(|req| {
            let location = req.param("redirect").unwrap_or("/");
            Ok(Some(Response::redirect(location, false)))
        }),
    );

    router.path("/stream", |_req| {
        let (resp, tx) = Response::streaming(StatusCode::Ok, 8);
        tokio::spawn(async move {
            for i in 0..5 {
                if tx.send(format!("tick {i}\n").into()).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        });
        Ok(Some(resp))
    })?;

    if let Some(static_cfg) = &cfg.static_files {
        let mount = static_cfg.mount.trim_end_matches('/');
        let under_mount = Regex::new(&format!("^{}(/.*)?$", regex::escape(mount)))?;
        router.route(
            Matcher::regex(under_mount),
            StaticFiles::new(mount, static_cfg.root.clone(), policy),
        );
    }

    Ok(router)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let router = Arc::new(build_router(&cfg)?);

    tokio::select! {
        res = server::run(&cfg, router) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
