use std::sync::{Arc, Mutex};

use lantern::error::HttpError;
use lantern::http::request::{Method, Request, RequestBuilder};
use lantern::http::response::{Body, Response, StatusCode};
use lantern::routing::{Handler, HandlerResult, Matcher, Router, handler_fn};

fn request(path: &str) -> Request {
    RequestBuilder::new()
        .method(Method::GET)
        .path(path)
        .header("Host", "www.example.com")
        .build()
        .unwrap()
}

fn body_text(resp: &Response) -> String {
    match &resp.body {
        Body::Full(b) => String::from_utf8_lossy(b).into_owned(),
        _ => String::new(),
    }
}

/// Records its label when called and answers (or declines).
fn recording(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str, answer: bool) -> impl Handler + 'static {
    let log = Arc::clone(log);
    handler_fn(move |_req: &Request| {
        log.lock().unwrap().push(label);
        Ok(answer.then(|| Response::ok(label)))
    })
}

#[tokio::test]
async fn test_only_matching_rule_fires() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    router.route(Matcher::path("/one").unwrap(), recording(&log, "r1", true));
    router.route(Matcher::path("/two").unwrap(), recording(&log, "r2", true));
    router.route(Matcher::path("/three").unwrap(), recording(&log, "r3", true));

    let resp = router.dispatch(&mut request("/one")).await.unwrap();

    assert_eq!(body_text(&resp), "r1");
    assert_eq!(*log.lock().unwrap(), vec!["r1"]);
}

#[tokio::test]
async fn test_newest_rule_wins() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    router.route(Matcher::path("/page").unwrap(), recording(&log, "default", true));
    router.route(Matcher::path("/page").unwrap(), recording(&log, "override", true));

    let resp = router.dispatch(&mut request("/page")).await.unwrap();

    assert_eq!(body_text(&resp), "override");
    assert_eq!(*log.lock().unwrap(), vec!["override"]);
}

#[tokio::test]
async fn test_fallthrough_to_older_rule() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    router.route(Matcher::path("/x").unwrap(), recording(&log, "oldest", true));
    router.route(Matcher::path("/other").unwrap(), recording(&log, "unrelated", true));
    router.route(Matcher::path("/x").unwrap(), recording(&log, "middle", false));
    router.route(Matcher::path("/x").unwrap(), recording(&log, "newest", false));

    let resp = router.dispatch(&mut request("/x")).await.unwrap();

    assert_eq!(body_text(&resp), "oldest");
    assert_eq!(*log.lock().unwrap(), vec!["newest", "middle", "oldest"]);
}

#[tokio::test]
async fn test_fallthrough_to_default_forbidden() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    router.route(Matcher::path("/x").unwrap(), recording(&log, "declines", false));

    let resp = router.dispatch(&mut request("/x")).await.unwrap();

    assert_eq!(resp.status, StatusCode::Forbidden);
    assert_eq!(body_text(&resp), "No handler found");
}

#[tokio::test]
async fn test_custom_default_handler() {
    let mut router = Router::new();
    router.set_default(handler_fn(|req: &Request| {
        Ok(Some(Response::text(StatusCode::NotFound, format!("nothing at {}", req.path))))
    }));

    let resp = router.dispatch(&mut request("/missing")).await.unwrap();

    assert_eq!(resp.status, StatusCode::NotFound);
    assert_eq!(body_text(&resp), "nothing at /missing");
}

#[tokio::test]
async fn test_path_parameters_extracted() {
    let mut router = Router::new();
    router
        .path("/controller/:action/:id", |req| {
            let body = format!("{}:{}", req.param("action").unwrap(), req.param("id").unwrap());
            Ok(Some(Response::ok(body)))
        })
        .unwrap();

    let mut req = request("/controller/show/16");
    let resp = router.dispatch(&mut req).await.unwrap();

    assert_eq!(body_text(&resp), "show:16");
    assert_eq!(req.param("action"), Some("show"));
    assert_eq!(req.param("id"), Some("16"));
}

#[tokio::test]
async fn test_unmatched_pattern_leaves_params_untouched() {
    let mut router = Router::new();
    router
        .path("/controller/:action/:id", |_req| Ok(Some(Response::ok("matched"))))
        .unwrap();

    let mut req = request("/controller");
    let resp = router.dispatch(&mut req).await.unwrap();

    assert_eq!(resp.status, StatusCode::Forbidden);
    assert!(req.params.is_empty());
}

#[tokio::test]
async fn test_declined_rule_params_are_rolled_back() {
    let seen = Arc::new(Mutex::new(None));
    let seen_in_handler = Arc::clone(&seen);

    let mut router = Router::new();
    router.route(
        Matcher::path("/items/:slug").unwrap(),
        handler_fn(move |req: &Request| {
            *seen_in_handler.lock().unwrap() = Some(req.param("id").map(str::to_string));
            Ok(Some(Response::ok("older")))
        }),
    );
    router.route(
        Matcher::path("/items/:id").unwrap(),
        handler_fn(|req: &Request| {
            assert_eq!(req.param("id"), Some("9"));
            Ok(None)
        }),
    );

    let mut req = request("/items/9");
    router.dispatch(&mut req).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), Some(None));
    assert_eq!(req.param("slug"), Some("9"));
}

#[tokio::test]
async fn test_attribute_map_rule() {
    let mut router = Router::new();
    router.route(
        Matcher::attributes(&[
            ("host", &["www.example.com", "example.com"][..]),
            ("path", &["/blog/:post"][..]),
        ])
        .unwrap(),
        handler_fn(|req: &Request| Ok(Some(Response::ok(req.param("post").unwrap_or("").to_string())))),
    );

    let resp = router.dispatch(&mut request("/blog/hello")).await.unwrap();
    assert_eq!(body_text(&resp), "hello");

    let mut other_host = RequestBuilder::new()
        .method(Method::GET)
        .path("/blog/hello")
        .header("Host", "evil.test")
        .build()
        .unwrap();
    let resp = router.dispatch(&mut other_host).await.unwrap();
    assert_eq!(resp.status, StatusCode::Forbidden);
}

#[tokio::test]
async fn test_predicate_rule() {
    let mut router = Router::new();
    router.route(
        Matcher::predicate(|req| req.method == Method::GET && req.path.ends_with(".json")),
        handler_fn(|_req: &Request| Ok(Some(Response::ok("json")))),
    );

    assert_eq!(body_text(&router.dispatch(&mut request("/data.json")).await.unwrap()), "json");
    assert_eq!(
        router.dispatch(&mut request("/data.xml")).await.unwrap().status,
        StatusCode::Forbidden
    );
}

#[tokio::test]
async fn test_handler_errors_propagate() {
    let mut router = Router::new();
    router
        .path("/secret", |_req| Err(HttpError::Forbidden("/secret".into()).into()))
        .unwrap();

    let err = router.dispatch(&mut request("/secret")).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<HttpError>(), Some(HttpError::Forbidden(_))));
}

struct AsyncEcho;

#[async_trait::async_trait]
impl Handler for AsyncEcho {
    async fn call(&self, req: &Request) -> HandlerResult {
        tokio::task::yield_now().await;
        Ok(Some(Response::ok(req.path.clone())))
    }
}

#[tokio::test]
async fn test_async_handler() {
    let mut router = Router::new();
    router.route(Matcher::path("/echo/:rest").unwrap(), AsyncEcho);

    let resp = router.dispatch(&mut request("/echo/abc")).await.unwrap();
    assert_eq!(body_text(&resp), "/echo/abc");
}

#[tokio::test]
async fn test_reset_clears_rules() {
    let mut router = Router::new();
    router.path("/a", |_req| Ok(Some(Response::ok("a")))).unwrap();
    router.path("/b", |_req| Ok(Some(Response::ok("b")))).unwrap();
    assert_eq!(router.len(), 2);

    router.reset();

    assert!(router.is_empty());
    assert_eq!(
        router.dispatch(&mut request("/a")).await.unwrap().status,
        StatusCode::Forbidden
    );
}
