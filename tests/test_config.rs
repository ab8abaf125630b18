use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use lantern::config::{Config, Limits};
use lantern::http::cache::CachePolicy;

#[test]
fn test_empty_document_is_default_config() {
    let cfg = Config::from_yaml("").unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.server.idle_timeout(), Duration::from_secs(60));
    assert_eq!(cfg.limits, Limits::default());
    assert_eq!(cfg.cache.max_age_secs, 3600);
    assert!(cfg.static_files.is_none());
}

#[test]
fn test_default_limits() {
    let limits = Limits::default();
    assert_eq!(limits.max_request_line, 1024);
    assert_eq!(limits.max_header_name, 256);
    assert_eq!(limits.max_header_bytes, 112 * 1024);
    assert_eq!(limits.max_headers, 256);
    assert_eq!(limits.max_param_name, 64);
    assert_eq!(limits.max_param_value, 10 * 1024);
}

#[test]
fn test_partial_document_keeps_other_defaults() {
    let cfg = Config::from_yaml(
        r#"
server:
  listen_addr: "0.0.0.0:9000"
limits:
  max_request_line: 2048
cache:
  max_age_secs: 60
  cache_control: "public"
static_files:
  root: ./public
"#,
    )
    .unwrap();

    assert_eq!(cfg.server.listen_addr, "0.0.0.0:9000");
    assert_eq!(cfg.server.idle_timeout_secs, 60);
    assert_eq!(cfg.limits.max_request_line, 2048);
    assert_eq!(cfg.limits.max_headers, 256);

    let policy = CachePolicy::from(&cfg.cache);
    assert_eq!(policy.max_age, Duration::from_secs(60));
    assert_eq!(policy.cache_control.as_deref(), Some("public"));

    let static_files = cfg.static_files.unwrap();
    assert_eq!(static_files.mount, "/static");
    assert_eq!(static_files.root, PathBuf::from("./public"));
}

#[test]
fn test_invalid_yaml_is_an_error() {
    assert!(Config::from_yaml("server: 42").is_err());
    assert!(Config::from_yaml("limits:\n  max_headers: lots").is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let err = Config::from_file(std::path::Path::new("/nonexistent/lantern.yaml")).unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/lantern.yaml"));
}

// Environment variables are process-wide, so everything touching them
// lives in one test.
#[test]
fn test_load_from_file_and_env_override() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "server:\n  listen_addr: \"127.0.0.1:7000\"\n  idle_timeout_secs: 5").unwrap();

    unsafe {
        std::env::set_var("LANTERN_CONFIG", file.path());
        std::env::remove_var("LISTEN");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:7000");
    assert_eq!(cfg.server.idle_timeout(), Duration::from_secs(5));

    unsafe {
        std::env::set_var("LISTEN", "0.0.0.0:3000");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");
    assert_eq!(cfg.server.idle_timeout_secs, 5);

    unsafe {
        std::env::set_var("LANTERN_CONFIG", "/nonexistent/lantern.yaml");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");
    assert_eq!(cfg.server.idle_timeout_secs, 60);

    unsafe {
        std::env::remove_var("LISTEN");
        std::env::remove_var("LANTERN_CONFIG");
    }
}
