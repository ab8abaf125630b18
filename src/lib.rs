//! Lantern - embeddable HTTP/1.x server engine
//!
//! Parses requests off raw sockets, dispatches them through a rule-based
//! router, negotiates client-side caching and writes responses back while
//! managing persistent connections.

pub mod config;
pub mod error;
pub mod http;
pub mod provider;
pub mod routing;
pub mod server;
