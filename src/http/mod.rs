//! HTTP/1.x protocol implementation.
//!
//! # Architecture
//!
//! - **`connection`**: per-socket request/response state machine
//! - **`parser`**: pull-based request reader enforcing protocol limits
//! - **`urlencoded`**: query, form and cookie decoding
//! - **`multipart`**: `multipart/form-data` bodies
//! - **`request`**: parsed request representation
//! - **`response`**: response representation, cookies and redirects
//! - **`writer`**: serializes responses and tracks connection persistence
//! - **`cache`**: ETag / Last-Modified / expiry-etag negotiation
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for the next request (idle timeout applies)
//!        └──────┬──────┘
//!               │ Request parsed            (malformed → 400, then Closed)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Router dispatch
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Persistent → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lantern::http::connection::{Connection, ConnectionSettings};
//! use lantern::http::response::Response;
//! use lantern::routing::Router;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut router = Router::new();
//!     router.path("/hello", |_req| Ok(Some(Response::ok("hi\n"))))?;
//!     let router = Arc::new(router);
//!
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     loop {
//!         let (socket, _addr) = listener.accept().await?;
//!         let router = Arc::clone(&router);
//!         tokio::spawn(async move {
//!             let mut conn = Connection::new(socket, router, &ConnectionSettings::default());
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod cache;
pub mod connection;
pub mod mime;
pub mod multipart;
pub mod parser;
pub mod request;
pub mod response;
pub mod urlencoded;
pub mod writer;
