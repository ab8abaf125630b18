use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadHalf, WriteHalf};
use tracing::{debug, warn};

use crate::config::Limits;
use crate::error::HttpError;
use crate::http::parser::{ParseError, Parser};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::routing::Router;

/// Per-connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub limits: Limits,
    pub idle_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

pub struct Connection<S> {
    parser: Parser<BufReader<ReadHalf<S>>>,
    writer: WriteHalf<S>,
    router: Arc<Router>,
    idle_timeout: Duration,
    peer: Option<SocketAddr>,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(Response, Outgoing),
    Closed,
}

/// How the pending response should be written.
#[derive(Debug, Clone, Copy)]
pub struct Outgoing {
    pub persistent: bool,
    pub head_only: bool,
    /// The client speaks HTTP/1.0 and needs keep-alive spelled out.
    pub http10: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S, router: Arc<Router>, settings: &ConnectionSettings) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        Self {
            parser: Parser::new(BufReader::new(read_half), settings.limits),
            writer,
            router,
            idle_timeout: settings.idle_timeout,
            peer: None,
            state: ConnectionState::Reading,
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Runs the parse → route → respond loop until the connection closes.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = self.read_request().await;
                }

                ConnectionState::Processing(mut req) => {
                    let head_only = req.method == Method::HEAD;
                    let http10 = req.version == "HTTP/1.0";
                    let (response, persistent) = Self::handle_request(&self.router, self.peer, &mut req).await;
                    self.state = ConnectionState::Writing(
                        response,
                        Outgoing {
                            persistent,
                            head_only,
                            http10,
                        },
                    );
                }

                ConnectionState::Writing(response, outgoing) => {
                    let status = response.status.as_u16();
                    let mut writer = ResponseWriter::new(&mut self.writer, outgoing.persistent)
                        .with_keep_alive_header(outgoing.http10);
                    writer.send(response, outgoing.head_only).await;

                    if writer.is_persistent() {
                        debug!(peer = ?self.peer, status, "response sent, keeping connection open");
                        self.state = ConnectionState::Reading; // go back for next request
                    } else {
                        debug!(peer = ?self.peer, status, "response sent, closing connection");
                        self.state = ConnectionState::Closed;
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    async fn read_request(&mut self) -> ConnectionState {
        // Only the wait for a new request counts as idle; a request that
        // has started arriving is read to completion.
        match tokio::time::timeout(self.idle_timeout, self.parser.wait_for_request()).await {
            Err(_) => {
                debug!(peer = ?self.peer, "idle timeout, closing connection");
                return ConnectionState::Closed;
            }
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => return ConnectionState::Closed,
            Ok(Err(e)) => {
                debug!(peer = ?self.peer, error = %e, "read failed");
                return ConnectionState::Closed;
            }
        }

        match self.parser.parse().await {
            Ok(Some(req)) => ConnectionState::Processing(req),
            // Client closed connection
            Ok(None) | Err(ParseError::UnexpectedEof) => ConnectionState::Closed,
            Err(ParseError::Io(e)) => {
                debug!(peer = ?self.peer, error = %e, "read failed");
                ConnectionState::Closed
            }
            Err(e) => {
                // Malformed request → protocol error
                warn!(peer = ?self.peer, error = %e, "malformed request");
                let response = Response::text(StatusCode::BadRequest, format!("{e}\n"));
                ConnectionState::Writing(
                    response,
                    Outgoing {
                        persistent: false,
                        head_only: false,
                        http10: false,
                    },
                )
            }
        }
    }

    async fn handle_request(
        router: &Router,
        peer: Option<SocketAddr>,
        req: &mut Request,
    ) -> (Response, bool) {
        debug!(
            peer = ?peer,
            method = req.method.as_str(),
            path = %req.path,
            "dispatching request"
        );

        match router.dispatch(req).await {
            Ok(response) => (response, req.persistent),
            Err(err) => {
                if let Some(http_err) = err.downcast_ref::<HttpError>() {
                    debug!(path = %req.path, error = %http_err, "handler raised http error");
                    let status = http_err.status();
                    return (Response::text(status, format!("{http_err}\n")), req.persistent);
                }

                warn!(
                    method = req.method.as_str(),
                    path = %req.path,
                    error = %err,
                    "handler failed"
                );
                let response = Response::text(StatusCode::InternalServerError, format!("{err:?}\n"));
                (response, false)
            }
        }
    }
}
