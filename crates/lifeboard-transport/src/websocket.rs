//! WebSocket transport implementation on top of `axum`.
//!
//! The listener is driven by `axum::serve`, so every TCP connection gets
//! its own task for reading the request head and doing the handshake. A
//! peer that connects and never speaks only ever stalls itself. Finished
//! upgrades are handed to [`accept`](Transport::accept) through a channel.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc, watch};
use tower_http::services::ServeDir;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Upgraded connections waiting for `accept`.
const ACCEPT_BACKLOG: usize = 64;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// Any request carrying a WebSocket upgrade is upgraded, whatever its
/// path; the path is kept on the connection. When a static root is
/// configured, every other request is answered from that directory and
/// never surfaces from [`accept`](Transport::accept).
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    /// Taken when the server task starts on the first `accept`.
    listener: Option<TcpListener>,
    static_root: Option<PathBuf>,
    /// Moves into the router on start; `incoming` closes once the server
    /// task and every pending upgrade are gone.
    incoming_tx: Option<mpsc::Sender<WebSocketConnection>>,
    incoming: mpsc::Receiver<WebSocketConnection>,
    stop: watch::Sender<bool>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr =
            listener.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, "WebSocket transport listening");

        let (incoming_tx, incoming) = mpsc::channel(ACCEPT_BACKLOG);
        let (stop, _) = watch::channel(false);
        Ok(Self {
            local_addr,
            listener: Some(listener),
            static_root: None,
            incoming_tx: Some(incoming_tx),
            incoming,
            stop,
        })
    }

    /// Serves non-upgrade HTTP requests from `root`.
    pub fn with_static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_root = Some(root.into());
        self
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        Ok(self.local_addr)
    }

    fn router(&self, incoming: mpsc::Sender<WebSocketConnection>) -> Router {
        let router = match &self.static_root {
            Some(root) => Router::new().fallback_service(ServeDir::new(root)),
            None => Router::new().fallback(|| async { StatusCode::NOT_FOUND }),
        };
        router.layer(middleware::from_fn_with_state(incoming, upgrade_or_next))
    }

    fn start(&mut self) {
        let (Some(listener), Some(incoming)) =
            (self.listener.take(), self.incoming_tx.take())
        else {
            return;
        };
        let app = self.router(incoming);
        let mut stop = self.stop.subscribe();
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    // A dropped transport stops the server as well.
                    let _ = stop.wait_for(|stopped| *stopped).await;
                })
                .await;
            match result {
                Ok(()) => tracing::info!("WebSocket transport stopped"),
                Err(e) => tracing::error!(error = %e, "WebSocket transport failed"),
            }
        });
    }
}

/// Upgrades WebSocket requests; passes everything else down the router.
async fn upgrade_or_next(
    State(incoming): State<mpsc::Sender<WebSocketConnection>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(_) => return next.run(Request::from_parts(parts, body)).await,
    };

    let path = parts.uri.path().to_owned();
    upgrade
        .on_failed_upgrade(|e| {
            tracing::debug!(error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| async move {
            let conn = WebSocketConnection::new(socket, path);
            tracing::debug!(id = %conn.id, path = %conn.path, "accepted WebSocket connection");
            if incoming.send(conn).await.is_err() {
                tracing::debug!("transport no longer accepting, dropping connection");
            }
        })
        .into_response()
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        if *self.stop.borrow() {
            return Err(TransportError::Shutdown);
        }
        self.start();
        self.incoming.recv().await.ok_or(TransportError::Shutdown)
    }

    /// Stops taking new connections. Connections already handed out stay
    /// open.
    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.stop.send_replace(true);
        Ok(())
    }
}

/// A single WebSocket connection.
///
/// The socket is split so that a task blocked in [`recv`](Connection::recv)
/// does not hold up a concurrent [`send`](Connection::send).
pub struct WebSocketConnection {
    id: ConnectionId,
    path: String,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
}

impl WebSocketConnection {
    fn new(socket: WebSocket, path: String) -> Self {
        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        let (sink, stream) = socket.split();
        Self {
            id,
            path,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// UTF-8 payloads go out as text frames (browsers hand those to
    /// `JSON.parse` directly); anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| TransportError::SendFailed(std::io::Error::other(e)))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.to_vec()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::other(e),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(std::io::Error::other(e)))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn path(&self) -> &str {
        &self.path
    }
}
