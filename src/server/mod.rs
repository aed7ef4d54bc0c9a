//! Style Broadcast Server
//!
//! Injected clients connect to `ws://127.0.0.1:<port>/client`, say hello
//! with their executable name and from then on receive every style update
//! published for that executable.
//!
//! # Architecture
//!
//! ```text
//! watch actor --[Publish]--> StyleServer --[topic = exe]--> Clients
//!                                 ^                            |
//!                                 +--------[hello {exe}]-------+
//! ```
//!
//! All connections are handled cooperatively inside one event loop: each
//! tick accepts pending connections and polls every client. Handshakes run
//! on the blocking pool and hand finished connections back to the loop, so
//! a silent client never stalls publishes.

mod hub;
mod listener;
mod message;


pub use hub::{Connection, Hub, Received};
pub use listener::{DEBUG_PORT, EPHEMERAL_PORTS, bind, port_in_use};
pub use message::{ClientMessage, MessageType, ServerMessage};

use crate::core::Context;
use crate::{debug, log};
use std::io;
use std::net::{TcpListener, TcpStream};
use std::time::Duration;
use tokio::sync::mpsc;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::{Message, WebSocket};

/// Path injected clients connect to.
pub const CLIENT_PATH: &str = "/client";

/// Event loop tick: accept and read interval.
const TICK: Duration = Duration::from_millis(50);

/// Upper bound for a client's handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Messages to the style server
#[derive(Debug)]
pub enum ServerMsg {
    /// Send new CSS to every client subscribed to `exe`
    Publish { exe: String, css: String },
    /// Close all connections and stop
    Shutdown,
}

/// Cloneable sender side of the style server.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    tx: mpsc::Sender<ServerMsg>,
    port: u16,
}

impl ServerHandle {
    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn publish(&self, exe: impl Into<String>, css: String) {
        let msg = ServerMsg::Publish {
            exe: exe.into(),
            css,
        };
        if self.tx.send(msg).await.is_err() {
            debug!("server"; "publish after shutdown ignored");
        }
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(ServerMsg::Shutdown).await;
    }

    /// A handle with no server behind it; messages land in the receiver.
    #[cfg(test)]
    pub(crate) fn detached(port: u16) -> (Self, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(64);
        (Self { tx, port }, rx)
    }
}

/// A websocket client in non-blocking mode.
pub struct WsConnection {
    ws: WebSocket<TcpStream>,
}

impl WsConnection {
    /// Handshake on a fresh stream, then switch it to non-blocking.
    pub fn accept(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

        let ws = tungstenite::accept_hdr(stream, check_path).map_err(|e| {
            io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string())
        })?;
        ws.get_ref().set_read_timeout(None)?;
        ws.get_ref().set_nonblocking(true)?;
        Ok(Self { ws })
    }
}

fn check_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == CLIENT_PATH {
        return Ok(response);
    }
    let mut error = ErrorResponse::new(Some(format!("unknown path {}", request.uri().path())));
    *error.status_mut() = StatusCode::NOT_FOUND;
    Err(error)
}

impl Connection for WsConnection {
    fn send(&mut self, text: &str) -> io::Result<()> {
        match self.ws.send(Message::Text(text.into())) {
            Ok(()) => Ok(()),
            // Queued in the write buffer, flushed on a later tick.
            Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(tungstenite::Error::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    fn try_recv(&mut self) -> Received {
        match self.ws.read() {
            Ok(Message::Text(text)) => Received::Text(text.as_str().to_string()),
            Ok(Message::Binary(data)) => {
                Received::Text(String::from_utf8_lossy(&data).into_owned())
            }
            Ok(Message::Close(_)) => Received::Closed,
            Ok(_) => Received::Nothing,
            Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                Received::Nothing
            }
            Err(_) => Received::Closed,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.ws.flush() {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(tungstenite::Error::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    fn close(&mut self) {
        let _ = self.ws.close(None);
        let _ = self.ws.flush();
    }
}

/// Style server actor
pub struct StyleServer {
    rx: mpsc::Receiver<ServerMsg>,
    /// Connections whose handshake finished on the blocking pool.
    accepted_tx: mpsc::Sender<WsConnection>,
    accepted_rx: mpsc::Receiver<WsConnection>,
    listener: TcpListener,
    hub: Hub<WsConnection>,
    ctx: Context,
}

impl StyleServer {
    /// Bind the listener. Returns the actor and a handle to it.
    pub fn bind(ctx: Context) -> anyhow::Result<(Self, ServerHandle)> {
        let (listener, port) = listener::bind(ctx.snapshot().server.port)?;
        listener.set_nonblocking(true)?;
        log!("server"; "listening on ws://127.0.0.1:{}{}", port, CLIENT_PATH);

        let (tx, rx) = mpsc::channel(64);
        let (accepted_tx, accepted_rx) = mpsc::channel(64);
        let server = Self {
            rx,
            accepted_tx,
            accepted_rx,
            listener,
            hub: Hub::new(),
            ctx,
        };
        Ok((server, ServerHandle { tx, port }))
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(TICK);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(ServerMsg::Publish { exe, css }) => {
                        self.hub.publish(&exe, &css);
                    }
                    Some(ServerMsg::Shutdown) | None => {
                        debug!("server"; "shutting down");
                        self.hub.close_all();
                        break;
                    }
                },
                Some(conn) = self.accepted_rx.recv() => {
                    self.hub.add(conn);
                }
                _ = tick.tick() => {
                    self.accept_pending();
                    self.hub.poll(&self.ctx);
                }
            }
        }
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    debug!("server"; "connection from {}", addr);
                    let accepted = self.accepted_tx.clone();
                    tokio::task::spawn_blocking(move || match WsConnection::accept(stream) {
                        Ok(conn) => {
                            // closed only once the actor has stopped
                            let _ = accepted.blocking_send(conn);
                        }
                        Err(e) => log!("server"; "handshake failed: {}", e),
                    });
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log!("server"; "accept error: {}", e);
                    break;
                }
            }
        }
    }
}
