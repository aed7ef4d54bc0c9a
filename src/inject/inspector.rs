//! Protocol Client: one request at a time over the inspector websocket.
//!
//! Requests carry an `id` from a counter starting at 0. A new request may
//! only be sent once the reply to the previous one has arrived, and only a
//! reply whose `id` equals the last sent id is accepted. Everything else
//! (events, stale replies, undecodable frames) is logged and skipped.

use super::frame::{FrameAssembler, Incoming};
use super::ProtocolDecodeError;
use crate::debug;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};
use thiserror::Error;
use tungstenite::handshake::HandshakeError;
use tungstenite::{Message, WebSocket};

#[derive(Debug, Error)]
pub enum InspectorError {
    #[error("failed to connect to {url}")]
    Connect {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error("inspector transport failed")]
    Transport(#[from] io::Error),

    #[error("no reply to request {id} within {timeout:?}")]
    ReplyTimeout { id: u64, timeout: Duration },

    #[error("inspector session closed")]
    SessionClosed,

    #[error("request {id} is still awaiting its reply")]
    Pending { id: u64 },
}

/// Byte transport under the inspector session.
pub trait Transport {
    /// Send one text message.
    fn send_text(&mut self, text: String) -> io::Result<()>;

    /// Read raw frame bytes, waiting at most `timeout`.
    ///
    /// `Ok(0)` means the peer closed the connection. A timeout is reported
    /// as `WouldBlock` or `TimedOut`.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Send a close frame. Errors are ignored.
    fn close(&mut self);
}

/// Client websocket over a plain TCP stream.
///
/// Outgoing frames go through tungstenite; incoming bytes are read
/// straight off the socket and reassembled by [`FrameAssembler`].
pub struct WsTransport {
    ws: WebSocket<TcpStream>,
}

impl WsTransport {
    /// Connect and perform the upgrade handshake.
    ///
    /// The TCP connect and every handshake read or write are bounded by
    /// `timeout`, so a target that accepts but never answers fails with
    /// [`InspectorError::Connect`].
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, InspectorError> {
        let connect_err = |source: io::Error| InspectorError::Connect {
            url: url.to_string(),
            source,
        };
        let timeout = timeout.max(Duration::from_millis(1));
        let parsed = url::Url::parse(url).map_err(|e| connect_err(io::Error::other(e)))?;
        let addrs = parsed
            .socket_addrs(|| Some(80))
            .map_err(connect_err)?;
        let stream = connect_any(&addrs, timeout).map_err(connect_err)?;
        stream.set_nodelay(true).ok();
        stream.set_read_timeout(Some(timeout)).map_err(connect_err)?;
        stream.set_write_timeout(Some(timeout)).map_err(connect_err)?;

        let (ws, _response) = tungstenite::client(url, stream).map_err(|e| match e {
            // a read or write timeout surfaces as WouldBlock mid-handshake
            HandshakeError::Interrupted(_) => connect_err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no handshake response within {timeout:?}"),
            )),
            HandshakeError::Failure(tungstenite::Error::Io(e)) => connect_err(e),
            HandshakeError::Failure(e) => connect_err(io::Error::other(e.to_string())),
        })?;
        Ok(Self { ws })
    }
}

/// Try each resolved address in turn, each bounded by `timeout`.
fn connect_any(addrs: &[SocketAddr], timeout: Duration) -> io::Result<TcpStream> {
    let mut last = io::Error::new(io::ErrorKind::AddrNotAvailable, "no address resolved");
    for addr in addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last = e,
        }
    }
    Err(last)
}

impl Transport for WsTransport {
    fn send_text(&mut self, text: String) -> io::Result<()> {
        self.ws.send(Message::Text(text.into())).map_err(|e| match e {
            tungstenite::Error::Io(e) => e,
            e => io::Error::other(e),
        })
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let stream = self.ws.get_mut();
        stream.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        stream.read(buf)
    }

    fn close(&mut self) {
        let _ = self.ws.close(None);
        let _ = self.ws.flush();
    }
}

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// One inspector session, scoped to a single injection job.
pub struct Inspector<T> {
    transport: T,
    assembler: FrameAssembler,
    next_id: u64,
    last_sent_id: Option<u64>,
    last_reply_id: Option<u64>,
    last_reply: Option<Value>,
    reply_timeout: Duration,
    closed: bool,
}

impl Inspector<WsTransport> {
    pub fn connect(url: &str, reply_timeout: Duration) -> Result<Self, InspectorError> {
        Ok(Self::new(WsTransport::connect(url, reply_timeout)?, reply_timeout))
    }
}

impl<T: Transport> Inspector<T> {
    pub fn new(transport: T, reply_timeout: Duration) -> Self {
        Self {
            transport,
            assembler: FrameAssembler::default(),
            next_id: 0,
            last_sent_id: None,
            last_reply_id: None,
            last_reply: None,
            reply_timeout,
            closed: false,
        }
    }

    #[inline]
    pub fn last_sent_id(&self) -> Option<u64> {
        self.last_sent_id
    }

    #[inline]
    pub fn last_reply_id(&self) -> Option<u64> {
        self.last_reply_id
    }

    #[inline]
    pub fn last_reply(&self) -> Option<&Value> {
        self.last_reply.as_ref()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether a sent request has not been answered yet.
    #[inline]
    pub fn is_awaiting(&self) -> bool {
        self.last_sent_id.is_some() && self.last_sent_id != self.last_reply_id
    }

    /// Send a request. Returns its id.
    pub fn send(&mut self, method: &str, params: Option<Value>) -> Result<u64, InspectorError> {
        if self.closed {
            return Err(InspectorError::SessionClosed);
        }
        if let Some(id) = self.last_sent_id.filter(|_| self.is_awaiting()) {
            return Err(InspectorError::Pending { id });
        }

        let id = self.next_id;
        let request = Request { id, method, params };
        let text = serde_json::to_string(&request).map_err(io::Error::from)?;
        self.transport.send_text(text)?;

        self.next_id += 1;
        self.last_sent_id = Some(id);
        debug!("inspector"; "-> {} ({})", method, id);
        Ok(id)
    }

    /// Block until the reply to the last sent request arrives.
    ///
    /// Returns immediately if nothing is outstanding.
    pub fn wait_reply(&mut self) -> Result<Value, InspectorError> {
        let Some(id) = self.last_sent_id.filter(|_| self.is_awaiting()) else {
            return Ok(self.last_reply.clone().unwrap_or(Value::Null));
        };
        if self.closed {
            return Err(InspectorError::SessionClosed);
        }

        let deadline = Instant::now() + self.reply_timeout;
        let mut buf = [0u8; 8192];
        loop {
            while let Some(message) = self.assembler.next_message() {
                match message {
                    Ok(Incoming::Text(text)) => {
                        if let Some(reply) = self.accept(id, &text) {
                            return Ok(reply);
                        }
                    }
                    Ok(Incoming::Close) => {
                        self.closed = true;
                        return Err(InspectorError::SessionClosed);
                    }
                    Ok(_) => {}
                    Err(e) => log_decode_error(&e),
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.timeout(id));
            }
            match self.transport.read(&mut buf, deadline - now) {
                Ok(0) => {
                    self.closed = true;
                    return Err(InspectorError::SessionClosed);
                }
                Ok(n) => self.assembler.feed(&buf[..n]),
                Err(e) if is_timeout(&e) => return Err(self.timeout(id)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(InspectorError::Transport(e)),
            }
        }
    }

    /// Send a close frame. The session is unusable afterwards.
    pub fn close(&mut self) {
        if !self.closed {
            self.transport.close();
            self.closed = true;
        }
    }

    /// Record `text` as the reply if it answers request `id`.
    fn accept(&mut self, id: u64, text: &str) -> Option<Value> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                log_decode_error(&ProtocolDecodeError::Json(e));
                return None;
            }
        };
        match value.get("id").and_then(Value::as_u64) {
            Some(reply_id) if reply_id == id => {
                debug!("inspector"; "<- reply ({})", id);
                self.last_reply_id = Some(id);
                self.last_reply = Some(value.clone());
                Some(value)
            }
            Some(other) => {
                debug!("inspector"; "ignoring reply {} while waiting for {}", other, id);
                None
            }
            None => {
                if let Some(method) = value.get("method").and_then(Value::as_str) {
                    debug!("inspector"; "<- event {}", method);
                }
                None
            }
        }
    }

    fn timeout(&self, id: u64) -> InspectorError {
        InspectorError::ReplyTimeout {
            id,
            timeout: self.reply_timeout,
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn log_decode_error(e: &ProtocolDecodeError) {
    crate::log!("inspector"; "discarding message: {}", e);
}
