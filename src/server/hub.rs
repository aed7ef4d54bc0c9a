//! Topic hub: connected clients and their subscriptions.
//!
//! A client subscribes by sending a hello naming its executable. The topic
//! is that executable name. Unknown executables are logged and ignored
//! without closing the connection.

use super::message::{ClientMessage, ServerMessage};
use crate::core::Context;
use crate::{debug, log};
use std::io;

/// Result of polling a connection for input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Text(String),
    Nothing,
    Closed,
}

/// One connected client, as the hub sees it.
pub trait Connection {
    fn send(&mut self, text: &str) -> io::Result<()>;

    /// Non-blocking read of the next message.
    fn try_recv(&mut self) -> Received;

    /// Push buffered output. Called once per loop tick.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self);
}

struct Client<C> {
    id: u64,
    conn: C,
    /// Executable this client subscribed to.
    topic: Option<String>,
}

pub struct Hub<C> {
    clients: Vec<Client<C>>,
    next_id: u64,
}

impl<C> Default for Hub<C> {
    fn default() -> Self {
        Self {
            clients: Vec::new(),
            next_id: 0,
        }
    }
}

impl<C: Connection> Hub<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and greet it. `None` if the greeting failed.
    pub fn add(&mut self, mut conn: C) -> Option<u64> {
        if let Err(e) = conn.send(&ServerMessage::Connected.to_json()) {
            log!("server"; "failed to greet client: {}", e);
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.clients.push(Client {
            id,
            conn,
            topic: None,
        });
        debug!("server"; "client {} connected (total: {})", id, self.clients.len());
        Some(id)
    }

    /// Read pending input from every client and drop closed ones.
    pub fn poll(&mut self, ctx: &Context) {
        let mut i = 0;
        while i < self.clients.len() {
            match self.clients[i].conn.try_recv() {
                Received::Text(text) => self.handle_text(i, &text, ctx),
                Received::Nothing => {
                    if self.clients[i].conn.flush().is_err() {
                        self.remove(i);
                        continue;
                    }
                    i += 1;
                }
                Received::Closed => self.remove(i),
            }
        }
    }

    fn handle_text(&mut self, index: usize, text: &str, ctx: &Context) {
        match ClientMessage::parse(text) {
            Some(ClientMessage::Hello { exe }) => self.hello(index, exe, ctx),
            None => debug!("server"; "ignoring message: {}", text),
        }
    }

    fn hello(&mut self, index: usize, exe: String, ctx: &Context) {
        let client = &mut self.clients[index];
        if client.topic.is_some() {
            return;
        }

        let config = ctx.snapshot();
        let app = match config.apps.by_exe(&exe) {
            Ok(app) => app,
            Err(e) => {
                log!("server"; "hello from client {}: {}", client.id, e);
                return;
            }
        };

        let css = ctx.styles.get_style(app);
        let update = ServerMessage::StylesUpdate { css }.to_json();
        match client.conn.send(&update) {
            Ok(()) => {
                log!("server"; "{} connected", exe);
                client.topic = Some(exe);
            }
            Err(e) => {
                debug!("server"; "client {} disconnected: {}", client.id, e);
                self.remove(index);
            }
        }
    }

    /// Send a style update to every subscriber of `topic`.
    ///
    /// Returns the number of clients that received it.
    pub fn publish(&mut self, topic: &str, css: &str) -> usize {
        let payload = ServerMessage::StylesUpdate {
            css: css.to_string(),
        }
        .to_json();
        let mut sent = 0;

        self.clients.retain_mut(|client| {
            if client.topic.as_deref() != Some(topic) {
                return true;
            }
            match client.conn.send(&payload) {
                Ok(()) => {
                    sent += 1;
                    true
                }
                Err(e) => {
                    debug!("server"; "client {} disconnected: {}", client.id, e);
                    false
                }
            }
        });

        debug!("server"; "published {} to {} subscriber(s)", topic, sent);
        sent
    }

    pub fn subscribers(&self, topic: &str) -> usize {
        self.clients
            .iter()
            .filter(|client| client.topic.as_deref() == Some(topic))
            .count()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn close_all(&mut self) {
        for mut client in self.clients.drain(..) {
            client.conn.close();
        }
    }

    fn remove(&mut self, index: usize) {
        let client = self.clients.remove(index);
        debug!("server"; "client {} left (total: {})", client.id, self.clients.len());
    }
}
