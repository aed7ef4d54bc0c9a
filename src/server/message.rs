//! Style server message protocol.
//!
//! Messages are JSON objects tagged by a numeric `type`:
//!
//! | type | direction       | shape                          |
//! |------|-----------------|--------------------------------|
//! | 0    | client → server | `{"type":0,"exe":"app.exe"}`   |
//! | 1    | server → client | `{"type":1,"css":"..."}`       |
//! | 3    | server → client | `{"type":3}` (on connect)      |

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Numeric message tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum MessageType {
    Hello = 0,
    StylesUpdate = 1,
    Connected = 3,
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Hello),
            1 => Ok(Self::StylesUpdate),
            3 => Ok(Self::Connected),
            other => Err(format!("unknown message type {other}")),
        }
    }
}

/// Message received from an injected client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Subscribe to the topic of this executable.
    Hello { exe: String },
}

impl ClientMessage {
    /// Parse a client message. `None` for anything unrecognised.
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let kind = value.get("type")?.as_u64()?;
        match MessageType::try_from(u8::try_from(kind).ok()?).ok()? {
            MessageType::Hello => {
                let exe = value.get("exe")?.as_str()?;
                Some(Self::Hello {
                    exe: exe.to_string(),
                })
            }
            _ => None,
        }
    }
}

/// Message sent to injected clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    StylesUpdate { css: String },
    Connected,
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        match self {
            Self::StylesUpdate { css } => {
                json!({ "type": MessageType::StylesUpdate, "css": css }).to_string()
            }
            Self::Connected => json!({ "type": MessageType::Connected }).to_string(),
        }
    }
}
