//! Incoming websocket frame reassembly.
//!
//! Bytes arrive in arbitrary chunks. [`FrameAssembler`] buffers them and
//! walks each frame through a small state machine:
//!
//! ```text
//! AwaitingHeader ──header──▶ Accumulating { offset, remaining }
//!    ▲    │                         │ remaining == 0
//!    │    └──rejected──▶ Discarding { remaining }
//!    └────── message ◀── Complete
//! ```
//!
//! Fragmented messages (`Text`/`Binary` followed by `Continue` frames) are
//! joined before being yielded. A header that parses but is rejected
//! (oversized, reserved bits or opcode, bad control frame) is reported once
//! and its payload skipped. A header that cannot be parsed at all leaves no
//! way to find the next frame, so the assembler starts over from an empty
//! buffer.

use super::ProtocolDecodeError;
use std::io::Cursor;
use std::mem;
use tungstenite::protocol::frame::FrameHeader;
use tungstenite::protocol::frame::coding::{Control, Data, OpCode};

/// Largest single message accepted from a target.
pub const MAX_MESSAGE_SIZE: usize = 16 << 20;

/// Reassembly progress for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    AwaitingHeader,
    /// `offset` payload bytes received, `remaining` still expected.
    Accumulating { offset: usize, remaining: usize },
    /// Skipping the payload of a rejected frame.
    Discarding { remaining: usize },
    Complete,
}

/// A complete message decoded from one or more frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong,
    Close,
}

#[derive(Debug)]
pub struct FrameAssembler {
    state: FrameState,
    /// Raw bytes not yet consumed.
    input: Vec<u8>,
    header: Option<FrameHeader>,
    /// Payload of the frame being accumulated.
    payload: Vec<u8>,
    /// Fragments of a message split across frames.
    fragments: Option<(Data, Vec<u8>)>,
    max_size: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

impl FrameAssembler {
    pub fn new(max_size: usize) -> Self {
        Self {
            state: FrameState::AwaitingHeader,
            input: Vec::new(),
            header: None,
            payload: Vec::new(),
            fragments: None,
            max_size,
        }
    }

    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Append raw bytes read from the transport.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend_from_slice(bytes);
    }

    /// Next complete message, if the buffered bytes contain one.
    ///
    /// `None` means more input is needed.
    pub fn next_message(&mut self) -> Option<Result<Incoming, ProtocolDecodeError>> {
        loop {
            match self.state {
                FrameState::AwaitingHeader => {
                    if let Err(e) = self.read_header()? {
                        return Some(Err(e));
                    }
                }
                FrameState::Discarding { remaining } => {
                    if remaining == 0 {
                        self.state = FrameState::AwaitingHeader;
                        continue;
                    }
                    if self.input.is_empty() {
                        return None;
                    }
                    let take = remaining.min(self.input.len());
                    self.input.drain(..take);
                    self.state = FrameState::Discarding {
                        remaining: remaining - take,
                    };
                }
                FrameState::Accumulating { offset, remaining } => {
                    if remaining == 0 {
                        self.state = FrameState::Complete;
                        continue;
                    }
                    if self.input.is_empty() {
                        return None;
                    }
                    let take = remaining.min(self.input.len());
                    self.payload.extend(self.input.drain(..take));
                    self.state = FrameState::Accumulating {
                        offset: offset + take,
                        remaining: remaining - take,
                    };
                }
                FrameState::Complete => {
                    self.state = FrameState::AwaitingHeader;
                    let Some(header) = self.header.take() else {
                        continue;
                    };
                    let mut payload = mem::take(&mut self.payload);
                    if let Some(mask) = header.mask {
                        apply_mask(&mut payload, mask);
                    }
                    if let Some(message) = self.finish_frame(&header, payload) {
                        return Some(message);
                    }
                }
            }
        }
    }

    /// Parse a header from the input buffer.
    ///
    /// Outer `None`: not enough bytes yet. Inner `Err`: invalid header.
    fn read_header(&mut self) -> Option<Result<(), ProtocolDecodeError>> {
        let mut cursor = Cursor::new(self.input.as_slice());
        let parsed = FrameHeader::parse(&mut cursor);
        let consumed = cursor.position() as usize;

        let (header, len) = match parsed {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return None,
            Err(e) => {
                self.reset();
                return Some(Err(ProtocolDecodeError::Header(e.to_string())));
            }
        };
        self.input.drain(..consumed);

        if let Err(e) = self.validate(&header, len) {
            self.fragments = None;
            self.state = FrameState::Discarding {
                remaining: usize::try_from(len).unwrap_or(usize::MAX),
            };
            return Some(Err(e));
        }

        self.payload = Vec::with_capacity(len as usize);
        self.header = Some(header);
        self.state = FrameState::Accumulating {
            offset: 0,
            remaining: len as usize,
        };
        Some(Ok(()))
    }

    fn validate(&self, header: &FrameHeader, len: u64) -> Result<(), ProtocolDecodeError> {
        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(ProtocolDecodeError::Header("reserved bits set".into()));
        }
        match header.opcode {
            OpCode::Data(Data::Reserved(op)) | OpCode::Control(Control::Reserved(op)) => {
                return Err(ProtocolDecodeError::Header(format!("reserved opcode {op}")));
            }
            OpCode::Control(_) if !header.is_final || len > 125 => {
                return Err(ProtocolDecodeError::Header(
                    "fragmented or oversized control frame".into(),
                ));
            }
            _ => {}
        }
        let buffered = self.fragments.as_ref().map_or(0, |(_, data)| data.len() as u64);
        if len.saturating_add(buffered) > self.max_size as u64 {
            return Err(ProtocolDecodeError::TooLarge {
                len: len.saturating_add(buffered),
                max: self.max_size,
            });
        }
        Ok(())
    }

    /// Turn a complete frame into a message, joining fragments.
    ///
    /// `None` when the frame is a non-final fragment.
    fn finish_frame(
        &mut self,
        header: &FrameHeader,
        payload: Vec<u8>,
    ) -> Option<Result<Incoming, ProtocolDecodeError>> {
        match header.opcode {
            OpCode::Control(Control::Close) => Some(Ok(Incoming::Close)),
            OpCode::Control(Control::Ping) => Some(Ok(Incoming::Ping(payload))),
            OpCode::Control(_) => Some(Ok(Incoming::Pong)),
            OpCode::Data(Data::Continue) => {
                let Some((kind, mut data)) = self.fragments.take() else {
                    return Some(Err(ProtocolDecodeError::UnexpectedContinuation));
                };
                data.extend_from_slice(&payload);
                if header.is_final {
                    Some(decode(kind, data))
                } else {
                    self.fragments = Some((kind, data));
                    None
                }
            }
            OpCode::Data(kind) => {
                // A new data frame abandons any unfinished fragmented message.
                self.fragments = None;
                if header.is_final {
                    Some(decode(kind, payload))
                } else {
                    self.fragments = Some((kind, payload));
                    None
                }
            }
        }
    }

    fn reset(&mut self) {
        self.state = FrameState::AwaitingHeader;
        self.input.clear();
        self.header = None;
        self.payload.clear();
        self.fragments = None;
    }
}

fn decode(kind: Data, data: Vec<u8>) -> Result<Incoming, ProtocolDecodeError> {
    match kind {
        Data::Text => Ok(Incoming::Text(String::from_utf8(data)?)),
        _ => Ok(Incoming::Binary(data)),
    }
}

fn apply_mask(buf: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}
