//! Wire protocol for the resource server.
//!
//! Length-delimited frames over TCP. Each frame is:
//!
//! ```text
//! [payload length: u32 LE][message id: u32 LE][payload: JSON]
//! ```
//!
//! # Message Types
//!
//! | ID | Direction | Payload |
//! |---|---|---|
//! | `RequestResource` | client → server | [`ResourceRequest`] |
//! | `ResourceRequestComplete` | server → client (unicast) | [`ResourceResponse`] |
//! | `ResourceUpdated` | server → all clients (broadcast) | [`ResourceResponse`] |

mod server;

pub use server::{InboundRequest, NetServer};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Maximum accepted frame payload size.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Frame header size: payload length + message id.
pub const HEADER_LEN: usize = 8;

// ============================================================================
// Message IDs
// ============================================================================

/// Numeric message identifier carried in every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageId {
    /// Client asks for the compiled form of a resource.
    RequestResource = 1,
    /// Per-client answer to `RequestResource`.
    ResourceRequestComplete = 2,
    /// Broadcast: a resource was recompiled, clients may hot-reload it.
    ResourceUpdated = 3,
}

impl MessageId {
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::RequestResource),
            2 => Some(Self::ResourceRequestComplete),
            3 => Some(Self::ResourceUpdated),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// `RequestResource` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Virtual resource path (e.g. `data://characters/hero.anim`).
    pub path: String,
}

/// `ResourceRequestComplete` / `ResourceUpdated` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceResponse {
    /// The resource the request was for.
    pub resource_id: String,

    /// Path of the compiled artifact; absent when compilation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

// ============================================================================
// Frame codec
// ============================================================================

/// Encode one frame.
pub fn encode_frame(id: MessageId, payload: &impl Serialize) -> Vec<u8> {
    let body = serde_json::to_vec(payload).unwrap_or_else(|_| b"{}".to_vec());

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&id.as_u32().to_le_bytes());
    frame.extend_from_slice(&body);
    frame
}

/// Incremental frame decoder over a byte stream.
#[derive(Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes read from the stream.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, if one is buffered.
    ///
    /// Errors on oversized frames; the connection should be dropped then.
    pub fn next_frame(&mut self) -> Result<Option<(u32, Vec<u8>)>> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut word = [0u8; 4];
        word.copy_from_slice(&self.buf[0..4]);
        let len = u32::from_le_bytes(word) as usize;
        if len > MAX_FRAME_LEN {
            bail!("frame length {len} exceeds maximum {MAX_FRAME_LEN}");
        }
        if self.buf.len() < HEADER_LEN + len {
            return Ok(None);
        }

        word.copy_from_slice(&self.buf[4..8]);
        let id = u32::from_le_bytes(word);
        let payload = self.buf[HEADER_LEN..HEADER_LEN + len].to_vec();
        self.buf.drain(..HEADER_LEN + len);

        Ok(Some((id, payload)))
    }
}

// ============================================================================
// Tests
// ============================================================================
