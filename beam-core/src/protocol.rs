//! Data-channel payloads exchanged between peers.

use serde::{Deserialize, Serialize};

/// Current payload format version. Checked at the transport handshake.
pub const PROTOCOL_VERSION: u8 = 1;

/// Everything a data channel carries. Encoding is bincode; framing is
/// length-prefix (see wire module).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    /// A complete file: raw bytes plus the name and mime type the
    /// receiver needs to persist it.
    File {
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

impl Payload {
    /// The file name carried by this payload.
    pub fn file_name(&self) -> &str {
        match self {
            Payload::File { file_name, .. } => file_name,
        }
    }
}
