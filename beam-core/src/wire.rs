//! Framing: length-prefix (4 bytes LE) + bincode payload.

use crate::protocol::Payload;

/// Size of the length prefix in bytes.
pub const LEN_SIZE: usize = 4;
/// Upper bound on a single frame. Frames carry whole files, so this is
/// generous; anything larger is refused on both ends.
pub const MAX_FRAME_LEN: u32 = 256 * 1024 * 1024; // 256 MiB

/// Encode a payload into a single frame: 4 bytes LE length + bincode body.
pub fn encode_frame(payload: &Payload) -> Result<Vec<u8>, FrameEncodeError> {
    let body = bincode::serialize(payload).map_err(FrameEncodeError::Encode)?;
    let len = body.len() as u32;
    if len > MAX_FRAME_LEN {
        return Err(FrameEncodeError::TooLarge);
    }
    let mut out = Vec::with_capacity(LEN_SIZE + body.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Error encoding a payload into a frame (bincode or size limit).
#[derive(Debug, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("frame too large")]
    TooLarge,
}

/// Decode one frame from the front of `bytes`. Returns the payload and the
/// number of bytes consumed. Call with a partial buffer; `NeedMore` means
/// the caller should retry after reading more data.
pub fn decode_frame(bytes: &[u8]) -> Result<(Payload, usize), FrameDecodeError> {
    if bytes.len() < LEN_SIZE {
        return Err(FrameDecodeError::NeedMore);
    }
    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if len > MAX_FRAME_LEN as usize {
        return Err(FrameDecodeError::TooLarge);
    }
    if bytes.len() < LEN_SIZE + len {
        return Err(FrameDecodeError::NeedMore);
    }
    let payload: Payload =
        bincode::deserialize(&bytes[LEN_SIZE..LEN_SIZE + len]).map_err(FrameDecodeError::Decode)?;
    Ok((payload, LEN_SIZE + len))
}

/// Error decoding a frame (need more bytes, too large, or bincode failure).
#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("need more bytes")]
    NeedMore,
    #[error("frame too large")]
    TooLarge,
    #[error("decode error: {0}")]
    Decode(#[from] bincode::Error),
}
