//! Newline-delimited message framing over a TCP byte stream.
//!
//! Every message is one UTF-8 line terminated by `\n`: a compact JSON object
//! (client → server), a compact JSON array (server → client) or the plain-text
//! rejection notice. Compact JSON never contains a raw newline, so a line is
//! always exactly one message no matter how the stream splits or merges reads.
//!
//! `MAX_FRAME_LEN` bounds the memory a single peer can make us buffer. An
//! oversized line is still consumed up to its terminator so the stream stays
//! in sync and the next frame can be read normally.

use crate::{ScoreUpdate, Snapshot, REJECTION_MESSAGE};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Largest accepted frame, excluding the line terminator.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("message is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("frame too long: {len} bytes (max {max})")]
    FrameTooLong { len: usize, max: usize },
}

impl ProtocolError {
    /// Only transport failures end a connection; everything else drops one
    /// message and the stream can keep going.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::Io(_))
    }
}

/// Serializes `message` as compact JSON followed by `\n`.
pub fn encode_frame<T: Serialize + ?Sized>(message: &T) -> Result<String, ProtocolError> {
    let mut frame = serde_json::to_string(message).map_err(ProtocolError::Encode)?;
    frame.push('\n');
    Ok(frame)
}

/// The rejection notice as it goes on the wire.
pub fn rejection_frame() -> String {
    format!("{}\n", REJECTION_MESSAGE)
}

/// Reads the next non-blank line from `reader`.
///
/// Returns `Ok(None)` once the stream is closed. A final line without a
/// terminator is still returned when the peer closes right after writing it.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<String>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = Vec::new();
        let mut total_len = 0usize;
        let mut last_byte = None;
        let mut saw_bytes = false;

        loop {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            saw_bytes = true;

            let newline = available.iter().position(|&b| b == b'\n');
            let chunk = &available[..newline.unwrap_or(available.len())];

            let room = MAX_FRAME_LEN.saturating_sub(line.len());
            line.extend_from_slice(&chunk[..chunk.len().min(room)]);
            total_len += chunk.len();
            if let Some(&b) = chunk.last() {
                last_byte = Some(b);
            }

            let used = newline.map_or(available.len(), |i| i + 1);
            reader.consume(used);

            if newline.is_some() {
                break;
            }
        }

        if !saw_bytes {
            return Ok(None);
        }

        // The `\r` of a CRLF ending is judged on the full line, not on the
        // capped prefix kept in `line`.
        if last_byte == Some(b'\r') {
            total_len -= 1;
            line.truncate(total_len);
        }

        if total_len > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLong {
                len: total_len,
                max: MAX_FRAME_LEN,
            });
        }

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        return Ok(Some(String::from_utf8(line)?));
    }
}

/// Parses a client → server score update
///
/// Malformed JSON, a missing `pumps` or a pump count that is negative or
/// fractional all yield `ProtocolError::Decode`, which the relay treats as a
/// dropped message rather than a broken connection.
pub fn decode_update(frame: &str) -> Result<ScoreUpdate, ProtocolError> {
    serde_json::from_str(frame).map_err(ProtocolError::Decode)
}

/// Parses a server → client leaderboard push
///
/// The rejection notice is not JSON and fails here; check it with
/// [`is_rejection`] first.
pub fn decode_snapshot(frame: &str) -> Result<Snapshot, ProtocolError> {
    serde_json::from_str(frame).map_err(ProtocolError::Decode)
}

/// True if `frame` is the notice a full relay sends before closing
pub fn is_rejection(frame: &str) -> bool {
    frame.trim() == REJECTION_MESSAGE
}
