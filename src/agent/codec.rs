//! NDJSON codec for agent stdout streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a fixed maximum line length
//! so an unterminated or runaway line from a misbehaving agent cannot force
//! unbounded buffering. Used as the codec parameter for
//! [`tokio_util::codec::FramedRead`] over each session's stdout pipe.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum accepted event line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Line-framing decoder for agent event streams.
///
/// Each newline-terminated UTF-8 string is one candidate event. Lines over
/// [`MAX_LINE_BYTES`] yield [`AppError::Decode`] with `"line too long"`;
/// underlying I/O failures map to [`AppError::Io`].
#[derive(Debug)]
pub struct EventCodec(LinesCodec);

impl EventCodec {
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for EventCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EventCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Decode(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
