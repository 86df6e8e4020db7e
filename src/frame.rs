//! Delimited frame codec.
//!
//! A frame is one marshalled value followed by [`FRAME_DELIMITER`]. The
//! marshaller must never emit the delimiter inside a payload; JSON satisfies
//! this because it escapes newlines inside strings and `serde_json` writes
//! compact output.
//!
//! Reading is bounded: a frame longer than the configured limit is consumed
//! through its delimiter and reported as [`FrameError::OversizedFrame`], so
//! the stream stays aligned on frame boundaries.
//!
//! # Edge Cases Handled
//!
//! - End-of-stream between frames → [`FrameError::Closed`].
//! - End-of-stream inside a frame → [`FrameError::IncompleteFrame`].
//! - Empty frames (a bare delimiter) go to the marshaller like any other
//!   payload; with JSON they are [`FrameError::MalformedFrame`].
//! - Undecodable payload → [`FrameError::MalformedFrame`] carrying the raw bytes.

use std::fmt;
use std::io::BufRead;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::DEFAULT_MAX_FRAME_SIZE;
use crate::error::{FrameError, MarshalError};

/// Byte terminating every frame.
pub const FRAME_DELIMITER: u8 = b'\n';

// ============================================================================
// Marshallers
// ============================================================================

/// Converts values to and from payload bytes.
pub trait Marshaller: Send + Sync + 'static {
    /// Encodes `value`.
    ///
    /// # Errors
    ///
    /// Returns a [`MarshalError`] if the value cannot be represented.
    fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, MarshalError>;

    /// Decodes a value from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns a [`MarshalError`] if `bytes` is not a valid encoding.
    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, MarshalError>;
}

/// Compact single-line JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaller;

impl Marshaller for JsonMarshaller {
    fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, MarshalError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, MarshalError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Encodes and decodes frames carrying values of type `T`.
pub struct FrameCodec<T, M = JsonMarshaller> {
    marshaller: M,
    max_frame_len: usize,
    _item: PhantomData<fn() -> T>,
}

impl<T, M: Marshaller> FrameCodec<T, M> {
    /// Creates a codec using `marshaller` and the default frame size limit.
    #[must_use]
    pub const fn new(marshaller: M) -> Self {
        Self {
            marshaller,
            max_frame_len: DEFAULT_MAX_FRAME_SIZE,
            _item: PhantomData,
        }
    }

    /// Sets the largest payload accepted by the readers, in bytes.
    #[must_use]
    pub const fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Largest payload accepted by the readers, in bytes.
    #[must_use]
    pub const fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl<T: Serialize, M: Marshaller> FrameCodec<T, M> {
    /// Marshals `item` and appends the delimiter.
    ///
    /// # Errors
    ///
    /// [`FrameError::Marshal`] if marshalling fails, or
    /// [`FrameError::DelimiterInPayload`] if the marshaller broke the framing
    /// contract.
    pub fn encode(&self, item: &T) -> Result<Vec<u8>, FrameError> {
        let mut frame = self.marshaller.marshal(item)?;
        if frame.contains(&FRAME_DELIMITER) {
            return Err(FrameError::DelimiterInPayload);
        }
        frame.push(FRAME_DELIMITER);
        Ok(frame)
    }
}

impl<T: DeserializeOwned, M: Marshaller> FrameCodec<T, M> {
    /// Unmarshals one payload (without its delimiter).
    ///
    /// # Errors
    ///
    /// [`FrameError::MalformedFrame`] with the raw payload attached.
    pub fn decode(&self, payload: &[u8]) -> Result<T, FrameError> {
        self.marshaller
            .unmarshal(payload)
            .map_err(|e| FrameError::MalformedFrame {
                raw: payload.to_vec(),
                reason: e.message,
            })
    }

    /// Reads and decodes the next frame from a blocking reader.
    ///
    /// # Errors
    ///
    /// See the module docs for the end-of-stream and oversize cases;
    /// decoding failures are [`FrameError::MalformedFrame`].
    pub fn read_frame<R: BufRead + ?Sized>(&self, reader: &mut R) -> Result<T, FrameError> {
        let mut scanner = FrameScanner::new(self.max_frame_len);
        loop {
            let available = match reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if available.is_empty() {
                return Err(scanner.end_of_stream());
            }
            let (consumed, complete) = scanner.feed(available);
            reader.consume(consumed);
            if complete {
                break;
            }
        }
        self.decode(&scanner.finish()?)
    }

    /// Reads and decodes the next frame from an async reader.
    ///
    /// Same outcomes as [`read_frame`](Self::read_frame).
    ///
    /// # Errors
    ///
    /// See [`read_frame`](Self::read_frame).
    pub async fn read_frame_async<R>(&self, reader: &mut R) -> Result<T, FrameError>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        let mut scanner = FrameScanner::new(self.max_frame_len);
        loop {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Err(scanner.end_of_stream());
            }
            let (consumed, complete) = scanner.feed(available);
            reader.consume(consumed);
            if complete {
                break;
            }
        }
        self.decode(&scanner.finish()?)
    }
}

impl<T, M: Marshaller + Default> Default for FrameCodec<T, M> {
    fn default() -> Self {
        Self::new(M::default())
    }
}

impl<T, M: Clone> Clone for FrameCodec<T, M> {
    fn clone(&self) -> Self {
        Self {
            marshaller: self.marshaller.clone(),
            max_frame_len: self.max_frame_len,
            _item: PhantomData,
        }
    }
}

impl<T, M> fmt::Debug for FrameCodec<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCodec")
            .field("item", &std::any::type_name::<T>())
            .field("max_frame_len", &self.max_frame_len)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Scanner
// ============================================================================

/// Accumulates one frame from successive buffer fills.
///
/// Bytes past the limit are consumed but not kept.
struct FrameScanner {
    buf: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

impl FrameScanner {
    const fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            overflowed: false,
        }
    }

    /// Takes bytes up to and including the next delimiter.
    ///
    /// Returns how many bytes of `available` were used and whether the
    /// delimiter was reached.
    fn feed(&mut self, available: &[u8]) -> (usize, bool) {
        match available.iter().position(|&b| b == FRAME_DELIMITER) {
            Some(pos) => {
                self.keep(&available[..pos]);
                (pos + 1, true)
            }
            None => {
                self.keep(available);
                (available.len(), false)
            }
        }
    }

    fn keep(&mut self, bytes: &[u8]) {
        let room = self.limit.saturating_sub(self.buf.len());
        if bytes.len() > room {
            self.overflowed = true;
        }
        self.buf.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    /// Payload of a delimited frame, possibly empty.
    fn finish(self) -> Result<Vec<u8>, FrameError> {
        if self.overflowed {
            return Err(FrameError::OversizedFrame { limit: self.limit });
        }
        Ok(self.buf)
    }

    fn end_of_stream(self) -> FrameError {
        if self.buf.is_empty() && !self.overflowed {
            FrameError::Closed
        } else {
            FrameError::IncompleteFrame { partial: self.buf }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
