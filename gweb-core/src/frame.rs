//! gRPC-Web frame codec and the streaming deframer.
//!
//! A gRPC-Web body is a sequence of length-prefixed frames:
//!
//! ```text
//! [frame type: 1][length: 4, big-endian][payload]
//! ```
//!
//! Frame type `0x00` carries a serialized message, `0x80` carries trailer
//! text. A unary response body is one DATA frame followed by one TRAILER
//! frame; a TRAILER may also arrive first when the server produced no
//! message.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

use crate::error::TransportError;
use crate::status::StatusCode;
use crate::BoxError;

/// Frame type byte of a DATA frame.
pub const FRAME_TYPE_DATA: u8 = 0x00;
/// Frame type byte of a TRAILER frame.
pub const FRAME_TYPE_TRAILER: u8 = 0x80;
/// Frame type byte plus the four big-endian length bytes.
pub const FRAME_HEADER_LEN: usize = 5;

/// One deframed gRPC-Web frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A serialized message payload.
    Data(Bytes),
    /// Trailer text (CRLF-separated `name: value` lines).
    Trailer(Bytes),
}

/// Encode one outgoing DATA frame.
pub fn encode_data_frame(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u8(FRAME_TYPE_DATA);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Reads frames out of an incremental byte stream.
///
/// Chunk boundaries are arbitrary; partial reads accumulate in an internal
/// buffer until a full frame is available. Only one read on the underlying
/// stream is ever in flight.
pub struct FrameReader<S> {
    stream: S,
    buf: BytesMut,
}

impl<S> FrameReader<S>
where
    S: Stream<Item = Result<Bytes, BoxError>> + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::new(),
        }
    }

    /// Read the next frame.
    ///
    /// A DATA frame is returned as soon as its declared payload is buffered;
    /// a TRAILER frame is returned once the stream ends (the declared
    /// trailer length is not enforced). The stream ending anywhere else is a
    /// [`StatusCode::DataLoss`] error.
    pub async fn next_frame(&mut self) -> Result<Frame, TransportError> {
        loop {
            match self.buf.first() {
                Some(&FRAME_TYPE_DATA) => return self.read_data().await,
                Some(&FRAME_TYPE_TRAILER) => return self.read_trailer().await,
                // Empty accumulator (or a zero-length chunk): the frame type
                // is not known yet, keep reading.
                _ => {
                    if !self.fill().await? {
                        return Err(premature_eof());
                    }
                }
            }
        }
    }

    /// Pull one chunk into the accumulator. `false` once the stream is
    /// exhausted.
    async fn fill(&mut self) -> Result<bool, TransportError> {
        match self.stream.next().await {
            Some(Ok(chunk)) => {
                self.buf.extend_from_slice(&chunk);
                Ok(true)
            }
            Some(Err(source)) => Err(TransportError::new(
                StatusCode::Unknown,
                format!("response body read failed: {source}"),
            )),
            None => Ok(false),
        }
    }

    async fn read_data(&mut self) -> Result<Frame, TransportError> {
        while self.buf.len() < FRAME_HEADER_LEN {
            if !self.fill().await? {
                return Err(premature_eof());
            }
        }
        let len = u32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]) as usize;
        while self.buf.len() < FRAME_HEADER_LEN + len {
            if !self.fill().await? {
                return Err(premature_eof());
            }
        }
        self.buf.advance(FRAME_HEADER_LEN);
        Ok(Frame::Data(self.buf.split_to(len).freeze()))
    }

    async fn read_trailer(&mut self) -> Result<Frame, TransportError> {
        while self.fill().await? {}
        // The declared length is ignored: the payload is everything after
        // the frame header until stream end.
        self.buf.advance(FRAME_HEADER_LEN.min(self.buf.len()));
        Ok(Frame::Trailer(self.buf.split().freeze()))
    }
}

fn premature_eof() -> TransportError {
    TransportError::new(StatusCode::DataLoss, "premature end of response body")
}
