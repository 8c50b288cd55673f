//! Delimiter framing for the stream socket.
//!
//! The delimiter is the only message boundary on the wire. Inbound bytes are
//! buffered until a delimiter shows up, so a message split across reads is
//! reassembled and several messages in one read come out one by one.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Splits and joins frames on an arbitrary non-empty byte delimiter.
#[derive(Debug, Clone)]
pub struct DelimitedCodec {
    delimiter: Vec<u8>,
    max_frame_len: usize,
    /// Offset in the buffer already searched without finding a delimiter.
    next_index: usize,
    /// Dropping the rest of an oversized frame up to its delimiter.
    discarding: bool,
}

impl DelimitedCodec {
    /// Creates a codec for `delimiter`, used verbatim.
    ///
    /// The delimiter should be non-empty; [`crate::IpcConfig::validate`]
    /// rejects empty ones before a transport builds its codec. With an empty
    /// delimiter nothing is ever split, and the buffer only comes out whole
    /// at end of stream.
    pub fn new(delimiter: impl Into<Vec<u8>>, max_frame_len: usize) -> Self {
        Self {
            delimiter: delimiter.into(),
            max_frame_len: max_frame_len.max(1),
            next_index: 0,
            discarding: false,
        }
    }

    /// The framing delimiter.
    pub fn delimiter(&self) -> &[u8] { &self.delimiter }

    /// Largest frame handed to the caller.
    pub fn max_frame_len(&self) -> usize { self.max_frame_len }
}

/// Whether `delimiter` occurs anywhere in `bytes`.
pub fn contains_delimiter(bytes: &[u8], delimiter: &[u8]) -> bool {
    find(bytes, delimiter).is_some()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    if needle.len() == 1 {
        return haystack.iter().position(|b| *b == needle[0]);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

impl Decoder for DelimitedCodec {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<BytesMut>, io::Error> {
        loop {
            let start = self.next_index.min(buf.len());
            match find(&buf[start..], &self.delimiter) {
                Some(offset) => {
                    let frame = buf.split_to(start + offset);
                    buf.advance(self.delimiter.len());
                    self.next_index = 0;

                    if self.discarding {
                        self.discarding = false;
                        continue;
                    }
                    if frame.len() > self.max_frame_len {
                        tracing::warn!(
                            len = frame.len(),
                            max = self.max_frame_len,
                            "discarding oversized frame"
                        );
                        continue;
                    }
                    return Ok(Some(frame));
                }
                None => {
                    // A delimiter may straddle the end of the buffer.
                    let tail = self.delimiter.len().saturating_sub(1);
                    if buf.len() > self.max_frame_len + tail {
                        if !self.discarding {
                            tracing::warn!(
                                max = self.max_frame_len,
                                "frame exceeds maximum length, discarding until next delimiter"
                            );
                        }
                        let drop_len = buf.len() - tail;
                        buf.advance(drop_len);
                        self.discarding = true;
                        self.next_index = 0;
                    } else {
                        self.next_index = buf.len().saturating_sub(tail);
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<BytesMut>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        // An unterminated last message is still a message.
        self.next_index = 0;
        if buf.is_empty() || self.discarding {
            buf.clear();
            self.discarding = false;
            return Ok(None);
        }
        let frame = buf.split_to(buf.len());
        Ok(Some(frame))
    }
}

impl Encoder<Bytes> for DelimitedCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(item.len() + self.delimiter.len());
        dst.put(item);
        dst.put_slice(&self.delimiter);
        Ok(())
    }
}
