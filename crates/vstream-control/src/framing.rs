//! Incremental message framing.
//!
//! QUIC streams do not preserve write boundaries, so a read may deliver a
//! partial message or several messages at once. Compact JSON is
//! self-delimiting; the reader buffers incoming bytes and yields every
//! complete value, keeping the unfinished tail for the next read.
//!
//! A message that is complete but does not deserialize (for example an
//! unknown `command` tag) is skipped and reported in place, so one bad
//! message never wedges the stream or hides its neighbours.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::error::{ControlError, Result};

/// Upper bound on a single buffered message.
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

pub struct MessageReader<T> {
    buffer: Vec<u8>,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> MessageReader<T> {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Append stream bytes and return every message completed by them, in
    /// arrival order. Each entry is either a parsed message or the error
    /// for one undecodable message that was skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<T>> {
        self.buffer.extend_from_slice(bytes);

        let mut out = Vec::new();
        let mut consumed = 0;
        loop {
            let remaining = &self.buffer[consumed..];
            if remaining.is_empty() {
                break;
            }
            let mut stream = serde_json::Deserializer::from_slice(remaining).into_iter::<T>();
            match stream.next() {
                Some(Ok(message)) => {
                    consumed += stream.byte_offset();
                    out.push(Ok(message));
                }
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(e)) => {
                    // Valid JSON that is not a known message can be framed
                    // and skipped; anything else leaves no way to resync.
                    let mut probe = serde_json::Deserializer::from_slice(remaining)
                        .into_iter::<serde_json::Value>();
                    match probe.next() {
                        Some(Ok(_)) => {
                            consumed += probe.byte_offset();
                            out.push(Err(ControlError::Malformed(e)));
                        }
                        Some(Err(pe)) if pe.is_eof() => break,
                        _ => {
                            self.buffer.clear();
                            out.push(Err(ControlError::Malformed(e)));
                            return out;
                        }
                    }
                }
                None => break,
            }
        }
        self.buffer.drain(..consumed);

        if self.buffer.len() > MAX_MESSAGE_SIZE {
            self.buffer.clear();
            out.push(Err(ControlError::MessageTooLarge {
                limit: MAX_MESSAGE_SIZE,
            }));
        }
        out
    }
}

impl<T: DeserializeOwned> Default for MessageReader<T> {
    fn default() -> Self {
        Self::new()
    }
}
