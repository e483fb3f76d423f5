//! The Copy coder.
//!
//! Stored data is not transformed, but the coder still declares an
//! output size and the packed stream may run longer than it: an
//! AES-encrypted stored folder, for example, keeps its CBC padding in
//! the packed bytes. Decoding Copy therefore means clipping the input
//! to the declared size, which [`std::io::Take`] already does.

use std::io::{self, Read, Take};

use super::{Decoder, method};

/// Decoder for stored (Copy) streams: identity, clipped to the
/// declared output size.
pub struct StoredDecoder<R> {
    inner: Take<R>,
}

impl<R: Read + Send> StoredDecoder<R> {
    /// Creates a decoder producing at most `size` bytes of `inner`.
    ///
    /// A source that ends early simply yields a short stream; whether
    /// that is an error is the caller's call (the substream sequencer
    /// treats it as a truncated folder).
    pub fn new(inner: R, size: u64) -> Self {
        Self {
            inner: inner.take(size),
        }
    }
}

impl<R: Read + Send> Read for StoredDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for StoredDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::COPY
    }
}
