//! CRC-32 helpers shared by header parsing and stream verification.

use std::io::{self, Read};

use crc32fast::Hasher;

/// A reader adapter that accumulates a CRC-32 over everything read.
///
/// Used by the substream sequencer to verify each file's recorded
/// checksum once its stream is drained.
pub struct Crc32Reader<R> {
    inner: R,
    hasher: Hasher,
}

impl<R: Read> Crc32Reader<R> {
    /// Wraps a reader, starting with a fresh CRC state.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
        }
    }

    /// Returns the CRC-32 of all bytes read so far.
    pub fn crc(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Resets the CRC state without disturbing the reader position.
    pub fn reset(&mut self) {
        self.hasher = Hasher::new();
    }

    /// Consumes the adapter, returning the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Returns a mutable reference to the inner reader.
    ///
    /// Bytes read through this reference bypass CRC accumulation.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R: Read> Read for Crc32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
