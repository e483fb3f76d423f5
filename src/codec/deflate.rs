//! Raw deflate decoder.

use std::io::{self, BufReader, Read};

use flate2::bufread::DeflateDecoder as FlateDecoder;

use super::{Decoder, method};

/// Deflate decoder.
///
/// 7z stores deflate streams raw, without zlib or gzip framing.
pub struct DeflateDecoder<R> {
    inner: FlateDecoder<BufReader<R>>,
}

impl<R> std::fmt::Debug for DeflateDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeflateDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> DeflateDecoder<R> {
    /// Creates a new deflate decoder.
    pub fn new(input: R) -> Self {
        Self {
            inner: FlateDecoder::new(BufReader::new(input)),
        }
    }
}

impl<R: Read + Send> Read for DeflateDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for DeflateDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::DEFLATE
    }
}
