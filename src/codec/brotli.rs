//! Brotli decoder.

use std::io::{self, Read};

use brotli::Decompressor;

use super::{Decoder, method};

/// Internal buffer size for the brotli decompressor.
const BUFFER_SIZE: usize = 4096;

/// Brotli decoder.
pub struct BrotliDecoder<R: Read> {
    inner: Decompressor<R>,
}

impl<R: Read> std::fmt::Debug for BrotliDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrotliDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> BrotliDecoder<R> {
    /// Creates a new Brotli decoder.
    pub fn new(input: R) -> Self {
        Self {
            inner: Decompressor::new(input, BUFFER_SIZE),
        }
    }
}

impl<R: Read + Send> Read for BrotliDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for BrotliDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::BROTLI
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_brotli_roundtrip() {
        let original = b"brotli brotli brotli brotli brotli";

        let mut compressed = Vec::new();
        {
            let mut encoder =
                brotli::CompressorWriter::new(&mut compressed, BUFFER_SIZE, 5, 22);
            encoder.write_all(original).unwrap();
        }

        let mut decoder = BrotliDecoder::new(Cursor::new(compressed));
        let mut output = Vec::new();
        decoder.read_to_end(&mut output).unwrap();

        assert_eq!(output, original);
    }

    #[test]
    fn test_method_id() {
        let decoder = BrotliDecoder::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(decoder.method_id(), method::BROTLI);
    }
}
