//! Zstandard decoder.

use std::io::{self, BufReader, Read};

use zstd::stream::Decoder as ZstdStreamDecoder;

use crate::{Error, Result};

use super::{Decoder, method};

/// Zstandard decoder.
pub struct ZstdDecoder<R> {
    inner: ZstdStreamDecoder<'static, BufReader<R>>,
}

impl<R> std::fmt::Debug for ZstdDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZstdDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> ZstdDecoder<R> {
    /// Creates a new Zstandard decoder.
    pub fn new(input: R) -> Result<Self> {
        let inner = ZstdStreamDecoder::new(input).map_err(|e| Error::DecoderFailure {
            method: "Zstandard",
            reason: e.to_string(),
        })?;
        Ok(Self { inner })
    }
}

impl<R: Read + Send> Read for ZstdDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for ZstdDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::ZSTD
    }
}
