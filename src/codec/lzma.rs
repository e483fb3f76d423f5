//! LZMA and LZMA2 decoders.

use std::io::{self, Read};

use crate::{Error, Result};

use super::{Decoder, method};

/// LZMA decoder.
///
/// 7z stores LZMA with 5 bytes of properties: the packed lc/lp/pb byte
/// followed by the little-endian dictionary size. There is no end marker;
/// the stream is bounded by the declared unpack size.
pub struct LzmaDecoder<R> {
    inner: lzma_rust2::LzmaReader<R>,
}

impl<R> std::fmt::Debug for LzmaDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LzmaDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> LzmaDecoder<R> {
    /// Creates a new LZMA decoder.
    pub fn new(input: R, properties: &[u8], unpack_size: u64) -> Result<Self> {
        if properties.len() < 5 {
            return Err(Error::malformed("LZMA properties shorter than 5 bytes"));
        }

        let props_byte = properties[0];
        let dict_size = u32::from_le_bytes(properties[1..5].try_into().unwrap());

        let reader =
            lzma_rust2::LzmaReader::new_with_props(input, unpack_size, props_byte, dict_size, None)
                .map_err(|e| Error::DecoderFailure {
                    method: "LZMA",
                    reason: e.to_string(),
                })?;

        Ok(Self { inner: reader })
    }
}

impl<R: Read + Send> Read for LzmaDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for LzmaDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::LZMA
    }
}

/// LZMA2 decoder.
///
/// LZMA2 carries a single property byte encoding the dictionary size;
/// chunk framing inside the stream carries everything else.
pub struct Lzma2Decoder<R> {
    inner: lzma_rust2::Lzma2Reader<R>,
}

impl<R> std::fmt::Debug for Lzma2Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lzma2Decoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> Lzma2Decoder<R> {
    /// Creates a new LZMA2 decoder.
    pub fn new(input: R, properties: &[u8]) -> Result<Self> {
        if properties.is_empty() {
            return Err(Error::malformed("LZMA2 properties missing"));
        }

        let dict_size = decode_dict_size(properties[0])?;
        Ok(Self {
            inner: lzma_rust2::Lzma2Reader::new(input, dict_size, None),
        })
    }
}

impl<R: Read + Send> Read for Lzma2Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for Lzma2Decoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::LZMA2
    }
}

/// Decodes the LZMA2 dictionary-size property byte.
///
/// Values 0-39 alternate between powers of two and 3x powers of two from
/// 4 KiB upward; 40 is the special 4 GiB - 1 encoding.
fn decode_dict_size(prop: u8) -> Result<u32> {
    if prop > 40 {
        return Err(Error::malformed(format!(
            "invalid LZMA2 dictionary size property: {}",
            prop
        )));
    }

    if prop == 40 {
        return Ok(0xFFFF_FFFF);
    }

    let base_log = (prop as u32) / 2 + 12;
    let dict_size = if prop % 2 == 0 {
        1u32 << base_log
    } else {
        3u32 << (base_log - 1)
    };

    Ok(dict_size)
}
