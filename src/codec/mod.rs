//! Decoder registry for 7z coders.
//!
//! A coder id is a short byte sequence; [`build_decoder`] maps it to a
//! concrete decoder given the coder's properties, its input streams and an
//! optional password. The registry is a closed set: unknown ids surface as
//! [`Error::UnsupportedMethod`].
//!
//! Folders compose coders into a small dataflow graph; see [`graph`] for
//! the assembler that instantiates a whole folder.

pub mod graph;

mod copy;

#[cfg(feature = "lzma")]
mod lzma;

#[cfg(feature = "lzma")]
mod filters;

pub mod bcj2;

#[cfg(feature = "deflate")]
mod deflate;

#[cfg(feature = "bzip2")]
mod bzip2;

#[cfg(feature = "lz4")]
mod lz4;

#[cfg(feature = "zstd")]
mod zstd;

#[cfg(feature = "brotli")]
mod brotli;

use std::io::Read;

use crate::format::streams::Coder;
use crate::{Error, Result};

use crate::password::Password;

pub use bcj2::Bcj2Decoder;
pub use copy::StoredDecoder;

#[cfg(feature = "brotli")]
pub use self::brotli::BrotliDecoder;
#[cfg(feature = "bzip2")]
pub use self::bzip2::Bzip2Decoder;
#[cfg(feature = "zstd")]
pub use self::zstd::ZstdDecoder;
#[cfg(feature = "deflate")]
pub use deflate::DeflateDecoder;
#[cfg(feature = "lzma")]
pub use filters::{BcjArmDecoder, BcjPpcDecoder, BcjSparcDecoder, BcjX86Decoder, DeltaDecoder};
#[cfg(feature = "lz4")]
pub use lz4::Lz4Decoder;
#[cfg(feature = "lzma")]
pub use lzma::{Lzma2Decoder, LzmaDecoder};

/// A byte stream feeding or produced by a coder.
pub type ByteSource = Box<dyn Read + Send>;

/// A decoder that reads coded data and produces decoded output.
pub trait Decoder: Read + Send {
    /// Returns the method id this decoder handles.
    fn method_id(&self) -> &'static [u8];
}

/// Method ids for the registered coders.
pub mod method {
    /// Copy (stored, no transformation).
    pub const COPY: &[u8] = &[0x00];
    /// Delta filter.
    pub const DELTA: &[u8] = &[0x03];
    /// LZMA.
    pub const LZMA: &[u8] = &[0x03, 0x01, 0x01];
    /// LZMA2.
    pub const LZMA2: &[u8] = &[0x21];
    /// Raw deflate.
    pub const DEFLATE: &[u8] = &[0x04, 0x01, 0x08];
    /// Bzip2.
    pub const BZIP2: &[u8] = &[0x04, 0x02, 0x02];
    /// BCJ (x86) branch filter.
    pub const BCJ_X86: &[u8] = &[0x03, 0x03, 0x01, 0x03];
    /// BCJ (ARM) branch filter.
    pub const BCJ_ARM: &[u8] = &[0x03, 0x03, 0x05, 0x01];
    /// BCJ (PowerPC) branch filter.
    pub const BCJ_PPC: &[u8] = &[0x03, 0x03, 0x02, 0x05];
    /// BCJ (SPARC) branch filter.
    pub const BCJ_SPARC: &[u8] = &[0x03, 0x03, 0x08, 0x05];
    /// BCJ2 four-stream x86 filter.
    pub const BCJ2: &[u8] = &[0x03, 0x03, 0x01, 0x1B];
    /// Zstandard.
    pub const ZSTD: &[u8] = &[0x04, 0xF7, 0x11, 0x01];
    /// Brotli.
    pub const BROTLI: &[u8] = &[0x04, 0xF7, 0x11, 0x02];
    /// LZ4 (frame format).
    pub const LZ4: &[u8] = &[0x04, 0xF7, 0x11, 0x04];
    /// AES-256-CBC with the 7z key derivation.
    pub const AES: &[u8] = &[0x06, 0xF1, 0x07, 0x01];

    /// Returns `true` for filters that transform already-decoded content.
    pub fn is_filter(method_id: &[u8]) -> bool {
        matches!(
            method_id,
            DELTA | BCJ_X86 | BCJ_ARM | BCJ_PPC | BCJ_SPARC | BCJ2
        )
    }

    /// Returns a human-readable name for a method id.
    pub fn name(id: &[u8]) -> &'static str {
        match id {
            COPY => "Copy",
            DELTA => "Delta",
            LZMA => "LZMA",
            LZMA2 => "LZMA2",
            DEFLATE => "Deflate",
            BZIP2 => "Bzip2",
            BCJ_X86 => "BCJ (x86)",
            BCJ_ARM => "BCJ (ARM)",
            BCJ_PPC => "BCJ (PowerPC)",
            BCJ_SPARC => "BCJ (SPARC)",
            BCJ2 => "BCJ2",
            ZSTD => "Zstandard",
            BROTLI => "Brotli",
            LZ4 => "LZ4",
            AES => "AES-256",
            _ => "Unknown",
        }
    }
}

/// Pops the sole input of a single-input coder.
fn single_input(mut inputs: Vec<ByteSource>, id: &[u8]) -> Result<ByteSource> {
    if inputs.len() != 1 {
        return Err(Error::malformed(format!(
            "{} coder expects 1 input stream, got {}",
            method::name(id),
            inputs.len()
        )));
    }
    Ok(inputs.pop().expect("length checked above"))
}

/// Builds a decoder for a single coder.
///
/// # Arguments
///
/// * `coder` - the coder record from the folder
/// * `inputs` - one byte source per coder input, in input-stream order
/// * `unpack_size` - the declared size of this coder's output
/// * `password` - password for the 7zAES coder
///
/// # Errors
///
/// [`Error::UnsupportedMethod`] for unregistered ids,
/// [`Error::PasswordRequired`] for 7zAES without a password.
pub(crate) fn build_decoder(
    coder: &Coder,
    inputs: Vec<ByteSource>,
    unpack_size: u64,
    password: Option<&Password>,
) -> Result<Box<dyn Decoder>> {
    let id = coder.method_id.as_slice();
    #[allow(unused_variables)]
    let properties = coder.properties.as_deref().unwrap_or(&[]);
    #[cfg(not(feature = "aes"))]
    let _ = password;

    match id {
        method::COPY => Ok(Box::new(StoredDecoder::new(
            single_input(inputs, id)?,
            unpack_size,
        ))),

        #[cfg(feature = "lzma")]
        method::LZMA => Ok(Box::new(LzmaDecoder::new(
            single_input(inputs, id)?,
            properties,
            unpack_size,
        )?)),

        #[cfg(feature = "lzma")]
        method::LZMA2 => Ok(Box::new(Lzma2Decoder::new(
            single_input(inputs, id)?,
            properties,
        )?)),

        #[cfg(feature = "deflate")]
        method::DEFLATE => Ok(Box::new(DeflateDecoder::new(single_input(inputs, id)?))),

        #[cfg(feature = "bzip2")]
        method::BZIP2 => Ok(Box::new(Bzip2Decoder::new(single_input(inputs, id)?))),

        #[cfg(feature = "lz4")]
        method::LZ4 => Ok(Box::new(Lz4Decoder::new(single_input(inputs, id)?))),

        #[cfg(feature = "zstd")]
        method::ZSTD => Ok(Box::new(ZstdDecoder::new(single_input(inputs, id)?)?)),

        #[cfg(feature = "brotli")]
        method::BROTLI => Ok(Box::new(BrotliDecoder::new(single_input(inputs, id)?))),

        #[cfg(feature = "lzma")]
        method::DELTA => Ok(Box::new(DeltaDecoder::new(
            single_input(inputs, id)?,
            properties,
        ))),

        #[cfg(feature = "lzma")]
        method::BCJ_X86 => Ok(Box::new(BcjX86Decoder::new(single_input(inputs, id)?))),

        #[cfg(feature = "lzma")]
        method::BCJ_ARM => Ok(Box::new(BcjArmDecoder::new(single_input(inputs, id)?))),

        #[cfg(feature = "lzma")]
        method::BCJ_PPC => Ok(Box::new(BcjPpcDecoder::new(single_input(inputs, id)?))),

        #[cfg(feature = "lzma")]
        method::BCJ_SPARC => Ok(Box::new(BcjSparcDecoder::new(single_input(inputs, id)?))),

        method::BCJ2 => {
            if inputs.len() != 4 {
                return Err(Error::malformed(format!(
                    "BCJ2 coder expects 4 input streams, got {}",
                    inputs.len()
                )));
            }
            let mut it = inputs.into_iter();
            let main = it.next().expect("length checked above");
            let call = it.next().expect("length checked above");
            let jump = it.next().expect("length checked above");
            let range = it.next().expect("length checked above");
            Ok(Box::new(Bcj2Decoder::new(main, call, jump, range)?))
        }

        #[cfg(feature = "aes")]
        method::AES => {
            let password = password.ok_or(Error::PasswordRequired)?;
            let input = single_input(inputs, id)?;
            Ok(Box::new(crate::crypto::Aes256Decoder::new(
                input, properties, password,
            )?))
        }

        _ => Err(Error::UnsupportedMethod {
            method_id: coder.method_id_u64(),
        }),
    }
}

/// Returns `true` if the coder id has a registered decoder in this build.
pub fn is_supported(method_id: &[u8]) -> bool {
    match method_id {
        method::COPY | method::BCJ2 => true,
        method::LZMA | method::LZMA2 | method::DELTA | method::BCJ_X86 | method::BCJ_ARM
        | method::BCJ_PPC | method::BCJ_SPARC => cfg!(feature = "lzma"),
        method::DEFLATE => cfg!(feature = "deflate"),
        method::BZIP2 => cfg!(feature = "bzip2"),
        method::LZ4 => cfg!(feature = "lz4"),
        method::ZSTD => cfg!(feature = "zstd"),
        method::BROTLI => cfg!(feature = "brotli"),
        method::AES => cfg!(feature = "aes"),
        _ => false,
    }
}
