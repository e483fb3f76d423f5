//! Content filters: Delta and the BCJ branch converters.
//!
//! Filters operate on decoded content rather than compressed bytes: they
//! sit downstream of a compression coder and reverse a transformation the
//! archiver applied to improve compressibility (branch-target rewriting
//! for executables, byte-delta for sampled data).

use std::io::{self, Read};

use lzma_rust2::filter::bcj::BcjReader;
use lzma_rust2::filter::delta::DeltaReader;

use super::{Decoder, method};

macro_rules! bcj_decoder {
    ($(#[$doc:meta])* $name:ident, $ctor:ident, $id:expr) => {
        $(#[$doc])*
        pub struct $name<R> {
            inner: BcjReader<R>,
        }

        impl<R> std::fmt::Debug for $name<R> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }

        impl<R: Read + Send> $name<R> {
            /// Creates the filter over decoded content.
            pub fn new(input: R) -> Self {
                Self {
                    inner: BcjReader::$ctor(input, 0),
                }
            }
        }

        impl<R: Read + Send> Read for $name<R> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                self.inner.read(buf)
            }
        }

        impl<R: Read + Send> Decoder for $name<R> {
            fn method_id(&self) -> &'static [u8] {
                $id
            }
        }
    };
}

bcj_decoder!(
    /// BCJ x86 branch filter decoder.
    ///
    /// Converts absolute CALL/JMP targets back to the relative form found
    /// in the original executable.
    BcjX86Decoder,
    new_x86,
    method::BCJ_X86
);

bcj_decoder!(
    /// BCJ ARM branch filter decoder.
    BcjArmDecoder,
    new_arm,
    method::BCJ_ARM
);

bcj_decoder!(
    /// BCJ PowerPC branch filter decoder.
    BcjPpcDecoder,
    new_ppc,
    method::BCJ_PPC
);

bcj_decoder!(
    /// BCJ SPARC branch filter decoder.
    BcjSparcDecoder,
    new_sparc,
    method::BCJ_SPARC
);

/// Delta filter decoder.
///
/// Reconstructs original bytes from stored differences at a fixed
/// distance. The property byte stores `distance - 1`.
pub struct DeltaDecoder<R> {
    inner: DeltaReader<R>,
}

impl<R> std::fmt::Debug for DeltaDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaDecoder").finish_non_exhaustive()
    }
}

impl<R: Read + Send> DeltaDecoder<R> {
    /// Creates a Delta decoder from the coder properties.
    ///
    /// Missing properties default to distance 1.
    pub fn new(input: R, properties: &[u8]) -> Self {
        let distance = properties.first().map(|b| *b as usize + 1).unwrap_or(1);
        Self {
            inner: DeltaReader::new(input, distance),
        }
    }
}

impl<R: Read + Send> Read for DeltaDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Decoder for DeltaDecoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::DELTA
    }
}
