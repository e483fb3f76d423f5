//! Error types for 7z archive reading.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when opening and decoding 7z archives, along with a
//! convenient [`Result<T>`] type alias.
//!
//! # Encrypted failures
//!
//! A wrong password is usually detected indirectly: AES-CBC happily
//! decrypts with the wrong key and produces garbage, which then either
//! breaks the downstream decompressor or fails the CRC check. To let
//! callers distinguish "wrong password" from plain corruption, any error
//! that surfaced from a folder containing a 7zAES coder is wrapped in
//! [`Error::Encrypted`]. Use [`Error::is_encrypted`] instead of matching
//! the variant directly:
//!
//! ```rust,no_run
//! use unseven::{Archive, Error};
//!
//! match Archive::open_with_password("secret.7z", "guess") {
//!     Ok(archive) => println!("{} files", archive.files().len()),
//!     Err(e) if e.is_encrypted() => eprintln!("wrong password?"),
//!     Err(e) => eprintln!("error: {}", e),
//! }
//! ```

use std::io;

/// Helper struct for formatting CrcMismatch error messages.
struct CrcMismatchDisplay<'a> {
    entry_name: Option<&'a str>,
    expected: u32,
    actual: u32,
}

impl std::fmt::Display for CrcMismatchDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CRC mismatch")?;
        if let Some(name) = self.entry_name {
            write!(f, " for '{}'", name)?;
        }
        write!(f, ": expected {:#x}, got {:#x}", self.expected, self.actual)
    }
}

/// The main error type for 7z archive operations.
///
/// Each variant carries enough context to diagnose the failure. Errors
/// raised while streaming a file "stick": every subsequent read on the
/// same handle reports the same condition.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading archive data.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The metadata property stream is syntactically invalid.
    ///
    /// Raised for unknown property ids, packed integers longer than nine
    /// bytes, missing terminators, truncated bit vectors and similar
    /// violations of the header encoding.
    #[error("malformed header: {reason}")]
    MalformedHeader {
        /// Description of the violation.
        reason: String,
    },

    /// The archive format version is not one this reader understands.
    ///
    /// Version `0.2` through `0.4` archives are accepted; anything else is
    /// rejected rather than misparsed.
    #[error("unsupported archive version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version byte from the signature header.
        major: u8,
        /// Minor version byte from the signature header.
        minor: u8,
    },

    /// A folder references a coder id with no registered decoder.
    #[error("unsupported method: {method_id:#x}")]
    UnsupportedMethod {
        /// The coder id bytes packed little-endian into a u64.
        method_id: u64,
    },

    /// The header carries PackInfo but no CodersInfo.
    ///
    /// Packed streams without folder definitions cannot be interpreted.
    #[error("missing unpack info for packed streams")]
    MissingUnpackInfo,

    /// A negative size was supplied for a stream-opened archive.
    #[error("negative stream size")]
    NegativeSize,

    /// A checksum was requested for an entry that has none recorded.
    #[error("no checksum recorded for entry")]
    ChecksumUnavailable,

    /// A computed CRC-32 differs from the stored one.
    ///
    /// Covers every CRC check in the format: the start header, the end
    /// header, decoded encoded-header bytes, per-substream digests and
    /// folder-level digests. `entry_name` is set when the failure is
    /// attributable to a named member; header-level checks carry none.
    #[error("{}", CrcMismatchDisplay { entry_name: entry_name.as_deref(), expected: *expected, actual: *actual })]
    CrcMismatch {
        /// Name of the affected entry, when known.
        entry_name: Option<String>,
        /// The CRC-32 recorded in the archive.
        expected: u32,
        /// The CRC-32 computed over the produced bytes.
        actual: u32,
    },

    /// A failure that surfaced from an encrypted folder.
    ///
    /// This wraps the underlying cause (typically [`CrcMismatch`] or
    /// [`DecoderFailure`] caused by wrong-password garbage) so that
    /// callers can tell wrong-password apart from corruption without
    /// losing the original error.
    ///
    /// [`CrcMismatch`]: Error::CrcMismatch
    /// [`DecoderFailure`]: Error::DecoderFailure
    #[error("encrypted data error: {source}")]
    Encrypted {
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// A decoder failed on its input.
    #[error("{method} decoder failure: {reason}")]
    DecoderFailure {
        /// Human-readable name of the failing coder.
        method: &'static str,
        /// Description of the failure.
        reason: String,
    },

    /// A password is required but none was provided.
    #[error("password required for encrypted data")]
    PasswordRequired,

    /// The archive (or file handle) has been closed.
    #[error("archive is closed")]
    Closed,

    /// A parsing or derivation limit was exceeded.
    ///
    /// Guards against malicious headers (absurd entry counts, extreme key
    /// derivation iteration counts and the like).
    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),
}

impl Error {
    /// Returns `true` if this error surfaced from encrypted data.
    ///
    /// This is a structural query: [`Error::Encrypted`] is a wrapper, not
    /// a sibling kind, so the underlying cause stays available through
    /// [`std::error::Error::source`].
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Error::Encrypted { .. })
    }

    /// Returns `true` if this is a data corruption error.
    ///
    /// Looks through the [`Encrypted`][Error::Encrypted] wrapper.
    pub fn is_corruption(&self) -> bool {
        match self {
            Error::CrcMismatch { .. } => true,
            Error::Encrypted { source } => source.is_corruption(),
            _ => false,
        }
    }

    /// Returns `true` if the archive uses features this build cannot decode.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedMethod { .. } | Error::UnsupportedVersion { .. }
        )
    }

    /// Returns the coder id if this is an unsupported-method error.
    pub fn method_id(&self) -> Option<u64> {
        match self {
            Error::UnsupportedMethod { method_id } => Some(*method_id),
            _ => None,
        }
    }

    /// Wraps an error as having surfaced from encrypted data.
    ///
    /// Idempotent: an already-wrapped error is returned unchanged, so a
    /// failure propagating through nested encrypted folders is tagged once.
    pub fn encrypted(source: Error) -> Self {
        if source.is_encrypted() {
            return source;
        }
        Error::Encrypted {
            source: Box::new(source),
        }
    }

    /// Creates a MalformedHeader error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedHeader {
            reason: reason.into(),
        }
    }

    /// Creates a CrcMismatch error.
    pub fn crc_mismatch(entry_name: Option<String>, expected: u32, actual: u32) -> Self {
        Error::CrcMismatch {
            entry_name,
            expected,
            actual,
        }
    }

    /// Duplicates this error for sticky reporting.
    ///
    /// `io::Error` is not `Clone`; the copy preserves kind and message.
    pub(crate) fn replicate(&self) -> Self {
        match self {
            Error::Io(e) => Error::Io(io::Error::new(e.kind(), e.to_string())),
            Error::MalformedHeader { reason } => Error::MalformedHeader {
                reason: reason.clone(),
            },
            Error::UnsupportedVersion { major, minor } => Error::UnsupportedVersion {
                major: *major,
                minor: *minor,
            },
            Error::UnsupportedMethod { method_id } => Error::UnsupportedMethod {
                method_id: *method_id,
            },
            Error::MissingUnpackInfo => Error::MissingUnpackInfo,
            Error::NegativeSize => Error::NegativeSize,
            Error::ChecksumUnavailable => Error::ChecksumUnavailable,
            Error::CrcMismatch {
                entry_name,
                expected,
                actual,
            } => Error::CrcMismatch {
                entry_name: entry_name.clone(),
                expected: *expected,
                actual: *actual,
            },
            Error::Encrypted { source } => Error::Encrypted {
                source: Box::new(source.replicate()),
            },
            Error::DecoderFailure { method, reason } => Error::DecoderFailure {
                method,
                reason: reason.clone(),
            },
            Error::PasswordRequired => Error::PasswordRequired,
            Error::Closed => Error::Closed,
            Error::ResourceLimitExceeded(msg) => Error::ResourceLimitExceeded(msg.clone()),
        }
    }
}

/// A specialized Result type for 7z operations.
pub type Result<T> = std::result::Result<T, Error>;
