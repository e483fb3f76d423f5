//! # unseven
//!
//! A pure-Rust, read-only reader for 7z archives.
//!
//! The crate parses the archive's compressed, self-referential metadata,
//! assembles each folder's coder graph (decompression, filters,
//! decryption) and exposes every member as an independently openable byte
//! stream with CRC verification. Multi-volume sets (`.7z.001`, `.7z.002`,
//! ...) and self-extracting `.exe` archives are handled transparently.
//!
//! ## Reading an archive
//!
//! ```rust,no_run
//! use std::io::Read;
//! use unseven::{Archive, Result};
//!
//! fn main() -> Result<()> {
//!     let archive = Archive::open("archive.7z")?;
//!
//!     for file in archive.files() {
//!         println!("{}: {} bytes", file.name, file.size);
//!
//!         let mut reader = file.open()?;
//!         let mut content = Vec::new();
//!         reader.read_to_end(&mut content)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Reading members in archive order is fastest: consecutive members of a
//! solid folder share the folder's decode state, so each output byte is
//! produced exactly once. Random-order access stays correct but decodes
//! the folder again from its start.
//!
//! ## Encrypted archives
//!
//! ```rust,no_run
//! use unseven::{Archive, Result};
//!
//! fn main() -> Result<()> {
//!     let archive = Archive::open_with_password("secret.7z", "password")?;
//!     println!("{} files", archive.files().len());
//!     Ok(())
//! }
//! ```
//!
//! A wrong password usually shows up as garbage after AES-CBC, caught by
//! the downstream decompressor or the CRC check; those failures are
//! wrapped so [`Error::is_encrypted`] distinguishes them from plain
//! corruption.
//!
//! ## Direct access to stored members
//!
//! [`Archive::list_with_offsets`] reports where each member's packed
//! bytes live and whether they are transformed. Members of a stored
//! folder (single Copy coder, no encryption) can be read straight from
//! the archive bytes at the reported offset, without this crate's decode
//! pipeline; encrypted-but-stored members can be decrypted externally
//! using the exposed salt, IV and iteration count.
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `lzma` | Yes | LZMA/LZMA2 plus the Delta and BCJ filters |
//! | `deflate` | Yes | Deflate |
//! | `bzip2` | Yes | Bzip2 |
//! | `lz4` | Yes | LZ4 (frame format) |
//! | `zstd` | Yes | Zstandard |
//! | `brotli` | Yes | Brotli |
//! | `aes` | Yes | 7zAES (AES-256-CBC) decryption |
//!
//! Archives using a coder whose feature is disabled open fine; reading
//! the affected members fails with [`Error::UnsupportedMethod`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod checksum;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod format;
pub mod password;
pub mod read;
pub mod timestamp;
pub mod volume;

pub use error::{Error, Result};
pub use password::Password;
pub use read::{Archive, File, FileInfo, FileReader};
pub use timestamp::Timestamp;
