//! Signature location and start header parsing.

use std::io::{Read, Seek, SeekFrom};

use crate::{Error, Result};

use super::reader::{read_u8, read_u32_le};
use super::{SIGNATURE, VERSION_MINOR_MAX, VERSION_MINOR_MIN};

/// Maximum search range for the 7z signature in self-extracting archives.
///
/// The format itself does not bound the stub size; one megabyte covers
/// every stub 7-Zip ships and is the documented limit of this reader.
pub const SFX_SEARCH_LIMIT: usize = 1024 * 1024;

/// The fixed 32-byte structure at the start of every archive.
///
/// All offsets it carries are relative to the end of the start header,
/// i.e. byte 32 of the (logical) archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartHeader {
    /// Archive format version, major number.
    pub version_major: u8,
    /// Archive format version, minor number.
    pub version_minor: u8,
    /// Offset from byte 32 to the end-of-archive header.
    pub next_header_offset: u64,
    /// Size of the end-of-archive header in bytes.
    pub next_header_size: u64,
    /// CRC-32 of the end-of-archive header bytes.
    pub next_header_crc: u32,
    /// Offset of the 7z signature within the file (non-zero for SFX).
    pub base_offset: u64,
}

impl StartHeader {
    /// Parses the signature and start header from the reader's position.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedHeader`] if the signature does not match
    /// - [`Error::UnsupportedVersion`] for versions outside 0.2 - 0.4
    /// - [`Error::CrcMismatch`] if the start header CRC fails
    pub fn parse<R: Read>(r: &mut R) -> Result<Self> {
        let mut sig = [0u8; 6];
        r.read_exact(&mut sig)?;
        if sig != *SIGNATURE {
            return Err(Error::malformed("invalid 7z signature"));
        }

        let version_major = read_u8(r)?;
        let version_minor = read_u8(r)?;

        if version_major != 0
            || !(VERSION_MINOR_MIN..=VERSION_MINOR_MAX).contains(&version_minor)
        {
            return Err(Error::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        let start_header_crc = read_u32_le(r)?;

        // The CRC covers the 20 bytes holding offset, size and next CRC.
        let mut header_data = [0u8; 20];
        r.read_exact(&mut header_data)?;

        let calculated_crc = crc32fast::hash(&header_data);
        if calculated_crc != start_header_crc {
            return Err(Error::crc_mismatch(None, start_header_crc, calculated_crc));
        }

        let next_header_offset = u64::from_le_bytes(header_data[0..8].try_into().unwrap());
        let next_header_size = u64::from_le_bytes(header_data[8..16].try_into().unwrap());
        let next_header_crc = u32::from_le_bytes(header_data[16..20].try_into().unwrap());

        Ok(Self {
            version_major,
            version_minor,
            next_header_offset,
            next_header_size,
            next_header_crc,
            base_offset: 0, // set by the caller for SFX archives
        })
    }

    /// Returns the absolute position of the end-of-archive header.
    pub fn next_header_position(&self) -> u64 {
        self.base_offset + super::SIGNATURE_HEADER_SIZE + self.next_header_offset
    }

    /// Returns the absolute position packed-stream offsets are relative to.
    pub fn data_position(&self) -> u64 {
        self.base_offset + super::SIGNATURE_HEADER_SIZE
    }
}

/// Scans for the 7z signature within the first [`SFX_SEARCH_LIMIT`] bytes.
///
/// Self-extracting archives embed the container after an executable stub.
/// A candidate match must be followed by plausible version bytes to avoid
/// stray signature bytes inside the stub.
///
/// Returns `Ok(Some(offset))` with the absolute signature position, or
/// `Ok(None)` if no signature exists within the window.
pub fn find_signature<R: Read + Seek>(reader: &mut R) -> Result<Option<u64>> {
    reader.seek(SeekFrom::Start(0))?;

    let mut buffer = vec![0u8; SFX_SEARCH_LIMIT];
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buffer.truncate(filled);

    let mut search_start = 0;
    while search_start + 8 <= buffer.len() {
        match buffer[search_start..].windows(6).position(|w| w == SIGNATURE) {
            Some(rel) => {
                let pos = search_start + rel;
                // A signature right at the start is authoritative; its
                // version is judged by the start header parser so that
                // out-of-range versions report as unsupported rather
                // than missing.
                if pos == 0 {
                    return Ok(Some(0));
                }
                if pos + 8 <= buffer.len() {
                    let major = buffer[pos + 6];
                    let minor = buffer[pos + 7];
                    if major == 0 && (VERSION_MINOR_MIN..=VERSION_MINOR_MAX).contains(&minor) {
                        return Ok(Some(pos as u64));
                    }
                }
                // False positive inside the stub; keep scanning.
                search_start = pos + 1;
            }
            None => break,
        }
    }

    Ok(None)
}
