//! End-of-archive header parsing.
//!
//! The end header is either stored plainly or as an *encoded header*: a
//! StreamsInfo block describing a folder whose decoded terminal output is
//! the real header bytes. Encoded headers run through the same coder
//! graph machinery as file data, including 7zAES for encrypted headers.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;

use crate::checksum::Crc32Reader;
use crate::codec::graph::build_folder_decoder;
use crate::password::Password;
use crate::volume::{ReadAt, Section, SourceCursor};
use crate::{Error, Result};

use super::files::FilesInfo;
use super::header::StartHeader;
use super::property_id;
use super::reader::{read_bytes, read_number, read_u8};
use super::streams::{Folder, Limits, PackInfo, SubStreamsInfo, UnpackInfo};

/// Maximum nesting depth for encoded headers.
const MAX_HEADER_RECURSION: u32 = 4;

/// Parsed end-of-archive header.
#[derive(Debug, Clone, Default)]
pub struct ArchiveHeader {
    /// Packed stream layout.
    pub pack_info: Option<PackInfo>,
    /// Folder definitions.
    pub unpack_info: Option<UnpackInfo>,
    /// Substream slicing of folder outputs.
    pub substreams_info: Option<SubStreamsInfo>,
    /// Named entries.
    pub files_info: Option<FilesInfo>,
    /// Whether decoding the header required the 7zAES coder.
    pub header_encrypted: bool,
}

impl ArchiveHeader {
    /// Returns the folder list.
    pub fn folders(&self) -> &[Folder] {
        self.unpack_info.as_ref().map_or(&[], |u| &u.folders)
    }
}

/// Header parser holding limits and the optional password.
pub struct HeaderParser<'a> {
    limits: &'a Limits,
    password: Option<&'a Password>,
}

impl<'a> HeaderParser<'a> {
    /// Creates a parser.
    pub fn new(limits: &'a Limits, password: Option<&'a Password>) -> Self {
        Self { limits, password }
    }

    /// Parses the complete end header of an archive.
    ///
    /// `source` covers the logical archive bytes; `base_offset` is the
    /// position of the 7z signature (non-zero for SFX archives).
    pub fn parse(
        &self,
        source: &Arc<dyn ReadAt>,
        base_offset: u64,
    ) -> Result<(StartHeader, ArchiveHeader)> {
        let mut cursor = SourceCursor::new(source.clone());
        cursor.seek(SeekFrom::Start(base_offset))?;

        let mut start_header = StartHeader::parse(&mut cursor)?;
        start_header.base_offset = base_offset;

        // An empty archive carries no end header at all.
        if start_header.next_header_size == 0 {
            return Ok((start_header, ArchiveHeader::default()));
        }

        if start_header.next_header_size > self.limits.max_header_bytes {
            return Err(Error::ResourceLimitExceeded(format!(
                "header size {} exceeds limit",
                start_header.next_header_size
            )));
        }

        let header_pos = start_header.next_header_position();
        let mut header_data = vec![0u8; start_header.next_header_size as usize];
        source.read_exact_at(header_pos, &mut header_data)?;

        let actual_crc = crc32fast::hash(&header_data);
        if actual_crc != start_header.next_header_crc {
            return Err(Error::crc_mismatch(
                None,
                start_header.next_header_crc,
                actual_crc,
            ));
        }

        let data_position = start_header.data_position();
        let header = self.parse_header_bytes(header_data, source, data_position)?;

        Ok((start_header, header))
    }

    /// Parses header bytes, resolving encoded headers as needed.
    fn parse_header_bytes(
        &self,
        mut header_data: Vec<u8>,
        source: &Arc<dyn ReadAt>,
        data_position: u64,
    ) -> Result<ArchiveHeader> {
        let mut header_encrypted = false;

        for _ in 0..MAX_HEADER_RECURSION {
            let first_byte = *header_data
                .first()
                .ok_or_else(|| Error::malformed("empty header data"))?;

            match first_byte {
                property_id::HEADER => {
                    let mut cursor = Cursor::new(&header_data[1..]);
                    let mut header = self.parse_main_header(&mut cursor)?;
                    header.header_encrypted = header_encrypted;
                    return Ok(header);
                }

                property_id::ENCODED_HEADER => {
                    let mut cursor = Cursor::new(&header_data[1..]);
                    let mut streams = ArchiveHeader::default();
                    self.parse_streams_info(&mut cursor, &mut streams)?;

                    let encrypted_step = streams.folders().iter().any(Folder::is_encrypted);
                    header_encrypted |= encrypted_step;

                    header_data = self
                        .decode_header(&streams, source, data_position)
                        .map_err(|e| match e {
                            // A missing password is its own signal, not a
                            // wrong-password symptom.
                            Error::PasswordRequired => Error::PasswordRequired,
                            e if encrypted_step => Error::encrypted(e),
                            e => e,
                        })?;
                }

                other => {
                    return Err(Error::malformed(format!(
                        "expected header marker, got {:#x}",
                        other
                    )));
                }
            }
        }

        Err(Error::ResourceLimitExceeded(
            "encoded header nesting too deep".into(),
        ))
    }

    /// Decodes an encoded header's folder into the real header bytes.
    fn decode_header(
        &self,
        streams: &ArchiveHeader,
        source: &Arc<dyn ReadAt>,
        data_position: u64,
    ) -> Result<Vec<u8>> {
        let pack_info = streams
            .pack_info
            .as_ref()
            .ok_or_else(|| Error::malformed("encoded header missing pack info"))?;

        let unpack_info = streams
            .unpack_info
            .as_ref()
            .ok_or(Error::MissingUnpackInfo)?;

        let folder = unpack_info
            .folders
            .first()
            .ok_or_else(|| Error::malformed("encoded header has no folders"))?;

        folder.validate_packed_streams(pack_info.num_streams())?;

        let unpack_size = folder.unpack_size()?;
        if unpack_size > self.limits.max_header_bytes {
            return Err(Error::ResourceLimitExceeded(
                "decoded header too large".into(),
            ));
        }

        // The folder's packed streams sit at data_position + pack_pos,
        // back to back in pack order.
        let mut offset = data_position + pack_info.pack_pos;
        let mut packed: Vec<crate::codec::ByteSource> =
            Vec::with_capacity(folder.packed_streams.len());
        for idx in 0..folder.packed_streams.len() {
            let size = pack_info.pack_sizes[idx];
            packed.push(Box::new(Section::new(source.clone(), offset, size)));
            offset += size;
        }

        let decoder = build_folder_decoder(folder, packed, self.password)?;
        let mut decoder = Crc32Reader::new(decoder.take(unpack_size));

        let mut decoded = Vec::with_capacity(unpack_size as usize);
        decoder.read_to_end(&mut decoded)?;

        if (decoded.len() as u64) < unpack_size {
            return Err(Error::malformed("encoded header output truncated"));
        }

        if let Some(expected) = folder.unpack_crc {
            let actual = decoder.crc();
            if actual != expected {
                return Err(Error::crc_mismatch(None, expected, actual));
            }
        }

        Ok(decoded)
    }

    /// Parses the content of a plain header (after the 0x01 marker).
    fn parse_main_header<R: Read>(&self, r: &mut R) -> Result<ArchiveHeader> {
        let mut header = ArchiveHeader::default();

        loop {
            let prop_id = read_u8(r)?;
            match prop_id {
                property_id::END => break,

                property_id::ARCHIVE_PROPERTIES => {
                    skip_archive_properties(r)?;
                }

                property_id::MAIN_STREAMS_INFO => {
                    self.parse_streams_info(r, &mut header)?;
                }

                property_id::FILES_INFO => {
                    let (sizes, digests) = substream_sizes_and_digests(&header)?;
                    header.files_info =
                        Some(FilesInfo::parse(r, &sizes, &digests, self.limits)?);
                }

                property_id::ADDITIONAL_STREAMS_INFO => {
                    return Err(Error::malformed("additional streams are not supported"));
                }

                other => {
                    return Err(Error::malformed(format!(
                        "unexpected property id {:#x} in header",
                        other
                    )));
                }
            }
        }

        // Packed streams without folder definitions are undecodable.
        if header.pack_info.is_some() && header.unpack_info.is_none() {
            return Err(Error::MissingUnpackInfo);
        }

        Ok(header)
    }

    /// Parses a StreamsInfo block into the header.
    fn parse_streams_info<R: Read>(&self, r: &mut R, header: &mut ArchiveHeader) -> Result<()> {
        loop {
            let prop_id = read_u8(r)?;
            match prop_id {
                property_id::END => break,

                property_id::PACK_INFO => {
                    header.pack_info = Some(PackInfo::parse(r, self.limits)?);
                }

                property_id::UNPACK_INFO => {
                    header.unpack_info = Some(UnpackInfo::parse(r, self.limits)?);
                }

                property_id::SUBSTREAMS_INFO => {
                    let folders = header
                        .unpack_info
                        .as_ref()
                        .map_or(&[] as &[Folder], |u| &u.folders);
                    header.substreams_info =
                        Some(SubStreamsInfo::parse(r, folders, self.limits)?);
                }

                other => {
                    return Err(Error::malformed(format!(
                        "unexpected property id {:#x} in streams info",
                        other
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Skips an ArchiveProperties block: `(id, size, data)*` until END.
fn skip_archive_properties<R: Read>(r: &mut R) -> Result<()> {
    loop {
        let prop_id = read_u8(r)?;
        if prop_id == property_id::END {
            return Ok(());
        }
        let size = read_number(r)? as usize;
        let _ = read_bytes(r, size)?;
    }
}

/// Collects per-substream sizes and digests for FilesInfo assignment.
fn substream_sizes_and_digests(header: &ArchiveHeader) -> Result<(Vec<u64>, Vec<Option<u32>>)> {
    if let Some(ref substreams) = header.substreams_info {
        return Ok((substreams.unpack_sizes.clone(), substreams.digests.clone()));
    }

    if let Some(ref unpack_info) = header.unpack_info {
        // One substream per folder.
        let mut sizes = Vec::with_capacity(unpack_info.folders.len());
        let mut digests = Vec::with_capacity(unpack_info.folders.len());
        for folder in &unpack_info.folders {
            sizes.push(folder.unpack_size()?);
            digests.push(folder.unpack_crc);
        }
        return Ok((sizes, digests));
    }

    Ok((Vec::new(), Vec::new()))
}
