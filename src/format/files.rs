//! FilesInfo structures: the named entries of an archive.

use std::io::Read;

use crate::{Error, Result};

use super::property_id;
use super::reader::{
    read_bit_vector, read_bytes, read_count, read_number, read_optional_bit_vector, read_u8,
    read_u32_le, read_u64_le, read_utf16le_string,
};
use super::streams::Limits;

/// A single entry as recorded in FilesInfo.
///
/// Sizes and CRCs are assigned afterwards from SubStreamsInfo; entries
/// without a data stream (directories, empty files, anti-items) do not
/// occupy a substream position.
#[derive(Debug, Clone, Default)]
pub struct FileRecord {
    /// Name (path within the archive, forward slashes).
    pub name: String,
    /// Whether this entry is a directory.
    pub is_directory: bool,
    /// Whether this is an anti-item (deletion marker in incremental sets).
    pub is_anti: bool,
    /// Whether this entry has a data stream (a substream position).
    pub has_stream: bool,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// CRC-32 of the uncompressed data, when recorded.
    pub crc: Option<u32>,
    /// Creation time (Windows FILETIME).
    pub ctime: Option<u64>,
    /// Last access time (Windows FILETIME).
    pub atime: Option<u64>,
    /// Modification time (Windows FILETIME).
    pub mtime: Option<u64>,
    /// Windows file attributes.
    pub attributes: Option<u32>,
}

/// Parsed FilesInfo block.
#[derive(Debug, Clone, Default)]
pub struct FilesInfo {
    /// Entries in archive order.
    pub records: Vec<FileRecord>,
}

impl FilesInfo {
    /// Parses FilesInfo; the reader is positioned after the property id.
    ///
    /// `unpack_sizes` and `digests` are the per-substream values from
    /// SubStreamsInfo (or derived from the folders); they are assigned to
    /// entries with streams in order.
    pub fn parse<R: Read>(
        r: &mut R,
        unpack_sizes: &[u64],
        digests: &[Option<u32>],
        limits: &Limits,
    ) -> Result<Self> {
        let num_files = read_count(r, limits.max_entries, "files")?;

        let mut records: Vec<FileRecord> = (0..num_files).map(|_| FileRecord::default()).collect();

        let mut empty_streams = vec![false; num_files];
        let mut empty_files = Vec::new();
        let mut anti_items = Vec::new();

        loop {
            let prop_id = read_u8(r)?;
            if prop_id == property_id::END {
                break;
            }

            let prop_size = read_number(r)?;
            if prop_size > limits.max_header_bytes {
                return Err(Error::ResourceLimitExceeded(format!(
                    "file property {:#x} claims {} bytes",
                    prop_id, prop_size
                )));
            }
            let prop_size = prop_size as usize;

            match prop_id {
                property_id::NAME => {
                    let external = read_u8(r)?;
                    if external != 0 {
                        return Err(Error::malformed("external file names"));
                    }
                    for record in &mut records {
                        record.name = read_utf16le_string(r)?;
                    }
                }

                property_id::EMPTY_STREAM => {
                    empty_streams = read_bit_vector(r, num_files)?;
                }

                property_id::EMPTY_FILE => {
                    let num_empty = empty_streams.iter().filter(|&&b| b).count();
                    empty_files = read_bit_vector(r, num_empty)?;
                }

                property_id::ANTI => {
                    let num_empty = empty_streams.iter().filter(|&&b| b).count();
                    anti_items = read_bit_vector(r, num_empty)?;
                }

                property_id::CTIME => {
                    parse_times(r, &mut records, |rec, t| rec.ctime = Some(t))?;
                }

                property_id::ATIME => {
                    parse_times(r, &mut records, |rec, t| rec.atime = Some(t))?;
                }

                property_id::MTIME => {
                    parse_times(r, &mut records, |rec, t| rec.mtime = Some(t))?;
                }

                property_id::WIN_ATTRIBUTES => {
                    parse_attributes(r, &mut records)?;
                }

                property_id::DUMMY => {
                    // Alignment padding emitted by some writers.
                    let _ = read_bytes(r, prop_size)?;
                }

                _ => {
                    // Unknown file property: skip by its declared size.
                    let _ = read_bytes(r, prop_size)?;
                }
            }
        }

        // An entry without a stream is a directory unless the EmptyFile
        // vector singles it out as a zero-length file; anti flags ride the
        // same empty-entry positions.
        let mut empty_idx = 0;
        for (record, &is_empty_stream) in records.iter_mut().zip(empty_streams.iter()) {
            if is_empty_stream {
                record.has_stream = false;

                let is_empty_file = empty_files.get(empty_idx).copied().unwrap_or(false);
                record.is_directory = !is_empty_file;
                record.is_anti = anti_items.get(empty_idx).copied().unwrap_or(false);

                empty_idx += 1;
            } else {
                record.has_stream = true;
            }
        }

        // Hand out substream sizes and digests in stream order.
        let mut stream_idx = 0;
        for record in &mut records {
            if record.has_stream {
                record.size = unpack_sizes.get(stream_idx).copied().unwrap_or(0);
                record.crc = digests.get(stream_idx).copied().flatten();
                stream_idx += 1;
            }
        }

        Ok(Self { records })
    }

    /// Returns the number of entries.
    pub fn num_files(&self) -> usize {
        self.records.len()
    }

    /// Returns entries that occupy a substream position.
    pub fn records_with_streams(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter().filter(|r| r.has_stream)
    }
}

/// Parses a timestamp property block into entries.
fn parse_times<R: Read, F>(r: &mut R, records: &mut [FileRecord], mut assign: F) -> Result<()>
where
    F: FnMut(&mut FileRecord, u64),
{
    let defined = read_optional_bit_vector(r, records.len())?;

    let external = read_u8(r)?;
    if external != 0 {
        return Err(Error::malformed("external timestamps"));
    }

    for (record, &has_time) in records.iter_mut().zip(defined.iter()) {
        if has_time {
            assign(record, read_u64_le(r)?);
        }
    }

    Ok(())
}

/// Parses the Windows attributes property block into entries.
fn parse_attributes<R: Read>(r: &mut R, records: &mut [FileRecord]) -> Result<()> {
    let defined = read_optional_bit_vector(r, records.len())?;

    let external = read_u8(r)?;
    if external != 0 {
        return Err(Error::malformed("external attributes"));
    }

    for (record, &has_attr) in records.iter_mut().zip(defined.iter()) {
        if has_attr {
            record.attributes = Some(read_u32_le(r)?);
        }
    }

    Ok(())
}
