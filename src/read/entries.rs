//! Construction of the public file list from the parsed header.

use std::sync::Arc;

use crate::format::parser::ArchiveHeader;
use crate::timestamp::Timestamp;
use crate::{Error, Result};

use super::file::File;
use super::ArchiveInner;

/// Builds the file list, connecting entries to their substreams.
///
/// Entries with a data stream occupy substream positions in archive
/// order; empty files, directories and anti-items do not.
pub(crate) fn build_files(
    inner: &Arc<ArchiveInner>,
    header: &ArchiveHeader,
) -> Result<Vec<File>> {
    let Some(ref files_info) = header.files_info else {
        return Ok(Vec::new());
    };

    let model = &inner.model;
    let mut files = Vec::with_capacity(files_info.records.len());
    let mut stream_idx = 0usize;

    for record in &files_info.records {
        let substream = if record.has_stream {
            if stream_idx >= model.substreams.len() {
                return Err(Error::malformed(
                    "more entries with streams than substreams",
                ));
            }
            let idx = stream_idx;
            stream_idx += 1;
            Some(idx)
        } else {
            None
        };

        let is_encrypted = substream
            .map(|s| {
                let folder = model.substreams[s].folder_index;
                model.folders[folder].is_encrypted()
            })
            .unwrap_or(false);

        files.push(File {
            inner: inner.clone(),
            substream,
            name: record.name.clone(),
            size: record.size,
            crc32: record.crc,
            is_directory: record.is_directory,
            is_anti: record.is_anti,
            is_encrypted,
            attributes: record.attributes,
            modification_time: record.mtime.map(Timestamp::from_filetime),
            creation_time: record.ctime.map(Timestamp::from_filetime),
            access_time: record.atime.map(Timestamp::from_filetime),
        });
    }

    Ok(files)
}
