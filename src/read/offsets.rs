//! The offset/metadata listing.
//!
//! [`Archive::list_with_offsets`] exposes where each member's packed
//! bytes live, whether they are transformed at all, and the crypto
//! parameters for encrypted folders. Callers can use this to read stored
//! members directly from the archive bytes, or to decrypt
//! stored-but-encrypted members without the decode pipeline.

use crate::codec::method;
use crate::crypto::AesProperties;

use super::Archive;

/// Offset and layout metadata for one archive member.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct FileInfo {
    /// Path within the archive.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Absolute archive byte offset where the member's packed bytes
    /// would begin.
    ///
    /// Computed as the folder's first packed byte plus the sizes of the
    /// preceding substreams. Only members of a stored folder (a single
    /// Copy coder, [`compressed`][Self::compressed] is `false`) can be
    /// read directly at this offset; for transformed folders the value
    /// still identifies the packed region.
    pub offset: u64,
    /// Total packed size of the member's folder.
    pub packed_size: u64,
    /// Owning folder index; `None` for entries without a stream.
    pub folder_index: Option<usize>,
    /// `false` only when the folder graph is exactly one Copy coder.
    pub compressed: bool,
    /// Whether the folder contains the 7zAES coder.
    pub encrypted: bool,
    /// Decryption parameters for encrypted members: salt, IV and the key
    /// derivation cycles ([`AesProperties::kdf_iterations`] gives the
    /// iteration count).
    pub crypto: Option<AesProperties>,
}

impl FileInfo {
    /// Returns `true` if the member can be read directly at
    /// [`offset`][Self::offset] without any decoding.
    pub fn is_stored(&self) -> bool {
        !self.compressed && !self.encrypted
    }
}

impl Archive {
    /// Returns offset and layout metadata for every member.
    ///
    /// Entries without a data stream (directories, empty files,
    /// anti-items) are reported with a zero offset and no folder.
    pub fn list_with_offsets(&self) -> Vec<FileInfo> {
        let model = &self.inner.model;

        self.files()
            .iter()
            .map(|file| {
                let Some(substream_idx) = file.substream else {
                    return FileInfo {
                        name: file.name.clone(),
                        size: file.size,
                        offset: 0,
                        packed_size: 0,
                        folder_index: None,
                        compressed: false,
                        encrypted: false,
                        crypto: None,
                    };
                };

                let substream = &model.substreams[substream_idx];
                let folder_index = substream.folder_index;
                let folder = &model.folders[folder_index];

                let pack_offset = model.folder_pack_offset(folder_index).unwrap_or(0);
                let encrypted = folder.is_encrypted();

                let crypto = if encrypted {
                    folder
                        .coders
                        .iter()
                        .find(|c| c.method_id.as_slice() == method::AES)
                        .and_then(|c| c.properties.as_deref())
                        .and_then(|props| AesProperties::parse(props).ok())
                } else {
                    None
                };

                FileInfo {
                    name: file.name.clone(),
                    size: file.size,
                    offset: pack_offset + substream.offset_in_folder,
                    packed_size: model.folder_packed_size(folder_index),
                    folder_index: Some(folder_index),
                    compressed: !folder.is_copy_only(),
                    encrypted,
                    crypto,
                }
            })
            .collect()
    }
}
