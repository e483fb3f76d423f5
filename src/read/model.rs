//! The decoded archive model: folders, packed ranges and substreams.
//!
//! Built once at open from the parsed header, then shared immutably by
//! every file handle. All offsets here are absolute positions in the
//! logical archive byte sequence (volume concatenation included).

use crate::format::header::StartHeader;
use crate::format::parser::ArchiveHeader;
use crate::format::streams::Folder;
use crate::{Error, Result};

/// One packed stream's absolute location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PackRange {
    /// Absolute byte offset of the stream's first byte.
    pub offset: u64,
    /// Length of the packed stream.
    pub size: u64,
}

/// One substream: a slice of a folder's terminal output.
#[derive(Debug, Clone)]
pub(crate) struct Substream {
    /// Owning folder.
    pub folder_index: usize,
    /// Position among the folder's substreams.
    pub index_in_folder: usize,
    /// Byte offset within the folder's terminal output.
    pub offset_in_folder: u64,
    /// Substream length.
    pub size: u64,
    /// Recorded CRC-32, when present.
    pub crc: Option<u32>,
}

/// The immutable decode model derived from the header.
#[derive(Debug, Default)]
pub(crate) struct Model {
    /// Folder records, in archive order.
    pub folders: Vec<Folder>,
    /// Packed ranges per folder, in the folder's pack order.
    pub folder_packs: Vec<Vec<PackRange>>,
    /// All substreams, flattened in folder order.
    pub substreams: Vec<Substream>,
    /// Per folder, the range of its substreams in `substreams`.
    pub folder_substreams: Vec<std::ops::Range<usize>>,
    /// Whether the end header itself was encrypted.
    pub header_encrypted: bool,
}

impl Model {
    /// Builds the model from a parsed header.
    pub fn build(start: &StartHeader, header: &ArchiveHeader) -> Result<Self> {
        let folders = header
            .unpack_info
            .as_ref()
            .map(|u| u.folders.clone())
            .unwrap_or_default();

        let mut model = Model {
            folder_packs: Vec::with_capacity(folders.len()),
            folder_substreams: Vec::with_capacity(folders.len()),
            folders,
            substreams: Vec::new(),
            header_encrypted: header.header_encrypted,
        };

        // Assign packed streams to folders: the folders partition the
        // pack list in order.
        if let Some(ref pack_info) = header.pack_info {
            let mut offset = start.data_position() + pack_info.pack_pos;
            let mut pack_idx = 0usize;

            for folder in &model.folders {
                let want = folder.packed_streams.len();
                if pack_idx + want > pack_info.pack_sizes.len() {
                    return Err(Error::malformed(
                        "folders reference more packed streams than PackInfo provides",
                    ));
                }

                let mut ranges = Vec::with_capacity(want);
                for size in &pack_info.pack_sizes[pack_idx..pack_idx + want] {
                    ranges.push(PackRange {
                        offset,
                        size: *size,
                    });
                    offset += size;
                }

                model.folder_packs.push(ranges);
                pack_idx += want;
            }
        } else if !model.folders.is_empty() {
            return Err(Error::malformed("folders without pack info"));
        }

        // Slice each folder's output into substreams.
        let default_counts;
        let (counts, sizes, digests) = match header.substreams_info {
            Some(ref ss) => (
                ss.num_unpack_streams.as_slice(),
                ss.unpack_sizes.clone(),
                ss.digests.clone(),
            ),
            None => {
                default_counts = vec![1u64; model.folders.len()];
                let mut sizes = Vec::with_capacity(model.folders.len());
                let mut digests = Vec::with_capacity(model.folders.len());
                for folder in &model.folders {
                    sizes.push(folder.unpack_size()?);
                    digests.push(folder.unpack_crc);
                }
                (default_counts.as_slice(), sizes, digests)
            }
        };

        let mut stream_idx = 0usize;
        for (folder_index, &count) in counts.iter().enumerate() {
            let first = model.substreams.len();
            let mut offset_in_folder = 0u64;

            for index_in_folder in 0..count as usize {
                let size = sizes.get(stream_idx).copied().ok_or_else(|| {
                    Error::malformed("substream sizes shorter than substream count")
                })?;
                let crc = digests.get(stream_idx).copied().flatten();

                model.substreams.push(Substream {
                    folder_index,
                    index_in_folder,
                    offset_in_folder,
                    size,
                    crc,
                });

                offset_in_folder += size;
                stream_idx += 1;
            }

            // Any output past the last substream is implicit discard; the
            // slices must still fit inside the folder output.
            let folder = &model.folders[folder_index];
            if offset_in_folder > folder.unpack_size()? {
                return Err(Error::malformed(
                    "substream sizes exceed folder output size",
                ));
            }

            model.folder_substreams.push(first..model.substreams.len());
        }

        Ok(model)
    }

    /// Returns a folder's total packed size.
    pub fn folder_packed_size(&self, folder_index: usize) -> u64 {
        self.folder_packs[folder_index]
            .iter()
            .map(|r| r.size)
            .sum()
    }

    /// Returns the absolute offset of a folder's first packed byte.
    pub fn folder_pack_offset(&self, folder_index: usize) -> Option<u64> {
        self.folder_packs[folder_index].first().map(|r| r.offset)
    }

    /// Returns `true` when a folder mixes 7zAES with real compression.
    ///
    /// Wrong-password garbage surfaces differently depending on the graph:
    /// a downstream decompressor chokes (or its CRC fails) for compressed
    /// folders, while stored folders decrypt to wrong bytes that only the
    /// CRC notices. Failures are wrapped as encrypted only in the former
    /// case, so stored folders report a plain CRC mismatch.
    pub fn folder_is_encrypted_compressed(&self, folder_index: usize) -> bool {
        let folder = &self.folders[folder_index];
        folder.is_encrypted()
            && folder.coders.iter().any(|c| {
                !matches!(
                    c.method_id.as_slice(),
                    crate::codec::method::COPY | crate::codec::method::AES
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::streams::{Coder, PackInfo, SubStreamsInfo, UnpackInfo};

    fn copy_folder(unpack_size: u64) -> Folder {
        Folder {
            coders: vec![Coder {
                method_id: vec![0x00],
                num_in_streams: 1,
                num_out_streams: 1,
                properties: None,
            }],
            bind_pairs: vec![],
            packed_streams: vec![0],
            unpack_sizes: vec![unpack_size],
            unpack_crc: None,
        }
    }

    fn start_header() -> StartHeader {
        StartHeader {
            version_major: 0,
            version_minor: 4,
            next_header_offset: 0,
            next_header_size: 0,
            next_header_crc: 0,
            base_offset: 0,
        }
    }

    fn header_with(
        pack_sizes: Vec<u64>,
        folders: Vec<Folder>,
        substreams: Option<SubStreamsInfo>,
    ) -> ArchiveHeader {
        ArchiveHeader {
            pack_info: Some(PackInfo {
                pack_pos: 0,
                pack_crcs: vec![None; pack_sizes.len()],
                pack_sizes,
            }),
            unpack_info: Some(UnpackInfo { folders }),
            substreams_info: substreams,
            files_info: None,
            header_encrypted: false,
        }
    }

    #[test]
    fn test_pack_ranges_partition_in_order() {
        let header = header_with(
            vec![10, 20],
            vec![copy_folder(10), copy_folder(20)],
            None,
        );
        let model = Model::build(&start_header(), &header).unwrap();

        // Data starts at byte 32 (no SFX stub).
        assert_eq!(
            model.folder_packs[0],
            vec![PackRange {
                offset: 32,
                size: 10
            }]
        );
        assert_eq!(
            model.folder_packs[1],
            vec![PackRange {
                offset: 42,
                size: 20
            }]
        );
        assert_eq!(model.folder_packed_size(1), 20);
        assert_eq!(model.folder_pack_offset(1), Some(42));
    }

    #[test]
    fn test_default_single_substream_per_folder() {
        let header = header_with(vec![10], vec![copy_folder(10)], None);
        let model = Model::build(&start_header(), &header).unwrap();

        assert_eq!(model.substreams.len(), 1);
        assert_eq!(model.substreams[0].size, 10);
        assert_eq!(model.substreams[0].offset_in_folder, 0);
        assert_eq!(model.folder_substreams[0], 0..1);
    }

    #[test]
    fn test_solid_folder_offsets() {
        let substreams = SubStreamsInfo {
            num_unpack_streams: vec![3],
            unpack_sizes: vec![4, 6, 10],
            digests: vec![Some(1), None, Some(3)],
        };
        let header = header_with(vec![20], vec![copy_folder(20)], Some(substreams));
        let model = Model::build(&start_header(), &header).unwrap();

        assert_eq!(model.substreams.len(), 3);
        assert_eq!(model.substreams[0].offset_in_folder, 0);
        assert_eq!(model.substreams[1].offset_in_folder, 4);
        assert_eq!(model.substreams[2].offset_in_folder, 10);
        assert_eq!(model.substreams[2].index_in_folder, 2);
        assert_eq!(model.folder_substreams[0], 0..3);
    }

    #[test]
    fn test_substreams_exceeding_folder_rejected() {
        let substreams = SubStreamsInfo {
            num_unpack_streams: vec![2],
            unpack_sizes: vec![15, 10],
            digests: vec![None, None],
        };
        let header = header_with(vec![20], vec![copy_folder(20)], Some(substreams));
        let err = Model::build(&start_header(), &header).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { .. }));
    }

    #[test]
    fn test_too_few_pack_streams_rejected() {
        let header = header_with(vec![10], vec![copy_folder(10), copy_folder(10)], None);
        let err = Model::build(&start_header(), &header).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader { .. }));
    }

    #[test]
    fn test_empty_header() {
        let model = Model::build(&start_header(), &ArchiveHeader::default()).unwrap();
        assert!(model.folders.is_empty());
        assert!(model.substreams.is_empty());
    }

    #[test]
    fn test_encrypted_compressed_classification() {
        let aes = Coder {
            method_id: vec![0x06, 0xF1, 0x07, 0x01],
            num_in_streams: 1,
            num_out_streams: 1,
            properties: None,
        };
        let copy = Coder {
            method_id: vec![0x00],
            num_in_streams: 1,
            num_out_streams: 1,
            properties: None,
        };
        let lzma2 = Coder {
            method_id: vec![0x21],
            num_in_streams: 1,
            num_out_streams: 1,
            properties: None,
        };

        let stored_encrypted = Folder {
            coders: vec![copy.clone(), aes.clone()],
            bind_pairs: vec![crate::format::streams::BindPair {
                in_index: 0,
                out_index: 1,
            }],
            packed_streams: vec![1],
            unpack_sizes: vec![16, 16],
            unpack_crc: None,
        };
        let compressed_encrypted = Folder {
            coders: vec![lzma2, aes],
            bind_pairs: vec![crate::format::streams::BindPair {
                in_index: 0,
                out_index: 1,
            }],
            packed_streams: vec![1],
            unpack_sizes: vec![16, 16],
            unpack_crc: None,
        };

        let header = header_with(
            vec![16, 16],
            vec![stored_encrypted, compressed_encrypted],
            None,
        );
        let model = Model::build(&start_header(), &header).unwrap();

        assert!(!model.folder_is_encrypted_compressed(0));
        assert!(model.folder_is_encrypted_compressed(1));
    }
}
