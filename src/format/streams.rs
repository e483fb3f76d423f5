//! StreamsInfo structures: packed streams, folders and substreams.
//!
//! A folder is a small dataflow graph of coders. Bind pairs connect one
//! coder's output to another's input; inputs left unbound are fed by
//! packed streams, and exactly one output is left unbound per folder -
//! that output is the folder's terminal stream, which the substream layer
//! slices into files.

use std::io::Read;

use crate::{Error, Result};

use super::property_id;
use super::reader::{
    read_bytes, read_count, read_number, read_optional_bit_vector, read_u8, read_u32_le,
};

/// Limits applied while parsing archive metadata.
///
/// These guard against hostile headers: the counts below feed allocations
/// and loops, so they are bounded before use. The defaults accept any
/// realistic archive.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum number of entries (files, streams, folders).
    pub max_entries: usize,
    /// Maximum bytes consumed while parsing header data.
    pub max_header_bytes: u64,
    /// Maximum number of coders in a single folder.
    pub max_coders_per_folder: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_entries: 1_000_000,
            max_header_bytes: 64 << 20,
            max_coders_per_folder: 32,
        }
    }
}

impl Limits {
    /// Creates limits with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of entries.
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Sets the maximum header size in bytes.
    pub fn max_header_bytes(mut self, max: u64) -> Self {
        self.max_header_bytes = max;
        self
    }
}

/// Information about the packed (compressed) streams.
#[derive(Debug, Clone, Default)]
pub struct PackInfo {
    /// Position of the first packed stream, relative to byte 32.
    pub pack_pos: u64,
    /// Byte length of each packed stream.
    pub pack_sizes: Vec<u64>,
    /// Optional CRC-32 per packed stream.
    pub pack_crcs: Vec<Option<u32>>,
}

impl PackInfo {
    /// Parses PackInfo; the reader is positioned after the property id.
    pub fn parse<R: Read>(r: &mut R, limits: &Limits) -> Result<Self> {
        let pack_pos = read_number(r)?;
        let num_streams = read_count(r, limits.max_entries, "pack streams")?;

        let mut pack_sizes = Vec::with_capacity(num_streams);
        let mut pack_crcs = vec![None; num_streams];

        loop {
            let prop_id = read_u8(r)?;
            match prop_id {
                property_id::END => break,

                property_id::SIZE => {
                    for _ in 0..num_streams {
                        pack_sizes.push(read_number(r)?);
                    }
                }

                property_id::CRC => {
                    let defined = read_optional_bit_vector(r, num_streams)?;
                    for (i, &has_crc) in defined.iter().enumerate() {
                        if has_crc {
                            pack_crcs[i] = Some(read_u32_le(r)?);
                        }
                    }
                }

                _ => {
                    return Err(Error::malformed(format!(
                        "unexpected property id {:#x} in PackInfo",
                        prop_id
                    )));
                }
            }
        }

        if pack_sizes.len() != num_streams {
            return Err(Error::malformed("PackInfo is missing stream sizes"));
        }

        Ok(Self {
            pack_pos,
            pack_sizes,
            pack_crcs,
        })
    }

    /// Returns the number of packed streams.
    pub fn num_streams(&self) -> usize {
        self.pack_sizes.len()
    }

    /// Returns the total length of the packed region.
    pub fn total_packed_size(&self) -> u64 {
        self.pack_sizes.iter().sum()
    }
}

/// A single coder within a folder.
#[derive(Debug, Clone)]
pub struct Coder {
    /// Method id bytes (1-4 bytes in practice).
    pub method_id: Vec<u8>,
    /// Number of input streams.
    pub num_in_streams: u64,
    /// Number of output streams.
    pub num_out_streams: u64,
    /// Coder properties (dictionary sizes, salt/IV, filter distance).
    pub properties: Option<Vec<u8>>,
}

impl Coder {
    /// Returns the method id packed little-endian into a u64.
    ///
    /// Used for error reporting; comparisons use the byte slices.
    pub fn method_id_u64(&self) -> u64 {
        let mut result = 0u64;
        for (i, &byte) in self.method_id.iter().take(8).enumerate() {
            result |= (byte as u64) << (8 * i);
        }
        result
    }
}

/// A directed edge in the folder graph.
///
/// Connects the producer's output stream `out_index` to the consumer's
/// input stream `in_index`. Both indices are global across the folder's
/// coders in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindPair {
    /// Global index of the consuming input stream.
    pub in_index: u64,
    /// Global index of the producing output stream.
    pub out_index: u64,
}

/// A folder: coders, bind pairs and the packed streams feeding them.
#[derive(Debug, Clone)]
pub struct Folder {
    /// Coders in declaration order.
    pub coders: Vec<Coder>,
    /// Edges connecting coder outputs to coder inputs.
    pub bind_pairs: Vec<BindPair>,
    /// For each packed stream consumed by this folder (in pack order),
    /// the global input stream index it feeds.
    pub packed_streams: Vec<u64>,
    /// Unpacked size per coder output stream, in global output order.
    pub unpack_sizes: Vec<u64>,
    /// Optional CRC-32 of the terminal output.
    pub unpack_crc: Option<u32>,
}

impl Folder {
    /// Parses a single folder record.
    fn parse<R: Read>(r: &mut R, limits: &Limits) -> Result<Self> {
        let num_coders = read_count(r, limits.max_coders_per_folder, "coders in folder")?;
        if num_coders == 0 {
            return Err(Error::malformed("folder with no coders"));
        }

        let mut coders = Vec::with_capacity(num_coders);
        let mut total_in_streams = 0u64;
        let mut total_out_streams = 0u64;

        for _ in 0..num_coders {
            let flags = read_u8(r)?;

            let method_id_size = (flags & 0x0F) as usize;
            let is_complex = (flags & 0x10) != 0;
            let has_attributes = (flags & 0x20) != 0;

            let method_id = read_bytes(r, method_id_size)?;

            let (num_in_streams, num_out_streams) = if is_complex {
                (read_number(r)?, read_number(r)?)
            } else {
                (1, 1)
            };

            let properties = if has_attributes {
                let props_size = read_number(r)?;
                if props_size > limits.max_header_bytes {
                    return Err(Error::ResourceLimitExceeded(
                        "coder properties too large".into(),
                    ));
                }
                Some(read_bytes(r, props_size as usize)?)
            } else {
                None
            };

            total_in_streams += num_in_streams;
            total_out_streams += num_out_streams;

            coders.push(Coder {
                method_id,
                num_in_streams,
                num_out_streams,
                properties,
            });
        }

        // There is always exactly one fewer bind pair than output streams:
        // every output except the terminal one feeds another coder.
        let num_bind_pairs = total_out_streams.saturating_sub(1);
        let mut bind_pairs = Vec::with_capacity(num_bind_pairs as usize);

        for i in 0..num_bind_pairs {
            let in_index = read_number(r)?;
            let out_index = read_number(r)?;

            if in_index >= total_in_streams {
                return Err(Error::malformed(format!(
                    "bind pair {} input index {} exceeds input stream count {}",
                    i, in_index, total_in_streams
                )));
            }
            if out_index >= total_out_streams {
                return Err(Error::malformed(format!(
                    "bind pair {} output index {} exceeds output stream count {}",
                    i, out_index, total_out_streams
                )));
            }

            bind_pairs.push(BindPair {
                in_index,
                out_index,
            });
        }

        // Inputs not fed by a bind pair are fed by packed streams. With a
        // single packed input its index is implicit; otherwise the indices
        // are listed explicitly.
        let num_packed = total_in_streams.saturating_sub(num_bind_pairs);
        let mut packed_streams = Vec::with_capacity(num_packed as usize);

        if num_packed == 1 {
            let mut bound = vec![false; total_in_streams as usize];
            for bp in &bind_pairs {
                bound[bp.in_index as usize] = true;
            }
            match bound.iter().position(|&b| !b) {
                Some(idx) => packed_streams.push(idx as u64),
                None => return Err(Error::malformed("folder has no unbound input stream")),
            }
        } else {
            for _ in 0..num_packed {
                let idx = read_number(r)?;
                if idx >= total_in_streams {
                    return Err(Error::malformed(format!(
                        "packed stream input index {} exceeds input stream count {}",
                        idx, total_in_streams
                    )));
                }
                packed_streams.push(idx);
            }
        }

        Ok(Self {
            coders,
            bind_pairs,
            packed_streams,
            unpack_sizes: Vec::new(),
            unpack_crc: None,
        })
    }

    /// Returns the total number of input streams across all coders.
    pub fn total_in_streams(&self) -> u64 {
        self.coders.iter().map(|c| c.num_in_streams).sum()
    }

    /// Returns the total number of output streams across all coders.
    pub fn total_out_streams(&self) -> u64 {
        self.coders.iter().map(|c| c.num_out_streams).sum()
    }

    /// Returns `(first_in_stream, first_out_stream)` per coder.
    ///
    /// Global stream indices are assigned to coders in declaration order;
    /// these offsets translate between global indices and coder positions.
    pub fn coder_stream_offsets(&self) -> Vec<(u64, u64)> {
        let mut result = Vec::with_capacity(self.coders.len());
        let mut in_offset = 0u64;
        let mut out_offset = 0u64;

        for coder in &self.coders {
            result.push((in_offset, out_offset));
            in_offset += coder.num_in_streams;
            out_offset += coder.num_out_streams;
        }

        result
    }

    /// Returns the global index of the terminal output stream.
    ///
    /// The terminal output is the single coder output that no bind pair
    /// consumes as its producer side.
    pub fn terminal_out_stream(&self) -> Result<u64> {
        let total_out = self.total_out_streams();
        let mut consumed = vec![false; total_out as usize];
        for bp in &self.bind_pairs {
            consumed[bp.out_index as usize] = true;
        }

        let mut terminal = None;
        for (idx, &used) in consumed.iter().enumerate() {
            if !used {
                if terminal.is_some() {
                    return Err(Error::malformed("folder has multiple terminal outputs"));
                }
                terminal = Some(idx as u64);
            }
        }

        terminal.ok_or_else(|| Error::malformed("folder has no terminal output"))
    }

    /// Returns the unpacked size of the terminal output.
    pub fn unpack_size(&self) -> Result<u64> {
        let terminal = self.terminal_out_stream()? as usize;
        self.unpack_sizes
            .get(terminal)
            .copied()
            .ok_or_else(|| Error::malformed("folder is missing terminal unpack size"))
    }

    /// Returns the coder owning the terminal output stream.
    pub fn terminal_coder(&self) -> Result<&Coder> {
        let terminal = self.terminal_out_stream()?;
        let offsets = self.coder_stream_offsets();
        for (idx, coder) in self.coders.iter().enumerate() {
            let first_out = offsets[idx].1;
            if terminal >= first_out && terminal < first_out + coder.num_out_streams {
                return Ok(coder);
            }
        }
        Err(Error::malformed("terminal output has no owning coder"))
    }

    /// Finds the bind pair feeding the given global input stream, if any.
    pub fn bind_pair_for_in_stream(&self, in_stream: u64) -> Option<&BindPair> {
        self.bind_pairs.iter().find(|bp| bp.in_index == in_stream)
    }

    /// Returns the folder-local pack position feeding the given input.
    ///
    /// The position indexes into this folder's slice of the global packed
    /// stream list.
    pub fn packed_index_for_in_stream(&self, in_stream: u64) -> Option<usize> {
        self.packed_streams.iter().position(|&ps| ps == in_stream)
    }

    /// Checks this folder's packed stream count against PackInfo.
    pub fn validate_packed_streams(&self, available: usize) -> Result<()> {
        if self.packed_streams.len() > available {
            return Err(Error::malformed(format!(
                "folder consumes {} packed streams but only {} remain",
                self.packed_streams.len(),
                available
            )));
        }
        Ok(())
    }

    /// Returns `true` if any coder in this folder is the 7zAES coder.
    pub fn is_encrypted(&self) -> bool {
        self.coders
            .iter()
            .any(|c| c.method_id.as_slice() == crate::codec::method::AES)
    }

    /// Returns `true` if the graph is exactly one Copy coder.
    ///
    /// Such folders store their data verbatim: the packed bytes are the
    /// file bytes, so callers may read them directly at the packed offset.
    pub fn is_copy_only(&self) -> bool {
        self.coders.len() == 1 && self.coders[0].method_id.as_slice() == crate::codec::method::COPY
    }
}

/// CodersInfo: the folder definitions.
#[derive(Debug, Clone, Default)]
pub struct UnpackInfo {
    /// Folder records in archive order.
    pub folders: Vec<Folder>,
}

impl UnpackInfo {
    /// Parses UnpackInfo; the reader is positioned after the property id.
    pub fn parse<R: Read>(r: &mut R, limits: &Limits) -> Result<Self> {
        let mut folders = Vec::new();

        loop {
            let prop_id = read_u8(r)?;
            match prop_id {
                property_id::END => break,

                property_id::FOLDER => {
                    let num_folders = read_count(r, limits.max_entries, "folders")?;

                    let external = read_u8(r)?;
                    if external != 0 {
                        return Err(Error::malformed("external folder definitions"));
                    }

                    for _ in 0..num_folders {
                        folders.push(Folder::parse(r, limits)?);
                    }
                }

                property_id::CODERS_UNPACK_SIZE => {
                    for folder in &mut folders {
                        let num_sizes = folder.total_out_streams() as usize;
                        folder.unpack_sizes = Vec::with_capacity(num_sizes);
                        for _ in 0..num_sizes {
                            folder.unpack_sizes.push(read_number(r)?);
                        }
                    }
                }

                property_id::CRC => {
                    let defined = read_optional_bit_vector(r, folders.len())?;
                    for (folder, &has_crc) in folders.iter_mut().zip(defined.iter()) {
                        if has_crc {
                            folder.unpack_crc = Some(read_u32_le(r)?);
                        }
                    }
                }

                _ => {
                    return Err(Error::malformed(format!(
                        "unexpected property id {:#x} in UnpackInfo",
                        prop_id
                    )));
                }
            }
        }

        // Every folder must resolve to exactly one terminal output.
        for folder in &folders {
            folder.terminal_out_stream()?;
        }

        Ok(Self { folders })
    }

    /// Returns the number of folders.
    pub fn num_folders(&self) -> usize {
        self.folders.len()
    }
}

/// SubStreamsInfo: how folder outputs are sliced into files.
#[derive(Debug, Clone, Default)]
pub struct SubStreamsInfo {
    /// Number of substreams (files) per folder.
    pub num_unpack_streams: Vec<u64>,
    /// Unpacked size per substream, across all folders in order.
    pub unpack_sizes: Vec<u64>,
    /// Optional CRC-32 per substream, across all folders in order.
    pub digests: Vec<Option<u32>>,
}

impl SubStreamsInfo {
    /// Parses SubStreamsInfo; the reader is positioned after the property id.
    pub fn parse<R: Read>(r: &mut R, folders: &[Folder], limits: &Limits) -> Result<Self> {
        let num_folders = folders.len();

        // Default when NUM_UNPACK_STREAM is absent: one file per folder.
        let mut num_unpack_streams = vec![1u64; num_folders];
        let mut unpack_sizes = Vec::new();
        let mut digests = Vec::new();

        loop {
            let prop_id = read_u8(r)?;
            match prop_id {
                property_id::END => break,

                property_id::NUM_UNPACK_STREAM => {
                    for count in num_unpack_streams.iter_mut() {
                        *count = read_number(r)?;
                    }
                    let total: u64 = num_unpack_streams.iter().sum();
                    if total > limits.max_entries as u64 {
                        return Err(Error::ResourceLimitExceeded(format!(
                            "too many substreams: {}",
                            total
                        )));
                    }
                }

                property_id::SIZE => {
                    // Per folder, n-1 sizes are stored; the last substream
                    // takes whatever remains of the folder output.
                    for (folder_idx, &count) in num_unpack_streams.iter().enumerate() {
                        if count == 0 {
                            continue;
                        }

                        let folder_size = folders[folder_idx].unpack_size()?;
                        let mut remaining = folder_size;

                        for _ in 0..count - 1 {
                            let size = read_number(r)?;
                            unpack_sizes.push(size);
                            remaining = remaining.checked_sub(size).ok_or_else(|| {
                                Error::malformed("substream sizes exceed folder output size")
                            })?;
                        }

                        unpack_sizes.push(remaining);
                    }
                }

                property_id::CRC => {
                    // Substreams covered by a folder-level CRC (single
                    // substream in a folder that has one) are skipped in
                    // the stored digest list.
                    let mut needing_crc = 0usize;
                    for (folder_idx, &count) in num_unpack_streams.iter().enumerate() {
                        if folders[folder_idx].unpack_crc.is_none() || count != 1 {
                            needing_crc += count as usize;
                        }
                    }

                    let defined = read_optional_bit_vector(r, needing_crc)?;
                    let mut defined_iter = defined.iter();

                    for (folder_idx, &count) in num_unpack_streams.iter().enumerate() {
                        let folder = &folders[folder_idx];

                        if folder.unpack_crc.is_some() && count == 1 {
                            digests.push(folder.unpack_crc);
                        } else {
                            for _ in 0..count {
                                let has_crc = defined_iter.next().copied().unwrap_or(false);
                                if has_crc {
                                    digests.push(Some(read_u32_le(r)?));
                                } else {
                                    digests.push(None);
                                }
                            }
                        }
                    }
                }

                _ => {
                    return Err(Error::malformed(format!(
                        "unexpected property id {:#x} in SubStreamsInfo",
                        prop_id
                    )));
                }
            }
        }

        // Without a SIZE block each folder holds exactly one substream of
        // the folder's full output size.
        if unpack_sizes.is_empty() {
            for (folder_idx, &count) in num_unpack_streams.iter().enumerate() {
                if count == 1 {
                    unpack_sizes.push(folders[folder_idx].unpack_size()?);
                } else if count != 0 {
                    return Err(Error::malformed(
                        "multiple substreams per folder but no substream sizes",
                    ));
                }
            }
        }

        // Without a CRC block, single-substream folders inherit the folder
        // CRC; everything else has none.
        if digests.is_empty() {
            for (folder_idx, &count) in num_unpack_streams.iter().enumerate() {
                if count == 1 {
                    digests.push(folders[folder_idx].unpack_crc);
                } else {
                    for _ in 0..count {
                        digests.push(None);
                    }
                }
            }
        }

        Ok(Self {
            num_unpack_streams,
            unpack_sizes,
            digests,
        })
    }

    /// Returns the total number of substreams.
    pub fn total_streams(&self) -> u64 {
        self.num_unpack_streams.iter().sum()
    }
}
