//! Folder graph assembly.
//!
//! A folder describes a DAG of coders: bind pairs route one coder's output
//! into another's input, unbound inputs are fed by packed streams, and the
//! single unbound output is the folder's terminal stream. The assembler
//! instantiates decoders in dependency order, producing one reader for the
//! terminal output. Everything stays streaming: no coder output is
//! materialized, each decoder pulls from its predecessors on demand.

use crate::format::streams::Folder;
use crate::password::Password;
use crate::{Error, Result};

use super::{ByteSource, build_decoder};

/// Builds the decoder graph for a folder, returning its terminal stream.
///
/// # Arguments
///
/// * `folder` - the folder record (coders, bind pairs, packed indices)
/// * `packed` - one byte source per packed stream consumed by the folder,
///   in the folder's pack order
/// * `password` - password for folders containing the 7zAES coder
///
/// # Errors
///
/// [`Error::MalformedHeader`] for inconsistent graphs (missing inputs,
/// cycles, multiple terminals), [`Error::UnsupportedMethod`] for
/// unregistered coder ids.
pub(crate) fn build_folder_decoder(
    folder: &Folder,
    packed: Vec<ByteSource>,
    password: Option<&Password>,
) -> Result<ByteSource> {
    if packed.len() != folder.packed_streams.len() {
        return Err(Error::malformed(format!(
            "folder expects {} packed streams, got {}",
            folder.packed_streams.len(),
            packed.len()
        )));
    }

    let terminal = folder.terminal_out_stream()?;

    let mut builder = GraphBuilder {
        folder,
        offsets: folder.coder_stream_offsets(),
        packed: packed.into_iter().map(Some).collect(),
        building: vec![false; folder.coders.len()],
        password,
    };

    builder.build_output(terminal)
}

struct GraphBuilder<'a> {
    folder: &'a Folder,
    /// `(first_in_stream, first_out_stream)` per coder.
    offsets: Vec<(u64, u64)>,
    /// Packed sources, taken as they are consumed.
    packed: Vec<Option<ByteSource>>,
    /// Marks coders currently on the build path; a repeat means a cycle.
    building: Vec<bool>,
    password: Option<&'a Password>,
}

impl GraphBuilder<'_> {
    /// Instantiates the coder producing the given global output stream.
    fn build_output(&mut self, out_stream: u64) -> Result<ByteSource> {
        let coder_idx = self.coder_for_output(out_stream)?;

        if self.building[coder_idx] {
            return Err(Error::malformed("cycle in folder coder graph"));
        }
        self.building[coder_idx] = true;

        let coder = &self.folder.coders[coder_idx];
        let first_in = self.offsets[coder_idx].0;

        let mut inputs: Vec<ByteSource> = Vec::with_capacity(coder.num_in_streams as usize);
        for i in 0..coder.num_in_streams {
            inputs.push(self.resolve_input(first_in + i)?);
        }

        self.building[coder_idx] = false;

        let unpack_size = self
            .folder
            .unpack_sizes
            .get(out_stream as usize)
            .copied()
            .ok_or_else(|| Error::malformed("folder is missing a coder unpack size"))?;

        let decoder = build_decoder(coder, inputs, unpack_size, self.password)?;
        Ok(Box::new(decoder))
    }

    /// Resolves one coder input to its byte source.
    fn resolve_input(&mut self, in_stream: u64) -> Result<ByteSource> {
        if let Some(bp) = self.folder.bind_pair_for_in_stream(in_stream) {
            let out_index = bp.out_index;
            return self.build_output(out_index);
        }

        if let Some(pack_idx) = self.folder.packed_index_for_in_stream(in_stream) {
            return self.packed[pack_idx]
                .take()
                .ok_or_else(|| Error::malformed("packed stream consumed twice in folder graph"));
        }

        Err(Error::malformed(format!(
            "folder input stream {} is neither bound nor packed",
            in_stream
        )))
    }

    /// Finds the coder owning the given global output stream.
    fn coder_for_output(&self, out_stream: u64) -> Result<usize> {
        for (idx, coder) in self.folder.coders.iter().enumerate() {
            let first_out = self.offsets[idx].1;
            if out_stream >= first_out && out_stream < first_out + coder.num_out_streams {
                return Ok(idx);
            }
        }
        Err(Error::malformed(format!(
            "no coder produces output stream {}",
            out_stream
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::method;
    use crate::format::streams::{BindPair, Coder};
    use std::io::{Cursor, Read};

    fn coder(method_id: &[u8], ins: u64, properties: Option<Vec<u8>>) -> Coder {
        Coder {
            method_id: method_id.to_vec(),
            num_in_streams: ins,
            num_out_streams: 1,
            properties,
        }
    }

    fn source(data: &[u8]) -> ByteSource {
        Box::new(Cursor::new(data.to_vec()))
    }

    #[test]
    fn test_single_copy_coder() {
        let folder = Folder {
            coders: vec![coder(method::COPY, 1, None)],
            bind_pairs: vec![],
            packed_streams: vec![0],
            unpack_sizes: vec![5],
            unpack_crc: None,
        };

        let mut out = build_folder_decoder(&folder, vec![source(b"hello...")], None).unwrap();
        let mut buf = Vec::new();
        out.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello");
    }

    #[cfg(feature = "lzma")]
    #[test]
    fn test_filter_chain_delta_over_copy() {
        // Coder 0 is the Delta filter (terminal), coder 1 is Copy feeding it.
        // Input stream 0 (Delta's input) is bound to output stream 1 (Copy).
        let folder = Folder {
            coders: vec![
                coder(method::DELTA, 1, Some(vec![0x00])),
                coder(method::COPY, 1, None),
            ],
            bind_pairs: vec![BindPair {
                in_index: 0,
                out_index: 1,
            }],
            packed_streams: vec![1],
            unpack_sizes: vec![4, 4],
            unpack_crc: None,
        };

        let mut out = build_folder_decoder(&folder, vec![source(&[1, 1, 1, 1])], None).unwrap();
        let mut buf = Vec::new();
        out.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_packed_count_mismatch() {
        let folder = Folder {
            coders: vec![coder(method::COPY, 1, None)],
            bind_pairs: vec![],
            packed_streams: vec![0],
            unpack_sizes: vec![5],
            unpack_crc: None,
        };

        let err = build_folder_decoder(&folder, vec![], None).err().unwrap();
        assert!(matches!(err, Error::MalformedHeader { .. }));
    }

    #[test]
    fn test_cycle_detection() {
        // Two coders feeding each other with no terminal path to packed data.
        let folder = Folder {
            coders: vec![coder(method::COPY, 1, None), coder(method::COPY, 1, None)],
            bind_pairs: vec![
                BindPair {
                    in_index: 0,
                    out_index: 1,
                },
                BindPair {
                    in_index: 1,
                    out_index: 0,
                },
            ],
            packed_streams: vec![],
            unpack_sizes: vec![4, 4],
            unpack_crc: None,
        };

        // Both outputs are bound, so terminal resolution already fails.
        let err = build_folder_decoder(&folder, vec![], None).err().unwrap();
        assert!(matches!(err, Error::MalformedHeader { .. }));
    }

    #[test]
    fn test_unknown_method_in_graph() {
        let folder = Folder {
            coders: vec![coder(&[0x7F, 0x7F], 1, None)],
            bind_pairs: vec![],
            packed_streams: vec![0],
            unpack_sizes: vec![5],
            unpack_crc: None,
        };

        let err = build_folder_decoder(&folder, vec![source(b"x")], None).err().unwrap();
        assert!(matches!(err, Error::UnsupportedMethod { .. }));
    }

    #[test]
    fn test_bcj2_identity_graph() {
        // BCJ2 fed directly by four packed streams. The main stream holds
        // no E8/E9/Jcc bytes, so decoding is the identity and the call and
        // jump streams stay untouched; the range stream only needs its
        // five initialization bytes.
        let folder = Folder {
            coders: vec![coder(method::BCJ2, 4, None)],
            bind_pairs: vec![],
            packed_streams: vec![0, 1, 2, 3],
            unpack_sizes: vec![11],
            unpack_crc: None,
        };

        let packed = vec![
            source(b"plain bytes"),
            source(&[]),
            source(&[]),
            source(&[0, 0, 0, 0, 0]),
        ];

        let mut out = build_folder_decoder(&folder, packed, None).unwrap();
        let mut buf = Vec::new();
        out.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"plain bytes");
    }
}
