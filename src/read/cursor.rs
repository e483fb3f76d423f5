//! The shared folder cursor.
//!
//! Substreams are sequential slices of a folder's terminal output, so
//! extracting files in natural order only needs each output byte once.
//! A [`FolderCursor`] is the folder's decode state: the instantiated
//! coder graph plus the position within the output, always parked at a
//! substream boundary when cached. At most one cursor per folder lives in
//! the archive's cache; a handle that cannot use it (position already
//! past its substream, or another handle holds it) builds a fresh graph
//! instead, which is the correct but slower fallback.

use std::sync::Arc;

use crc32fast::Hasher;

use crate::codec::ByteSource;
use crate::codec::graph::build_folder_decoder;
use crate::password::Password;
use crate::volume::{ReadAt, Section};
use crate::{Error, Result};

use super::model::Model;

/// Scratch buffer size for discarding skipped output.
const SKIP_BUFFER_SIZE: usize = 8192;

/// Decode state for one folder, positioned at a substream boundary.
pub(crate) struct FolderCursor {
    /// The folder this cursor belongs to.
    pub folder_index: usize,
    /// Folder-local index of the next unread substream.
    pub next_substream: usize,
    /// Terminal output stream of the instantiated coder graph.
    decoder: ByteSource,
    /// CRC over every terminal byte produced so far.
    folder_hasher: Hasher,
    /// Number of terminal bytes produced so far.
    produced: u64,
}

impl FolderCursor {
    /// Instantiates a fresh coder graph for the folder.
    ///
    /// The cursor starts at output offset zero, positioned before the
    /// folder's first substream.
    pub fn build(
        model: &Model,
        source: &Arc<dyn ReadAt>,
        password: Option<&Password>,
        folder_index: usize,
    ) -> Result<Self> {
        let folder = &model.folders[folder_index];

        let packed: Vec<ByteSource> = model.folder_packs[folder_index]
            .iter()
            .map(|range| {
                Box::new(Section::new(source.clone(), range.offset, range.size)) as ByteSource
            })
            .collect();

        let decoder = build_folder_decoder(folder, packed, password)?;

        Ok(Self {
            folder_index,
            next_substream: 0,
            decoder,
            folder_hasher: Hasher::new(),
            produced: 0,
        })
    }

    /// Reads terminal output bytes, tracking the folder CRC.
    pub fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.decoder.read(buf)?;
        self.folder_hasher.update(&buf[..n]);
        self.produced += n as u64;
        Ok(n)
    }

    /// Reads and discards exactly `count` bytes of terminal output.
    pub fn skip(&mut self, mut count: u64) -> Result<()> {
        let mut buf = [0u8; SKIP_BUFFER_SIZE];
        while count > 0 {
            let want = (count.min(buf.len() as u64)) as usize;
            let n = self.read(&mut buf[..want])?;
            if n == 0 {
                return Err(Error::malformed(
                    "folder output ended before its declared size",
                ));
            }
            count -= n as u64;
        }
        Ok(())
    }

    /// Advances the cursor past whole substreams up to `target`.
    ///
    /// The skipped substreams' CRCs are not checked; they were not asked
    /// for.
    pub fn advance_to(&mut self, model: &Model, target: usize) -> Result<()> {
        debug_assert!(self.next_substream <= target);

        let range = model.folder_substreams[self.folder_index].clone();
        while self.next_substream < target {
            let substream = &model.substreams[range.start + self.next_substream];
            self.skip(substream.size)?;
            self.next_substream += 1;
        }
        Ok(())
    }

    /// Verifies the folder-level CRC if the output is fully drained.
    ///
    /// Substream slicing may leave an implicit discard tail, in which
    /// case the terminal output was never fully produced and the check
    /// does not apply.
    pub fn verify_folder_crc(&self, model: &Model) -> Result<()> {
        let folder = &model.folders[self.folder_index];
        let Some(expected) = folder.unpack_crc else {
            return Ok(());
        };

        if self.produced != folder.unpack_size()? {
            return Ok(());
        }

        let actual = self.folder_hasher.clone().finalize();
        if actual != expected {
            return Err(Error::crc_mismatch(None, expected, actual));
        }
        Ok(())
    }
}

impl std::fmt::Debug for FolderCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderCursor")
            .field("folder_index", &self.folder_index)
            .field("next_substream", &self.next_substream)
            .field("produced", &self.produced)
            .finish()
    }
}
