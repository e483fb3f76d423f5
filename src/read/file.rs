//! Per-file views and the streaming file reader.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::SystemTime;

use crc32fast::Hasher;

use crate::timestamp::Timestamp;
use crate::{Error, Result};

use super::ArchiveInner;
use super::cursor::FolderCursor;

/// A member of an archive.
///
/// Holds the entry metadata and a shared reference to the archive, so a
/// `File` can be kept and opened independently of the [`Archive`] value
/// it came from.
///
/// [`Archive`]: super::Archive
#[derive(Clone)]
pub struct File {
    pub(crate) inner: Arc<ArchiveInner>,
    /// Global substream index for entries with a data stream.
    pub(crate) substream: Option<usize>,

    /// Path within the archive (forward slashes).
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Recorded CRC-32 of the content, when present.
    pub crc32: Option<u32>,
    /// Whether this entry is a directory.
    pub is_directory: bool,
    /// Whether this is an anti-item (deletion marker).
    pub is_anti: bool,
    /// Whether the entry's folder uses the 7zAES coder.
    pub is_encrypted: bool,
    /// Windows file attributes.
    pub attributes: Option<u32>,
    /// Modification time.
    pub modification_time: Option<Timestamp>,
    /// Creation time.
    pub creation_time: Option<Timestamp>,
    /// Access time.
    pub access_time: Option<Timestamp>,
}

impl File {
    /// Returns `true` for entries that are not directories.
    pub fn is_file(&self) -> bool {
        !self.is_directory
    }

    /// Returns `true` for entries without a data stream of their own.
    ///
    /// Directories and zero-length files do not occupy a substream.
    pub fn is_empty_stream(&self) -> bool {
        self.substream.is_none()
    }

    /// Returns the recorded checksum.
    ///
    /// # Errors
    ///
    /// [`Error::ChecksumUnavailable`] if the archive recorded none.
    pub fn checksum(&self) -> Result<u32> {
        self.crc32.ok_or(Error::ChecksumUnavailable)
    }

    /// Returns the modification time as `SystemTime`.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modification_time.map(|t| t.as_system_time())
    }

    /// Returns the creation time as `SystemTime`.
    pub fn created(&self) -> Option<SystemTime> {
        self.creation_time.map(|t| t.as_system_time())
    }

    /// Returns the access time as `SystemTime`.
    pub fn accessed(&self) -> Option<SystemTime> {
        self.access_time.map(|t| t.as_system_time())
    }

    /// Opens the member for reading.
    ///
    /// Each call returns an independent reader producing the member's
    /// bytes from the start, with CRC verification at end of stream.
    /// Sequential opens in archive order reuse the shared folder cursor;
    /// out-of-order opens decode the folder again from its start.
    pub fn open(&self) -> Result<FileReader> {
        if self.inner.is_closed() {
            return Err(Error::Closed);
        }

        Ok(FileReader::new(self))
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("crc32", &self.crc32)
            .field("is_directory", &self.is_directory)
            .field("is_encrypted", &self.is_encrypted)
            .finish_non_exhaustive()
    }
}

/// Reader state, advancing `Idle -> Reading -> Drained` with `Failed`
/// and `Closed` as terminal states.
enum State {
    Idle,
    Reading(FolderCursor),
    Drained,
    Failed(Error),
    Closed,
}

/// A streaming reader over one archive member.
///
/// Errors surfaced while reading stick: once a read fails, every further
/// read reports the same condition. Dropping the reader advances the
/// shared folder cursor to the end of this member's substream so the next
/// member in order can continue from the cached decode state.
pub struct FileReader {
    inner: Arc<ArchiveInner>,
    /// Global substream index; `None` for entries without a stream.
    substream: Option<usize>,
    name: String,
    remaining: u64,
    expected_crc: Option<u32>,
    size: u64,
    hasher: Hasher,
    /// Whether errors should be wrapped as [`Error::Encrypted`].
    encrypted_compressed: bool,
    state: State,
}

impl FileReader {
    fn new(file: &File) -> Self {
        let encrypted_compressed = file
            .substream
            .map(|s| {
                let folder = file.inner.model.substreams[s].folder_index;
                file.inner.model.folder_is_encrypted_compressed(folder)
            })
            .unwrap_or(false);

        Self {
            inner: file.inner.clone(),
            substream: file.substream,
            name: file.name.clone(),
            remaining: file.size,
            expected_crc: file.crc32,
            size: file.size,
            hasher: Hasher::new(),
            encrypted_compressed,
            state: State::Idle,
        }
    }

    /// Applies the encrypted-folder wrapping policy to an error.
    fn classify(&self, err: Error) -> Error {
        match err {
            Error::PasswordRequired | Error::Closed => err,
            other if self.encrypted_compressed => Error::encrypted(other),
            other => other,
        }
    }

    /// Acquires a cursor positioned at the start of our substream.
    fn acquire_cursor(&self) -> Result<FolderCursor> {
        let substream_idx = self.substream.expect("entries without streams never acquire");
        let model = &self.inner.model;
        let substream = &model.substreams[substream_idx];
        let target = substream.index_in_folder;

        if let Some(mut cursor) = self.inner.take_cursor(substream.folder_index) {
            if cursor.next_substream == target {
                return Ok(cursor);
            }
            if cursor.next_substream < target {
                cursor.advance_to(model, target)?;
                return Ok(cursor);
            }
            // The cached cursor is already past us; only a fresh graph
            // can seek backwards.
        }

        let mut cursor = FolderCursor::build(
            model,
            &self.inner.source,
            self.inner.password.as_ref(),
            substream.folder_index,
        )?;
        cursor.advance_to(model, target)?;
        Ok(cursor)
    }

    /// Verifies this substream's CRC and releases the cursor.
    fn finish(&mut self, mut cursor: FolderCursor) -> Result<()> {
        let actual = self.hasher.clone().finalize();

        match self.expected_crc {
            // A recorded CRC of zero on a non-empty member means the
            // writer stored no checksum; accept the data as-is.
            Some(0) if self.size > 0 && actual != 0 => {
                log::warn!("archive member '{}' has no CRC", self.name);
            }
            Some(expected) if expected != actual => {
                return Err(Error::crc_mismatch(Some(self.name.clone()), expected, actual));
            }
            _ => {}
        }

        cursor.next_substream += 1;
        cursor.verify_folder_crc(&self.inner.model)?;
        self.inner.return_cursor(cursor);
        Ok(())
    }

    /// Records a failure and returns it.
    fn fail(&mut self, err: Error) -> Error {
        let err = self.classify(err);
        self.state = State::Failed(err.replicate());
        err
    }

    /// Completes the substream: verify, release the cursor, drain.
    fn complete(&mut self) -> Result<()> {
        let State::Reading(cursor) = std::mem::replace(&mut self.state, State::Drained) else {
            unreachable!("only called in the reading state");
        };
        self.finish(cursor).map_err(|e| self.fail(e))
    }

    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.inner.is_closed() {
            self.state = State::Failed(Error::Closed);
            return Err(Error::Closed);
        }

        match &self.state {
            State::Drained => return Ok(0),
            State::Failed(e) => return Err(e.replicate()),
            State::Closed => return Err(Error::Closed),
            State::Idle | State::Reading(_) => {}
        }

        if matches!(self.state, State::Idle) {
            if self.substream.is_none() {
                self.state = State::Drained;
                return Ok(0);
            }
            match self.acquire_cursor() {
                Ok(cursor) => self.state = State::Reading(cursor),
                Err(e) => return Err(self.fail(e)),
            }
        }

        // Zero-length substreams still advance the shared cursor.
        if self.remaining == 0 {
            self.complete()?;
            return Ok(0);
        }

        if buf.is_empty() {
            return Ok(0);
        }

        let State::Reading(cursor) = &mut self.state else {
            unreachable!("state transitions above leave us reading");
        };

        let want = (self.remaining.min(buf.len() as u64)) as usize;
        let n = match cursor.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(self.fail(Error::malformed(
                    "folder output ended before the end of the substream",
                )));
            }
            Ok(n) => n,
            Err(e) => {
                let e = map_read_error(e);
                return Err(self.fail(e));
            }
        };

        self.hasher.update(&buf[..n]);
        self.remaining -= n as u64;

        // Verify at the moment the stream completes so a CRC mismatch
        // fails this read, not a later one.
        if self.remaining == 0 {
            self.complete()?;
        }

        Ok(n)
    }

    /// Closes the reader.
    ///
    /// If the member was not fully read, the rest of its substream is
    /// decoded and discarded so the shared cursor lands on the next
    /// substream boundary for the following member.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Reading(mut cursor) => {
                if self.remaining > 0 && cursor.skip(self.remaining).is_err() {
                    // Broken decode state; the cursor is not reusable.
                    return Ok(());
                }
                self.remaining = 0;
                cursor.next_substream += 1;
                self.inner.return_cursor(cursor);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_inner(buf).map_err(io::Error::other)
    }
}

impl Drop for FileReader {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for FileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Idle => "Idle",
            State::Reading(_) => "Reading",
            State::Drained => "Drained",
            State::Failed(_) => "Failed",
            State::Closed => "Closed",
        };
        f.debug_struct("FileReader")
            .field("name", &self.name)
            .field("remaining", &self.remaining)
            .field("state", &state)
            .finish()
    }
}

/// Recovers a crate error smuggled through an `io::Error` by a decoder.
pub(crate) fn map_read_error(err: io::Error) -> Error {
    match err.downcast::<Error>() {
        Ok(inner) => inner,
        Err(err) => Error::Io(err),
    }
}
