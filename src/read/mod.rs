//! Archive opening and the reading API.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::io::Read;
//! use unseven::Archive;
//!
//! # fn main() -> unseven::Result<()> {
//! let archive = Archive::open("archive.7z")?;
//! for file in archive.files() {
//!     let mut reader = file.open()?;
//!     let mut content = Vec::new();
//!     reader.read_to_end(&mut content)?;
//!     println!("{}: {} bytes", file.name, content.len());
//! }
//! # Ok(())
//! # }
//! ```

mod cursor;
mod entries;
mod file;
mod model;
mod offsets;

use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::format::header::find_signature;
use crate::format::parser::HeaderParser;
use crate::format::streams::Limits;
use crate::password::Password;
use crate::volume::{ReadAt, SourceCursor, StreamSource, VolumeSource};
use crate::{Error, Result};

use cursor::FolderCursor;
use model::Model;

pub use file::{File, FileReader};
pub use offsets::FileInfo;

/// Shared state behind an open archive.
///
/// Immutable after open except for the cursor cache and the closed flag.
pub(crate) struct ArchiveInner {
    pub(crate) source: Arc<dyn ReadAt>,
    pub(crate) password: Option<Password>,
    pub(crate) model: Model,
    /// At most one cached cursor per folder; `None` while a handle
    /// borrows it or before anything was decoded.
    cursors: Mutex<Vec<Option<FolderCursor>>>,
    closed: AtomicBool,
}

impl ArchiveInner {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Borrows the folder's cached cursor, if available.
    pub(crate) fn take_cursor(&self, folder_index: usize) -> Option<FolderCursor> {
        if self.is_closed() {
            return None;
        }
        let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        cursors[folder_index].take()
    }

    /// Returns a cursor to the cache.
    ///
    /// If another handle already parked a cursor for the folder, the
    /// incoming one is dropped; both sit at valid boundaries and one is
    /// enough.
    pub(crate) fn return_cursor(&self, cursor: FolderCursor) {
        if self.is_closed() {
            return;
        }
        let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        let slot = &mut cursors[cursor.folder_index];
        if slot.is_none() {
            *slot = Some(cursor);
        }
    }

    fn drop_cursors(&self) {
        let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        for slot in cursors.iter_mut() {
            *slot = None;
        }
    }
}

/// An open 7z archive.
///
/// Created by [`Archive::open`] and friends; immutable afterwards. File
/// contents are read through [`File::open`] handles, which may be used
/// from multiple threads (handles into the same folder serialize on the
/// shared folder cursor, falling back to independent decoding).
pub struct Archive {
    inner: Arc<ArchiveInner>,
    files: Vec<File>,
    volumes: Vec<PathBuf>,
}

impl Archive {
    /// Opens an archive from a path.
    ///
    /// A path ending in `.7z.001` (case-insensitive) opens the whole
    /// volume set; `.exe` self-extracting archives are handled by
    /// scanning for the embedded signature.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_path_internal(path.as_ref(), None)
    }

    /// Opens an encrypted archive from a path.
    pub fn open_with_password(
        path: impl AsRef<Path>,
        password: impl Into<Password>,
    ) -> Result<Self> {
        Self::open_path_internal(path.as_ref(), Some(password.into()))
    }

    /// Opens an archive from a seekable stream of the given size.
    ///
    /// # Errors
    ///
    /// [`Error::NegativeSize`] when `size` is negative.
    pub fn open_stream<R>(reader: R, size: i64) -> Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        Self::open_stream_internal(reader, size, None)
    }

    /// Opens an encrypted archive from a seekable stream.
    pub fn open_stream_with_password<R>(
        reader: R,
        size: i64,
        password: impl Into<Password>,
    ) -> Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        Self::open_stream_internal(reader, size, Some(password.into()))
    }

    fn open_path_internal(path: &Path, password: Option<Password>) -> Result<Self> {
        let source = VolumeSource::open(path)?;
        let volumes = source.paths();
        Self::open_source(Arc::new(source), volumes, password)
    }

    fn open_stream_internal<R>(reader: R, size: i64, password: Option<Password>) -> Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        if size < 0 {
            return Err(Error::NegativeSize);
        }
        let source = StreamSource::new(reader, size as u64);
        Self::open_source(Arc::new(source), Vec::new(), password)
    }

    fn open_source(
        source: Arc<dyn ReadAt>,
        volumes: Vec<PathBuf>,
        password: Option<Password>,
    ) -> Result<Self> {
        // Locate the signature; non-zero offsets mean an SFX stub.
        let mut cursor = SourceCursor::new(source.clone());
        let base_offset = find_signature(&mut cursor)?
            .ok_or_else(|| Error::malformed("no 7z signature found"))?;

        let limits = Limits::default();
        let parser = HeaderParser::new(&limits, password.as_ref());
        let (start_header, header) = parser.parse(&source, base_offset)?;

        let model = Model::build(&start_header, &header)?;
        let num_folders = model.folders.len();

        let inner = Arc::new(ArchiveInner {
            source,
            password,
            model,
            cursors: Mutex::new((0..num_folders).map(|_| None).collect()),
            closed: AtomicBool::new(false),
        });

        let files = entries::build_files(&inner, &header)?;

        Ok(Self {
            inner,
            files,
            volumes,
        })
    }

    /// Returns the archive members in archive order.
    pub fn files(&self) -> &[File] {
        &self.files
    }

    /// Returns the on-disk volume paths, in order.
    ///
    /// Empty for archives opened from a stream.
    pub fn volumes(&self) -> &[PathBuf] {
        &self.volumes
    }

    /// Returns whether reading the header required the password.
    pub fn has_encrypted_header(&self) -> bool {
        self.inner.model.header_encrypted
    }

    /// Closes the archive.
    ///
    /// All cached decode state is dropped; reads on outstanding file
    /// handles fail with [`Error::Closed`]. Dropping the archive has the
    /// same effect.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.drop_cursors();
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("files", &self.files.len())
            .field("folders", &self.inner.model.folders.len())
            .field("volumes", &self.volumes)
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}
