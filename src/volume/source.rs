//! Concrete archive byte sources.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{Error, Result};

use super::ReadAt;

/// A seekable view over one or more on-disk volume files.
///
/// Volumes beyond the first follow the numeric suffix convention: opening
/// `archive.7z.001` discovers `.002`, `.003`, ... until a missing file.
/// The logical byte sequence is their concatenation; the volume list and
/// sizes are computed once at open and never re-checked during reads.
pub struct VolumeSource {
    /// `(path, size)` per volume, in order.
    volumes: Vec<(PathBuf, u64)>,
    /// Lazily opened handles, indexed like `volumes`.
    handles: Mutex<Vec<Option<File>>>,
    total_size: u64,
}

impl VolumeSource {
    /// Opens a source for the given path.
    ///
    /// A path ending in `.7z.001` (case-insensitive) triggers volume
    /// discovery; any other path is treated as a single-file archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match multivolume_base(path) {
            Some(base) => Self::open_volumes(&base),
            None => Self::open_single(path),
        }
    }

    /// Opens a single-file archive.
    fn open_single(path: &Path) -> Result<Self> {
        let size = std::fs::metadata(path)?.len();
        Ok(Self {
            volumes: vec![(path.to_path_buf(), size)],
            handles: Mutex::new(vec![None]),
            total_size: size,
        })
    }

    /// Discovers and opens all volumes for a base path (without suffix).
    fn open_volumes(base: &Path) -> Result<Self> {
        let mut volumes = Vec::new();
        let mut total = 0u64;

        for index in 1u32.. {
            let path = volume_path(base, index);
            match std::fs::metadata(&path) {
                Ok(meta) => {
                    total += meta.len();
                    volumes.push((path, meta.len()));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => break,
                Err(e) => return Err(Error::Io(e)),
            }
        }

        if volumes.is_empty() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no volumes found for {}", base.display()),
            )));
        }

        let count = volumes.len();
        Ok(Self {
            volumes,
            handles: Mutex::new((0..count).map(|_| None).collect()),
            total_size: total,
        })
    }

    /// Returns the ordered volume paths.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.volumes.iter().map(|(p, _)| p.clone()).collect()
    }

    /// Returns the number of volumes.
    pub fn num_volumes(&self) -> usize {
        self.volumes.len()
    }

    /// Maps a logical position to `(volume index, offset within volume)`.
    fn locate(&self, pos: u64) -> (usize, u64) {
        let mut remaining = pos;
        for (idx, &(_, size)) in self.volumes.iter().enumerate() {
            if remaining < size {
                return (idx, remaining);
            }
            remaining -= size;
        }
        (self.volumes.len(), 0)
    }
}

impl ReadAt for VolumeSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.total_size || buf.is_empty() {
            return Ok(0);
        }

        let (mut vol_idx, mut vol_off) = self.locate(offset);
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());

        let mut filled = 0usize;
        while filled < buf.len() && vol_idx < self.volumes.len() {
            let vol_size = self.volumes[vol_idx].1;
            let left_in_volume = vol_size - vol_off;

            if left_in_volume == 0 {
                vol_idx += 1;
                vol_off = 0;
                continue;
            }

            if handles[vol_idx].is_none() {
                handles[vol_idx] = Some(File::open(&self.volumes[vol_idx].0)?);
            }
            let file = handles[vol_idx].as_mut().expect("opened above");

            let want = (buf.len() - filled).min(left_in_volume as usize);
            file.seek(SeekFrom::Start(vol_off))?;
            let n = file.read(&mut buf[filled..filled + want])?;
            if n == 0 {
                break;
            }

            filled += n;
            vol_off += n as u64;
        }

        Ok(filled)
    }

    fn len(&self) -> u64 {
        self.total_size
    }
}

/// Returns the base path if this path names the first volume of a set.
///
/// Matches a trailing `.7z.001`, case-insensitively, per the multi-volume
/// naming convention.
pub(crate) fn multivolume_base(path: &Path) -> Option<PathBuf> {
    let name = path.to_str()?;
    let bytes = name.as_bytes();
    if bytes.len() < 7 {
        return None;
    }

    let suffix = &bytes[bytes.len() - 7..];
    if suffix.eq_ignore_ascii_case(b".7z.001") {
        // The suffix is ASCII, so this boundary is a char boundary.
        Some(PathBuf::from(&name[..name.len() - 4]))
    } else {
        None
    }
}

/// Generates the path of volume `index` (1-based) for a base path.
fn volume_path(base: &Path, index: u32) -> PathBuf {
    PathBuf::from(format!("{}.{:03}", base.display(), index))
}

/// A source over a caller-provided stream.
///
/// The stream is seekable but stateful, so it sits behind a mutex; every
/// positioned read locks, seeks and reads.
pub struct StreamSource<R> {
    inner: Mutex<R>,
    len: u64,
}

impl<R: Read + Seek + Send> StreamSource<R> {
    /// Wraps a stream of the given total length.
    pub fn new(inner: R, len: u64) -> Self {
        Self {
            inner: Mutex::new(inner),
            len,
        }
    }
}

impl<R: Read + Seek + Send> ReadAt for StreamSource<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }

        let max = (self.len - offset).min(buf.len() as u64) as usize;
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.seek(SeekFrom::Start(offset))?;
        inner.read(&mut buf[..max])
    }

    fn len(&self) -> u64 {
        self.len
    }
}
