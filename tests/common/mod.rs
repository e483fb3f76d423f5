//! In-memory 7z archive construction for tests.
//!
//! The reader under test only ever consumes archives, so the fixtures are
//! assembled here byte by byte: stored folders directly, compressed
//! folders through the `lzma_rust2` encoder, encrypted folders through
//! the `aes`/`cbc` crates. Only the format features the tests exercise
//! are supported.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use aes::Aes256;
use cbc::cipher::{BlockModeEncrypt, KeyIvInit};
use unseven::Password;

// Property ids used while assembling headers.
const K_END: u8 = 0x00;
const K_HEADER: u8 = 0x01;
const K_MAIN_STREAMS_INFO: u8 = 0x04;
const K_FILES_INFO: u8 = 0x05;
const K_PACK_INFO: u8 = 0x06;
const K_UNPACK_INFO: u8 = 0x07;
const K_SUBSTREAMS_INFO: u8 = 0x08;
const K_SIZE: u8 = 0x09;
const K_CRC: u8 = 0x0A;
const K_FOLDER: u8 = 0x0B;
const K_CODERS_UNPACK_SIZE: u8 = 0x0C;
const K_NUM_UNPACK_STREAM: u8 = 0x0D;
const K_EMPTY_STREAM: u8 = 0x0E;
const K_EMPTY_FILE: u8 = 0x0F;
const K_ANTI: u8 = 0x10;
const K_NAME: u8 = 0x11;
const K_MTIME: u8 = 0x14;
const K_ENCODED_HEADER: u8 = 0x17;

pub const METHOD_COPY: &[u8] = &[0x00];
pub const METHOD_LZMA2: &[u8] = &[0x21];
pub const METHOD_DELTA: &[u8] = &[0x03];
pub const METHOD_BCJ2: &[u8] = &[0x03, 0x03, 0x01, 0x1B];
pub const METHOD_AES: &[u8] = &[0x06, 0xF1, 0x07, 0x01];

/// Appends a 7z packed number in its shortest form.
pub fn write_number(buf: &mut Vec<u8>, value: u64) {
    let mut first = 0u8;
    let mut mask = 0x80u8;
    let mut extra = Vec::new();
    let mut v = value;

    for i in 0..8 {
        if v < (1u64 << (7 - i)) {
            first |= v as u8;
            break;
        }
        extra.push(v as u8);
        v >>= 8;
        first |= mask;
        mask >>= 1;
    }

    buf.push(first);
    buf.extend_from_slice(&extra);
}

/// Appends a zero-terminated UTF-16LE string.
fn write_utf16le(buf: &mut Vec<u8>, s: &str) {
    for unit in s.encode_utf16() {
        buf.extend_from_slice(&unit.to_le_bytes());
    }
    buf.extend_from_slice(&[0, 0]);
}

/// Compresses data as a raw LZMA2 stream, returning `(property, bytes)`.
pub fn lzma2_compress(data: &[u8]) -> (u8, Vec<u8>) {
    use lzma_rust2::{Lzma2Options, Lzma2Writer};

    let mut options = Lzma2Options::with_preset(6);
    options.lzma_options.dict_size = 1 << 16;

    let mut compressed = Vec::new();
    {
        let mut writer = Lzma2Writer::new(&mut compressed, options);
        writer.write_all(data).unwrap();
        writer.finish().unwrap();
    }

    // Dictionary property 8 decodes to 2^16, matching the encoder.
    (8, compressed)
}

/// Derives the 7z AES key exactly like the reader does.
pub fn derive_key(password: &str, salt: &[u8], cycles: u8) -> [u8; 32] {
    unseven::crypto::derive_key(&Password::new(password), salt, cycles).unwrap()
}

/// Encrypts with AES-256-CBC, zero-padding to whole blocks.
pub fn aes_encrypt(data: &[u8], key: &[u8; 32], iv: &[u8; 16]) -> Vec<u8> {
    type Enc = cbc::Encryptor<Aes256>;

    let mut padded = data.to_vec();
    let overhang = padded.len() % 16;
    if overhang != 0 {
        padded.resize(padded.len() + 16 - overhang, 0);
    }

    let len = padded.len();
    Enc::new(key.into(), iv.into())
        .encrypt_padded::<cbc::cipher::block_padding::NoPadding>(&mut padded, len)
        .unwrap();
    padded
}

/// Encodes 7zAES coder properties.
pub fn aes_properties(cycles: u8, salt: &[u8], iv: &[u8; 16]) -> Vec<u8> {
    let salt_flag = u8::from(!salt.is_empty());
    let mut props = vec![(salt_flag << 7) | 0x40 | (cycles & 0x3F)];
    let salt_extra = salt.len().saturating_sub(1) as u8;
    props.push((salt_extra << 4) | 0x0F); // 16-byte IV
    props.extend_from_slice(salt);
    props.extend_from_slice(iv);
    props
}

/// One coder of a folder under construction.
#[derive(Clone)]
pub struct CoderSpec {
    pub id: Vec<u8>,
    pub num_in: u64,
    pub num_out: u64,
    pub props: Option<Vec<u8>>,
}

impl CoderSpec {
    pub fn simple(id: &[u8], props: Option<Vec<u8>>) -> Self {
        Self {
            id: id.to_vec(),
            num_in: 1,
            num_out: 1,
            props,
        }
    }
}

/// One folder of the archive under construction.
#[derive(Clone)]
pub struct FolderSpec {
    pub coders: Vec<CoderSpec>,
    /// `(in_index, out_index)` pairs.
    pub bind_pairs: Vec<(u64, u64)>,
    /// Input stream index fed by each packed stream, written explicitly
    /// only when there is more than one.
    pub packed_inputs: Vec<u64>,
    /// Packed stream payloads, in pack order.
    pub packed: Vec<Vec<u8>>,
    /// Unpack size per output stream.
    pub unpack_sizes: Vec<u64>,
    /// Folder-level CRC of the terminal output.
    pub folder_crc: Option<u32>,
    /// Substreams as `(size, crc)`; one per file stored in this folder.
    pub files: Vec<(u64, Option<u32>)>,
}

impl FolderSpec {
    /// A stored (single Copy coder) folder holding one file.
    pub fn copy(data: &[u8]) -> Self {
        Self {
            coders: vec![CoderSpec::simple(METHOD_COPY, None)],
            bind_pairs: vec![],
            packed_inputs: vec![0],
            packed: vec![data.to_vec()],
            unpack_sizes: vec![data.len() as u64],
            folder_crc: None,
            files: vec![(data.len() as u64, Some(crc32fast::hash(data)))],
        }
    }

    /// An LZMA2-compressed folder holding one file.
    pub fn lzma2(data: &[u8]) -> Self {
        let (prop, compressed) = lzma2_compress(data);
        Self {
            coders: vec![CoderSpec::simple(METHOD_LZMA2, Some(vec![prop]))],
            bind_pairs: vec![],
            packed_inputs: vec![0],
            packed: vec![compressed],
            unpack_sizes: vec![data.len() as u64],
            folder_crc: None,
            files: vec![(data.len() as u64, Some(crc32fast::hash(data)))],
        }
    }

    /// A Delta-filtered stored folder: packed -> Copy -> Delta -> output.
    pub fn delta_copy(data: &[u8], distance: u8) -> Self {
        // Store the delta-encoded form so decoding recovers `data`.
        let dist = distance as usize + 1;
        let mut encoded = data.to_vec();
        for i in (dist..encoded.len()).rev() {
            encoded[i] = encoded[i].wrapping_sub(encoded[i - dist]);
        }

        Self {
            coders: vec![
                CoderSpec::simple(METHOD_DELTA, Some(vec![distance])),
                CoderSpec::simple(METHOD_COPY, None),
            ],
            // Delta input (0) is fed by Copy's output (1).
            bind_pairs: vec![(0, 1)],
            packed_inputs: vec![1],
            packed: vec![encoded],
            unpack_sizes: vec![data.len() as u64, data.len() as u64],
            folder_crc: None,
            files: vec![(data.len() as u64, Some(crc32fast::hash(data)))],
        }
    }

    /// An encrypted stored folder: packed -> AES -> Copy -> output.
    pub fn aes_copy(data: &[u8], password: &str, cycles: u8, salt: &[u8], iv: [u8; 16]) -> Self {
        let key = derive_key(password, salt, cycles);
        let encrypted = aes_encrypt(data, &key, &iv);
        let padded_len = encrypted.len() as u64;

        Self {
            coders: vec![
                CoderSpec::simple(METHOD_COPY, None),
                CoderSpec::simple(METHOD_AES, Some(aes_properties(cycles, salt, &iv))),
            ],
            bind_pairs: vec![(0, 1)], // Copy input <- AES output
            packed_inputs: vec![1],   // packed data feeds the AES input
            packed: vec![encrypted],
            unpack_sizes: vec![data.len() as u64, padded_len],
            folder_crc: None,
            files: vec![(data.len() as u64, Some(crc32fast::hash(data)))],
        }
    }

    /// An encrypted compressed folder: packed -> AES -> LZMA2 -> output.
    pub fn aes_lzma2(data: &[u8], password: &str, cycles: u8, salt: &[u8], iv: [u8; 16]) -> Self {
        let (prop, compressed) = lzma2_compress(data);
        let key = derive_key(password, salt, cycles);
        let encrypted = aes_encrypt(&compressed, &key, &iv);
        let padded_len = encrypted.len() as u64;

        Self {
            coders: vec![
                CoderSpec::simple(METHOD_LZMA2, Some(vec![prop])),
                CoderSpec::simple(METHOD_AES, Some(aes_properties(cycles, salt, &iv))),
            ],
            bind_pairs: vec![(0, 1)],
            packed_inputs: vec![1],
            packed: vec![encrypted],
            unpack_sizes: vec![data.len() as u64, padded_len],
            folder_crc: None,
            files: vec![(data.len() as u64, Some(crc32fast::hash(data)))],
        }
    }

    /// A BCJ2 folder whose four inputs come straight from packed streams.
    pub fn bcj2_stored(main: &[u8], call: &[u8], jump: &[u8], range: &[u8], output_len: u64) -> Self {
        Self {
            coders: vec![CoderSpec {
                id: METHOD_BCJ2.to_vec(),
                num_in: 4,
                num_out: 1,
                props: None,
            }],
            bind_pairs: vec![],
            packed_inputs: vec![0, 1, 2, 3],
            packed: vec![
                main.to_vec(),
                call.to_vec(),
                jump.to_vec(),
                range.to_vec(),
            ],
            unpack_sizes: vec![output_len],
            folder_crc: None,
            files: vec![(output_len, None)],
        }
    }

    /// Slices this folder's output into several files.
    pub fn with_files(mut self, chunks: &[&[u8]]) -> Self {
        self.files = chunks
            .iter()
            .map(|c| (c.len() as u64, Some(crc32fast::hash(c))))
            .collect();
        self
    }

    /// Sets the folder-level CRC over the whole terminal output.
    pub fn with_folder_crc(mut self, data: &[u8]) -> Self {
        self.folder_crc = Some(crc32fast::hash(data));
        self
    }

    fn encode(&self, out: &mut Vec<u8>) {
        write_number(out, self.coders.len() as u64);

        for coder in &self.coders {
            let complex = coder.num_in != 1 || coder.num_out != 1;
            let mut flags = coder.id.len() as u8;
            if complex {
                flags |= 0x10;
            }
            if coder.props.is_some() {
                flags |= 0x20;
            }
            out.push(flags);
            out.extend_from_slice(&coder.id);
            if complex {
                write_number(out, coder.num_in);
                write_number(out, coder.num_out);
            }
            if let Some(ref props) = coder.props {
                write_number(out, props.len() as u64);
                out.extend_from_slice(props);
            }
        }

        for &(in_index, out_index) in &self.bind_pairs {
            write_number(out, in_index);
            write_number(out, out_index);
        }

        if self.packed.len() > 1 {
            for &input in &self.packed_inputs {
                write_number(out, input);
            }
        }
    }
}

/// An entry of the archive under construction.
#[derive(Clone)]
pub enum Entry {
    /// A regular file consuming the next substream.
    File { name: String, mtime: Option<u64> },
    /// A zero-length file (no substream).
    EmptyFile { name: String },
    /// A directory.
    Dir { name: String },
    /// An anti-item (deletion marker).
    Anti { name: String },
}

impl Entry {
    pub fn file(name: &str) -> Self {
        Entry::File {
            name: name.into(),
            mtime: None,
        }
    }

    pub fn file_with_mtime(name: &str, mtime: u64) -> Self {
        Entry::File {
            name: name.into(),
            mtime: Some(mtime),
        }
    }

    pub fn empty_file(name: &str) -> Self {
        Entry::EmptyFile { name: name.into() }
    }

    pub fn dir(name: &str) -> Self {
        Entry::Dir { name: name.into() }
    }

    pub fn anti(name: &str) -> Self {
        Entry::Anti { name: name.into() }
    }

    fn name(&self) -> &str {
        match self {
            Entry::File { name, .. }
            | Entry::EmptyFile { name }
            | Entry::Dir { name }
            | Entry::Anti { name } => name,
        }
    }

    fn has_stream(&self) -> bool {
        matches!(self, Entry::File { .. })
    }
}

/// How the end header is stored in the archive.
#[derive(Clone)]
pub enum HeaderEncoding {
    /// Stored as-is.
    Plain,
    /// Wrapped in an encoded header compressed with LZMA2.
    Lzma2,
    /// Wrapped in an encoded header encrypted with 7zAES.
    Encrypted {
        password: String,
        cycles: u8,
        salt: Vec<u8>,
        iv: [u8; 16],
    },
}

/// Assembles complete archives from folder and entry specs.
pub struct ArchiveBuilder {
    folders: Vec<FolderSpec>,
    entries: Vec<Entry>,
    header_encoding: HeaderEncoding,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            folders: Vec::new(),
            entries: Vec::new(),
            header_encoding: HeaderEncoding::Plain,
        }
    }

    pub fn folder(mut self, folder: FolderSpec) -> Self {
        self.folders.push(folder);
        self
    }

    pub fn entry(mut self, entry: Entry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Adds a stored single-file folder plus its entry in one step.
    pub fn stored_file(self, name: &str, data: &[u8]) -> Self {
        self.folder(FolderSpec::copy(data)).entry(Entry::file(name))
    }

    pub fn header_encoding(mut self, encoding: HeaderEncoding) -> Self {
        self.header_encoding = encoding;
        self
    }

    /// Builds the archive bytes.
    pub fn build(self) -> Vec<u8> {
        // Payload: every folder's packed streams, back to back.
        let mut payload = Vec::new();
        let mut pack_sizes = Vec::new();
        for folder in &self.folders {
            for packed in &folder.packed {
                pack_sizes.push(packed.len() as u64);
                payload.extend_from_slice(packed);
            }
        }

        let header = self.encode_header(&pack_sizes, 0);

        // The next-header region is either the header itself or an
        // encoded-header stream referencing a packed blob in the payload.
        let next_header = match &self.header_encoding {
            HeaderEncoding::Plain => header,
            HeaderEncoding::Lzma2 => {
                let (prop, blob) = lzma2_compress(&header);
                let folder = FolderSpec {
                    coders: vec![CoderSpec::simple(METHOD_LZMA2, Some(vec![prop]))],
                    bind_pairs: vec![],
                    packed_inputs: vec![0],
                    packed: vec![blob],
                    unpack_sizes: vec![header.len() as u64],
                    folder_crc: Some(crc32fast::hash(&header)),
                    files: vec![],
                };
                encoded_header_stream(&mut payload, &folder)
            }
            HeaderEncoding::Encrypted {
                password,
                cycles,
                salt,
                iv,
            } => {
                let key = derive_key(password, salt, *cycles);
                let blob = aes_encrypt(&header, &key, iv);
                let folder = FolderSpec {
                    coders: vec![CoderSpec::simple(
                        METHOD_AES,
                        Some(aes_properties(*cycles, salt, iv)),
                    )],
                    bind_pairs: vec![],
                    packed_inputs: vec![0],
                    packed: vec![blob],
                    unpack_sizes: vec![header.len() as u64],
                    folder_crc: Some(crc32fast::hash(&header)),
                    files: vec![],
                };
                encoded_header_stream(&mut payload, &folder)
            }
        };

        // Signature header around payload and next-header region.
        let mut archive = Vec::new();
        archive.extend_from_slice(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04]);

        let mut fixed = Vec::new();
        fixed.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        fixed.extend_from_slice(&(next_header.len() as u64).to_le_bytes());
        fixed.extend_from_slice(&crc32fast::hash(&next_header).to_le_bytes());

        archive.extend_from_slice(&crc32fast::hash(&fixed).to_le_bytes());
        archive.extend_from_slice(&fixed);
        archive.extend_from_slice(&payload);
        archive.extend_from_slice(&next_header);
        archive
    }

    /// Encodes the plain header property stream.
    fn encode_header(&self, pack_sizes: &[u64], pack_pos: u64) -> Vec<u8> {
        let mut h = Vec::new();
        h.push(K_HEADER);

        if !self.folders.is_empty() {
            h.push(K_MAIN_STREAMS_INFO);
            encode_streams_info(&mut h, &self.folders, pack_sizes, pack_pos, true);
        }

        if !self.entries.is_empty() {
            self.encode_files_info(&mut h);
        }

        h.push(K_END);
        h
    }

    fn encode_files_info(&self, h: &mut Vec<u8>) {
        h.push(K_FILES_INFO);
        write_number(h, self.entries.len() as u64);

        let empties: Vec<&Entry> = self.entries.iter().filter(|e| !e.has_stream()).collect();

        if !empties.is_empty() {
            // EMPTY_STREAM over all entries.
            let bits = bit_vector(self.entries.iter().map(|e| !e.has_stream()));
            h.push(K_EMPTY_STREAM);
            write_number(h, bits.len() as u64);
            h.extend_from_slice(&bits);

            // EMPTY_FILE over empty entries: set for empty files and
            // anti-items (everything that is not a directory).
            if empties
                .iter()
                .any(|e| matches!(e, Entry::EmptyFile { .. } | Entry::Anti { .. }))
            {
                let bits = bit_vector(
                    empties
                        .iter()
                        .map(|e| matches!(e, Entry::EmptyFile { .. } | Entry::Anti { .. })),
                );
                h.push(K_EMPTY_FILE);
                write_number(h, bits.len() as u64);
                h.extend_from_slice(&bits);
            }

            if empties.iter().any(|e| matches!(e, Entry::Anti { .. })) {
                let bits = bit_vector(empties.iter().map(|e| matches!(e, Entry::Anti { .. })));
                h.push(K_ANTI);
                write_number(h, bits.len() as u64);
                h.extend_from_slice(&bits);
            }
        }

        // Names.
        let mut names = vec![0u8]; // not external
        for entry in &self.entries {
            write_utf16le(&mut names, entry.name());
        }
        h.push(K_NAME);
        write_number(h, names.len() as u64);
        h.extend_from_slice(&names);

        // Modification times, when present.
        let mtimes: Vec<Option<u64>> = self
            .entries
            .iter()
            .map(|e| match e {
                Entry::File { mtime, .. } => *mtime,
                _ => None,
            })
            .collect();

        if mtimes.iter().any(Option::is_some) {
            let mut block = Vec::new();
            if mtimes.iter().all(Option::is_some) {
                block.push(0x01);
            } else {
                block.push(0x00);
                block.extend_from_slice(&bit_vector(mtimes.iter().map(Option::is_some)));
            }
            block.push(0x00); // not external
            for mtime in mtimes.iter().flatten() {
                block.extend_from_slice(&mtime.to_le_bytes());
            }

            h.push(K_MTIME);
            write_number(h, block.len() as u64);
            h.extend_from_slice(&block);
        }

        h.push(K_END);
    }

    /// Writes the archive to a single file.
    pub fn write_to(self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }

    /// Writes the archive split into `count` volumes under `base`.
    ///
    /// Returns the volume paths (`base.001`, `base.002`, ...).
    pub fn write_volumes(self, base: &Path, count: usize) -> Vec<PathBuf> {
        let bytes = self.build();
        let chunk = bytes.len().div_ceil(count);

        let mut paths = Vec::new();
        for (i, piece) in bytes.chunks(chunk).enumerate() {
            let path = PathBuf::from(format!("{}.{:03}", base.display(), i + 1));
            std::fs::write(&path, piece).unwrap();
            paths.push(path);
        }
        paths
    }
}

/// Encodes a StreamsInfo block (without the enclosing property id).
fn encode_streams_info(
    h: &mut Vec<u8>,
    folders: &[FolderSpec],
    pack_sizes: &[u64],
    pack_pos: u64,
    with_substreams: bool,
) {
    // PackInfo.
    h.push(K_PACK_INFO);
    write_number(h, pack_pos);
    write_number(h, pack_sizes.len() as u64);
    h.push(K_SIZE);
    for &size in pack_sizes {
        write_number(h, size);
    }
    h.push(K_END);

    // UnpackInfo.
    h.push(K_UNPACK_INFO);
    h.push(K_FOLDER);
    write_number(h, folders.len() as u64);
    h.push(0x00); // inline
    for folder in folders {
        folder.encode(h);
    }

    h.push(K_CODERS_UNPACK_SIZE);
    for folder in folders {
        for &size in &folder.unpack_sizes {
            write_number(h, size);
        }
    }

    if folders.iter().any(|f| f.folder_crc.is_some()) {
        h.push(K_CRC);
        if folders.iter().all(|f| f.folder_crc.is_some()) {
            h.push(0x01);
        } else {
            h.push(0x00);
            h.extend_from_slice(&bit_vector(folders.iter().map(|f| f.folder_crc.is_some())));
        }
        for folder in folders {
            if let Some(crc) = folder.folder_crc {
                h.extend_from_slice(&crc.to_le_bytes());
            }
        }
    }
    h.push(K_END);

    // SubStreamsInfo.
    if with_substreams {
        h.push(K_SUBSTREAMS_INFO);

        h.push(K_NUM_UNPACK_STREAM);
        for folder in folders {
            write_number(h, folder.files.len() as u64);
        }

        h.push(K_SIZE);
        for folder in folders {
            for &(size, _) in folder.files.iter().take(folder.files.len().saturating_sub(1)) {
                write_number(h, size);
            }
        }

        // Digests for substreams not covered by a folder CRC.
        let mut digests = Vec::new();
        for folder in folders {
            if folder.folder_crc.is_some() && folder.files.len() == 1 {
                continue;
            }
            for &(_, crc) in &folder.files {
                digests.push(crc);
            }
        }

        if digests.iter().any(Option::is_some) {
            h.push(K_CRC);
            if digests.iter().all(Option::is_some) {
                h.push(0x01);
            } else {
                h.push(0x00);
                h.extend_from_slice(&bit_vector(digests.iter().map(Option::is_some)));
            }
            for crc in digests.iter().flatten() {
                h.extend_from_slice(&crc.to_le_bytes());
            }
        }

        h.push(K_END);
    }

    h.push(K_END);
}

/// Builds an encoded-header stream, appending the packed blob to the
/// payload and referencing it by position.
fn encoded_header_stream(payload: &mut Vec<u8>, folder: &FolderSpec) -> Vec<u8> {
    let pack_pos = payload.len() as u64;
    let pack_sizes: Vec<u64> = folder.packed.iter().map(|p| p.len() as u64).collect();
    for packed in &folder.packed {
        payload.extend_from_slice(packed);
    }

    let mut stream = Vec::new();
    stream.push(K_ENCODED_HEADER);
    encode_streams_info(
        &mut stream,
        std::slice::from_ref(folder),
        &pack_sizes,
        pack_pos,
        false,
    );
    stream
}

/// Packs booleans MSB-first into bytes.
fn bit_vector(bits: impl Iterator<Item = bool>) -> Vec<u8> {
    let mut out = Vec::new();
    let mut current = 0u8;
    let mut used = 0;

    for bit in bits {
        if bit {
            current |= 0x80 >> used;
        }
        used += 1;
        if used == 8 {
            out.push(current);
            current = 0;
            used = 0;
        }
    }
    if used > 0 {
        out.push(current);
    }
    out
}

/// Reads a file handle to the end.
pub fn read_all(file: &unseven::File) -> unseven::Result<Vec<u8>> {
    use std::io::Read;

    let mut reader = file.open()?;
    let mut out = Vec::new();
    match reader.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(e) => Err(unwrap_io(e)),
    }
}

/// Recovers the crate error carried inside an `io::Error`.
pub fn unwrap_io(err: std::io::Error) -> unseven::Error {
    match err.downcast::<unseven::Error>() {
        Ok(inner) => inner,
        Err(err) => unseven::Error::Io(err),
    }
}
