//! 7zAES support: key derivation and streaming AES-256-CBC decryption.
//!
//! The 7z scheme derives a 32-byte AES key from the UTF-16LE password and
//! a per-archive salt by feeding `salt || password || counter` for every
//! counter value into a single SHA-256 state. The special cycles value
//! `0x3F` skips hashing entirely and uses `salt || password` directly as
//! key material.
//!
//! Decryption is plain AES-256-CBC without padding handling: ciphertext
//! is always a whole number of blocks and the plaintext length comes from
//! the downstream unpack size.

mod properties;

#[cfg(feature = "aes")]
use aes::Aes256;
#[cfg(feature = "aes")]
use cbc::cipher::{BlockModeDecrypt, KeyIvInit};
#[cfg(feature = "aes")]
use sha2::{Digest, Sha256};
#[cfg(feature = "aes")]
use std::io::{self, Read};

#[cfg(feature = "aes")]
use crate::password::Password;
#[cfg(feature = "aes")]
use crate::{Error, Result};

pub use properties::AesProperties;

#[cfg(feature = "aes")]
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size in bytes.
#[cfg(feature = "aes")]
const BLOCK_SIZE: usize = 16;

/// The cycles value that selects the no-hash key derivation.
pub const NO_HASH_CYCLES: u8 = 0x3F;

#[cfg(feature = "aes")]
/// Maximum accepted `num_cycles_power` for hashed key derivation.
///
/// 2^24 SHA-256 feedings already take noticeable time; anything beyond
/// this is treated as a hostile header rather than a real archive
/// (7-Zip's own default is 19).
pub const MAX_NUM_CYCLES_POWER: u8 = 24;

/// Derives the AES-256 key for a password and salt.
///
/// With `num_cycles_power == 0x3F` the key is the first 32 bytes of
/// `salt || utf16le(password)`, zero-padded. Otherwise a single SHA-256
/// state is fed `salt || utf16le(password) || counter_le64` for every
/// counter in `0..2^num_cycles_power` and the digest is the key.
///
/// # Errors
///
/// [`Error::ResourceLimitExceeded`] when `num_cycles_power` exceeds
/// [`MAX_NUM_CYCLES_POWER`] (and is not the `0x3F` special case).
#[cfg(feature = "aes")]
pub fn derive_key(password: &Password, salt: &[u8], num_cycles_power: u8) -> Result<[u8; 32]> {
    let password_bytes = password.as_utf16_le();

    if num_cycles_power == NO_HASH_CYCLES {
        let mut key = [0u8; 32];
        let mut filled = 0;
        for chunk in [salt, password_bytes.as_slice()] {
            let take = chunk.len().min(32 - filled);
            key[filled..filled + take].copy_from_slice(&chunk[..take]);
            filled += take;
            if filled == 32 {
                break;
            }
        }
        return Ok(key);
    }

    if num_cycles_power > MAX_NUM_CYCLES_POWER {
        log::warn!(
            "rejecting key derivation with cycles power {} (limit {})",
            num_cycles_power,
            MAX_NUM_CYCLES_POWER
        );
        return Err(Error::ResourceLimitExceeded(format!(
            "key derivation cycles power {} exceeds maximum {}",
            num_cycles_power, MAX_NUM_CYCLES_POWER
        )));
    }

    let iterations = 1u64 << num_cycles_power;
    let mut sha = Sha256::new();

    for counter in 0..iterations {
        sha.update(salt);
        sha.update(&password_bytes);
        sha.update(counter.to_le_bytes());
    }

    Ok(sha.finalize().into())
}

/// Streaming AES-256-CBC decoder.
///
/// Reads whole ciphertext blocks from the inner stream, decrypts them and
/// serves plaintext on demand. The trailing partial content of the final
/// block (CBC padding) is left to the consumer: downstream coders stop at
/// their declared unpack size.
#[cfg(feature = "aes")]
pub struct Aes256Decoder<R> {
    inner: R,
    buffer: Vec<u8>,
    pos: usize,
    key: [u8; 32],
    iv: [u8; 16],
    finished: bool,
}

#[cfg(feature = "aes")]
impl<R> std::fmt::Debug for Aes256Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aes256Decoder").finish_non_exhaustive()
    }
}

#[cfg(feature = "aes")]
impl<R: Read + Send> Aes256Decoder<R> {
    /// Creates a decoder from 7zAES coder properties and a password.
    pub fn new(input: R, properties: &[u8], password: &Password) -> Result<Self> {
        let props = AesProperties::parse(properties)?;
        let key = derive_key(password, &props.salt, props.num_cycles_power)?;

        Ok(Self {
            inner: input,
            buffer: Vec::new(),
            pos: 0,
            key,
            iv: props.iv,
            finished: false,
        })
    }

    /// Creates a decoder with an explicit key and IV.
    pub fn with_key_iv(input: R, key: [u8; 32], iv: [u8; 16]) -> Self {
        Self {
            inner: input,
            buffer: Vec::new(),
            pos: 0,
            key,
            iv,
            finished: false,
        }
    }

    /// Reads and decrypts the next run of ciphertext blocks.
    fn decrypt_more(&mut self) -> io::Result<()> {
        let mut encrypted = vec![0u8; 4096];
        let mut filled = 0;
        while filled < encrypted.len() {
            let n = self.inner.read(&mut encrypted[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            self.finished = true;
            return Ok(());
        }

        let aligned = (filled / BLOCK_SIZE) * BLOCK_SIZE;
        if aligned == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "encrypted stream is not a whole number of AES blocks",
            ));
        }
        encrypted.truncate(aligned);

        // CBC chains on the last ciphertext block; remember it before
        // decrypting in place.
        let next_iv: [u8; 16] = encrypted[aligned - BLOCK_SIZE..]
            .try_into()
            .expect("slice is exactly one block");

        let decryptor = Aes256CbcDec::new(&self.key.into(), &self.iv.into());
        let decrypted = decryptor
            .decrypt_padded::<cbc::cipher::block_padding::NoPadding>(&mut encrypted)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        self.iv = next_iv;
        self.buffer = decrypted.to_vec();
        self.pos = 0;

        Ok(())
    }
}

#[cfg(feature = "aes")]
impl<R: Read + Send> Read for Aes256Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.buffer.len() && !self.finished {
            self.decrypt_more()?;
        }

        if self.pos >= self.buffer.len() {
            return Ok(0);
        }

        let available = &self.buffer[self.pos..];
        let to_copy = available.len().min(buf.len());
        buf[..to_copy].copy_from_slice(&available[..to_copy]);
        self.pos += to_copy;

        Ok(to_copy)
    }
}

#[cfg(feature = "aes")]
impl<R: Read + Send> crate::codec::Decoder for Aes256Decoder<R> {
    fn method_id(&self) -> &'static [u8] {
        crate::codec::method::AES
    }
}
