//! 7zAES coder property parsing.

use crate::{Error, Result};

/// Parsed 7zAES coder properties.
///
/// Layout:
/// - byte 0: `(salt_flag << 7) | (iv_flag << 6) | num_cycles_power`
/// - byte 1: `(salt_size_extra << 4) | iv_size_extra`
/// - followed by `salt` then `iv`
///
/// where `salt_size = salt_flag + salt_size_extra` and
/// `iv_size = iv_flag + iv_size_extra`. The IV is zero-padded to the AES
/// block size. This carrier is shared by the encoded-header path and the
/// per-folder decryption path.
#[derive(Debug, Clone)]
pub struct AesProperties {
    /// Key derivation iteration exponent (lower 6 bits of byte 0).
    pub num_cycles_power: u8,
    /// Salt for key derivation (0-16 bytes).
    pub salt: Vec<u8>,
    /// Initialization vector, zero-padded to 16 bytes.
    pub iv: [u8; 16],
}

impl AesProperties {
    /// Parses 7zAES properties from the coder property bytes.
    pub fn parse(properties: &[u8]) -> Result<Self> {
        if properties.is_empty() {
            return Err(Error::malformed("7zAES properties missing"));
        }

        let first = properties[0];
        let num_cycles_power = first & 0x3F;
        let salt_flag = (first >> 7) & 1;
        let iv_flag = (first >> 6) & 1;

        let (salt_size, iv_size, data_start) = if salt_flag == 0 && iv_flag == 0 {
            (0usize, 0usize, 1usize)
        } else {
            if properties.len() < 2 {
                return Err(Error::malformed("7zAES properties truncated"));
            }
            let second = properties[1];
            let salt_size = (salt_flag + ((second >> 4) & 0x0F)) as usize;
            let iv_size = (iv_flag + (second & 0x0F)) as usize;
            (salt_size, iv_size, 2usize)
        };

        let salt_end = data_start + salt_size;
        let iv_end = salt_end + iv_size;
        if properties.len() < iv_end {
            return Err(Error::malformed(format!(
                "7zAES properties truncated: expected {} bytes, got {}",
                iv_end,
                properties.len()
            )));
        }

        let salt = properties[data_start..salt_end].to_vec();

        let mut iv = [0u8; 16];
        let iv_data = &properties[salt_end..iv_end];
        iv[..iv_data.len().min(16)].copy_from_slice(&iv_data[..iv_data.len().min(16)]);

        Ok(Self {
            num_cycles_power,
            salt,
            iv,
        })
    }

    /// Returns the KDF iteration count this header implies.
    ///
    /// The `0x3F` no-hash derivation reports zero iterations.
    pub fn kdf_iterations(&self) -> u64 {
        if self.num_cycles_power == super::NO_HASH_CYCLES {
            0
        } else {
            1u64 << self.num_cycles_power.min(63)
        }
    }

    /// Encodes properties for test archive construction.
    #[cfg(test)]
    pub(crate) fn test_encode(num_cycles_power: u8, salt: &[u8], iv: &[u8]) -> Vec<u8> {
        let salt_flag = u8::from(!salt.is_empty());
        let iv_flag = u8::from(!iv.is_empty());

        let mut out = vec![(salt_flag << 7) | (iv_flag << 6) | (num_cycles_power & 0x3F)];
        if salt_flag != 0 || iv_flag != 0 {
            let salt_extra = salt.len().saturating_sub(1) as u8;
            let iv_extra = iv.len().saturating_sub(1) as u8;
            out.push((salt_extra << 4) | (iv_extra & 0x0F));
            out.extend_from_slice(salt);
            out.extend_from_slice(iv);
        }
        out
    }
}
