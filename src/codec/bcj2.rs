//! BCJ2 four-stream filter for x86 executables.
//!
//! BCJ2 separates the targets of CALL/JMP/Jcc instructions from the rest
//! of the code so each stream compresses better. The decoder merges four
//! inputs back into the original bytes:
//!
//! - main: the code with branch opcodes but without their targets
//! - call: CALL (E8) destinations, absolute, big-endian
//! - jump: JMP (E9) and Jcc destinations, absolute, big-endian
//! - range: range-coded selector bits saying which candidate opcodes
//!   actually had their targets extracted
//!
//! For every E8/E9/`0F 8x` byte in the main stream the decoder consults
//! the range decoder; when the bit says "converted" it pulls four bytes
//! from the call or jump stream and rewrites the absolute target back to
//! the relative form at the current output position.

use std::io::{self, BufReader, Read};

use crate::{Error, Result};

use super::{Decoder, method};

/// Range decoder constants (shared with the LZMA family).
mod range {
    pub const NUM_MOVE_BITS: u32 = 5;
    pub const NUM_BIT_MODEL_TOTAL_BITS: u32 = 11;
    pub const BIT_MODEL_TOTAL: u32 = 1 << NUM_BIT_MODEL_TOTAL_BITS;
    pub const NUM_TOP_BITS: u32 = 24;
    pub const TOP_VALUE: u32 = 1 << NUM_TOP_BITS;
    pub const INITIAL_PROB: u32 = BIT_MODEL_TOTAL / 2;
}

/// Bit-level range decoder for the selector stream.
struct RangeDecoder<R> {
    reader: R,
    range: u32,
    code: u32,
}

impl<R: Read> RangeDecoder<R> {
    /// Creates a decoder, consuming the five initialization bytes.
    fn new(mut reader: R) -> Result<Self> {
        let mut code: u32 = 0;
        for _ in 0..5 {
            let mut byte = [0u8; 1];
            reader.read_exact(&mut byte).map_err(Error::Io)?;
            code = (code << 8) | byte[0] as u32;
        }

        Ok(Self {
            reader,
            range: 0xFFFF_FFFF,
            code,
        })
    }

    /// Decodes one bit with the given probability, returning
    /// `(bit, adapted probability)`.
    fn decode_bit(&mut self, prob: u32) -> io::Result<(u32, u32)> {
        let bound = (self.range >> range::NUM_BIT_MODEL_TOTAL_BITS) * prob;

        let (bit, new_prob) = if self.code < bound {
            self.range = bound;
            (0, prob + ((range::BIT_MODEL_TOTAL - prob) >> range::NUM_MOVE_BITS))
        } else {
            self.range -= bound;
            self.code -= bound;
            (1, prob - (prob >> range::NUM_MOVE_BITS))
        };

        if self.range < range::TOP_VALUE {
            let mut byte = [0u8; 1];
            // The selector stream may run out exactly at the end; a zero
            // byte is the correct range-coding finale in that case.
            match self.reader.read(&mut byte) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
                Err(e) => return Err(e),
            }
            self.code = (self.code << 8) | byte[0] as u32;
            self.range <<= 8;
        }

        Ok((bit, new_prob))
    }
}

/// Adaptive probability slot for one selector context.
#[derive(Clone, Copy)]
struct Status {
    prob: u32,
}

impl Status {
    fn new() -> Self {
        Self {
            prob: range::INITIAL_PROB,
        }
    }

    fn decode<R: Read>(&mut self, rd: &mut RangeDecoder<R>) -> io::Result<bool> {
        let (bit, new_prob) = rd.decode_bit(self.prob)?;
        self.prob = new_prob;
        Ok(bit == 1)
    }
}

/// Number of selector contexts: 256 E8 contexts keyed by the preceding
/// byte, one for E9 and one for Jcc.
const NUM_STATUS: usize = 258;

/// BCJ2 decoder merging the four input streams.
pub struct Bcj2Decoder<R> {
    main: BufReader<R>,
    call: R,
    jump: R,
    selector: RangeDecoder<R>,
    status: [Status; NUM_STATUS],
    prev_byte: u8,
    /// Bytes emitted so far, for target address reconstruction.
    written: u32,
    buffer: Vec<u8>,
    buffer_pos: usize,
}

impl<R: Read> Bcj2Decoder<R> {
    /// Creates a decoder from the four input streams.
    pub fn new(main: R, call: R, jump: R, range: R) -> Result<Self> {
        Ok(Self {
            main: BufReader::new(main),
            call,
            jump,
            selector: RangeDecoder::new(range)?,
            status: [Status::new(); NUM_STATUS],
            prev_byte: 0,
            written: 0,
            buffer: Vec::with_capacity(65536),
            buffer_pos: 0,
        })
    }

    /// Returns whether the byte pair is a branch candidate.
    #[inline]
    fn is_candidate(prev: u8, curr: u8) -> bool {
        (curr & 0xFE) == 0xE8 || Self::is_jcc(prev, curr)
    }

    /// Returns whether the byte pair is a conditional jump.
    #[inline]
    fn is_jcc(prev: u8, curr: u8) -> bool {
        prev == 0x0F && (curr & 0xF0) == 0x80
    }

    /// Returns the selector context for the byte pair.
    #[inline]
    fn status_index(prev: u8, curr: u8) -> usize {
        match curr {
            0xE8 => prev as usize,
            0xE9 => 256,
            _ => 257,
        }
    }

    /// Refills the internal output buffer.
    fn fill_buffer(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.buffer_pos = 0;

        loop {
            let mut byte = [0u8; 1];
            match self.main.read(&mut byte) {
                Ok(0) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(e),
            }
            let b = byte[0];

            self.written = self.written.wrapping_add(1);
            self.buffer.push(b);

            if Self::is_candidate(self.prev_byte, b) {
                let idx = Self::status_index(self.prev_byte, b);
                let converted = self.status[idx].decode(&mut self.selector)?;

                if converted {
                    let reader: &mut dyn Read = if b == 0xE8 {
                        &mut self.call
                    } else {
                        &mut self.jump
                    };

                    let mut dest_bytes = [0u8; 4];
                    reader.read_exact(&mut dest_bytes)?;

                    // Absolute big-endian target back to relative
                    // little-endian at this output position.
                    let dest = u32::from_be_bytes(dest_bytes);
                    let relative = dest.wrapping_sub(self.written.wrapping_add(4));

                    self.buffer.extend_from_slice(&relative.to_le_bytes());
                    self.prev_byte = (relative >> 24) as u8;
                    self.written = self.written.wrapping_add(4);
                } else {
                    self.prev_byte = b;
                }
            } else {
                self.prev_byte = b;
            }

            if self.buffer.len() >= self.buffer.capacity() / 2 {
                break;
            }
        }

        Ok(())
    }
}

impl<R: Read> Read for Bcj2Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.buffer_pos >= self.buffer.len() {
            self.fill_buffer()?;
            if self.buffer.is_empty() {
                return Ok(0);
            }
        }

        let available = self.buffer.len() - self.buffer_pos;
        let to_copy = available.min(buf.len());
        buf[..to_copy].copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + to_copy]);
        self.buffer_pos += to_copy;

        Ok(to_copy)
    }
}

impl<R: Read + Send> Decoder for Bcj2Decoder<R> {
    fn method_id(&self) -> &'static [u8] {
        method::BCJ2
    }
}
