//! Bit-level access to deciphered block payloads.
//!
//! Wraps [`bitstream_io::BitReader`] with the codec's block semantics: the
//! addressable range excludes the trailing two checksum bytes, `peek` is
//! lenient past the end of that range, and the cursor can be rewound by a
//! signed amount to un-consume speculatively read bits.

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, BitReader};

/// MSB-first bit cursor over one deciphered block.
#[derive(Debug)]
pub struct BitCursor<'a> {
    bs: BitReader<io::Cursor<&'a [u8]>, BigEndian>,
    len: u64,
}

impl<'a> BitCursor<'a> {
    /// Creates a cursor whose usable range is `8 * len - 16` bits; the
    /// block checksum is never part of the bitstream.
    pub fn from_block(buf: &'a [u8]) -> Self {
        let len = (buf.len() as u64 * 8).saturating_sub(16);

        Self {
            bs: BitReader::new(io::Cursor::new(buf)),
            len,
        }
    }

    /// Usable length in bits.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs
            .position_in_bits()
            .map(|pos| self.len.saturating_sub(pos))
    }

    /// Returns the next `n` bits (n ≤ 24) without advancing the cursor.
    ///
    /// A read that would cross the usable range yields 0 rather than an
    /// error; the residual decoder relies on this when its fixed-width
    /// peek window extends past the final code of a block.
    #[inline(always)]
    pub fn peek(&mut self, n: u32) -> io::Result<u32> {
        debug_assert!(n <= 24);

        if n == 0 {
            return Ok(0);
        }

        let pos = self.bs.position_in_bits()?;
        if pos + n as u64 > self.len {
            return Ok(0);
        }

        let value = self.bs.read_unsigned_var::<u32>(n)?;
        self.bs.seek_bits(SeekFrom::Start(pos))?;

        Ok(value)
    }

    /// Peek then advance by `n` bits (n ≤ 24). Reading past the usable
    /// range is a hard failure; truncated blocks cannot be decoded
    /// meaningfully.
    #[inline(always)]
    pub fn consume(&mut self, n: u32) -> io::Result<u32> {
        debug_assert!(n <= 24);

        if n == 0 {
            return Ok(0);
        }

        if n as u64 > self.available()? {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "consume({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            ));
        }

        self.bs.read_unsigned_var(n)
    }

    /// Moves the cursor by a signed bit offset. Negative offsets move
    /// backward, un-consuming bits read speculatively during residual
    /// decode.
    #[inline(always)]
    pub fn rewind(&mut self, offset: i64) -> io::Result<u64> {
        if (offset < 0 && self.position()? as i64 + offset >= 0)
            || (offset >= 0 && self.available()? as i64 >= offset)
        {
            return self.bs.seek_bits(SeekFrom::Current(offset));
        }

        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "rewind({}): out of bounds bits at {}",
                offset,
                self.position()?
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: [u8; 8] = [0xA5, 0x3C, 0x0F, 0xF0, 0x81, 0x7E, 0x00, 0x00];

    #[test]
    fn usable_range_excludes_checksum() {
        let mut br = BitCursor::from_block(&DATA);
        assert_eq!(br.len(), 8 * 8 - 16);
        assert_eq!(br.available().unwrap(), 48);
    }

    #[test]
    fn peek_matches_consume() {
        for n in 1..=24u32 {
            let mut br = BitCursor::from_block(&DATA);
            let peeked = br.peek(n).unwrap();
            let consumed = br.consume(n).unwrap();
            assert_eq!(peeked, consumed, "n = {n}");
            assert_eq!(br.position().unwrap(), n as u64);
        }
    }

    #[test]
    fn peek_does_not_advance() {
        let mut br = BitCursor::from_block(&DATA);
        br.consume(5).unwrap();
        let pos = br.position().unwrap();
        br.peek(13).unwrap();
        assert_eq!(br.position().unwrap(), pos);
    }

    #[test]
    fn peek_past_end_is_zero() {
        let mut br = BitCursor::from_block(&DATA);
        br.consume(24).unwrap();
        br.consume(16).unwrap();
        // 8 usable bits remain; a 9-bit peek crosses into the checksum.
        assert_eq!(br.peek(9).unwrap(), 0);
        assert_eq!(br.peek(8).unwrap(), 0x7E);
    }

    #[test]
    fn consume_past_end_fails() {
        let mut br = BitCursor::from_block(&DATA);
        br.consume(24).unwrap();
        br.consume(17).unwrap();
        assert!(br.consume(8).is_err());
    }

    #[test]
    fn rewind_restores_position() {
        let mut br = BitCursor::from_block(&DATA);
        let first = br.consume(11).unwrap();
        br.rewind(-11).unwrap();
        assert_eq!(br.position().unwrap(), 0);
        assert_eq!(br.consume(11).unwrap(), first);

        br.rewind(7).unwrap();
        assert_eq!(br.position().unwrap(), 18);

        assert!(br.rewind(-19).is_err());
    }
}
