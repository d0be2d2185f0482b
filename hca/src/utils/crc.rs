//! CRC validation utilities for stream headers and blocks.
//!
//! The format protects its header and every compressed block with the same
//! checksum: CRC-16, polynomial 0x8005, MSB-first, zero seed, table-driven.
//! Block checksums are computed over the scrambled (on-disk) bytes, so they
//! are verified before the cipher is applied.

/// CRC algorithm specification with polynomial and initial value.
pub struct Algorithm<T> {
    poly: T,
    init: T,
}

/// CRC-16 algorithm shared by the header and per-block checksums.
pub const CRC_STREAM_ALG: Algorithm<u16> = Algorithm {
    poly: 0x8005,
    init: 0x0000,
};

/// Computes a CRC-16 over `len` bits of `value`'s top byte.
#[inline(always)]
pub const fn crc16(poly: u16, mut value: u16, len: usize) -> u16 {
    value <<= 8;

    let mut i = 0;
    while i < len {
        value = (value << 1) ^ (((value >> 15) & 1) * poly);
        i += 1;
    }

    value
}

#[inline(always)]
const fn crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc16(poly, i as u16, 8);
        i += 1;
    }

    table
}

#[derive(Debug)]
pub struct Crc16 {
    pub poly: u16,
    pub init: u16,
    table: [u16; 256],
}

impl Crc16 {
    pub const fn new(algorithm: &Algorithm<u16>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc16_table(algorithm.poly),
        }
    }

    const fn table_entry(&self, index: u16) -> u16 {
        self.table[(index & 0xFF) as usize]
    }

    /// Folds `bytes` into a running checksum, allowing chained updates.
    #[inline(always)]
    pub const fn update(&self, mut crc: u16, bytes: &[u8]) -> u16 {
        let mut i = 0;

        while i < bytes.len() {
            crc = (crc << 8) ^ self.table_entry((crc >> 8) ^ bytes[i] as u16);
            i += 1;
        }

        crc
    }

    /// Checksum of `bytes` from the algorithm's initial value.
    #[inline(always)]
    pub const fn checksum(&self, bytes: &[u8]) -> u16 {
        self.update(self.init, bytes)
    }
}

/// The stream CRC, built once at compile time.
pub static CRC_STREAM: Crc16 = Crc16::new(&CRC_STREAM_ALG);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bytes_have_zero_checksum() {
        assert_eq!(CRC_STREAM.checksum(&[0u8; 16]), 0);
    }

    #[test]
    fn checksum_is_chainable() {
        let buf: Vec<u8> = (0u16..997).map(|i| (i * 31 % 251) as u8).collect();

        for split in [0, 1, 7, 256, 996, 997] {
            let (a, b) = buf.split_at(split);
            let chained = CRC_STREAM.update(CRC_STREAM.checksum(a), b);
            assert_eq!(chained, CRC_STREAM.checksum(&buf));
        }
    }

    #[test]
    fn detects_single_byte_corruption() {
        let mut buf = vec![0x12u8, 0x34, 0x56, 0x78, 0x9A];
        let original = CRC_STREAM.checksum(&buf);
        buf[2] ^= 0x01;
        assert_ne!(CRC_STREAM.checksum(&buf), original);
    }
}
