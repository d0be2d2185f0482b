//! Block descrambling cipher.
//!
//! Compressed block bytes may be scrambled with a byte-substitution cipher.
//! The substitution table depends only on the cipher mode from the header
//! and, for keyed streams, a caller-supplied 64-bit keycode, so it is built
//! once per stream and applied to every block. Every mode's table is a
//! permutation of the byte values with `0x00` and `0xFF` as fixed points.

use crate::utils::errors::HeaderError;

/// Scrambling mode signalled by the `ciph` header chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherMode {
    /// Bytes are stored in the clear.
    #[default]
    None,
    /// Fixed table shared by all streams.
    Scrambled,
    /// Table derived from a 64-bit keycode.
    Keyed,
}

impl CipherMode {
    pub fn from_raw(raw: u16) -> Result<Self, HeaderError> {
        match raw {
            0 => Ok(CipherMode::None),
            1 => Ok(CipherMode::Scrambled),
            56 => Ok(CipherMode::Keyed),
            _ => Err(HeaderError::InvalidCipherMode(raw)),
        }
    }

    pub fn as_raw(self) -> u16 {
        match self {
            CipherMode::None => 0,
            CipherMode::Scrambled => 1,
            CipherMode::Keyed => 56,
        }
    }
}

/// Byte-substitution table for one stream.
#[derive(Debug, Clone)]
pub struct Cipher {
    table: [u8; 256],
}

impl Cipher {
    /// Builds the descrambling table for `mode`.
    ///
    /// `keycode` is only consulted in keyed mode; the two halves are the
    /// low and high 32 bits of the 64-bit keycode.
    pub fn new(mode: CipherMode, keycode: u64) -> Self {
        let table = match mode {
            CipherMode::None => identity_table(),
            CipherMode::Scrambled => scrambled_table(),
            CipherMode::Keyed => keyed_table(keycode),
        };

        Self { table }
    }

    /// Descrambles one block in place. The trailing checksum bytes are
    /// never scrambled and are left untouched.
    pub fn descramble(&self, block: &mut [u8]) {
        let end = block.len().saturating_sub(2);

        for byte in &mut block[..end] {
            *byte = self.table[*byte as usize];
        }
    }

    /// Substitution for a single byte.
    pub fn substitute(&self, byte: u8) -> u8 {
        self.table[byte as usize]
    }

    /// The inverse permutation, mapping clear bytes back to scrambled
    /// ones. Used when writing keyed or scrambled streams.
    pub fn invert(&self) -> Self {
        let mut table = [0u8; 256];

        for (i, &v) in self.table.iter().enumerate() {
            table[v as usize] = i as u8;
        }

        Self { table }
    }
}

fn identity_table() -> [u8; 256] {
    let mut table = [0u8; 256];

    for (i, entry) in table.iter_mut().enumerate() {
        *entry = i as u8;
    }

    table
}

/// Fixed keyless scramble. A multiplicative walk fills positions 1..=254;
/// values that land on the fixed points 0x00 and 0xFF are stepped over.
fn scrambled_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut v: u8 = 0;

    for entry in table[1..255].iter_mut() {
        v = v.wrapping_mul(13).wrapping_add(11);
        if v == 0 || v == 0xFF {
            v = v.wrapping_mul(13).wrapping_add(11);
        }
        *entry = v;
    }

    table[0] = 0;
    table[255] = 0xFF;
    table
}

/// One 16-entry nibble sequence of the keyed schedule.
fn nibble_row(key: u8) -> [u8; 16] {
    let mul = ((key & 1) << 3) | 5;
    let add = (key & 0xE) | 1;
    let mut k = key >> 4;

    let mut row = [0u8; 16];
    for entry in row.iter_mut() {
        k = (k.wrapping_mul(mul).wrapping_add(add)) & 0xF;
        *entry = k;
    }

    row
}

/// Keyed scramble. The keycode is split into seven bytes; one drives the
/// row nibbles and a 16-entry XOR schedule of the rest drives the column
/// nibbles. A stride-17 walk over the combined 16x16 grid fills positions
/// 1..=254, skipping the fixed points.
fn keyed_table(keycode: u64) -> [u8; 256] {
    let keycode = keycode.wrapping_sub(u64::from(keycode != 0));

    let mut kc = [0u8; 7];
    for (i, b) in kc.iter_mut().enumerate() {
        *b = (keycode >> (i * 8)) as u8;
    }

    let seed: [u8; 16] = [
        kc[1],
        kc[1] ^ kc[6],
        kc[2] ^ kc[3],
        kc[2],
        kc[2] ^ kc[1],
        kc[3] ^ kc[4],
        kc[3],
        kc[3] ^ kc[2],
        kc[4] ^ kc[5],
        kc[4],
        kc[4] ^ kc[3],
        kc[5] ^ kc[6],
        kc[5],
        kc[5] ^ kc[4],
        kc[6] ^ kc[1],
        kc[6],
    ];

    let rows = nibble_row(kc[0]);

    let mut base = [0u8; 256];
    for r in 0..16 {
        let high = rows[r] << 4;
        let cols = nibble_row(seed[r]);
        for c in 0..16 {
            base[r * 16 + c] = high | cols[c];
        }
    }

    let mut table = [0u8; 256];
    let mut x: u8 = 0;
    let mut pos = 1;

    for _ in 0..256 {
        x = x.wrapping_add(17);
        let v = base[x as usize];
        if v != 0 && v != 0xFF {
            table[pos] = v;
            pos += 1;
        }
    }

    table[0] = 0;
    table[255] = 0xFF;
    table
}
