//! Quantization and scaling tables.
//!
//! The float tables are generated from their defining formulas at first use
//! so every build produces bit-identical values. The residual code tables
//! are written out in full; each 16-entry row is indexed by the decoder's
//! fixed-width peek, so entries sharing a code prefix repeat the same
//! length and value.

use std::sync::LazyLock;

/// Peek width in bits for each quantization resolution. Resolutions 8 and
/// up read exactly this many bits; 1 through 7 peek this many and advance
/// by the matched code's length.
pub const QUANT_WIDTH: [u32; 16] = [0, 2, 3, 3, 4, 4, 4, 4, 5, 6, 7, 8, 9, 10, 11, 12];

/// Code lengths for the prefix-coded resolutions, indexed by
/// `(resolution << 4) | peeked_code`.
#[rustfmt::skip]
pub const QUANT_CODE_LENGTH: [u32; 128] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    1, 1, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    2, 2, 2, 2, 2, 2, 3, 3, 0, 0, 0, 0, 0, 0, 0, 0,
    2, 2, 3, 3, 3, 3, 3, 3, 0, 0, 0, 0, 0, 0, 0, 0,
    3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4,
    3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4,
    3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
    3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
];

/// Dequantized values for the prefix-coded resolutions, indexed like
/// [`QUANT_CODE_LENGTH`].
#[rustfmt::skip]
pub const QUANT_CODE_VALUE: [f32; 128] = [
    0.0, 0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,
    0.0, 0.0,  1.0, -1.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,
    0.0, 0.0,  1.0,  1.0, -1.0, -1.0,  2.0, -2.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,
    0.0, 0.0,  1.0, -1.0,  2.0, -2.0,  3.0, -3.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,  0.0,
    0.0, 0.0,  1.0,  1.0, -1.0, -1.0,  2.0,  2.0, -2.0, -2.0,  3.0,  3.0, -3.0, -3.0,  4.0, -4.0,
    0.0, 0.0,  1.0,  1.0, -1.0, -1.0,  2.0,  2.0, -2.0, -2.0,  3.0, -3.0,  4.0, -4.0,  5.0, -5.0,
    0.0, 0.0,  1.0,  1.0, -1.0, -1.0,  2.0, -2.0,  3.0, -3.0,  4.0, -4.0,  5.0, -5.0,  6.0, -6.0,
    0.0, 0.0,  1.0, -1.0,  2.0, -2.0,  3.0, -3.0,  4.0, -4.0,  5.0, -5.0,  6.0, -6.0,  7.0, -7.0,
];

/// Quantization step per resolution: `2 / (2 * max_value + 1)`.
#[rustfmt::skip]
pub const DEQUANT_RANGE: [f32; 16] = [
    0.0,
    2.0 / 3.0,
    2.0 / 5.0,
    2.0 / 7.0,
    2.0 / 9.0,
    2.0 / 11.0,
    2.0 / 13.0,
    2.0 / 15.0,
    2.0 / 31.0,
    2.0 / 63.0,
    2.0 / 127.0,
    2.0 / 255.0,
    2.0 / 511.0,
    2.0 / 1023.0,
    2.0 / 2047.0,
    2.0 / 4095.0,
];

/// Resolution for a coefficient whose noise-shaped curve position lands in
/// 0..=63. Positions below the range quantize at 15, above it at 0.
#[rustfmt::skip]
pub const SCALE_TO_RESOLUTION: [u8; 64] = [
    15, 14, 14, 13, 13, 12, 12, 11, 11, 10, 10,  9,  9,  8,  8,  7,
     6,  6,  5,  4,  4,  4,  3,  3,  3,  2,  2,  2,  2,  1,  1,  1,
     1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
     1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  1,  0,  0,  0,  0,  0,
];

/// Gain contributed by a scale factor: `sqrt(128) * 2^((i - 63) * 53/128)`.
pub static SCALE_FACTOR_GAIN: LazyLock<[f32; 64]> = LazyLock::new(|| {
    let mut table = [0.0f32; 64];
    let sqrt_bands = 128.0f64.sqrt();

    for (i, entry) in table.iter_mut().enumerate() {
        let exponent = (i as f64 - 63.0) * (53.0 / 128.0);
        *entry = (sqrt_bands * exponent.exp2()) as f32;
    }

    table
});

/// Gain ratio between two scale factors 64 steps apart, used by bandwidth
/// extension: `2^((i - 64) * 53/128)`. The saturated endpoints mute the
/// copied coefficient instead of amplifying it without bound.
pub static SCALE_CONVERSION: LazyLock<[f32; 128]> = LazyLock::new(|| {
    let mut table = [0.0f32; 128];

    for (i, entry) in table.iter_mut().enumerate().take(127).skip(1) {
        let exponent = (i as f64 - 64.0) * (53.0 / 128.0);
        *entry = exponent.exp2() as f32;
    }

    table
});

/// Left-channel share of a coupled pair: `(14 - i) / 7`. The right channel
/// takes `2.0` minus this.
pub static INTENSITY_RATIO: LazyLock<[f32; 15]> = LazyLock::new(|| {
    let mut table = [0.0f32; 15];

    for (i, entry) in table.iter_mut().enumerate() {
        *entry = ((14 - i) as f64 / 7.0) as f32;
    }

    table
});

#[cfg(test)]
mod tests {
    use super::*;

    // Entries reached by peeked codes sharing a code's prefix must agree,
    // otherwise the decoded value would depend on bits past the code.
    #[test]
    fn code_rows_are_prefix_consistent() {
        for resolution in 1usize..8 {
            let width = QUANT_WIDTH[resolution];
            for code in 0..(1u32 << width) {
                let index = (resolution << 4) + code as usize;
                let len = QUANT_CODE_LENGTH[index];
                assert!(len >= 1 && len <= width, "res {resolution} code {code}");

                for other in 0..(1u32 << width) {
                    if other >> (width - len) == code >> (width - len) {
                        let other_index = (resolution << 4) + other as usize;
                        assert_eq!(QUANT_CODE_LENGTH[other_index], len);
                        assert_eq!(QUANT_CODE_VALUE[other_index], QUANT_CODE_VALUE[index]);
                    }
                }
            }
        }
    }

    #[test]
    fn dequant_range_matches_code_values() {
        for resolution in 1usize..8 {
            let max = QUANT_CODE_VALUE[resolution << 4..(resolution + 1) << 4]
                .iter()
                .fold(0.0f32, |m, &v| m.max(v));
            assert_eq!(DEQUANT_RANGE[resolution], 2.0 / (2.0 * max + 1.0));
        }

        for resolution in 8usize..16 {
            let max = (1u32 << (QUANT_WIDTH[resolution] - 1)) - 1;
            assert_eq!(DEQUANT_RANGE[resolution], 2.0 / (2 * max + 1) as f32);
        }
    }

    #[test]
    fn resolution_curve_is_monotonic() {
        for i in 1..SCALE_TO_RESOLUTION.len() {
            assert!(SCALE_TO_RESOLUTION[i] <= SCALE_TO_RESOLUTION[i - 1]);
        }
        assert_eq!(SCALE_TO_RESOLUTION[0], 15);
        assert_eq!(SCALE_TO_RESOLUTION[63], 0);
    }

    #[test]
    fn scale_factor_gain_is_geometric() {
        let ratio = (53.0f64 / 128.0).exp2() as f32;
        for i in 1..64 {
            let step = SCALE_FACTOR_GAIN[i] / SCALE_FACTOR_GAIN[i - 1];
            assert!((step - ratio).abs() < 1e-5, "i = {i}");
        }
        assert!((SCALE_FACTOR_GAIN[63] - 128.0f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn scale_conversion_endpoints_mute() {
        assert_eq!(SCALE_CONVERSION[0], 0.0);
        assert_eq!(SCALE_CONVERSION[127], 0.0);
        assert_eq!(SCALE_CONVERSION[64], 1.0);
        for i in 2..127 {
            assert!(SCALE_CONVERSION[i] > SCALE_CONVERSION[i - 1]);
        }
    }

    #[test]
    fn intensity_shares_step_evenly() {
        assert_eq!(INTENSITY_RATIO[0], 2.0);
        assert_eq!(INTENSITY_RATIO[7], 1.0);
        assert_eq!(INTENSITY_RATIO[14], 0.0);
        for i in 1..15 {
            let step = INTENSITY_RATIO[i - 1] - INTENSITY_RATIO[i];
            assert!((step - 1.0 / 7.0).abs() < 1e-6);
        }
    }
}
