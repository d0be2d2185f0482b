//! Absolute threshold of hearing table.
//!
//! The encoder biases quantization by a per-coefficient hearing threshold.
//! The decoder reproduces the same 128-entry table so that resolution
//! selection matches the encoder exactly: flat streams use all zeros, curve
//! streams sample a fixed base curve at a rate proportional to the stream's
//! sample rate.

use crate::SAMPLES_PER_SUBFRAME;

/// Threshold shape signalled by the `ath` header chunk.
///
/// Streams without an `ath` chunk default by format version: pre-2.0
/// encoders always wrote curve tables, later ones write flat streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AthMode {
    #[default]
    Flat,
    Curve,
}

impl AthMode {
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(AthMode::Flat),
            1 => Some(AthMode::Curve),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u16 {
        match self {
            AthMode::Flat => 0,
            AthMode::Curve => 1,
        }
    }

    /// Default mode for streams whose header carries no `ath` chunk.
    pub fn default_for_version(version: u16) -> Self {
        if version < 0x0200 {
            AthMode::Curve
        } else {
            AthMode::Flat
        }
    }
}

const BASE_CURVE_LEN: usize = 1166;

/// Cubic ramp from silence to full masking, saturating at 255.
const fn base_curve() -> [u8; BASE_CURVE_LEN] {
    let mut curve = [0u8; BASE_CURVE_LEN];
    let mut i = 0;

    while i < BASE_CURVE_LEN {
        let v = (i as u64 * i as u64 * i as u64) / 6_200_000;
        curve[i] = if v > 255 { 255 } else { v as u8 };
        i += 1;
    }

    curve
}

static BASE_CURVE: [u8; BASE_CURVE_LEN] = base_curve();

/// Per-coefficient hearing threshold for one stream.
#[derive(Debug, Clone)]
pub struct Ath {
    table: [u8; SAMPLES_PER_SUBFRAME],
}

impl Ath {
    /// Builds the threshold table for a stream's mode and sample rate.
    pub fn new(mode: AthMode, sample_rate: u32) -> Self {
        let mut table = [0u8; SAMPLES_PER_SUBFRAME];

        if mode == AthMode::Curve {
            let mut acc: u32 = 0;

            for (i, entry) in table.iter_mut().enumerate() {
                let index = (acc >> 13) as usize;
                if index >= BASE_CURVE_LEN {
                    // Everything above the curve's reach is fully masked.
                    for rest in &mut table[i..] {
                        *rest = 0xFF;
                    }
                    break;
                }
                *entry = BASE_CURVE[index];
                acc += sample_rate;
            }
        }

        Self { table }
    }

    #[inline(always)]
    pub fn level(&self, coefficient: usize) -> u8 {
        self.table[coefficient]
    }
}
