//! Spectral reconstruction stages.
//!
//! A block carries one envelope per channel followed by eight sub-frames
//! of residual codes. The stages here rebuild each channel's spectrum in
//! place: envelope and resolution selection, residual dequantization,
//! bandwidth extension and intensity stereo. The inverse transform in
//! [`transform`](crate::process::transform) finishes the chain.

use std::io;

use crate::process::tables::{
    DEQUANT_RANGE, INTENSITY_RATIO, QUANT_CODE_LENGTH, QUANT_CODE_VALUE, QUANT_WIDTH,
    SCALE_CONVERSION, SCALE_FACTOR_GAIN, SCALE_TO_RESOLUTION,
};
use crate::structs::ath::Ath;
use crate::structs::channel::{ChannelRole, ChannelState};
use crate::structs::header::StreamParameters;
use crate::utils::bitstream::BitCursor;
use crate::SAMPLES_PER_SUBFRAME;

/// Reads one channel's envelope and derives resolution and gain for every
/// coded coefficient. Runs once per channel per block, before any residual.
pub fn read_envelope(
    params: &StreamParameters,
    ath: &Ath,
    ch: &mut ChannelState,
    br: &mut BitCursor,
    packed_bias: i32,
) -> io::Result<()> {
    read_scale_factors(ch, br)?;

    if ch.role == ChannelRole::CouplingSecondary {
        for entry in ch.intensity.iter_mut() {
            *entry = br.consume(4)? as u8;
        }
    } else if params.hfr_group_count > 0 {
        ch.hfr_scales.fill(0);
        for entry in ch.hfr_scales[..params.hfr_group_count as usize].iter_mut() {
            *entry = br.consume(6)? as u8;
        }
    }

    select_resolutions(params, ath, ch, packed_bias);
    Ok(())
}

/// Scale factors are delta-coded: a 3-bit width selects between all-zero
/// envelopes, per-coefficient deltas with an escape to a raw 6-bit value,
/// and uncompressed 6-bit factors.
fn read_scale_factors(ch: &mut ChannelState, br: &mut BitCursor) -> io::Result<()> {
    ch.scale_factors.fill(0);
    let coded = ch.coded_count;

    let delta_bits = br.consume(3)?;
    if delta_bits >= 6 {
        for factor in ch.scale_factors[..coded].iter_mut() {
            *factor = br.consume(6)? as u8;
        }
        return Ok(());
    }

    if delta_bits == 0 {
        return Ok(());
    }

    let escape = (1u32 << delta_bits) - 1;
    let half = escape >> 1;
    let mut value = br.consume(6)?;
    ch.scale_factors[0] = value as u8;

    for factor in ch.scale_factors[1..coded].iter_mut() {
        let delta = br.consume(delta_bits)?;
        value = if delta == escape {
            br.consume(6)?
        } else {
            value.wrapping_add(delta).wrapping_sub(half) & 0x3F
        };
        *factor = value as u8;
    }

    Ok(())
}

/// Maps each coefficient's scale factor to a quantization resolution by
/// comparing it against the noise floor, then derives the dequantization
/// gain. The floor combines the hearing threshold with the block's packed
/// bias, rising slowly with the coefficient index.
fn select_resolutions(
    params: &StreamParameters,
    ath: &Ath,
    ch: &mut ChannelState,
    packed_bias: i32,
) {
    ch.resolution.fill(0);
    ch.gain.fill(0.0);

    for i in 0..ch.coded_count {
        let scale_factor = ch.scale_factors[i];
        if scale_factor == 0 {
            continue;
        }

        let noise_level = ath.level(i) as i32 + ((packed_bias + i as i32) >> 8);
        let curve_position = noise_level + 1 - 2 * scale_factor as i32;

        // Headers may declare bounds up to 31, but the quantizer only
        // defines resolutions 0 through 15.
        let resolution = match curve_position {
            i32::MIN..0 => 15,
            0..64 => SCALE_TO_RESOLUTION[curve_position as usize],
            _ => 0,
        }
        .clamp(params.min_resolution, params.max_resolution)
        .min(15);

        ch.resolution[i] = resolution;
        ch.gain[i] = (SCALE_FACTOR_GAIN[scale_factor as usize] as f64
            * DEQUANT_RANGE[resolution as usize] as f64) as f32;
    }
}

/// Dequantizes one sub-frame of residual codes into `ch.spectra`.
///
/// High resolutions store sign-magnitude codes where zero drops its
/// trailing sign bit; low resolutions use the prefix code tables. The
/// advance is clamped to the bits remaining so that envelopes packed flush
/// against the end of a block decode their tail coefficients as silence.
pub fn read_residual(ch: &mut ChannelState, br: &mut BitCursor) -> io::Result<()> {
    ch.spectra = [0.0; SAMPLES_PER_SUBFRAME];

    for i in 0..ch.coded_count {
        let resolution = ch.resolution[i] as usize;
        if resolution == 0 {
            continue;
        }

        let width = QUANT_WIDTH[resolution];
        let code = br.peek(width)?;

        let (value, advance) = if resolution >= 8 {
            let magnitude = (code >> 1) as i32;
            let value = (1 - 2 * (code & 1) as i32) * magnitude;
            let advance = if value == 0 { width - 1 } else { width };
            (value as f32, advance)
        } else {
            let index = (resolution << 4) + code as usize;
            (QUANT_CODE_VALUE[index], QUANT_CODE_LENGTH[index])
        };

        let advance = (advance as u64).min(br.available()?);
        br.rewind(advance as i64)?;

        ch.spectra[i] = value * ch.gain[i];
    }

    Ok(())
}

/// Fills the bands above the coded range by mirroring coded coefficients
/// outward, scaled by the gain ratio between the group's scale factor and
/// the source coefficient's. Coefficient 127 always stays silent.
pub fn reconstruct_high_frequency(params: &StreamParameters, ch: &mut ChannelState) {
    if ch.role == ChannelRole::CouplingSecondary
        || params.hfr_group_count == 0
        || params.bands_per_hfr_group == 0
    {
        return;
    }

    let start = params.base_band_count as usize + params.stereo_band_count as usize;
    let limit = (params.total_band_count as usize).min(SAMPLES_PER_SUBFRAME - 1);

    let mut high = start;
    let mut low = start as isize - 1;

    for group in 0..params.hfr_group_count as usize {
        for _ in 0..params.bands_per_hfr_group {
            if high >= limit || low < 0 {
                return;
            }

            let distance =
                ch.hfr_scales[group] as i32 - ch.scale_factors[low as usize] as i32 + 64;
            let gain = SCALE_CONVERSION[distance.clamp(0, 127) as usize];

            ch.spectra[high] = gain * ch.spectra[low as usize];
            high += 1;
            low -= 1;
        }
    }
}

/// Splits a coupled pair's shared stereo bands between both channels.
///
/// The primary carries the coded spectrum; the secondary contributes only
/// the per-sub-frame ratio index. The two shares always sum to twice the
/// coded value.
pub fn apply_intensity_stereo(
    primary: &mut ChannelState,
    secondary: &mut ChannelState,
    subframe: usize,
    params: &StreamParameters,
) {
    if primary.role != ChannelRole::CouplingPrimary || params.stereo_band_count == 0 {
        return;
    }

    let ratio_index = secondary.intensity[subframe].min(14) as usize;
    let primary_share = INTENSITY_RATIO[ratio_index];
    let secondary_share = 2.0 - primary_share;

    let base = params.base_band_count as usize;
    let total = params.total_band_count as usize;

    for i in base..total {
        let value = primary.spectra[i];
        primary.spectra[i] = value * primary_share;
        secondary.spectra[i] = value * secondary_share;
    }
}
