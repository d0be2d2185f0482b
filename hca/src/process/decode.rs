//! Block decoding to PCM samples.

use anyhow::{anyhow, Context};
use log::Level;

use crate::log_or_err;
use crate::process::pipeline::{
    apply_intensity_stereo, read_envelope, read_residual, reconstruct_high_frequency,
};
use crate::process::transform::imdct;
use crate::structs::ath::Ath;
use crate::structs::channel::{channel_roles, ChannelRole, ChannelState};
use crate::structs::cipher::{Cipher, CipherMode};
use crate::structs::header::StreamParameters;
use crate::utils::bitstream::BitCursor;
use crate::utils::crc::CRC_STREAM;
use crate::utils::errors::FrameError;
use crate::{BLOCK_SYNC, SAMPLES_PER_BLOCK, SAMPLES_PER_SUBFRAME, SUBFRAMES_PER_BLOCK};

/// A fully decoded stream.
#[derive(Debug, Clone)]
pub struct DecodedStream {
    pub sample_rate: u32,
    pub channel_count: usize,
    /// Interleaved samples in [-1.0, 1.0], one sub-frame of every channel
    /// at a time.
    pub samples: Vec<f32>,
    /// Loop start and end as sample positions per channel, when the
    /// stream declares a loop. The end is exclusive, one sample past the
    /// last looped block, so `end - start` is the loop length.
    pub loop_points: Option<(usize, usize)>,
}

/// Decodes a stream's block payload to PCM.
///
/// All lookup state (cipher, threshold curve, channel layout) is rebuilt
/// from the parameters on every call, so decoding the same input twice
/// yields identical output.
#[derive(Debug, Clone)]
pub struct Decoder {
    /// Validation failures at or below this level abort the decode;
    /// everything above it is logged instead.
    pub fail_level: Level,
    key: Option<(u32, u32)>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            fail_level: Level::Error,
            key: None,
        }
    }
}

impl Decoder {
    pub fn set_fail_level(&mut self, level: Level) -> &mut Self {
        self.fail_level = level;
        self
    }

    /// Sets the keycode for keyed streams as its low and high 32-bit
    /// halves.
    pub fn set_key(&mut self, key1: u32, key2: u32) -> &mut Self {
        self.key = Some((key1, key2));
        self
    }

    /// Decodes `payload`, which must start at the stream's `data_offset`
    /// and contain all `block_count` blocks. Trailing bytes are ignored.
    pub fn decode(
        &self,
        params: &StreamParameters,
        payload: &[u8],
    ) -> anyhow::Result<DecodedStream> {
        let block_size = params.block_size as usize;
        let block_count = params.block_count as usize;
        let channel_count = params.channel_count as usize;

        let need = block_size * block_count;
        if payload.len() < need {
            return Err(FrameError::TruncatedPayload {
                block: payload.len() / block_size,
                need,
                remaining: payload.len(),
            }
            .into());
        }

        if params.cipher_mode == CipherMode::Keyed && self.key.is_none() {
            log::warn!("keyed stream without a keycode, descrambling with keycode 0");
        }
        let keycode = self
            .key
            .map(|(key1, key2)| (key2 as u64) << 32 | key1 as u64)
            .unwrap_or(0);
        let cipher = Cipher::new(params.cipher_mode, keycode);
        let ath = Ath::new(params.ath_mode, params.sample_rate);

        let mut channels: Vec<ChannelState> = channel_roles(
            params.channel_count,
            params.track_count,
            params.channel_config,
            params.stereo_band_count,
        )
        .into_iter()
        .map(|role| ChannelState::new(role, params.base_band_count, params.stereo_band_count))
        .collect();

        let volume = params.volume as f64;
        let mut samples = Vec::with_capacity(block_count * SAMPLES_PER_BLOCK * channel_count);
        let mut scratch = vec![0u8; block_size];

        for block in 0..block_count {
            scratch.copy_from_slice(&payload[block * block_size..(block + 1) * block_size]);

            let calculated = CRC_STREAM.checksum(&scratch[..block_size - 2]);
            let read = u16::from_be_bytes([scratch[block_size - 2], scratch[block_size - 1]]);
            if calculated != read {
                log_or_err!(
                    self,
                    Level::Warn,
                    anyhow!(FrameError::ChecksumMismatch {
                        block,
                        calculated,
                        read,
                    })
                );
            }

            cipher.descramble(&mut scratch);

            if scratch[..block_size - 2].iter().all(|&b| b == 0) {
                // Blank block: decode as silence, but keep the transform
                // running so the overlap tails stay aligned.
                for ch in channels.iter_mut() {
                    ch.spectra = [0.0; SAMPLES_PER_SUBFRAME];
                    for subframe in 0..SUBFRAMES_PER_BLOCK {
                        let mut previous = ch.imdct_previous;
                        imdct(&ch.spectra, &mut previous, &mut ch.wave[subframe]);
                        ch.imdct_previous = previous;
                    }
                }
                Self::emit(&channels, volume, &mut samples);
                continue;
            }

            let mut br = BitCursor::from_block(&scratch);

            let sync = br.consume(16).with_context(|| format!("block {block}"))? as u16;
            if sync != BLOCK_SYNC {
                return Err(FrameError::InvalidSync { block, read: sync }.into());
            }

            let high = br.consume(9).with_context(|| format!("block {block}"))? as i32;
            let low = br.consume(7).with_context(|| format!("block {block}"))? as i32;
            let packed_bias = (high << 8) - low;

            for ch in channels.iter_mut() {
                read_envelope(params, &ath, ch, &mut br, packed_bias)
                    .with_context(|| format!("block {block}"))?;
            }

            for subframe in 0..SUBFRAMES_PER_BLOCK {
                for ch in channels.iter_mut() {
                    read_residual(ch, &mut br).with_context(|| format!("block {block}"))?;
                }

                for ch in channels.iter_mut() {
                    reconstruct_high_frequency(params, ch);
                }

                for i in 0..channel_count.saturating_sub(1) {
                    if channels[i].role == ChannelRole::CouplingPrimary
                        && channels[i + 1].role == ChannelRole::CouplingSecondary
                    {
                        let (head, rest) = channels.split_at_mut(i + 1);
                        apply_intensity_stereo(&mut head[i], &mut rest[0], subframe, params);
                    }
                }

                for ch in channels.iter_mut() {
                    let mut previous = ch.imdct_previous;
                    imdct(&ch.spectra, &mut previous, &mut ch.wave[subframe]);
                    ch.imdct_previous = previous;
                }
            }

            Self::emit(&channels, volume, &mut samples);
        }

        Ok(DecodedStream {
            sample_rate: params.sample_rate,
            channel_count,
            samples,
            loop_points: params.loop_info.map(|info| {
                (
                    info.start_block as usize * SAMPLES_PER_BLOCK,
                    (info.end_block as usize + 1) * SAMPLES_PER_BLOCK,
                )
            }),
        })
    }

    /// Interleaves one block's worth of every channel's samples, applying
    /// the stream volume and clamping in double precision.
    fn emit(channels: &[ChannelState], volume: f64, samples: &mut Vec<f32>) {
        for subframe in 0..SUBFRAMES_PER_BLOCK {
            for n in 0..SAMPLES_PER_SUBFRAME {
                for ch in channels {
                    let sample = (ch.wave[subframe][n] as f64 * volume).clamp(-1.0, 1.0);
                    samples.push(sample as f32);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::tables::{DEQUANT_RANGE, SCALE_FACTOR_GAIN};
    use crate::structs::ath::AthMode;
    use crate::structs::header::LoopInfo;

    fn params(channels: u8, base: u8, stereo: u8, total: u8, block_size: u16) -> StreamParameters {
        StreamParameters {
            version: 0x0200,
            data_offset: 96,
            channel_count: channels,
            sample_rate: 48000,
            block_count: 1,
            encoder_delay: 0,
            encoder_padding: 0,
            block_size,
            min_resolution: 1,
            max_resolution: 15,
            track_count: 1,
            channel_config: 0,
            total_band_count: total,
            base_band_count: base,
            stereo_band_count: stereo,
            bands_per_hfr_group: 0,
            hfr_group_count: 0,
            vbr: None,
            ath_mode: AthMode::Flat,
            loop_info: None,
            cipher_mode: CipherMode::None,
            volume: 1.0,
            comment: None,
            tail: Vec::new(),
        }
    }

    struct BlockBuilder {
        bits: Vec<bool>,
    }

    impl BlockBuilder {
        fn new() -> Self {
            let mut b = Self { bits: Vec::new() };
            b.push(BLOCK_SYNC as u32, 16);
            b.push(0, 9); // packed bias, high part
            b.push(0, 7); // packed bias, low part
            b
        }

        fn push(&mut self, value: u32, n: u32) -> &mut Self {
            for i in (0..n).rev() {
                self.bits.push(value >> i & 1 == 1);
            }
            self
        }

        /// Raw 6-bit scale factors for one channel.
        fn envelope(&mut self, factors: &[u32]) -> &mut Self {
            self.push(6, 3);
            for &factor in factors {
                self.push(factor, 6);
            }
            self
        }

        /// One resolution-15 sign-magnitude code.
        fn code15(&mut self, value: i32) -> &mut Self {
            let code = ((value.unsigned_abs() << 1) | (value < 0) as u32) & 0xFFF;
            self.push(code, 12);
            self
        }

        fn finish(&self, block_size: usize) -> Vec<u8> {
            let mut block = vec![0u8; block_size];
            assert!(self.bits.len() <= (block_size - 2) * 8);
            for (i, &bit) in self.bits.iter().enumerate() {
                if bit {
                    block[i / 8] |= 0x80 >> (i % 8);
                }
            }
            let crc = CRC_STREAM.checksum(&block[..block_size - 2]);
            block[block_size - 2..].copy_from_slice(&crc.to_be_bytes());
            block
        }
    }

    /// Mono stream, one band at scale factor 40, the same residual value
    /// in all eight sub-frames.
    fn mono_stream(value: i32) -> (StreamParameters, Vec<u8>) {
        let p = params(1, 1, 0, 1, 32);
        let mut b = BlockBuilder::new();
        b.envelope(&[40]);
        for _ in 0..SUBFRAMES_PER_BLOCK {
            b.code15(value);
        }
        (p, b.finish(32))
    }

    #[test]
    fn zero_payload_decodes_to_silence() {
        let mut p = params(2, 4, 2, 8, 48);
        p.block_count = 3;
        let payload = {
            let mut block = vec![0u8; 48];
            let crc = CRC_STREAM.checksum(&block[..46]);
            block[46..].copy_from_slice(&crc.to_be_bytes());
            block.repeat(3)
        };

        let decoded = Decoder::default().decode(&p, &payload).unwrap();

        assert_eq!(decoded.channel_count, 2);
        assert_eq!(decoded.samples.len(), 3 * SAMPLES_PER_BLOCK * 2);
        assert!(decoded.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn mono_stream_round_trips_through_the_transform() {
        let (p, payload) = mono_stream(5);
        let decoded = Decoder::default().decode(&p, &payload).unwrap();

        assert_eq!(decoded.sample_rate, 48000);
        assert_eq!(decoded.samples.len(), SAMPLES_PER_BLOCK);
        assert!(decoded.samples.iter().any(|&s| s != 0.0));

        // Scale factor 40 under a flat threshold selects resolution 15.
        let gain = (SCALE_FACTOR_GAIN[40] as f64 * DEQUANT_RANGE[15] as f64) as f32;
        let mut spectra = [0.0f32; SAMPLES_PER_SUBFRAME];
        spectra[0] = 5.0 * gain;

        let mut previous = [0.0f32; SAMPLES_PER_SUBFRAME];
        let mut expected = Vec::new();
        for _ in 0..SUBFRAMES_PER_BLOCK {
            let mut wave = [0.0f32; SAMPLES_PER_SUBFRAME];
            imdct(&spectra, &mut previous, &mut wave);
            expected.extend_from_slice(&wave);
        }

        assert_eq!(decoded.samples, expected);
    }

    #[test]
    fn decoding_twice_is_identical() {
        let (p, payload) = mono_stream(-7);
        let decoder = Decoder::default();
        let first = decoder.decode(&p, &payload).unwrap();
        let second = decoder.decode(&p, &payload).unwrap();
        assert_eq!(first.samples, second.samples);
    }

    #[test]
    fn scrambled_stream_matches_clear_stream() {
        let (clear_params, clear_payload) = mono_stream(3);

        let inverse = Cipher::new(CipherMode::Scrambled, 0).invert();
        let mut scrambled = clear_payload.clone();
        for byte in &mut scrambled[..30] {
            *byte = inverse.substitute(*byte);
        }
        let crc = CRC_STREAM.checksum(&scrambled[..30]);
        scrambled[30..].copy_from_slice(&crc.to_be_bytes());

        let mut scrambled_params = clear_params.clone();
        scrambled_params.cipher_mode = CipherMode::Scrambled;

        let clear = Decoder::default().decode(&clear_params, &clear_payload).unwrap();
        let descrambled = Decoder::default()
            .decode(&scrambled_params, &scrambled)
            .unwrap();

        assert!(clear.samples.iter().any(|&s| s != 0.0));
        assert_eq!(clear.samples, descrambled.samples);
    }

    #[test]
    fn coupled_pair_shares_stereo_bands() {
        // Two channels, one base band and one shared stereo band. The
        // secondary's intensity index 7 splits the shared band evenly.
        let p = params(2, 1, 1, 2, 64);

        let mut b = BlockBuilder::new();
        b.envelope(&[40, 40]); // primary
        b.envelope(&[40]); // secondary, intensity indices follow directly
        for _ in 0..SUBFRAMES_PER_BLOCK {
            b.push(7, 4);
        }
        for _ in 0..SUBFRAMES_PER_BLOCK {
            b.code15(5).code15(3); // primary: base band, stereo band
            b.code15(2); // secondary: base band
        }
        let payload = b.finish(64);

        let decoded = Decoder::default().decode(&p, &payload).unwrap();
        assert_eq!(decoded.samples.len(), 2 * SAMPLES_PER_BLOCK);

        let gain = (SCALE_FACTOR_GAIN[40] as f64 * DEQUANT_RANGE[15] as f64) as f32;
        let mut primary_spectra = [0.0f32; SAMPLES_PER_SUBFRAME];
        primary_spectra[0] = 5.0 * gain;
        primary_spectra[1] = 3.0 * gain;
        let mut secondary_spectra = [0.0f32; SAMPLES_PER_SUBFRAME];
        secondary_spectra[0] = 2.0 * gain;
        secondary_spectra[1] = 3.0 * gain;

        let mut previous = [[0.0f32; SAMPLES_PER_SUBFRAME]; 2];
        let mut expected = Vec::new();
        for _ in 0..SUBFRAMES_PER_BLOCK {
            let mut waves = [[0.0f32; SAMPLES_PER_SUBFRAME]; 2];
            imdct(&primary_spectra, &mut previous[0], &mut waves[0]);
            imdct(&secondary_spectra, &mut previous[1], &mut waves[1]);
            for n in 0..SAMPLES_PER_SUBFRAME {
                expected.push(waves[0][n]);
                expected.push(waves[1][n]);
            }
        }

        assert_eq!(decoded.samples, expected);
    }

    #[test]
    fn wide_resolution_bounds_decode() {
        // Bounds up to 31 pass header validation; the quantizer saturates
        // them at resolution 15 instead of running off its tables.
        let (mut p, payload) = mono_stream(5);
        p.min_resolution = 16;
        p.max_resolution = 31;

        let decoded = Decoder::default().decode(&p, &payload).unwrap();
        assert_eq!(decoded.samples.len(), SAMPLES_PER_BLOCK);
        assert!(decoded.samples.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn sync_corruption_is_fatal() {
        let (p, mut payload) = mono_stream(5);
        payload[0] = 0x7F;
        let crc = CRC_STREAM.checksum(&payload[..30]);
        payload[30..].copy_from_slice(&crc.to_be_bytes());

        let err = Decoder::default().decode(&p, &payload).unwrap_err();
        assert!(err.to_string().contains("sync"));
    }

    #[test]
    fn checksum_mismatch_is_fatal_only_when_strict() {
        let (p, mut payload) = mono_stream(5);
        payload[31] ^= 0xFF;

        assert!(Decoder::default().decode(&p, &payload).is_ok());

        let mut strict = Decoder::default();
        strict.set_fail_level(Level::Warn);
        assert!(strict.decode(&p, &payload).is_err());
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let (p, payload) = mono_stream(5);
        assert!(Decoder::default().decode(&p, &payload[..20]).is_err());
    }

    #[test]
    fn overlap_state_carries_across_blocks() {
        let (mut p, block) = mono_stream(5);
        p.block_count = 2;
        let payload = block.repeat(2);

        let decoded = Decoder::default().decode(&p, &payload).unwrap();

        // The second block's first sub-frame overlaps the first block's
        // tail, so it cannot equal the stream's opening sub-frame.
        let first = &decoded.samples[..SAMPLES_PER_SUBFRAME];
        let second_block = &decoded.samples[SAMPLES_PER_BLOCK..][..SAMPLES_PER_SUBFRAME];
        assert_ne!(first, second_block);
    }

    #[test]
    fn loop_points_are_sample_positions() {
        let (mut p, block) = mono_stream(1);
        p.block_count = 4;
        p.loop_info = Some(LoopInfo {
            start_block: 1,
            end_block: 2,
            start_delay: 0,
            end_padding: 0,
        });
        let payload = block.repeat(4);

        let decoded = Decoder::default().decode(&p, &payload).unwrap();
        assert_eq!(decoded.loop_points, Some((1024, 3072)));
    }
}
