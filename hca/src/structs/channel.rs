//! Channel roles and per-channel decode state.

use crate::{SAMPLES_PER_SUBFRAME, SUBFRAMES_PER_BLOCK};

/// Role a channel plays in joint-stereo reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelRole {
    /// Carries its own spectrum for every coded band.
    #[default]
    Plain,
    /// Left half of a coupled pair; codes the shared high-band spectrum.
    CouplingPrimary,
    /// Right half of a coupled pair; codes intensity ratios instead of
    /// high-band spectrum.
    CouplingSecondary,
}

/// Assigns a role to every channel from the header's track layout.
///
/// Coupling only exists when the stream has stereo bands and more than one
/// channel per track. The per-track patterns follow the encoder's fixed
/// speaker layouts; layouts with more than 8 channels per track are not
/// produced by any known encoder and decode as independent channels.
pub fn channel_roles(
    channel_count: u8,
    track_count: u8,
    channel_config: u8,
    stereo_band_count: u8,
) -> Vec<ChannelRole> {
    use ChannelRole::{CouplingPrimary as P, CouplingSecondary as S, Plain as D};

    let channel_count = channel_count as usize;
    let tracks = track_count.max(1) as usize;
    let per_track = channel_count / tracks;

    if stereo_band_count == 0 || per_track < 2 {
        return vec![D; channel_count];
    }

    let pattern: &[ChannelRole] = match per_track {
        2 => &[P, S],
        3 => &[P, S, D],
        4 if channel_config == 0 => &[P, S, P, S],
        4 => &[P, S, D, D],
        5 if channel_config > 2 => &[P, S, D, D, D],
        5 => &[P, S, D, P, S],
        6 => &[P, S, D, D, P, S],
        7 => &[P, S, D, D, P, S, D],
        8 => &[P, S, D, D, P, S, P, S],
        _ => return vec![D; channel_count],
    };

    let mut roles = Vec::with_capacity(channel_count);
    for _ in 0..tracks {
        roles.extend_from_slice(pattern);
    }
    // Channels past the last full track are independent.
    roles.resize(channel_count, D);
    roles
}

/// Working state for one channel.
///
/// Everything except `imdct_previous` is rebuilt from scratch for every
/// block. `imdct_previous` is the overlap-add tail of the inverse transform
/// and must persist across sub-frames and blocks.
#[derive(Debug, Clone)]
pub struct ChannelState {
    pub role: ChannelRole,
    /// Coefficients this channel codes itself: the base bands, plus the
    /// stereo bands unless the channel is a coupling secondary.
    pub coded_count: usize,
    pub scale_factors: [u8; SAMPLES_PER_SUBFRAME],
    pub resolution: [u8; SAMPLES_PER_SUBFRAME],
    pub gain: [f32; SAMPLES_PER_SUBFRAME],
    /// Per-sub-frame intensity ratio indices, coded by secondaries.
    pub intensity: [u8; SUBFRAMES_PER_BLOCK],
    /// Scale factors for the bandwidth-extension groups.
    pub hfr_scales: [u8; SAMPLES_PER_SUBFRAME],
    pub spectra: [f32; SAMPLES_PER_SUBFRAME],
    /// Overlap-add carry of the inverse transform.
    pub imdct_previous: [f32; SAMPLES_PER_SUBFRAME],
    /// Reconstructed time-domain samples for the current block.
    pub wave: [[f32; SAMPLES_PER_SUBFRAME]; SUBFRAMES_PER_BLOCK],
}

impl ChannelState {
    pub fn new(role: ChannelRole, base_band_count: u8, stereo_band_count: u8) -> Self {
        let coded_count = if role == ChannelRole::CouplingSecondary {
            base_band_count as usize
        } else {
            base_band_count as usize + stereo_band_count as usize
        };

        Self {
            role,
            coded_count,
            ..Default::default()
        }
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            role: ChannelRole::Plain,
            coded_count: 0,
            scale_factors: [0; SAMPLES_PER_SUBFRAME],
            resolution: [0; SAMPLES_PER_SUBFRAME],
            gain: [0.0; SAMPLES_PER_SUBFRAME],
            intensity: [0; SUBFRAMES_PER_BLOCK],
            hfr_scales: [0; SAMPLES_PER_SUBFRAME],
            spectra: [0.0; SAMPLES_PER_SUBFRAME],
            imdct_previous: [0.0; SAMPLES_PER_SUBFRAME],
            wave: [[0.0; SAMPLES_PER_SUBFRAME]; SUBFRAMES_PER_BLOCK],
        }
    }
}
