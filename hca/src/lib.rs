#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Parser and decoder for the HCA lossy frequency-domain audio codec found
//! in proprietary game asset containers.
//!
//! ### Stream Organization
//!
//! **Header**: a sequence of tagged metadata chunks protected by a CRC-16.
//! **Payload**: `block_count` compressed blocks of `block_size` bytes, each
//! carrying 8 sub-frames of 128 spectral coefficients per channel and a
//! trailing CRC-16.
//!
//! ### Decoding
//!
//! Blocks are descrambled with a byte-substitution cipher, then every
//! channel runs a five-stage reconstruction pipeline: spectral base,
//! residual, bandwidth extension, stereo coupling, and an inverse frequency
//! transform whose overlap-add state persists across sub-frames and blocks.
//!
//! ## Quick Start
//!
//! 1. Parse the chunked header with [`structs::header::HeaderParser`]
//! 2. Decode the payload to PCM samples with [`process::decode::Decoder`]
//!
//! ```rust,no_run
//! use hca::process::decode::Decoder;
//! use hca::structs::header::HeaderParser;
//!
//! let data = std::fs::read("stream.hca")?;
//! let params = HeaderParser::default().parse(&data)?;
//!
//! let decoder = Decoder::default();
//! let decoded = decoder.decode(&params, &data[params.data_offset..])?;
//!
//! for sample in &decoded.samples {
//!     // Interleaved f32 PCM, clamped to [-1.0, 1.0].
//!     let _ = sample;
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Processing functionality for compressed blocks.
///
/// 1. **Pipeline stages** ([`process::pipeline`]): per-channel spectral
///    reconstruction.
/// 2. **Inverse transform** ([`process::transform`]): 128-point inverse
///    DCT with windowed overlap-add.
/// 3. **Decoding** ([`process::decode`]): block orchestration and sample
///    assembly.
pub mod process;

/// Data structures representing HCA format components.
///
/// - **Stream header** ([`structs::header`]): chunked metadata and layout
/// - **Cipher tables** ([`structs::cipher`]): block descrambling
/// - **ATH tables** ([`structs::ath`]): perceptual threshold curve
/// - **Channels** ([`structs::channel`]): roles and persistent decode state
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream`]): bit-level block access
/// - **CRC Validation** ([`utils::crc`]): error detection
/// - **Error Handling** ([`utils::errors`]): error types
pub mod utils;

/// Spectral coefficients (and decoded samples) per sub-frame.
pub const SAMPLES_PER_SUBFRAME: usize = 128;

/// Sub-frames per compressed block.
pub const SUBFRAMES_PER_BLOCK: usize = 8;

/// Decoded samples per channel per block.
pub const SAMPLES_PER_BLOCK: usize = SAMPLES_PER_SUBFRAME * SUBFRAMES_PER_BLOCK;

/// 16-bit marker at the start of every non-blank compressed block.
pub const BLOCK_SYNC: u16 = 0xFFFF;

/// Audio container formats of the surrounding toolkit.
///
/// Only [`ContainerKind::Hca`] is decoded by this crate; the sibling
/// formats are handled by their own tools and are listed here so callers
/// can route files without sniffing signatures themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Frequency-domain lossy codec (this crate).
    Hca,
    /// Fixed-predictor ADPCM codec.
    Adx,
    /// Uncompressed RIFF/WAVE container.
    Wav,
}

impl ContainerKind {
    /// Identifies the container from the first bytes of a file.
    ///
    /// The HCA signature compare masks the high bit of each byte, since
    /// keyed streams set it on every header tag.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }

        if data[..4].iter().zip(b"HCA\0").all(|(b, sig)| b & 0x7F == *sig) {
            Some(ContainerKind::Hca)
        } else if data[0] == 0x80 && data[1] == 0x00 {
            Some(ContainerKind::Adx)
        } else if &data[..4] == b"RIFF" {
            Some(ContainerKind::Wav)
        } else {
            None
        }
    }

    /// Whether this crate can decode the container natively.
    pub fn is_supported(self) -> bool {
        matches!(self, ContainerKind::Hca)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_containers() {
        assert_eq!(ContainerKind::detect(b"HCA\0\x02\x00"), Some(ContainerKind::Hca));
        // Keyed streams mask the signature's high bits.
        assert_eq!(
            ContainerKind::detect(&[0xC8, 0xC3, 0xC1, 0x80]),
            Some(ContainerKind::Hca)
        );
        assert_eq!(ContainerKind::detect(&[0x80, 0x00, 0x01, 0x02]), Some(ContainerKind::Adx));
        assert_eq!(ContainerKind::detect(b"RIFF\x10\x00"), Some(ContainerKind::Wav));
        assert_eq!(ContainerKind::detect(b"OggS"), None);
        assert!(ContainerKind::Hca.is_supported());
        assert!(!ContainerKind::Adx.is_supported());
    }
}
