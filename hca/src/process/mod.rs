//! Processing functionality for compressed blocks.

/// Quantization and scaling tables shared by the pipeline stages.
pub mod tables;

/// Per-channel spectral reconstruction stages.
///
/// Each stage reads from the block's [`BitCursor`](crate::utils::bitstream::BitCursor)
/// or transforms spectra produced by an earlier stage.
pub mod pipeline;

/// Inverse frequency transform with windowed overlap-add.
pub mod transform;

/// Block decoding to PCM samples.
///
/// Provides the [`Decoder`](decode::Decoder) for converting a block payload
/// into a [`DecodedStream`](decode::DecodedStream) of interleaved samples.
pub mod decode;
