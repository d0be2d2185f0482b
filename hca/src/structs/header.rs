//! Chunked stream header.
//!
//! The header is a CRC-protected sequence of tagged chunks in front of the
//! block payload. Keyed streams set the high bit of every tag byte, so tags
//! are compared with that bit masked off. Exactly one of the `comp` and
//! `dec` chunks describes the band layout; everything else is optional.

use anyhow::anyhow;
use log::Level;

use crate::log_or_err;
use crate::structs::ath::AthMode;
use crate::structs::cipher::CipherMode;
use crate::utils::crc::CRC_STREAM;
use crate::utils::errors::HeaderError;

/// Contents of the optional `vbr` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VbrInfo {
    pub max_block_size: u16,
    pub noise_level: u16,
}

/// Contents of the optional `loop` chunk, in block units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopInfo {
    pub start_block: u32,
    pub end_block: u32,
    pub start_delay: u16,
    pub end_padding: u16,
}

/// Everything the decoder needs to know about a stream, extracted from its
/// header.
#[derive(Debug, Clone)]
pub struct StreamParameters {
    pub version: u16,
    /// Offset of the first compressed block from the start of the file.
    pub data_offset: usize,

    pub channel_count: u8,
    pub sample_rate: u32,
    pub block_count: u32,
    pub encoder_delay: u16,
    pub encoder_padding: u16,

    pub block_size: u16,
    pub min_resolution: u8,
    pub max_resolution: u8,
    pub track_count: u8,
    pub channel_config: u8,
    pub total_band_count: u8,
    pub base_band_count: u8,
    pub stereo_band_count: u8,
    pub bands_per_hfr_group: u8,
    /// Number of bandwidth-extension groups above the coded bands.
    pub hfr_group_count: u8,

    pub vbr: Option<VbrInfo>,
    pub ath_mode: AthMode,
    pub loop_info: Option<LoopInfo>,
    pub cipher_mode: CipherMode,
    /// Stream gain from the `rva` chunk, 1.0 when absent.
    pub volume: f32,
    pub comment: Option<String>,

    /// Unrecognized bytes between the last parsed chunk and the header
    /// checksum, kept verbatim so a rewritten header stays bit-identical.
    pub tail: Vec<u8>,
}

/// Byte reader over one chunk's payload.
struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
    chunk: &'static str,
}

impl<'a> ChunkReader<'a> {
    fn new(data: &'a [u8], pos: usize, chunk: &'static str) -> Self {
        Self { data, pos, chunk }
    }

    fn take(&mut self, need: usize) -> Result<&'a [u8], HeaderError> {
        let remaining = self.data.len().saturating_sub(self.pos);
        if need > remaining {
            return Err(HeaderError::TruncatedChunk {
                chunk: self.chunk,
                need,
                remaining,
            });
        }

        let slice = &self.data[self.pos..self.pos + need];
        self.pos += need;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, HeaderError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, HeaderError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self) -> Result<u32, HeaderError> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    fn u32(&mut self) -> Result<u32, HeaderError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> Result<f32, HeaderError> {
        let b = self.take(4)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Band layout from a `comp` or `dec` chunk.
struct BandLayout {
    block_size: u16,
    min_resolution: u8,
    max_resolution: u8,
    track_count: u8,
    channel_config: u8,
    total_band_count: u8,
    base_band_count: u8,
    stereo_band_count: u8,
    bands_per_hfr_group: u8,
}

/// Parses the chunked header into [`StreamParameters`].
#[derive(Debug, Clone)]
pub struct HeaderParser {
    /// Validation failures at or below this level abort the parse;
    /// everything above it is logged instead.
    pub fail_level: Level,
}

impl Default for HeaderParser {
    fn default() -> Self {
        Self {
            fail_level: Level::Error,
        }
    }
}

impl HeaderParser {
    pub fn set_fail_level(&mut self, level: Level) -> &mut Self {
        self.fail_level = level;
        self
    }

    /// Parses a stream header from the start of `data`.
    ///
    /// `data` must contain at least `data_offset` bytes; trailing payload
    /// bytes are ignored. A checksum mismatch is diagnostic by default and
    /// fatal when `fail_level` is raised to [`Level::Warn`].
    pub fn parse(&self, data: &[u8]) -> anyhow::Result<StreamParameters> {
        if data.len() < 10 {
            return Err(HeaderError::TruncatedHeader {
                len: data.len(),
                data_offset: 10,
            }
            .into());
        }

        if !data[..4].iter().zip(b"HCA\0").all(|(b, sig)| b & 0x7F == *sig) {
            let read = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
            return Err(HeaderError::InvalidSignature(read).into());
        }

        let version = u16::from_be_bytes([data[4], data[5]]);
        let data_offset = u16::from_be_bytes([data[6], data[7]]) as usize;

        if data_offset < 10 || data.len() < data_offset {
            return Err(HeaderError::TruncatedHeader {
                len: data.len(),
                data_offset,
            }
            .into());
        }

        let calculated = CRC_STREAM.checksum(&data[..data_offset - 2]);
        let read = u16::from_be_bytes([data[data_offset - 2], data[data_offset - 1]]);
        if calculated != read {
            log_or_err!(
                self,
                Level::Warn,
                anyhow!(HeaderError::ChecksumMismatch { calculated, read })
            );
        }

        let body_end = data_offset - 2;
        let mut pos = 8;

        let mut fmt: Option<(u8, u32, u32, u16, u16)> = None;
        let mut layout: Option<BandLayout> = None;
        let mut vbr = None;
        let mut ath_mode = None;
        let mut loop_info = None;
        let mut cipher_mode = CipherMode::None;
        let mut volume = 1.0f32;
        let mut comment = None;

        while pos + 4 <= body_end {
            let tag = [
                data[pos] & 0x7F,
                data[pos + 1] & 0x7F,
                data[pos + 2] & 0x7F,
                data[pos + 3] & 0x7F,
            ];
            let body = &data[..body_end];

            match &tag {
                b"fmt\0" => {
                    let mut r = ChunkReader::new(body, pos + 4, "fmt");
                    fmt = Some((r.u8()?, r.u24()?, r.u32()?, r.u16()?, r.u16()?));
                    pos = r.pos;
                }
                b"comp" => {
                    let mut r = ChunkReader::new(body, pos + 4, "comp");
                    let parsed = BandLayout {
                        block_size: r.u16()?,
                        min_resolution: r.u8()?,
                        max_resolution: r.u8()?,
                        track_count: r.u8()?,
                        channel_config: r.u8()?,
                        total_band_count: r.u8()?,
                        base_band_count: r.u8()?,
                        stereo_band_count: r.u8()?,
                        bands_per_hfr_group: r.u8()?,
                    };
                    r.take(2)?;
                    layout = Some(parsed);
                    pos = r.pos;
                }
                b"dec\0" => {
                    let mut r = ChunkReader::new(body, pos + 4, "dec");
                    let block_size = r.u16()?;
                    let min_resolution = r.u8()?;
                    let max_resolution = r.u8()?;
                    let total_band_count = r.u8()?.wrapping_add(1);
                    let mut base_band_count = r.u8()?.wrapping_add(1);
                    let track_config = r.u8()?;
                    let stereo_type = r.u8()?;

                    if stereo_type == 0 {
                        base_band_count = total_band_count;
                    }

                    layout = Some(BandLayout {
                        block_size,
                        min_resolution,
                        max_resolution,
                        track_count: track_config >> 4,
                        channel_config: track_config & 0xF,
                        total_band_count,
                        base_band_count,
                        stereo_band_count: total_band_count.saturating_sub(base_band_count),
                        bands_per_hfr_group: 0,
                    });
                    pos = r.pos;
                }
                b"vbr\0" => {
                    let mut r = ChunkReader::new(body, pos + 4, "vbr");
                    vbr = Some(VbrInfo {
                        max_block_size: r.u16()?,
                        noise_level: r.u16()?,
                    });
                    pos = r.pos;
                }
                b"ath\0" => {
                    let mut r = ChunkReader::new(body, pos + 4, "ath");
                    let raw = r.u16()?;
                    ath_mode = Some(
                        AthMode::from_raw(raw).ok_or(HeaderError::InvalidAthMode(raw))?,
                    );
                    pos = r.pos;
                }
                b"loop" => {
                    let mut r = ChunkReader::new(body, pos + 4, "loop");
                    loop_info = Some(LoopInfo {
                        start_block: r.u32()?,
                        end_block: r.u32()?,
                        start_delay: r.u16()?,
                        end_padding: r.u16()?,
                    });
                    pos = r.pos;
                }
                b"ciph" => {
                    let mut r = ChunkReader::new(body, pos + 4, "ciph");
                    cipher_mode = CipherMode::from_raw(r.u16()?)?;
                    pos = r.pos;
                }
                b"rva\0" => {
                    let mut r = ChunkReader::new(body, pos + 4, "rva");
                    volume = r.f32()?;
                    pos = r.pos;
                }
                b"comm" => {
                    let mut r = ChunkReader::new(body, pos + 4, "comm");
                    let len = r.u8()? as usize;
                    let bytes = r.take(len)?;
                    comment = Some(String::from_utf8_lossy(bytes).into_owned());
                    pos = r.pos;
                }
                b"pad\0" => {
                    // Padding runs to the checksum.
                    pos = body_end;
                }
                _ => break,
            }
        }

        let tail = data[pos.min(body_end)..body_end].to_vec();

        let Some((channel_count, sample_rate, block_count, encoder_delay, encoder_padding)) = fmt
        else {
            return Err(HeaderError::MissingChunk("fmt").into());
        };

        let Some(layout) = layout else {
            return Err(HeaderError::MissingChunk("comp").into());
        };

        if channel_count == 0 || channel_count > 16 {
            return Err(HeaderError::InvalidChannelCount(channel_count).into());
        }

        // A block must hold at least the sync word and its checksum.
        if layout.block_size < 4 {
            return Err(HeaderError::InvalidBlockSize(layout.block_size).into());
        }

        if layout.min_resolution > layout.max_resolution || layout.max_resolution > 31 {
            return Err(HeaderError::InvalidResolutionBounds {
                min: layout.min_resolution,
                max: layout.max_resolution,
            }
            .into());
        }

        let coded = layout.base_band_count as u16 + layout.stereo_band_count as u16;
        if coded > layout.total_band_count as u16 || layout.total_band_count > 128 {
            return Err(HeaderError::InvalidBandLayout {
                base: layout.base_band_count,
                stereo: layout.stereo_band_count,
                total: layout.total_band_count,
            }
            .into());
        }

        let hfr_bands = layout.total_band_count as u32 - coded as u32;
        let hfr_group_count = if layout.bands_per_hfr_group > 0 {
            hfr_bands.div_ceil(layout.bands_per_hfr_group as u32) as u8
        } else {
            0
        };

        Ok(StreamParameters {
            version,
            data_offset,
            channel_count,
            sample_rate,
            block_count,
            encoder_delay,
            encoder_padding,
            block_size: layout.block_size,
            min_resolution: layout.min_resolution,
            max_resolution: layout.max_resolution,
            track_count: layout.track_count,
            channel_config: layout.channel_config,
            total_band_count: layout.total_band_count,
            base_band_count: layout.base_band_count,
            stereo_band_count: layout.stereo_band_count,
            bands_per_hfr_group: layout.bands_per_hfr_group,
            hfr_group_count,
            vbr,
            ath_mode: ath_mode.unwrap_or_else(|| AthMode::default_for_version(version)),
            loop_info,
            cipher_mode,
            volume,
            comment,
            tail,
        })
    }
}
