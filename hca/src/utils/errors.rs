#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    #[error("Invalid stream signature. Read {0:#010X}, expected \"HCA\\0\"")]
    InvalidSignature(u32),

    #[error("Missing mandatory \"{0}\" chunk")]
    MissingChunk(&'static str),

    #[error("Header truncated inside \"{chunk}\" chunk: need {need} bytes, {remaining} remain")]
    TruncatedChunk {
        chunk: &'static str,
        need: usize,
        remaining: usize,
    },

    #[error("Header shorter than data_offset: {len} < {data_offset}")]
    TruncatedHeader { len: usize, data_offset: usize },

    #[error("Invalid block_size. Read {0}, expected at least 4")]
    InvalidBlockSize(u16),

    #[error("channel_count must be between 1 and 16. Read {0}")]
    InvalidChannelCount(u8),

    #[error(
        "Invalid quantization bounds: min_resolution = {min}, max_resolution = {max}, expected min <= max <= 31"
    )]
    InvalidResolutionBounds { min: u8, max: u8 },

    #[error(
        "Invalid band layout: base {base} + stereo {stereo} exceeds total {total}, or total > 128"
    )]
    InvalidBandLayout { base: u8, stereo: u8, total: u8 },

    #[error("Invalid cipher mode. Read {0}, expected 0, 1 or 56")]
    InvalidCipherMode(u16),

    #[error("Invalid threshold mode. Read {0}, expected 0 or 1")]
    InvalidAthMode(u16),

    #[error("CRC mismatch in header. Calculated {calculated:#06X}, Read {read:#06X}")]
    ChecksumMismatch { calculated: u16, read: u16 },
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("Invalid sync word in block {block}. Read {read:#06X}, expected 0xFFFF")]
    InvalidSync { block: usize, read: u16 },

    #[error("CRC mismatch in block {block}. Calculated {calculated:#06X}, Read {read:#06X}")]
    ChecksumMismatch {
        block: usize,
        calculated: u16,
        read: u16,
    },

    #[error("Payload truncated at block {block}: need {need} bytes, {remaining} remain")]
    TruncatedPayload {
        block: usize,
        need: usize,
        remaining: usize,
    },
}
