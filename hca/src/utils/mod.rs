//! Utility functions and supporting infrastructure.
//!
//! Provides bitstream I/O, CRC validation and error handling for the
//! header parser and the block decoder.

pub mod bitstream;
pub mod crc;
pub mod errors;
