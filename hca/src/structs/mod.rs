//! Data structures representing HCA format components.
//!
//! Contains structured representations of the chunked stream header, the
//! block descrambling cipher, the perceptual threshold table and per-channel
//! decode state used throughout the decoding pipeline.

pub mod ath;
pub mod channel;
pub mod cipher;
pub mod header;
