//! # Audio Module
//!
//! Everything the relay does with raw PCM audio besides fanning it out:
//!
//! - **Session Buffer Store**: capped per-session accumulation of recent
//!   audio for bulk retrieval (sliding window, oldest bytes dropped first)
//! - **Statistics Engine**: inline peak/RMS computation over each chunk
//! - **WAV Header Codec**: 44-byte RIFF/WAVE header for download responses
//!
//! ## Audio Format:
//! All audio is treated as little-endian signed 16-bit PCM. Sample rate and
//! channel count are supplied by the producer on each request (the data is
//! not self-describing); producers and consumers must agree out of band.

pub mod buffer;   // Capped per-session byte accumulation
pub mod stats;    // Peak/RMS over one PCM chunk
pub mod wav;      // RIFF/WAVE header construction
