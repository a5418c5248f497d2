//! # WAV Header Codec
//!
//! Builds the canonical 44-byte RIFF/WAVE header for raw 16-bit linear PCM
//! data. The relay stores and forwards bare PCM; the header is only attached
//! when a client asks for a downloadable WAV file, so this stays a pure
//! function with no state.
//!
//! ## Header Layout (44 bytes):
//! - `RIFF` + total file size minus 8 + `WAVE`
//! - `fmt ` subchunk: size 16, format 1 (PCM), channels, sample rate,
//!   byte rate, block align, 16 bits per sample
//! - `data` + PCM data length

use byteorder::{ByteOrder, LittleEndian};

/// Size of a canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// Build a WAV header describing `data_len` bytes of 16-bit PCM.
///
/// Byte-for-byte reproducible so standard WAV readers accept the output.
/// All multi-byte fields are little-endian.
pub fn wav_header(data_len: usize, sample_rate: u32, channels: u16) -> [u8; WAV_HEADER_LEN] {
    let mut header = [0u8; WAV_HEADER_LEN];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    LittleEndian::write_u32(&mut header[4..8], data_len as u32 + 36);
    header[8..12].copy_from_slice(b"WAVE");

    // fmt subchunk: 16 bytes, format code 1 = uncompressed PCM
    header[12..16].copy_from_slice(b"fmt ");
    LittleEndian::write_u32(&mut header[16..20], 16);
    LittleEndian::write_u16(&mut header[20..22], 1);
    LittleEndian::write_u16(&mut header[22..24], channels);
    LittleEndian::write_u32(&mut header[24..28], sample_rate);
    // byte rate = sample_rate * channels * bytes per sample
    LittleEndian::write_u32(&mut header[28..32], sample_rate * channels as u32 * 2);
    // block align = channels * bytes per sample
    LittleEndian::write_u16(&mut header[32..34], channels * 2);
    LittleEndian::write_u16(&mut header[34..36], 16);

    // data subchunk
    header[36..40].copy_from_slice(b"data");
    LittleEndian::write_u32(&mut header[40..44], data_len as u32);

    header
}
