//! # Audio Frame Decoder
//!
//! Converts raw binary WebSocket frames into the canonical sample format:
//! mono, 16 kHz, 32-bit float samples in [-1.0, 1.0]. Stateless: each frame
//! decodes independently of every other frame.
//!
//! ## Wire Format:
//! Clients send little-endian IEEE 754 `f32` samples, so a valid frame is
//! always a multiple of 4 bytes. Frames that fail to decode are rejected as
//! a whole; a failed frame never reaches the session buffer.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Bytes per 32-bit float PCM sample.
pub const BYTES_PER_SAMPLE: usize = 4;

/// Decode a raw PCM frame into canonical `f32` samples.
///
/// ## Validation:
/// 1. Frame must be non-empty
/// 2. Frame length must be a multiple of 4 bytes
/// 3. Samples must be finite (NaN/infinity indicates a corrupt frame)
///
/// Samples outside [-1.0, 1.0] are clamped to the canonical range.
pub fn decode_frame(data: &[u8]) -> Result<Vec<f32>, String> {
    if data.is_empty() {
        return Err("No audio data provided".to_string());
    }
    if data.len() % BYTES_PER_SAMPLE != 0 {
        return Err(format!(
            "Audio frame length {} is not a multiple of {} bytes (32-bit float samples)",
            data.len(),
            BYTES_PER_SAMPLE
        ));
    }

    let mut cursor = Cursor::new(data);
    let mut samples = Vec::with_capacity(data.len() / BYTES_PER_SAMPLE);

    while let Ok(sample) = cursor.read_f32::<LittleEndian>() {
        if !sample.is_finite() {
            return Err("Audio frame contains non-finite samples".to_string());
        }
        samples.push(sample.clamp(-1.0, 1.0));
    }

    Ok(samples)
}
