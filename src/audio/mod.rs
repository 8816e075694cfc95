//! # Audio Streaming Core
//!
//! Everything between a raw WebSocket frame and a transcription-ready
//! sample window lives here.
//!
//! ## Key Components:
//! - **Decoder**: raw f32 PCM frames → canonical mono 16 kHz samples
//! - **Session Buffer**: append-only sample store with the processed
//!   watermark and overlap bookkeeping
//! - **Windowing Scheduler**: decides when a transcription pass triggers
//!   and what range it covers
//! - **Recording Session**: per-connection lifecycle state and the
//!   session registry
//!
//! ## Audio Format:
//! - **Sample Rate**: 16 kHz
//! - **Channels**: Mono
//! - **Encoding**: little-endian 32-bit float samples in [-1.0, 1.0]

pub mod buffer; // Append-only sample buffer with transcription watermark
pub mod decoder; // PCM frame decoding and validation
pub mod scheduler; // Trigger threshold and window computation
pub mod session; // Per-connection session state and registry
