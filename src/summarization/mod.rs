//! # Transcript Summarization
//!
//! On-demand summarization of the running transcript. The transcript
//! snapshot is chunked into bounded pieces, each piece goes through the
//! summarization collaborator selected by the session language, and the
//! per-chunk summaries are concatenated into one `summary` event.
//!
//! ## Key Components:
//! - **Chunker**: contiguous ≤ 1800-character pieces, no overlap
//! - **Registry**: language → collaborator mapping with an explicit
//!   default arm
//! - **Model**: candle T5 conditional generation (greedy decode)

pub mod chunker; // Bounded-length transcript chunking
pub mod model; // Candle T5 summarization model
pub mod registry; // Language-keyed collaborator selection and dispatch

pub use chunker::{chunk_text, DEFAULT_CHUNK_SIZE};
pub use registry::{summarize_transcript, Summarizer, SummarizerRegistry};
