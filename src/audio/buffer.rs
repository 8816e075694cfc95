//! # Session Buffer
//!
//! Per-connection sample buffer for one recording. The buffer is append-only
//! for the life of a recording: samples accumulate from `start` until `stop`
//! and are only cleared when the next recording starts. A watermark tracks
//! how many leading samples have already been submitted for transcription,
//! minus the trailing overlap that gets re-submitted with the next window.
//!
//! ## Thread Safety:
//! Uses `Mutex` interior locking so the WebSocket actor can append frames
//! while the per-session transcription worker claims windows and advances
//! the watermark. Locks are held only for the copy, never across an
//! inference call.
//!
//! ## Invariants:
//! - `0 <= processed <= samples.len()` at all times
//! - the watermark never moves backward
//! - a window is never produced with zero length

use std::sync::Mutex;

/// A sample range claimed for one transcription pass.
///
/// Carries a copy of the samples so inference runs without holding the
/// buffer lock, plus the generation the window was claimed under so results
/// from a previous recording on the same connection can be discarded.
#[derive(Debug, Clone)]
pub struct PassWindow {
    /// First sample index of the window (overlap-adjusted)
    pub start: usize,
    /// One past the last sample index (buffer length at claim time)
    pub end: usize,
    /// The window's samples, copied out of the buffer
    pub samples: Vec<f32>,
    /// Recording generation the window belongs to
    pub generation: u64,
}

#[derive(Debug, Default)]
struct BufferState {
    samples: Vec<f32>,
    /// Watermark: leading samples already submitted for transcription
    processed: usize,
    /// Bumped on every reset; stale pass results are detected against it
    generation: u64,
}

/// Append-only sample buffer with a transcription watermark.
#[derive(Debug, Default)]
pub struct SessionBuffer {
    inner: Mutex<BufferState>,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append decoded samples; returns the total buffer length afterwards.
    pub fn append(&self, samples: &[f32]) -> usize {
        let mut state = self.inner.lock().unwrap();
        state.samples.extend_from_slice(samples);
        state.samples.len()
    }

    /// Total number of samples received since the last reset.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current watermark value.
    pub fn processed(&self) -> usize {
        self.inner.lock().unwrap().processed
    }

    /// Samples past the watermark, not yet submitted for transcription.
    pub fn unprocessed_len(&self) -> usize {
        let state = self.inner.lock().unwrap();
        state.samples.len() - state.processed
    }

    /// Current recording generation.
    pub fn generation(&self) -> u64 {
        self.inner.lock().unwrap().generation
    }

    /// Buffered audio duration at the given sample rate.
    pub fn duration_seconds(&self, sample_rate: u32) -> f64 {
        self.len() as f64 / sample_rate as f64
    }

    /// Clear samples and watermark for a new recording.
    ///
    /// Bumps the generation so any in-flight pass claimed before the reset
    /// is discarded when it completes instead of leaking a stale watermark
    /// into the new recording.
    pub fn reset(&self) {
        let mut state = self.inner.lock().unwrap();
        state.samples.clear();
        state.processed = 0;
        state.generation += 1;
    }

    /// Move the watermark forward to `new_value`.
    ///
    /// The watermark never moves backward and never passes the end of the
    /// buffer; out-of-bounds requests are clamped rather than applied.
    pub fn advance_watermark(&self, new_value: usize) {
        let mut state = self.inner.lock().unwrap();
        let clamped = new_value.min(state.samples.len());
        if clamped > state.processed {
            state.processed = clamped;
        }
    }

    /// Claim a window for one transcription pass.
    ///
    /// ## Modes:
    /// - `min_new_samples = Some(n)`: threshold mode: claims only when at
    ///   least `n` unprocessed samples have accumulated.
    /// - `min_new_samples = None`: flush mode: claims whatever unprocessed
    ///   audio remains, however little.
    ///
    /// In both modes the window starts one overlap before the watermark
    /// (clamped to 0) and runs to the buffer end. Returns `None` when there
    /// is no unprocessed audio; a zero-progress window is never claimed.
    pub fn claim_window(
        &self,
        overlap_samples: usize,
        min_new_samples: Option<usize>,
    ) -> Option<PassWindow> {
        let state = self.inner.lock().unwrap();
        let unprocessed = state.samples.len() - state.processed;

        if unprocessed == 0 {
            return None;
        }
        if let Some(min) = min_new_samples {
            if unprocessed < min {
                return None;
            }
        }

        let start = state.processed.saturating_sub(overlap_samples);
        let end = state.samples.len();
        debug_assert!(start < end);

        Some(PassWindow {
            start,
            end,
            samples: state.samples[start..end].to_vec(),
            generation: state.generation,
        })
    }

    /// Apply the watermark advance for a completed pass.
    ///
    /// With `retain_overlap = Some(n)` the watermark retreats `n` samples
    /// from the window end, so the next pass re-includes that tail. With
    /// `None` (final flush) the watermark lands exactly on the window end.
    ///
    /// Returns `false` without touching the buffer when the window belongs
    /// to an earlier generation (the recording was reset while the pass was
    /// in flight).
    pub fn complete_pass(&self, window: &PassWindow, retain_overlap: Option<usize>) -> bool {
        let mut state = self.inner.lock().unwrap();
        if state.generation != window.generation {
            return false;
        }

        let target = match retain_overlap {
            Some(overlap) => window.end.saturating_sub(overlap),
            None => window.end,
        };
        let clamped = target.min(state.samples.len());
        if clamped > state.processed {
            state.processed = clamped;
        }
        true
    }
}
