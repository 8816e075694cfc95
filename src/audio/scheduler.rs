//! # Windowing Scheduler
//!
//! Decides when enough new audio has accumulated to justify a transcription
//! pass and what sample range that pass covers. The policy: wait for at
//! least `min_new_audio_ms` of unprocessed audio, then submit everything
//! from one overlap before the watermark to the buffer end. After a pass
//! the watermark retreats by one overlap from the window end, so the next
//! pass re-includes the trailing `overlap_ms` of this one: a word sitting
//! on the boundary is transcribed twice rather than clipped.
//!
//! On a final flush (`stop`) the threshold is ignored and no overlap is
//! retained; the watermark lands exactly on the buffer end.

use crate::audio::buffer::{PassWindow, SessionBuffer};

/// Windowing constants, in milliseconds at a fixed sample rate.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Sample rate of the canonical stream (16 kHz)
    pub sample_rate: u32,
    /// Minimum new (unprocessed) audio before a pass triggers
    pub min_new_audio_ms: u32,
    /// Trailing audio re-submitted with the next pass
    pub overlap_ms: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            min_new_audio_ms: 2_000,
            overlap_ms: 500,
        }
    }
}

impl WindowConfig {
    /// Threshold in samples: `sample_rate * min_new_audio_ms / 1000`.
    pub fn min_new_samples(&self) -> usize {
        (self.sample_rate as usize * self.min_new_audio_ms as usize) / 1000
    }

    /// Overlap in samples: `sample_rate * overlap_ms / 1000`.
    pub fn overlap_samples(&self) -> usize {
        (self.sample_rate as usize * self.overlap_ms as usize) / 1000
    }
}

/// Whether a pass was triggered by the threshold or by an explicit flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Threshold-triggered pass; overlap retained for the next pass
    Incremental,
    /// `stop` flush; threshold ignored, no overlap retained
    Final,
}

/// Window policy applied on top of a [`SessionBuffer`].
#[derive(Debug, Clone)]
pub struct WindowingScheduler {
    config: WindowConfig,
}

impl WindowingScheduler {
    pub fn new(config: WindowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Check the trigger rule against the current unprocessed length.
    pub fn should_trigger(&self, unprocessed_len: usize) -> bool {
        unprocessed_len >= self.config.min_new_samples()
    }

    /// Claim the window for a pass, or `None` when no pass is due.
    ///
    /// Incremental claims apply the threshold; final claims only require
    /// that any unprocessed audio exists. Either way the returned window is
    /// guaranteed non-empty.
    pub fn claim(&self, buffer: &SessionBuffer, mode: PassMode) -> Option<PassWindow> {
        let min_new = match mode {
            PassMode::Incremental => Some(self.config.min_new_samples()),
            PassMode::Final => None,
        };
        buffer.claim_window(self.config.overlap_samples(), min_new)
    }

    /// Advance the watermark for a completed pass.
    ///
    /// Returns `false` when the pass belonged to an earlier recording
    /// generation and was discarded.
    pub fn complete(&self, buffer: &SessionBuffer, window: &PassWindow, mode: PassMode) -> bool {
        let retain = match mode {
            PassMode::Incremental => Some(self.config.overlap_samples()),
            PassMode::Final => None,
        };
        buffer.complete_pass(window, retain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> WindowingScheduler {
        WindowingScheduler::new(WindowConfig::default())
    }

    #[test]
    fn test_default_config_sample_math() {
        let config = WindowConfig::default();
        assert_eq!(config.min_new_samples(), 32_000); // 2.0s at 16kHz
        assert_eq!(config.overlap_samples(), 8_000); // 0.5s at 16kHz
    }

    #[test]
    fn test_trigger_boundary() {
        let scheduler = scheduler();
        assert!(!scheduler.should_trigger(31_999));
        assert!(scheduler.should_trigger(32_000));
        assert!(scheduler.should_trigger(40_000));
    }

    #[test]
    fn test_exactly_threshold_samples_trigger_one_pass() {
        let scheduler = scheduler();
        let buffer = SessionBuffer::new();

        // 31_999 new samples: no pass
        buffer.append(&[0.0; 31_999]);
        assert!(scheduler.claim(&buffer, PassMode::Incremental).is_none());

        // One more sample reaches exactly 2.0s: pass over [0, 32_000)
        buffer.append(&[0.0; 1]);
        let window = scheduler.claim(&buffer, PassMode::Incremental).unwrap();
        assert_eq!(window.start, 0);
        assert_eq!(window.end, 32_000);

        assert!(scheduler.complete(&buffer, &window, PassMode::Incremental));
        // Watermark retreats one overlap from the window end
        assert_eq!(buffer.processed(), 24_000);
    }

    #[test]
    fn test_window_includes_overlap_before_watermark() {
        let scheduler = scheduler();
        let buffer = SessionBuffer::new();

        buffer.append(&[0.0; 40_000]);
        let first = scheduler.claim(&buffer, PassMode::Incremental).unwrap();
        scheduler.complete(&buffer, &first, PassMode::Incremental);
        assert_eq!(buffer.processed(), 32_000);

        buffer.append(&[0.0; 32_000]);
        let second = scheduler.claim(&buffer, PassMode::Incremental).unwrap();
        assert_eq!(second.start, 24_000); // processed - overlap
        assert_eq!(second.end, 72_000);
    }

    #[test]
    fn test_final_flush_covers_remainder_exactly() {
        let scheduler = scheduler();
        let buffer = SessionBuffer::new();

        buffer.append(&[0.0; 40_000]);
        let pass = scheduler.claim(&buffer, PassMode::Incremental).unwrap();
        scheduler.complete(&buffer, &pass, PassMode::Incremental);

        // 8_000 unprocessed samples remain, below the threshold
        assert!(scheduler.claim(&buffer, PassMode::Incremental).is_none());

        let flush = scheduler.claim(&buffer, PassMode::Final).unwrap();
        assert_eq!(flush.start, 24_000);
        assert_eq!(flush.end, 40_000);
        assert!(scheduler.complete(&buffer, &flush, PassMode::Final));
        assert_eq!(buffer.processed(), 40_000);
    }

    #[test]
    fn test_final_flush_with_nothing_unprocessed_is_noop() {
        let scheduler = scheduler();
        let buffer = SessionBuffer::new();

        buffer.append(&[0.0; 32_000]);
        let pass = scheduler.claim(&buffer, PassMode::Incremental).unwrap();
        scheduler.complete(&buffer, &pass, PassMode::Incremental);
        buffer.advance_watermark(buffer.len());

        assert!(scheduler.claim(&buffer, PassMode::Final).is_none());
    }

    #[test]
    fn test_custom_config_scales_thresholds() {
        let scheduler = WindowingScheduler::new(WindowConfig {
            sample_rate: 8_000,
            min_new_audio_ms: 1_000,
            overlap_ms: 250,
        });
        assert_eq!(scheduler.config().min_new_samples(), 8_000);
        assert_eq!(scheduler.config().overlap_samples(), 2_000);
    }
}
