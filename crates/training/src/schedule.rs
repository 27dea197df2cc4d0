//! Segment curriculum over the batches of a generator.
//!
//! The batch range is split into `segments` equal segments. Segment `s`
//! trains on itself plus up to `history` preceding segments and is validated
//! on segment `s + 1`.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSchedule {
    segments: usize,
    history: usize,
    batches_per_segment: usize,
}

/// Rough wall-clock estimate of a full schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeEstimate {
    pub initial_segments: usize,
    pub regime_segments: usize,
    pub validation_segments: usize,
    pub segment_seconds: f64,
}

impl TimeEstimate {
    pub fn total_hours(&self) -> f64 {
        let segs = self.initial_segments + self.regime_segments + self.validation_segments;
        segs as f64 * self.segment_seconds / 3600.0
    }
}

impl SegmentSchedule {
    pub fn new(total_batches: usize, segments: usize, history: usize) -> anyhow::Result<Self> {
        if segments == 0 {
            anyhow::bail!("segment count must be positive");
        }
        let batches_per_segment = total_batches / segments;
        if batches_per_segment == 0 {
            anyhow::bail!(
                "{total_batches} batches cannot be split into {segments} segments; \
                 reduce the segment count or the batch size"
            );
        }
        Ok(Self {
            segments,
            history,
            batches_per_segment,
        })
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    pub fn history(&self) -> usize {
        self.history
    }

    pub fn batches_per_segment(&self) -> usize {
        self.batches_per_segment
    }

    /// First segment included in the training block of `seg`.
    pub fn first_segment(&self, seg: usize) -> usize {
        seg.saturating_sub(self.history)
    }

    /// Batch indices trained during segment `seg`.
    pub fn training_block(&self, seg: usize) -> Range<usize> {
        let bps = self.batches_per_segment;
        self.first_segment(seg) * bps..(seg + 1) * bps
    }

    /// Batch indices validated after segment `seg`, if any.
    ///
    /// The following segment is used; the last segment has none.
    pub fn validation_block(&self, seg: usize) -> Option<Range<usize>> {
        if self.segments <= 1 || seg + 1 >= self.segments {
            return None;
        }
        let bps = self.batches_per_segment;
        Some((seg + 1) * bps..(seg + 2) * bps)
    }

    /// Segments that get a validation pass.
    pub fn validated_segments(&self) -> usize {
        self.segments.saturating_sub(1)
    }

    pub fn estimate(&self, batch_seconds: f64) -> TimeEstimate {
        let h = self.history;
        TimeEstimate {
            initial_segments: h * (h + 1) / 2,
            regime_segments: self.segments.saturating_sub(h + 1) * h,
            validation_segments: self.validated_segments(),
            segment_seconds: self.batches_per_segment as f64 * batch_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_follow_history_window() {
        let s = SegmentSchedule::new(105, 10, 3).unwrap();
        assert_eq!(s.batches_per_segment(), 10);
        assert_eq!(s.training_block(0), 0..10);
        assert_eq!(s.training_block(2), 0..30);
        assert_eq!(s.training_block(3), 0..40);
        assert_eq!(s.training_block(4), 10..50);
        assert_eq!(s.training_block(9), 60..100);
    }

    #[test]
    fn validation_reads_next_segment() {
        let s = SegmentSchedule::new(100, 10, 3).unwrap();
        assert_eq!(s.validation_block(0), Some(10..20));
        assert_eq!(s.validation_block(8), Some(90..100));
        assert_eq!(s.validation_block(9), None);
        assert_eq!(s.validated_segments(), 9);
    }

    #[test]
    fn single_segment_never_validates() {
        let s = SegmentSchedule::new(5, 1, 3).unwrap();
        assert_eq!(s.training_block(0), 0..5);
        assert_eq!(s.validation_block(0), None);
        assert_eq!(s.validated_segments(), 0);
    }

    #[test]
    fn too_few_batches_rejected() {
        assert!(SegmentSchedule::new(9, 10, 3).is_err());
        assert!(SegmentSchedule::new(9, 0, 3).is_err());
    }

    #[test]
    fn estimate_matches_curriculum_counts() {
        let s = SegmentSchedule::new(1000, 10, 3).unwrap();
        let e = s.estimate(2.5);
        assert_eq!(e.initial_segments, 6);
        assert_eq!(e.regime_segments, 18);
        assert_eq!(e.validation_segments, 9);
        assert!((e.segment_seconds - 250.0).abs() < 1e-9);
        assert!((e.total_hours() - 33.0 * 250.0 / 3600.0).abs() < 1e-9);
    }
}
