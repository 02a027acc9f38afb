use crate::foundation::error::{ReelError, ReelResult};

/// Upper bound on resampled output length.
pub const MAX_OUTPUT_FRAMES: usize = 1_000_000;

/// Source frame indices selected for output, in output order.
///
/// Indices are non-decreasing and always valid for the sequence they were computed for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameTimeline {
    indices: Vec<usize>,
}

impl FrameTimeline {
    /// One output frame per source frame.
    pub fn identity(source_frame_count: usize) -> Self {
        Self {
            indices: (0..source_frame_count).collect(),
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Source frame shown at output position `position`.
    pub fn source_index(&self, position: usize) -> Option<usize> {
        self.indices.get(position).copied()
    }
}

/// Map a source sequence onto an output frame rate.
///
/// Without a rate every source frame is kept. With a rate, `round(duration_s * rate)` indices are
/// spread evenly (both ends inclusive) over `[0, source_frame_count - 1]` and rounded to the
/// nearest source frame. A single output frame yields `[0]`; zero output frames, or more than
/// [`MAX_OUTPUT_FRAMES`], is an error.
pub fn resample(
    t_start_s: f64,
    t_stop_s: f64,
    source_frame_count: usize,
    frame_rate: Option<f64>,
) -> ReelResult<FrameTimeline> {
    if source_frame_count == 0 {
        return Err(ReelError::validation(
            "cannot resample an empty image sequence",
        ));
    }

    let Some(rate) = frame_rate else {
        return Ok(FrameTimeline::identity(source_frame_count));
    };

    if !rate.is_finite() || rate <= 0.0 {
        return Err(ReelError::validation(format!(
            "frame rate must be a positive finite number (got {rate})"
        )));
    }
    let duration_s = t_stop_s - t_start_s;
    if !duration_s.is_finite() || duration_s < 0.0 {
        return Err(ReelError::validation(format!(
            "recording duration must be non-negative (t_start={t_start_s}s, t_stop={t_stop_s}s)"
        )));
    }

    let target = (duration_s * rate).round();
    if target < 1.0 {
        return Err(ReelError::validation(format!(
            "frame rate {rate} Hz over {duration_s} s yields no output frames"
        )));
    }
    if target > MAX_OUTPUT_FRAMES as f64 {
        return Err(ReelError::validation(format!(
            "frame rate {rate} Hz over {duration_s} s yields {target} frames (max {MAX_OUTPUT_FRAMES})"
        )));
    }
    let target = target as usize;
    if target == 1 {
        return Ok(FrameTimeline { indices: vec![0] });
    }

    let last = (source_frame_count - 1) as f64;
    let step = last / (target - 1) as f64;
    let indices = (0..target)
        .map(|k| ((k as f64 * step).round() as usize).min(source_frame_count - 1))
        .collect();

    Ok(FrameTimeline { indices })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rate_is_identity() {
        for n in [1usize, 2, 7, 100] {
            let tl = resample(0.0, 1.0, n, None).unwrap();
            assert_eq!(tl.indices(), (0..n).collect::<Vec<_>>().as_slice());
        }
    }

    #[test]
    fn downsampling_keeps_both_ends() {
        // 10 s at 0.5 Hz -> 5 frames out of 101.
        let tl = resample(0.0, 10.0, 101, Some(0.5)).unwrap();
        assert_eq!(tl.indices(), &[0, 25, 50, 75, 100]);
    }

    #[test]
    fn indices_stay_in_bounds_and_non_decreasing() {
        for (n, rate) in [(3usize, 7.3), (50, 1.1), (17, 0.9), (2, 31.0)] {
            let tl = resample(0.0, 4.0, n, Some(rate)).unwrap();
            assert_eq!(tl.len(), (4.0 * rate).round() as usize);
            assert!(tl.indices().iter().all(|&i| i < n));
            assert!(tl.indices().windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(tl.indices()[0], 0);
            assert_eq!(*tl.indices().last().unwrap(), n - 1);
        }
    }

    #[test]
    fn single_target_frame_degenerates_to_first_index() {
        let tl = resample(0.0, 1.0, 10, Some(1.2)).unwrap();
        assert_eq!(tl.indices(), &[0]);
    }

    #[test]
    fn zero_target_frames_is_an_error() {
        let err = resample(0.0, 1.0, 10, Some(0.2)).unwrap_err();
        assert!(matches!(err, ReelError::Validation(_)));
    }

    #[test]
    fn invalid_rates_are_rejected() {
        assert!(resample(0.0, 1.0, 10, Some(0.0)).is_err());
        assert!(resample(0.0, 1.0, 10, Some(-3.0)).is_err());
        assert!(resample(0.0, 1.0, 10, Some(f64::NAN)).is_err());
        assert!(resample(2.0, 1.0, 10, Some(5.0)).is_err());
        assert!(resample(0.0, 1.0, 0, None).is_err());
    }

    #[test]
    fn huge_rates_are_rejected_before_allocating() {
        for rate in [1e20, 1e12, f64::MAX] {
            let err = resample(0.0, 4.0, 4, Some(rate)).unwrap_err();
            assert!(matches!(err, ReelError::Validation(_)), "{rate}");
        }
        let at_limit = MAX_OUTPUT_FRAMES as f64 / 4.0;
        assert_eq!(
            resample(0.0, 4.0, 4, Some(at_limit)).unwrap().len(),
            MAX_OUTPUT_FRAMES
        );
    }

    #[test]
    fn upsampling_repeats_source_frames() {
        let tl = resample(0.0, 4.0, 4, Some(2.0)).unwrap();
        assert_eq!(tl.indices(), &[0, 0, 1, 1, 2, 2, 3, 3]);
    }
}
