use std::cmp::Ordering;

use crate::data::{load::find_event_set, model::EventSet};

/// One event as `(time, x, y)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedEvent {
    pub time: f64,
    pub x: i64,
    pub y: i64,
}

impl TimedEvent {
    /// Time first, then `(x, y)` so equal timestamps always order the same way.
    pub fn sort_key_cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.x.cmp(&other.x))
            .then(self.y.cmp(&other.y))
    }
}

/// Event coordinates `(x, y)` for each output frame, aligned with the frame times they were
/// binned against.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameBuckets {
    buckets: Vec<Vec<(i64, i64)>>,
}

impl FrameBuckets {
    pub fn empty(frame_count: usize) -> Self {
        Self {
            buckets: vec![Vec::new(); frame_count],
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Coordinates for frame `position`; empty when out of range.
    pub fn get(&self, position: usize) -> &[(i64, i64)] {
        self.buckets.get(position).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &[(i64, i64)]> {
        self.buckets.iter().map(Vec::as_slice)
    }

    /// Number of events assigned to any frame.
    pub fn total_events(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}

/// Flatten an event set into `(time, x, y)` triples sorted by [`TimedEvent::sort_key_cmp`].
pub fn sorted_events(set: &EventSet) -> Vec<TimedEvent> {
    let mut events: Vec<TimedEvent> = set
        .times
        .iter()
        .zip(&set.x_coords)
        .zip(&set.y_coords)
        .map(|((&time, &x), &y)| TimedEvent { time, x, y })
        .collect();
    events.sort_by(TimedEvent::sort_key_cmp);
    events
}

/// Partition pre-sorted events into half-open windows `[frame_times[k-1], frame_times[k])`.
///
/// The first window is `(-inf, frame_times[0])`. Events at or after the last frame time land in
/// no bucket. Runs as one forward scan; `frame_times` must be non-decreasing.
pub fn bin_sorted(events: &[TimedEvent], frame_times: &[f64]) -> FrameBuckets {
    let mut buckets = Vec::with_capacity(frame_times.len());
    let mut lo = 0usize;
    let mut hi = 0usize;

    for &frame_time in frame_times {
        while hi < events.len() && events[hi].time < frame_time {
            hi += 1;
        }
        buckets.push(events[lo..hi].iter().map(|e| (e.x, e.y)).collect());
        lo = hi;
    }

    FrameBuckets { buckets }
}

/// Bin the first event set called `event_kind` against `frame_times`.
///
/// Returns `None` (after logging a warning) when no event set carries that name; callers render
/// without markers in that case.
pub fn bin_events(
    events: &[EventSet],
    frame_times: &[f64],
    event_kind: &str,
) -> Option<FrameBuckets> {
    let Some(set) = find_event_set(events, event_kind) else {
        tracing::warn!(event_kind, "no '{event_kind}' events found");
        return None;
    };

    let sorted = sorted_events(set);
    let buckets = bin_sorted(&sorted, frame_times);
    tracing::debug!(
        event_kind,
        events = sorted.len(),
        binned = buckets.total_events(),
        frames = frame_times.len(),
        "binned events"
    );
    Some(buckets)
}
