//! Stream time to wall-clock mapping.
//!
//! The clock anchors a stream-relative timeline to the wall-clock instant the
//! stream was opened. This is best-effort alignment: it is not re-synchronized
//! against any clock reference, so the mapping drifts when the source clock
//! and the local clock diverge. Known limitation, not a bug.

use std::time::{Duration, SystemTime};

use crate::TimeBase;

#[derive(Clone, Copy, Debug)]
pub struct StreamClock {
    anchor: SystemTime,
    start_pts: i64,
    time_base: TimeBase,
}

impl StreamClock {
    /// `anchor` is captured once at stream open, before the first packet is
    /// read. A stream that reports no start time gets `start_pts = 0`.
    pub fn new(anchor: SystemTime, start_pts: Option<i64>, time_base: TimeBase) -> Self {
        StreamClock {
            anchor,
            start_pts: start_pts.unwrap_or(0),
            time_base,
        }
    }

    pub fn anchor(&self) -> SystemTime {
        self.anchor
    }

    /// Map a stream timestamp to an absolute wall-clock instant.
    /// Timestamps earlier than the stream start map before the anchor.
    pub fn to_absolute(&self, ts: i64) -> SystemTime {
        let rel_secs = ((ts - self.start_pts) as f64 * self.time_base.num as f64)
            / self.time_base.den as f64;
        if rel_secs >= 0.0 {
            self.anchor + Duration::from_secs_f64(rel_secs)
        } else {
            self.anchor - Duration::from_secs_f64(-rel_secs)
        }
    }
}
