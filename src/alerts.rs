//! New-event alerts.
//!
//! A bounded ring of event IDs the session has already displayed. Events
//! at or above the alert magnitude that are not in the ring become alerts.
//! Follows NASA Power of 10: bounded resources.

use std::collections::VecDeque;

use tracing::debug;

use crate::normalize::NormalizedEvent;

/// Default capacity for the seen-ID ring.
/// Sized for a week of the busiest feed.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default magnitude that triggers an alert.
pub const DEFAULT_ALERT_MAGNITUDE: f64 = 4.5;

/// A bounded FIFO ring of seen event IDs.
#[derive(Debug)]
pub struct SeenRing {
    /// Oldest at front, newest at back
    seen: VecDeque<String>,
    capacity: usize,
}

impl SeenRing {
    /// Create a ring with the given capacity (at least 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            seen: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        // Linear search; fast enough for 10k entries
        self.seen.iter().any(|e| e == id)
    }

    /// Record `id`. Returns `true` if it was not already present.
    pub fn mark(&mut self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        if self.seen.len() >= self.capacity {
            self.seen.pop_front();
        }
        self.seen.push_back(id.to_string());

        debug_assert!(self.seen.len() <= self.capacity);
        true
    }

    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

impl Default for SeenRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Detect alerts in a freshly built list and mark the whole list seen.
///
/// `events` is ordered newest first, so the returned alerts are too.
pub fn detect_alerts(
    seen: &mut SeenRing,
    events: &[NormalizedEvent],
    threshold: f64,
) -> Vec<NormalizedEvent> {
    let alerts: Vec<NormalizedEvent> = events
        .iter()
        .filter(|e| e.raw_magnitude >= threshold && !seen.contains(&e.id))
        .cloned()
        .collect();

    for event in events {
        seen.mark(&event.id);
    }
    debug!("{} new alerts, {} ids seen", alerts.len(), seen.len());

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::normalize::tests::{location, raw};

    #[test]
    fn test_mark() {
        let mut ring = SeenRing::new(100);
        assert!(ring.mark("event1"));
        assert!(ring.mark("event2"));
        assert!(!ring.mark("event1"));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_bounded_capacity() {
        let mut ring = SeenRing::new(3);

        ring.mark("event1");
        ring.mark("event2");
        ring.mark("event3");
        ring.mark("event4");
        assert_eq!(ring.len(), 3);

        // event1 was evicted
        assert!(!ring.contains("event1"));
        assert!(ring.contains("event4"));
    }

    #[test]
    fn test_alerts_fire_once() {
        let events = normalize(
            &[
                raw("small", Some(2.0), 3),
                raw("big", Some(5.2), 2),
                raw("edge", Some(4.5), 1),
            ],
            &location("UTC"),
        );
        let mut seen = SeenRing::default();

        let first: Vec<String> = detect_alerts(&mut seen, &events, 4.5)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(first, ["big", "edge"]);
        assert_eq!(seen.len(), 3);

        assert!(detect_alerts(&mut seen, &events, 4.5).is_empty());
    }

    #[test]
    fn test_seen_below_threshold_does_not_alert_later() {
        let events = normalize(&[raw("quake", Some(3.0), 1)], &location("UTC"));
        let mut seen = SeenRing::default();

        assert!(detect_alerts(&mut seen, &events, 4.5).is_empty());
        // lowering the threshold does not re-announce already shown events
        assert!(detect_alerts(&mut seen, &events, 2.0).is_empty());
    }
}
