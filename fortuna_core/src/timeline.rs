//! Virtual-time scheduling for the reel choreography.
//!
//! Nothing here sleeps. A host either fast-forwards the timeline (tests, the
//! server building a reveal trace) or paces it against the wall clock (the
//! terminal spinner).

use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Delayed-callback primitive the sequencer is written against.
pub trait Scheduler<C> {
    /// Arrange for `cue` to fire `delay` after the current instant.
    fn schedule(&mut self, delay: Duration, cue: C) -> TimerId;

    /// Drop a pending cue. Returns false when it already fired or was
    /// cancelled.
    fn cancel(&mut self, id: TimerId) -> bool;
}

/// Ordered queue of cues on a virtual clock.
#[derive(Debug, Clone)]
pub struct Timeline<C> {
    now: Duration,
    next_id: u64,
    // (deadline, id): ties fire in scheduling order
    queue: BTreeMap<(Duration, u64), C>,
}

impl<C> Default for Timeline<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Timeline<C> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            queue: BTreeMap::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove the earliest cue due at or before `until`, moving the clock to
    /// its deadline.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerId, C)> {
        let (&(deadline, id), _) = self.queue.first_key_value()?;
        if deadline > until {
            return None;
        }
        let cue = self.queue.remove(&(deadline, id))?;
        self.now = self.now.max(deadline);
        Some((TimerId(id), cue))
    }

    /// Move the clock forward without firing anything. The clock never runs
    /// backwards.
    pub fn advance_clock(&mut self, to: Duration) {
        self.now = self.now.max(to);
    }
}

impl<C> Scheduler<C> for Timeline<C> {
    fn schedule(&mut self, delay: Duration, cue: C) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.insert((self.now + delay, id), cue);
        TimerId(id)
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|&(_, seq), _| seq != id.0);
        self.queue.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn fires_in_deadline_then_schedule_order() {
        let mut t = Timeline::new();
        t.schedule(ms(30), "c");
        t.schedule(ms(10), "a");
        t.schedule(ms(10), "b");
        let fired: Vec<_> = std::iter::from_fn(|| t.pop_due(ms(100)).map(|(_, c)| c)).collect();
        assert_eq!(fired, ["a", "b", "c"]);
        assert_eq!(t.now(), ms(30));
    }

    #[test]
    fn respects_until() {
        let mut t = Timeline::new();
        t.schedule(ms(50), 1);
        assert!(t.pop_due(ms(49)).is_none());
        assert_eq!(t.next_deadline(), Some(ms(50)));
        t.advance_clock(ms(49));
        assert_eq!(t.now(), ms(49));
        assert_eq!(t.pop_due(ms(50)).map(|(_, c)| c), Some(1));
    }

    #[test]
    fn delays_are_relative_to_now() {
        let mut t = Timeline::new();
        t.advance_clock(ms(1000));
        t.schedule(ms(5), ());
        assert_eq!(t.next_deadline(), Some(ms(1005)));
    }

    #[test]
    fn cancel_removes_once() {
        let mut t = Timeline::new();
        let id = t.schedule(ms(10), 'x');
        t.schedule(ms(20), 'y');
        assert!(t.cancel(id));
        assert!(!t.cancel(id));
        assert_eq!(t.pending(), 1);
        assert_eq!(t.pop_due(ms(100)).map(|(_, c)| c), Some('y'));
    }
}
