//! Timed three-reel reveal of an already decided prize.
//!
//! The prize is drawn the moment a spin is triggered. Everything after that is
//! choreography: the reels shuffle filler labels, lock one by one onto the
//! result, and the result is announced once the last reel has settled.

use std::{collections::VecDeque, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    engine::{select, Celebration, DrawResult},
    prize_table::PrizeTier,
    rng::RandomSource,
    timeline::{Scheduler, Timeline, TimerId},
};

pub const REELS: usize = 3;

/// Revealed results kept per machine, newest first.
pub const HISTORY_LEN: usize = 10;

/// Reveal timing, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinTiming {
    /// Interval between filler shuffles while a reel is unlocked.
    pub shuffle_interval_ms: u64,
    /// Time from trigger until the first reel locks.
    pub first_stop_ms: u64,
    /// Time between consecutive reel locks.
    pub stop_interval_ms: u64,
    /// Time from the last lock until the result is announced.
    pub settle_ms: u64,
}

impl Default for SpinTiming {
    fn default() -> Self {
        Self::normal()
    }
}

impl SpinTiming {
    pub fn normal() -> Self {
        Self {
            shuffle_interval_ms: 80,
            first_stop_ms: 2000,
            stop_interval_ms: 600,
            settle_ms: 400,
        }
    }

    pub fn shuffle_interval(&self) -> Duration {
        // a zero interval would reschedule forever at the same instant
        Duration::from_millis(self.shuffle_interval_ms.max(1))
    }

    pub fn first_stop(&self) -> Duration {
        Duration::from_millis(self.first_stop_ms)
    }

    pub fn stop_interval(&self) -> Duration {
        Duration::from_millis(self.stop_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Trigger-to-announcement latency.
    pub fn total(&self) -> Duration {
        self.first_stop() + self.stop_interval() * (REELS as u32 - 1) + self.settle()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Spinning,
    RevealingReel1,
    RevealingReel2,
    /// All reels locked, waiting for the announcement.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Shuffle,
    Lock(usize),
    Settle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpinEvent {
    Frame {
        reels: [String; REELS],
    },
    ReelLocked {
        reel: usize,
        label: String,
    },
    Revealed {
        result: DrawResult,
        celebration: Option<Celebration>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub at: Duration,
    pub event: SpinEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Started,
    /// A spin was already in flight (or the sequencer was torn down).
    Ignored,
}

pub struct SpinSequencer<R, S = Timeline<Cue>> {
    tier: PrizeTier,
    timing: SpinTiming,
    rng: R,
    scheduler: S,
    phase: Phase,
    reels: [String; REELS],
    locked: usize,
    outcome: Option<DrawResult>,
    pending: Vec<TimerId>,
    torn_down: bool,
    spins: u64,
    history: VecDeque<DrawResult>,
}

impl<R, S> SpinSequencer<R, S>
where
    R: RandomSource,
    S: Scheduler<Cue>,
{
    pub fn new(tier: PrizeTier, timing: SpinTiming, rng: R, scheduler: S) -> Self {
        let reels = resting_reels(&tier);
        Self {
            tier,
            timing,
            rng,
            scheduler,
            phase: Phase::Idle,
            reels,
            locked: 0,
            outcome: None,
            pending: Vec::new(),
            torn_down: false,
            spins: 0,
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn reels(&self) -> &[String; REELS] {
        &self.reels
    }

    /// The decided prize of the current spin, or of the last finished one.
    pub fn outcome(&self) -> Option<&DrawResult> {
        self.outcome.as_ref()
    }

    pub fn spins(&self) -> u64 {
        self.spins
    }

    /// The last few revealed results, newest first.
    pub fn history(&self) -> impl Iterator<Item = &DrawResult> {
        self.history.iter()
    }

    pub fn tier(&self) -> &PrizeTier {
        &self.tier
    }

    pub fn timing(&self) -> &SpinTiming {
        &self.timing
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Swap the prize tier. Refused while a spin is in flight.
    pub fn set_tier(&mut self, tier: PrizeTier) -> bool {
        if self.is_in_flight() {
            return false;
        }
        self.reels = resting_reels(&tier);
        self.tier = tier;
        true
    }

    pub fn trigger(&mut self) -> Trigger {
        if self.torn_down || self.is_in_flight() {
            tracing::debug!(phase = ?self.phase, "spin already in flight, trigger ignored");
            return Trigger::Ignored;
        }

        let result = DrawResult::from_option(select(&self.tier, &mut self.rng));
        tracing::debug!(tier = %self.tier.tier(), label = %result.label, "spin started");
        self.outcome = Some(result);
        self.locked = 0;
        self.phase = Phase::Spinning;
        self.spins += 1;

        let shuffle = self.timing.shuffle_interval();
        let first_stop = self.timing.first_stop();
        self.arm(shuffle, Cue::Shuffle);
        self.arm(first_stop, Cue::Lock(0));
        Trigger::Started
    }

    /// Deliver a fired cue. Cues arriving while idle or after teardown are
    /// stale and produce nothing.
    pub fn handle(&mut self, id: TimerId, cue: Cue) -> Vec<SpinEvent> {
        self.pending.retain(|p| *p != id);
        if self.torn_down || !self.is_in_flight() {
            return Vec::new();
        }

        match cue {
            Cue::Shuffle => self.shuffle(),
            Cue::Lock(reel) => self.lock(reel),
            Cue::Settle => self.settle(),
        }
    }

    /// Cancel everything pending. The sequencer ignores all later triggers
    /// and cues.
    pub fn teardown(&mut self) {
        for id in self.pending.drain(..) {
            self.scheduler.cancel(id);
        }
        self.torn_down = true;
        self.phase = Phase::Idle;
    }

    fn arm(&mut self, delay: Duration, cue: Cue) {
        let id = self.scheduler.schedule(delay, cue);
        self.pending.push(id);
    }

    fn final_label(&self) -> String {
        self.outcome
            .as_ref()
            .map(|r| r.label.clone())
            .unwrap_or_default()
    }

    fn shuffle(&mut self) -> Vec<SpinEvent> {
        if self.locked >= REELS {
            return Vec::new();
        }
        let len = self.tier.options().len();
        for reel in self.locked..REELS {
            let idx = ((self.rng.next_unit() * len as f64) as usize).min(len - 1);
            self.reels[reel] = self.tier.options()[idx].label.clone();
        }
        let interval = self.timing.shuffle_interval();
        self.arm(interval, Cue::Shuffle);
        vec![SpinEvent::Frame {
            reels: self.reels.clone(),
        }]
    }

    fn lock(&mut self, reel: usize) -> Vec<SpinEvent> {
        if reel != self.locked || reel >= REELS {
            return Vec::new();
        }
        let label = self.final_label();
        self.reels[reel] = label.clone();
        self.locked += 1;
        self.phase = match self.locked {
            1 => Phase::RevealingReel1,
            2 => Phase::RevealingReel2,
            _ => Phase::Done,
        };

        if self.locked < REELS {
            let delay = self.timing.stop_interval();
            self.arm(delay, Cue::Lock(self.locked));
        } else {
            let delay = self.timing.settle();
            self.arm(delay, Cue::Settle);
        }

        vec![
            SpinEvent::ReelLocked { reel, label },
            SpinEvent::Frame {
                reels: self.reels.clone(),
            },
        ]
    }

    fn settle(&mut self) -> Vec<SpinEvent> {
        if self.phase != Phase::Done {
            return Vec::new();
        }
        self.phase = Phase::Idle;
        let Some(result) = self.outcome.clone() else {
            return Vec::new();
        };
        let celebration = result.celebration();
        self.history.push_front(result.clone());
        self.history.truncate(HISTORY_LEN);
        tracing::debug!(label = %result.label, value = result.value, ?celebration, "spin revealed");
        vec![SpinEvent::Revealed {
            result,
            celebration,
        }]
    }
}

impl<R: RandomSource> SpinSequencer<R, Timeline<Cue>> {
    pub fn with_timeline(tier: PrizeTier, timing: SpinTiming, rng: R) -> Self {
        Self::new(tier, timing, rng, Timeline::new())
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    /// Fast-forward the timeline by `by`, firing every cue that falls due.
    pub fn advance(&mut self, by: Duration) -> Vec<TimedEvent> {
        let until = self.scheduler.now() + by;
        self.advance_to(until)
    }

    pub fn advance_to(&mut self, until: Duration) -> Vec<TimedEvent> {
        let mut out = Vec::new();
        while let Some((id, cue)) = self.scheduler.pop_due(until) {
            let at = self.scheduler.now();
            out.extend(
                self.handle(id, cue)
                    .into_iter()
                    .map(|event| TimedEvent { at, event }),
            );
        }
        self.scheduler.advance_clock(until);
        out
    }

    /// Fire cues until the timeline is empty.
    pub fn run_to_end(&mut self) -> Vec<TimedEvent> {
        let mut out = Vec::new();
        while let Some(deadline) = self.scheduler.next_deadline() {
            out.extend(self.advance_to(deadline));
        }
        out
    }
}

fn resting_reels(tier: &PrizeTier) -> [String; REELS] {
    let labels: Vec<&str> = tier.labels().collect();
    std::array::from_fn(|i| labels[i % labels.len()].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{prize_table::PrizeTable, tier::Tier};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn sequencer(first: f64) -> SpinSequencer<impl RandomSource> {
        let tier = PrizeTable::builtin().tier(Tier::T1000).clone();
        let mut first = Some(first);
        let mut filler = 0.0;
        let rng = move || {
            first.take().unwrap_or_else(|| {
                filler = (filler + 0.37) % 1.0;
                filler
            })
        };
        SpinSequencer::with_timeline(tier, SpinTiming::normal(), rng)
    }

    fn revealed(events: &[TimedEvent]) -> Vec<(Duration, DrawResult, Option<Celebration>)> {
        events
            .iter()
            .filter_map(|e| match &e.event {
                SpinEvent::Revealed {
                    result,
                    celebration,
                } => Some((e.at, result.clone(), *celebration)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn total_latency() {
        assert_eq!(SpinTiming::normal().total(), ms(3600));
    }

    #[test]
    fn outcome_is_decided_on_trigger() {
        let mut seq = sequencer(0.999999);
        assert_eq!(seq.trigger(), Trigger::Started);
        assert_eq!(seq.phase(), Phase::Spinning);
        assert_eq!(seq.outcome().unwrap().label, "666獎金");
        assert!(seq.advance(ms(1999)).iter().all(|e| matches!(e.event, SpinEvent::Frame { .. })));
    }

    #[test]
    fn phases_follow_lock_schedule() {
        let mut seq = sequencer(0.5);
        seq.trigger();

        seq.advance_to(ms(1999));
        assert_eq!(seq.phase(), Phase::Spinning);
        seq.advance_to(ms(2000));
        assert_eq!(seq.phase(), Phase::RevealingReel1);
        assert_eq!(seq.reels()[0], "58獎金");

        seq.advance_to(ms(2599));
        assert_eq!(seq.phase(), Phase::RevealingReel1);
        seq.advance_to(ms(2600));
        assert_eq!(seq.phase(), Phase::RevealingReel2);
        assert_eq!(seq.reels()[1], "58獎金");

        seq.advance_to(ms(3200));
        assert_eq!(seq.phase(), Phase::Done);
        assert!(seq.reels().iter().all(|r| r == "58獎金"));

        let events = seq.advance_to(ms(3600));
        assert_eq!(seq.phase(), Phase::Idle);
        let r = revealed(&events);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].0, ms(3600));
        assert_eq!(seq.scheduler().pending(), 0);
    }

    #[test]
    fn locked_reels_stop_shuffling() {
        let mut seq = sequencer(0.85);
        seq.trigger();
        let events = seq.run_to_end();
        for e in &events {
            if let SpinEvent::Frame { reels } = &e.event {
                if e.at >= ms(2000) {
                    assert_eq!(reels[0], "168獎金");
                }
                if e.at >= ms(2600) {
                    assert_eq!(reels[1], "168獎金");
                }
            }
        }
        let shuffles = events
            .iter()
            .filter(|e| matches!(e.event, SpinEvent::Frame { .. }) && e.at.as_millis() % 80 == 0)
            .count();
        assert!(shuffles >= 39);
    }

    #[test]
    fn second_trigger_is_ignored() {
        let mut seq = sequencer(0.999999);
        assert_eq!(seq.trigger(), Trigger::Started);
        seq.advance(ms(500));
        assert_eq!(seq.trigger(), Trigger::Ignored);
        seq.advance(ms(1700));
        assert_eq!(seq.trigger(), Trigger::Ignored);
        let events = seq.run_to_end();
        let r = revealed(&events);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].0, ms(3600));
        assert_eq!(r[0].1.value, 666);
        assert_eq!(seq.spins(), 1);

        // idle again, a new spin may start
        assert_eq!(seq.trigger(), Trigger::Started);
        assert_eq!(seq.spins(), 2);
    }

    #[test]
    fn teardown_cancels_pending_cues() {
        let mut seq = sequencer(0.1);
        seq.trigger();
        seq.advance(ms(2100));
        seq.teardown();
        assert_eq!(seq.scheduler().pending(), 0);
        assert!(seq.run_to_end().is_empty());
        assert_eq!(seq.trigger(), Trigger::Ignored);
    }

    #[test]
    fn stale_cue_is_ignored_when_idle() {
        let mut seq = sequencer(0.1);
        let mut stray = Timeline::new();
        let id = stray.schedule(ms(0), Cue::Settle);
        assert!(seq.handle(id, Cue::Settle).is_empty());
        assert!(seq.handle(id, Cue::Lock(0)).is_empty());
        assert_eq!(seq.phase(), Phase::Idle);
    }

    #[test]
    fn out_of_range_lock_after_last_reel_is_ignored() {
        let mut seq = sequencer(0.1);
        seq.trigger();
        seq.advance_to(ms(3200));
        assert_eq!(seq.phase(), Phase::Done);

        let mut stray = Timeline::new();
        let id = stray.schedule(ms(0), Cue::Lock(REELS));
        assert!(seq.handle(id, Cue::Lock(REELS)).is_empty());
        assert!(seq.handle(id, Cue::Lock(usize::MAX)).is_empty());
        assert_eq!(seq.phase(), Phase::Done);

        let reveals = revealed(&seq.run_to_end());
        assert_eq!(reveals.len(), 1);
        assert_eq!(reveals[0].1.label, "58獎金");
    }

    #[test]
    fn history_keeps_last_ten_newest_first() {
        let mut seq = sequencer(0.999);
        seq.trigger();
        seq.run_to_end();
        assert_eq!(seq.history().next().map(|r| r.value), Some(666));

        for _ in 0..HISTORY_LEN + 2 {
            assert_eq!(seq.trigger(), Trigger::Started);
            seq.run_to_end();
        }
        assert_eq!(seq.history().count(), HISTORY_LEN);
        assert_eq!(seq.history().next(), seq.outcome());
    }

    #[test]
    fn tier_swap_refused_mid_spin() {
        let table = PrizeTable::builtin();
        let mut seq = sequencer(0.1);
        seq.trigger();
        assert!(!seq.set_tier(table.tier(Tier::T5000).clone()));
        seq.run_to_end();
        assert!(seq.set_tier(table.tier(Tier::T5000).clone()));
        assert_eq!(seq.reels()[0], "188獎金");
    }
}
