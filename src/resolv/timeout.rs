//! Timeouts for outstanding requests.
//!
//! Deadlines are absolute [`Tick`] values which wrap around at 2^32. To
//! avoid ever having to compare ticks across the wraparound, the scheduler
//! keeps two buckets. The current bucket holds deadlines that come before
//! the next wraparound, the next bucket those that come after it.
//!
//! The sweep notices the wraparound when the clock moves from the second
//! half of the tick range into the first half. Everything still left in
//! the current bucket at that point has expired. The next bucket then
//! becomes the current one.
//!
//! For this to work, the clock must be looked at at least once per quarter
//! of the range. Timeouts and wait durations are therefore capped at
//! [`MAX_TICKS`].

use super::arena::Key;
use super::clock::{Tick, HALF_TICK, MAX_TICKS};
use std::collections::BTreeSet;

//------------ Deadline ------------------------------------------------------

/// Where a request’s deadline is kept.
///
/// The request needs this to remove itself from the scheduler.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Deadline {
    /// The index of the bucket.
    bucket: usize,

    /// The deadline tick.
    tick: Tick,
}

impl Deadline {
    /// Returns the tick of the deadline.
    pub fn tick(self) -> Tick {
        self.tick
    }
}

//------------ Timeouts ------------------------------------------------------

/// The two deadline buckets.
#[derive(Debug)]
pub struct Timeouts {
    /// The buckets, ordered by deadline.
    buckets: [BTreeSet<(Tick, Key)>; 2],

    /// The index of the current bucket.
    current: usize,

    /// Whether the last sweep happened in the first half of the range.
    last_in_first_half: bool,
}

impl Timeouts {
    /// Creates a new scheduler with the clock at `now`.
    pub fn new(now: Tick) -> Self {
        Timeouts {
            buckets: Default::default(),
            current: 0,
            last_in_first_half: now < HALF_TICK,
        }
    }

    /// Returns whether both buckets are empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(BTreeSet::is_empty)
    }

    /// Removes all deadlines.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear()
        }
    }

    /// Restarts wraparound tracking at `now`.
    ///
    /// This needs to happen whenever sweeping resumes after a pause. Both
    /// buckets must be empty.
    pub fn rearm(&mut self, now: Tick) {
        debug_assert!(self.is_empty());
        self.current = 0;
        self.last_in_first_half = now < HALF_TICK;
    }

    /// Schedules a timeout for `key` after `timeout` ticks from `now`.
    ///
    /// The timeout is capped at [`MAX_TICKS`].
    pub fn schedule(&mut self, key: Key, now: Tick, timeout: Tick) -> Deadline {
        let tick = now.wrapping_add(timeout.min(MAX_TICKS));

        // The deadline belongs into the next bucket if it lies past the
        // wraparound or if the clock has wrapped but no sweep has noticed
        // yet.
        let wrapped = tick < now;
        let pending_wrap = now < HALF_TICK && !self.last_in_first_half;
        let bucket = if wrapped || pending_wrap {
            self.next()
        } else {
            self.current
        };
        self.buckets[bucket].insert((tick, key));
        Deadline { bucket, tick }
    }

    /// Removes a scheduled deadline.
    ///
    /// Returns whether it was still scheduled.
    pub fn remove(&mut self, deadline: Deadline, key: Key) -> bool {
        self.buckets[deadline.bucket].remove(&(deadline.tick, key))
    }

    /// Removes and returns all expired keys in order of their deadlines.
    pub fn sweep(&mut self, now: Tick) -> Vec<Key> {
        let mut expired = Vec::new();
        let first_half = now < HALF_TICK;
        if first_half && !self.last_in_first_half {
            let retiring = std::mem::take(&mut self.buckets[self.current]);
            expired.extend(retiring.into_iter().map(|(_, key)| key));
            self.current = self.next();
        }
        self.last_in_first_half = first_half;

        let current = &mut self.buckets[self.current];
        while let Some(&(tick, key)) = current.first() {
            if tick > now {
                break;
            }
            current.remove(&(tick, key));
            expired.push(key);
        }
        expired
    }

    /// Returns the number of ticks until the next sweep is due.
    ///
    /// If the current bucket is empty but the next one isn’t, this is the
    /// time until the wraparound. Returns `None` if nothing is scheduled.
    /// The result should be called right after a sweep and is at least 1.
    pub fn next_wait(&self, now: Tick) -> Option<Tick> {
        if let Some(tick) = self.next_deadline() {
            Some(tick.wrapping_sub(now).clamp(1, MAX_TICKS))
        } else if !self.buckets[self.next()].is_empty() {
            Some(0u32.wrapping_sub(now).clamp(1, MAX_TICKS))
        } else {
            None
        }
    }

    /// Returns the earliest deadline before the next wraparound.
    pub fn next_deadline(&self) -> Option<Tick> {
        self.buckets[self.current].first().map(|&(tick, _)| tick)
    }

    /// Returns the index of the next bucket.
    fn next(&self) -> usize {
        self.current ^ 1
    }
}

//============ Tests =========================================================
