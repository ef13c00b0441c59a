//! Gapless scheduling of inbound speech.
//!
//! Each decoded chunk becomes a unit placed at `max(cursor, now)`, and the
//! cursor moves to that unit's end. Units therefore never overlap and play back
//! to back however jittery the network is. An interruption drops every pending
//! unit and pulls the cursor back to `now`.

use std::collections::BTreeMap;

use log::debug;

pub type UnitId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledUnit {
    pub id: UnitId,
    /// Start time on the playback clock, in seconds.
    pub start: f64,
    pub duration: f64,
}

impl ScheduledUnit {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug)]
pub struct PlaybackScheduler {
    next_start: f64,
    next_id: UnitId,
    active: BTreeMap<UnitId, ScheduledUnit>,
}

impl PlaybackScheduler {
    pub fn new(now: f64) -> Self {
        Self {
            next_start: now,
            next_id: 1,
            active: BTreeMap::new(),
        }
    }

    /// Places a unit of `duration` seconds. The flag is true when this unit
    /// made the agent start talking.
    pub fn schedule(&mut self, now: f64, duration: f64) -> (ScheduledUnit, bool) {
        let start = self.next_start.max(now);
        let unit = ScheduledUnit {
            id: self.next_id,
            start,
            duration,
        };
        self.next_id += 1;
        self.next_start = unit.end();

        let started_talking = self.active.is_empty();
        self.active.insert(unit.id, unit);
        (unit, started_talking)
    }

    /// Removes a unit that played to the end. True when nothing is left playing.
    /// Unknown ids (already cancelled) are ignored.
    pub fn complete(&mut self, id: UnitId) -> bool {
        self.active.remove(&id).is_some() && self.active.is_empty()
    }

    /// Drops every pending unit and rewinds the cursor to `now`. Returns the
    /// dropped ids in schedule order so the device can cancel them.
    pub fn interrupt(&mut self, now: f64) -> Vec<UnitId> {
        let dropped: Vec<UnitId> = self.active.keys().copied().collect();
        if !dropped.is_empty() {
            debug!("Interrupting {} scheduled units", dropped.len());
        }
        self.active.clear();
        self.next_start = now;
        dropped
    }

    pub fn is_talking(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }

    pub fn active(&self) -> impl Iterator<Item = &ScheduledUnit> {
        self.active.values()
    }
}
