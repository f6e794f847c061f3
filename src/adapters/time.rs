//! Clock adapters.
//!
//! - [`SystemClock`]: `std::time::Instant` for the monotonic clock and
//!   the local time zone (via `chrono`) for schedules.
//! - [`ManualClock`]: advanced by hand; used by the simulator runner and
//!   tests.

use std::cell::Cell;
use std::time::Instant;

use chrono::{Datelike, Local, Timelike};

use crate::app::ports::Clock;
use crate::schedule::{DayOfWeek, WallTime};

/// Host clock.
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn wall_time(&self) -> Option<WallTime> {
        let now = Local::now();
        Some(WallTime {
            day: now.weekday().into(),
            minute_of_day: (now.hour() * 60 + now.minute()) as u16,
        })
    }
}

/// Clock that only moves when told to.  Wall time is unknown until set.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: Cell<u64>,
    wall: Cell<Option<WallTime>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ms(&self, now_ms: u64) {
        self.now_ms.set(now_ms);
    }

    pub fn advance_ms(&self, delta_ms: u64) {
        self.now_ms.set(self.now_ms.get().saturating_add(delta_ms));
    }

    pub fn set_wall_time(&self, day: DayOfWeek, hour: u8, minute: u8) {
        self.wall.set(Some(WallTime {
            day,
            minute_of_day: u16::from(hour) * 60 + u16::from(minute),
        }));
    }

    pub fn clear_wall_time(&self) {
        self.wall.set(None);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn wall_time(&self) -> Option<WallTime> {
        self.wall.get()
    }
}
