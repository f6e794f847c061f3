//! Time-of-day port schedules.
//!
//! A schedule drives one port through a list of `HH:MM → on/off` entries
//! on selected days.  The state in force at any moment is the latest entry
//! at or before now; before the first entry of an active day, the last
//! entry of the previous day carries over if that day was active too.  On
//! an inactive day the schedule asks for nothing.
//!
//! ```text
//!   Mon (active)                 Tue (active)            Wed (inactive)
//!   ──┬──────────┬─────────────┬─┼──────────┬────────────┼──────────────
//!   08:00 ON   20:00 OFF          │ 08:00 ON   20:00 OFF  │ (silent)
//!              ╰──── OFF carries over ──────╯            ╰─ no carry-over
//! ```
//!
//! Schedules need wall-clock time.  Until it is known the [`Scheduler`]
//! produces no decisions at all.

use core::fmt;

use log::info;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [Self; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    pub const fn previous(self) -> Self {
        match self {
            Self::Monday => Self::Sunday,
            Self::Tuesday => Self::Monday,
            Self::Wednesday => Self::Tuesday,
            Self::Thursday => Self::Wednesday,
            Self::Friday => Self::Thursday,
            Self::Saturday => Self::Friday,
            Self::Sunday => Self::Saturday,
        }
    }
}

impl From<chrono::Weekday> for DayOfWeek {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Self::Monday,
            chrono::Weekday::Tue => Self::Tuesday,
            chrono::Weekday::Wed => Self::Wednesday,
            chrono::Weekday::Thu => Self::Thursday,
            chrono::Weekday::Fri => Self::Friday,
            chrono::Weekday::Sat => Self::Saturday,
            chrono::Weekday::Sun => Self::Sunday,
        }
    }
}

/// `HH:MM`, 24-hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    /// Exactly two digits, a colon, two digits; hour ≤ 23, minute ≤ 59.
    pub fn parse(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() != 5 || b[2] != b':' {
            return None;
        }
        let digits = [b[0], b[1], b[3], b[4]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return None;
        }
        let hour = (b[0] - b'0') * 10 + (b[1] - b'0');
        let minute = (b[3] - b'0') * 10 + (b[4] - b'0');
        (hour <= 23 && minute <= 59).then_some(Self { hour, minute })
    }

    pub const fn minute_of_day(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Local day and time, as far as schedules care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallTime {
    pub day: DayOfWeek,
    pub minute_of_day: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// `HH:MM`.  Kept as text so a bad entry survives a load and shows up
    /// in validation instead of failing deserialization.
    pub time: String,
    pub state: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub node_id: u8,
    pub port_id: u8,
    pub days: Vec<DayOfWeek>,
    pub entries: Vec<ScheduleEntry>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Schedule {
    /// Disabled 08:00 ON / 20:00 OFF every day.
    pub fn template(id: impl Into<String>, node_id: u8, port_id: u8) -> Self {
        Self {
            id: id.into(),
            name: "New Schedule".into(),
            enabled: false,
            node_id,
            port_id,
            days: DayOfWeek::ALL.to_vec(),
            entries: vec![
                ScheduleEntry { time: "08:00".into(), state: true },
                ScheduleEntry { time: "20:00".into(), state: false },
            ],
            description: None,
        }
    }

    /// State this schedule asks for at `day`/`minute_of_day`, if any.
    pub fn desired_state(&self, day: DayOfWeek, minute_of_day: u16) -> Option<bool> {
        if !self.enabled {
            return None;
        }

        let mut entries: Vec<(u16, bool)> = self
            .entries
            .iter()
            .filter_map(|e| TimeOfDay::parse(&e.time).map(|t| (t.minute_of_day(), e.state)))
            .collect();
        if entries.is_empty() {
            return None;
        }
        // Stable: for equal times the later entry in the list wins.
        entries.sort_by_key(|&(minute, _)| minute);

        if !self.days.contains(&day) {
            return None;
        }
        if let Some(&(_, state)) = entries.iter().rev().find(|&&(m, _)| m <= minute_of_day) {
            return Some(state);
        }
        if self.days.contains(&day.previous()) {
            return entries.last().map(|&(_, state)| state);
        }
        None
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// One schedule's decision for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleDecision<'a> {
    pub schedule_id: &'a str,
    pub node_id: u8,
    pub port_id: u8,
    pub state: bool,
}

/// Holds the configured schedules and remembers each one's last decision
/// so changes are logged once.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    schedules: Vec<Schedule>,
    last: Vec<Option<bool>>,
}

impl Scheduler {
    pub fn new(schedules: Vec<Schedule>) -> Self {
        let last = vec![None; schedules.len()];
        Self { schedules, last }
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn replace(&mut self, schedules: Vec<Schedule>) {
        *self = Self::new(schedules);
    }

    /// Decisions for `now`, in configuration order.  Nothing without
    /// wall-clock time.
    pub fn tick(&mut self, now: Option<WallTime>) -> Vec<ScheduleDecision<'_>> {
        let Some(now) = now else {
            return Vec::new();
        };

        let mut decisions = Vec::new();
        for (schedule, last) in self.schedules.iter().zip(self.last.iter_mut()) {
            let state = schedule.desired_state(now.day, now.minute_of_day);
            if state != *last {
                if let Some(on) = state {
                    info!(
                        "Scheduler: '{}' → node {} port {} {}",
                        schedule.name,
                        schedule.node_id,
                        schedule.port_id,
                        if on { "ON" } else { "OFF" }
                    );
                }
                *last = state;
            }
            if let Some(state) = state {
                decisions.push(ScheduleDecision {
                    schedule_id: &schedule.id,
                    node_id: schedule.node_id,
                    port_id: schedule.port_id,
                    state,
                });
            }
        }
        decisions
    }

    /// Number of enabled schedules.
    pub fn active_count(&self) -> usize {
        self.schedules.iter().filter(|s| s.enabled).count()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
