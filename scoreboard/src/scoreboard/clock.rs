use derby_common::{config::Rules, state_store::StateStore};
use enum_iterator::Sequence;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence)]
pub enum ClockName {
    Period,
    Jam,
    Lineup,
    Timeout,
    Intermission,
}

impl ClockName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Period => "Period",
            Self::Jam => "Jam",
            Self::Lineup => "Lineup",
            Self::Timeout => "Timeout",
            Self::Intermission => "Intermission",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        enum_iterator::all::<Self>().find(|c| c.as_str() == name)
    }

    pub fn direction(self) -> Direction {
        match self {
            Self::Period | Self::Jam | Self::Intermission => Direction::Down,
            Self::Lineup | Self::Timeout => Direction::Up,
        }
    }

    /// The number a clock carries after a full reset. Period and intermission
    /// count from one, jams are numbered as they start.
    pub fn initial_number(self) -> i64 {
        match self {
            Self::Period | Self::Intermission => 1,
            Self::Jam | Self::Lineup | Self::Timeout => 0,
        }
    }

    pub fn max_ms(self, rules: &Rules) -> i64 {
        match self {
            Self::Period => rules.period_ms(),
            Self::Jam => rules.jam_ms(),
            Self::Lineup => rules.lineup_ms(),
            Self::Timeout => rules.timeout_ms(),
            Self::Intermission => rules.intermission_ms(),
        }
    }
}

impl Display for ClockName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "Up",
            Self::Down => "Down",
        }
    }
}

/// A bounded value, `min <= num <= max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub num: i64,
    pub min: i64,
    pub max: i64,
}

impl Position {
    fn new(num: i64, min: i64, max: i64) -> Self {
        let max = max.max(min);
        Self {
            num: num.clamp(min, max),
            min,
            max,
        }
    }

    fn set(&mut self, num: i64) {
        self.num = num.clamp(self.min, self.max);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clock {
    name: ClockName,
    direction: Direction,
    running: bool,
    adjustable: bool,
    time: Position,
    number: i64,
}

impl Clock {
    pub fn new(name: ClockName, rules: &Rules) -> Self {
        let direction = name.direction();
        let max = name.max_ms(rules);
        let start = match direction {
            Direction::Down => max,
            Direction::Up => 0,
        };
        Self {
            name,
            direction,
            running: false,
            adjustable: false,
            time: Position::new(start, 0, max),
            number: name.initial_number(),
        }
    }

    pub fn name(&self) -> ClockName {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_adjustable(&self) -> bool {
        self.adjustable
    }

    pub fn position(&self) -> Position {
        self.time
    }

    pub fn time(&self) -> i64 {
        self.time.num
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    /// Where a fresh run of this clock begins
    pub fn start_value(&self) -> i64 {
        match self.direction {
            Direction::Down => self.time.max,
            Direction::Up => self.time.min,
        }
    }

    /// Where this clock runs out
    pub fn limit(&self) -> i64 {
        match self.direction {
            Direction::Down => self.time.min,
            Direction::Up => self.time.max,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.time.num == self.limit()
    }

    pub fn has_moved(&self) -> bool {
        self.time.num != self.start_value()
    }

    /// Time left before the clock runs out
    pub fn remaining(&self) -> i64 {
        (self.limit() - self.time.num).abs()
    }

    pub(super) fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub(super) fn set_adjustable(&mut self, adjustable: bool) {
        self.adjustable = adjustable;
    }

    pub fn set_time(&mut self, time: i64) {
        self.time.set(time);
    }

    pub fn set_number(&mut self, number: i64) {
        self.number = number;
    }

    /// A hard reset moves the clock back to its start value. A soft reset keeps
    /// the position and restarts the numbering. `increment` bumps the number
    /// afterwards.
    pub fn reset(&mut self, soft: bool, increment: bool) {
        if soft {
            self.number = self.name.initial_number();
        } else {
            self.time.num = self.start_value();
        }
        if increment {
            self.number += 1;
        }
    }

    /// Moves a running clock `ms` toward its limit. Returns `true` if this run
    /// just ran out, in which case the clock has stopped itself.
    pub(super) fn advance(&mut self, ms: i64) -> bool {
        if !self.running {
            return false;
        }
        match self.direction {
            Direction::Down => self.time.set(self.time.num - ms),
            Direction::Up => self.time.set(self.time.num + ms),
        }
        if self.is_expired() {
            self.running = false;
            true
        } else {
            false
        }
    }

    pub fn base_path(name: ClockName) -> String {
        format!("Scoreboard.Clock({name})")
    }

    pub(super) fn publish(&self, store: &mut impl StateStore) {
        let base = Self::base_path(self.name);
        store.update(&format!("{base}.Running"), self.running.into());
        store.update(&format!("{base}.Number"), self.number.into());
        store.update(&format!("{base}.Time"), self.time.num.into());
        store.update(&format!("{base}.MinimumTime"), self.time.min.into());
        store.update(&format!("{base}.MaximumTime"), self.time.max.into());
        store.update(&format!("{base}.Direction"), self.direction.as_str().into());
        store.update(&format!("{base}.Adjustable"), self.adjustable.into());
    }
}
