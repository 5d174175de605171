use super::clock::{Clock, ClockName};
use derby_common::{config::Rules, state_store::StateStore};
use log::*;
use std::ops::{Index, IndexMut};

/// Owns every clock of the bout and the global tick counter
#[derive(Debug, Clone)]
pub struct MasterClock {
    rules: Rules,
    clocks: Vec<Clock>,
    ticks: i64,
}

impl MasterClock {
    pub fn new(rules: Rules) -> Self {
        let clocks = enum_iterator::all::<ClockName>()
            .map(|name| Clock::new(name, &rules))
            .collect();
        Self {
            rules,
            clocks,
            ticks: 0,
        }
    }

    /// Stops everything and returns every clock to its defaults
    pub fn reset(&mut self) {
        for clock in self.clocks.iter_mut() {
            *clock = Clock::new(clock.name(), &self.rules);
        }
        self.ticks = 0;
    }

    pub fn clocks(&self) -> impl Iterator<Item = &Clock> {
        self.clocks.iter()
    }

    /// Runs exactly the named clocks, stopping all others
    pub fn set_running_clocks(&mut self, names: &[ClockName]) {
        for clock in self.clocks.iter_mut() {
            clock.set_running(names.contains(&clock.name()));
        }
    }

    pub fn running_clocks(&self) -> Vec<ClockName> {
        self.clocks
            .iter()
            .filter(|c| c.is_running())
            .map(Clock::name)
            .collect()
    }

    pub fn set_clock_adjustable(&mut self, name: ClockName, adjustable: bool) {
        self[name].set_adjustable(adjustable);
    }

    pub fn current_time(&self) -> i64 {
        self.ticks
    }

    pub fn set_ticks(&mut self, ticks: i64) {
        self.ticks = ticks;
    }

    /// Advances every running clock by one tick. Returns the clocks that ran
    /// out on this tick, which have stopped themselves.
    pub fn tick(&mut self) -> Vec<ClockName> {
        let step = self.rules.tick_ms();
        self.ticks += 1;
        let expired: Vec<ClockName> = self
            .clocks
            .iter_mut()
            .filter_map(|clock| clock.advance(step).then_some(clock.name()))
            .collect();
        if !expired.is_empty() {
            debug!("Tick {}: clocks expired {expired:?}", self.ticks);
        }
        expired
    }

    /// Stops any running clock that already sits at its limit, without
    /// advancing time
    pub fn reevaluate(&mut self) -> Vec<ClockName> {
        self.clocks
            .iter_mut()
            .filter(|clock| clock.is_running() && clock.is_expired())
            .map(|clock| {
                clock.set_running(false);
                clock.name()
            })
            .collect()
    }

    pub fn publish(&self, store: &mut impl StateStore) {
        for clock in self.clocks.iter() {
            clock.publish(store);
        }
    }
}

impl Index<ClockName> for MasterClock {
    type Output = Clock;

    fn index(&self, name: ClockName) -> &Self::Output {
        &self.clocks[name as usize]
    }
}

impl IndexMut<ClockName> for MasterClock {
    fn index_mut(&mut self, name: ClockName) -> &mut Self::Output {
        &mut self.clocks[name as usize]
    }
}
