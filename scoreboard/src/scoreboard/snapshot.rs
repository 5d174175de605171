use super::{clock::ClockName, master_clock::MasterClock, team::Team};
use derby_common::{bundles::TeamBundle, game_state::GameState, state_store::StateStore};
use indexmap::IndexMap;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockSnapshot {
    pub number: i64,
    /// Position when the snapshot opened
    pub start_time: i64,
    /// Position when the snapshot closed
    pub end_time: i64,
    pub running: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeamSnapshot {
    pub timeouts: i64,
    pub official_reviews: i64,
    pub official_review_retained: bool,
}

/// Everything needed to put the bout back where it was when a state
/// transition happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub index: usize,
    pub state: GameState,
    pub in_progress: bool,
    pub can_revert: bool,
    pub start_ticks: i64,
    pub end_ticks: i64,
    pub start_time: OffsetDateTime,
    pub end_time: Option<OffsetDateTime>,
    pub clocks: IndexMap<ClockName, ClockSnapshot>,
    pub teams: TeamBundle<TeamSnapshot>,
    /// Length of the jam log when the snapshot closed
    pub jams: usize,
}

impl StateSnapshot {
    pub fn new(
        index: usize,
        state: GameState,
        master_clock: &MasterClock,
        teams: &TeamBundle<Team>,
        jams: usize,
    ) -> Self {
        let ticks = master_clock.current_time();
        Self {
            index,
            state,
            in_progress: true,
            can_revert: false,
            start_ticks: ticks,
            end_ticks: ticks,
            start_time: OffsetDateTime::now_utc(),
            end_time: None,
            clocks: master_clock
                .clocks()
                .map(|clock| {
                    let snapshot = ClockSnapshot {
                        number: clock.number(),
                        start_time: clock.time(),
                        end_time: clock.time(),
                        running: clock.is_running(),
                    };
                    (clock.name(), snapshot)
                })
                .collect(),
            teams: teams.map(|_, team| team.counters()),
            jams,
        }
    }

    /// Closes the snapshot, recording where every clock and counter stands
    /// before the transition changes them
    pub fn end(
        &mut self,
        can_revert: bool,
        master_clock: &MasterClock,
        teams: &TeamBundle<Team>,
        jams: usize,
    ) {
        self.in_progress = false;
        self.can_revert = can_revert;
        self.end_ticks = master_clock.current_time();
        self.end_time = Some(OffsetDateTime::now_utc());
        for clock in master_clock.clocks() {
            let entry = self.clocks.entry(clock.name()).or_default();
            entry.number = clock.number();
            entry.end_time = clock.time();
            entry.running = clock.is_running();
        }
        self.teams = teams.map(|_, team| team.counters());
        self.jams = jams;
    }

    /// Re-opens a closed snapshot
    pub fn unend(&mut self) {
        self.in_progress = true;
        self.can_revert = false;
        self.end_ticks = self.start_ticks;
        self.end_time = None;
    }

    /// Ticks spent in this state
    pub fn length(&self) -> i64 {
        self.end_ticks - self.start_ticks
    }

    pub fn base_path(index: usize) -> String {
        format!("Scoreboard.Snapshot({index})")
    }

    pub fn publish(&self, store: &mut impl StateStore) {
        let base = Self::base_path(self.index);
        store.update(&format!("{base}.State"), self.state.as_str().into());
        store.update(&format!("{base}.InProgress"), self.in_progress.into());
        store.update(&format!("{base}.CanRevert"), self.can_revert.into());
        store.update(&format!("{base}.StartTicks"), self.start_ticks.into());
        store.update(&format!("{base}.EndTicks"), self.end_ticks.into());
        store.update(&format!("{base}.Length"), self.length().into());
        store.update(&format!("{base}.StartTime"), self.start_time.into());
        match self.end_time {
            Some(end_time) => store.update(&format!("{base}.EndTime"), end_time.into()),
            None => store.delete(&format!("{base}.EndTime")),
        }
        for (name, clock) in &self.clocks {
            let path = format!("{base}.Clock({name})");
            store.update(&format!("{path}.Number"), clock.number.into());
            store.update(&format!("{path}.StartTime"), clock.start_time.into());
            store.update(&format!("{path}.EndTime"), clock.end_time.into());
            store.update(&format!("{path}.Running"), clock.running.into());
        }
        for (id, team) in &self.teams {
            let path = format!("{base}.Team({id})");
            store.update(&format!("{path}.Timeouts"), team.timeouts.into());
            store.update(&format!("{path}.OfficialReviews"), team.official_reviews.into());
            store.update(
                &format!("{path}.OfficialReviewRetained"),
                team.official_review_retained.into(),
            );
        }
    }

    pub fn delete(&self, store: &mut impl StateStore) {
        store.delete(&Self::base_path(self.index));
    }
}
