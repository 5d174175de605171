use derby_common::{
    bundles::TeamBundle,
    config::Rules,
    game_state::GameState,
    state_store::{StateStore, ValueKind},
    team_id::TeamId,
};
use log::*;
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub mod clock;
pub mod jam;
pub mod master_clock;
pub mod routes;
pub mod snapshot;
pub mod team;

use clock::ClockName;
use jam::{Jam, Positions};
use master_clock::MasterClock;
use snapshot::StateSnapshot;
use team::{SkaterPosition, Team};

/// The bout: game state, clocks, teams and the undo log. Every change is
/// published to the owned store as it happens.
#[derive(Debug)]
pub struct Scoreboard<S: StateStore> {
    state: GameState,
    master_clock: MasterClock,
    teams: TeamBundle<Team>,
    snapshots: Vec<StateSnapshot>,
    jams: Vec<Jam>,
    store: S,
}

impl<S: StateStore> Scoreboard<S> {
    pub fn new(rules: Rules, store: S) -> Self {
        let teams = TeamBundle::from_fn(|id| Team::new(id, &rules));
        let mut scoreboard = Self {
            state: GameState::NotRunning,
            master_clock: MasterClock::new(rules),
            teams,
            snapshots: vec![],
            jams: vec![],
            store,
        };
        scoreboard.reset();
        scoreboard
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn master_clock(&self) -> &MasterClock {
        &self.master_clock
    }

    pub fn team(&self, id: TeamId) -> &Team {
        &self.teams[id]
    }

    pub fn teams(&self) -> &TeamBundle<Team> {
        &self.teams
    }

    pub fn snapshots(&self) -> &[StateSnapshot] {
        &self.snapshots
    }

    pub fn active_snapshot(&self) -> Option<&StateSnapshot> {
        self.snapshots.last()
    }

    pub fn jams(&self) -> &[Jam] {
        &self.jams
    }

    pub fn active_jam(&self) -> Option<&Jam> {
        self.jams.last()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Throws away the whole bout and starts over with one open snapshot and
    /// one empty jam
    pub fn reset(&mut self) {
        info!("{} Resetting scoreboard", self.status_string());
        for snapshot in self.snapshots.drain(..) {
            snapshot.delete(&mut self.store);
        }
        for jam in self.jams.drain(..) {
            jam.delete(&mut self.store);
        }
        for (_, team) in self.teams.iter_mut() {
            team.reset(&mut self.store);
        }
        self.master_clock.reset();
        self.set_state(GameState::NotRunning);
        self.start_snapshot();
        self.new_jam();
    }

    pub fn set_state(&mut self, state: GameState) {
        if state != self.state {
            debug!("{} Setting state to {state}", self.status_string());
        }
        self.state = state;
        self.store.update("Scoreboard.State", state.as_str().into());
        self.master_clock
            .set_clock_adjustable(ClockName::Period, state.is_timeout());
        self.publish_clocks();
    }

    pub fn start_jam(&mut self) -> Outcome {
        if self.state == GameState::Jam {
            return Outcome::Ignored(Ignored::WrongState(self.state));
        }
        info!(
            "{} Starting jam {}",
            self.status_string(),
            self.active_jam().map_or(0, Jam::number)
        );
        self.end_snapshot(true);

        if self.state == GameState::Intermission {
            let intermission = &self.master_clock[ClockName::Intermission];
            if intermission.remaining() < intermission.position().max / 2 {
                self.end_of_intermission();
            }
        }

        self.set_state(GameState::Jam);
        self.master_clock[ClockName::Jam].reset(false, true);
        self.master_clock
            .set_running_clocks(&[ClockName::Period, ClockName::Jam]);
        if let Some(jam) = self.jams.last_mut() {
            jam.update(&self.teams, &mut self.store);
        }
        self.start_snapshot();
        Outcome::Applied
    }

    pub fn stop_jam(&mut self) -> Outcome {
        if self.state != GameState::Jam {
            return Outcome::Ignored(Ignored::WrongState(self.state));
        }
        if self.master_clock[ClockName::Period].is_expired() {
            return self.end_of_period(true);
        }

        info!("{} Stopping jam", self.status_string());
        let jam_moved = self.master_clock[ClockName::Jam].has_moved();
        self.end_snapshot(jam_moved);
        self.set_state(GameState::Lineup);
        self.new_jam();
        self.master_clock[ClockName::Lineup].reset(false, false);
        self.master_clock
            .set_running_clocks(&[ClockName::Period, ClockName::Lineup]);
        self.start_snapshot();
        Outcome::Applied
    }

    /// Starts a timeout of the requested kind. Anything that isn't a timeout
    /// state becomes an official timeout.
    pub fn timeout(&mut self, requested: Option<GameState>) -> Outcome {
        let requested = requested
            .filter(|state| state.is_timeout())
            .unwrap_or(GameState::OfficialTimeout);

        self.end_snapshot(true);
        let refusal = match requested {
            GameState::OfficialTimeout if self.state == GameState::OfficialTimeout => {
                Some(Ignored::AlreadyInTimeout)
            }
            GameState::TeamTimeout1 | GameState::TeamTimeout2 => {
                let team = requesting_team(requested);
                (!self.teams[team].use_timeout(&mut self.store)).then_some(Ignored::NoTimeouts(team))
            }
            GameState::OfficialReview1 | GameState::OfficialReview2 => {
                let team = requesting_team(requested);
                (!self.teams[team].use_official_review(&mut self.store))
                    .then_some(Ignored::NoOfficialReviews(team))
            }
            _ => None,
        };
        if let Some(refusal) = refusal {
            self.unend_snapshot();
            return Outcome::Ignored(refusal);
        }

        info!("{} Starting timeout {requested}", self.status_string());
        self.set_state(requested);
        self.master_clock[ClockName::Timeout].reset(false, false);
        self.master_clock.set_running_clocks(&[ClockName::Timeout]);
        self.start_snapshot();
        Outcome::Applied
    }

    /// Like `timeout`, with the kind given by its published name
    pub fn timeout_requested(&mut self, requested: &str) -> Outcome {
        let parsed = GameState::parse(requested);
        if parsed.is_none_or(|state| !state.is_timeout()) {
            warn!("Unrecognized timeout {requested:?}, starting an official timeout");
        }
        self.timeout(parsed)
    }

    pub fn team_timeout(&mut self, team: TeamId) -> Outcome {
        self.timeout(Some(GameState::team_timeout(team)))
    }

    pub fn official_review(&mut self, team: TeamId) -> Outcome {
        self.timeout(Some(GameState::official_review(team)))
    }

    pub fn end_timeout(&mut self) -> Outcome {
        if !self.state.is_timeout() {
            return Outcome::Ignored(Ignored::WrongState(self.state));
        }
        info!("{} Ending timeout", self.status_string());
        self.end_snapshot(true);
        self.set_state(GameState::Lineup);
        self.master_clock[ClockName::Lineup].reset(false, false);
        self.master_clock.set_running_clocks(&[ClockName::Lineup]);
        self.start_snapshot();
        Outcome::Applied
    }

    pub fn end_of_period(&mut self, can_undo: bool) -> Outcome {
        info!("{} Ending period", self.status_string());
        self.end_snapshot(can_undo);
        if self.master_clock[ClockName::Period].number() == 1 {
            self.set_state(GameState::Intermission);
            self.master_clock[ClockName::Intermission].reset(false, false);
            self.master_clock
                .set_running_clocks(&[ClockName::Intermission]);
        } else {
            self.set_state(GameState::UnofficialFinal);
            self.master_clock.set_running_clocks(&[]);
        }
        self.start_snapshot();
        Outcome::Applied
    }

    /// Prepares the next period. Only applies while the period clock has run
    /// out, so the period number advances once per intermission.
    pub fn end_of_intermission(&mut self) -> Outcome {
        if !self.master_clock[ClockName::Period].is_expired() {
            return Outcome::Ignored(Ignored::PeriodNotOver);
        }
        info!("{} Ending intermission", self.status_string());
        self.master_clock[ClockName::Period].reset(false, true);
        self.master_clock[ClockName::Jam].reset(true, false);
        self.publish_clocks();
        Outcome::Applied
    }

    /// Resolves clocks that ran out, according to the current state
    pub fn clocks_expired(&mut self, expired: &[ClockName]) {
        debug!(
            "{} Clocks expired: {expired:?}, still running {:?}",
            self.status_string(),
            self.master_clock.running_clocks()
        );
        let period_over = self.master_clock[ClockName::Period].is_expired();
        let outcome = match self.state {
            GameState::Lineup if period_over => self.end_of_period(false),
            GameState::Lineup if expired.contains(&ClockName::Lineup) => self.start_jam(),
            GameState::Jam if expired.contains(&ClockName::Jam) => {
                if period_over {
                    self.end_of_period(false)
                } else {
                    self.stop_jam()
                }
            }
            GameState::Intermission
                if expired.contains(&ClockName::Intermission)
                    && self.master_clock[ClockName::Intermission].number() == 1 =>
            {
                self.end_of_intermission()
            }
            _ => return,
        };
        if let Outcome::Ignored(reason) = outcome {
            debug!("{} Expiry had no effect: {reason}", self.status_string());
        }
    }

    /// Advances the clocks by one tick and handles anything that ran out
    pub fn tick(&mut self) -> Vec<ClockName> {
        let expired = self.master_clock.tick();
        self.publish_clocks();
        if !expired.is_empty() {
            self.clocks_expired(&expired);
        }
        expired
    }

    /// Rolls back the most recent transition
    pub fn undo(&mut self) -> Outcome {
        let Some(target) = self
            .snapshots
            .len()
            .checked_sub(2)
            .and_then(|i| self.snapshots.get(i))
            .cloned()
        else {
            return Outcome::Ignored(Ignored::NothingToUndo);
        };
        if !target.can_revert {
            return Outcome::Ignored(Ignored::NotRevertible);
        }
        info!(
            "{} Reverting snapshot {} to snapshot {} ({})",
            self.status_string(),
            self.active_snapshot().map_or(0, |s| s.index),
            target.index,
            target.state
        );

        if self.state != GameState::Jam && target.state == GameState::Jam {
            while self.jams.len() > target.jams.max(1) {
                if let Some(jam) = self.jams.pop() {
                    jam.delete(&mut self.store);
                }
            }
            if let Some(jam) = self.jams.last_mut() {
                jam.reinstate(&mut self.teams, &mut self.store);
            }
        }

        for (name, recorded) in &target.clocks {
            let clock = &mut self.master_clock[*name];
            clock.set_running(recorded.running);
            clock.set_time(recorded.end_time);
            clock.set_number(recorded.number);
        }
        for (id, team) in self.teams.iter_mut() {
            team.restore_counters(&target.teams[id], &mut self.store);
        }
        self.master_clock.set_ticks(target.end_ticks);
        self.set_state(target.state);

        if let Some(active) = self.snapshots.pop() {
            active.delete(&mut self.store);
        }
        self.unend_snapshot();

        let expired = self.master_clock.reevaluate();
        self.publish_clocks();
        if !expired.is_empty() {
            self.clocks_expired(&expired);
        }
        Outcome::Applied
    }

    pub fn set_clock_time(&mut self, name: ClockName, time: i64) {
        self.master_clock[name].set_time(time);
        self.publish_clocks();
    }

    /// Sets the name and colour a team starts with and returns to on reset
    pub fn set_team_defaults(&mut self, id: TeamId, name: &str, color: &str) {
        self.teams[id].set_defaults(name, color, &mut self.store);
    }

    /// Runs `f` against one team, with the store to publish into
    pub fn with_team<R>(&mut self, id: TeamId, f: impl FnOnce(&mut Team, &mut S) -> R) -> R {
        f(&mut self.teams[id], &mut self.store)
    }

    pub fn retain_official_review(&mut self, team: TeamId) -> Outcome {
        if self.teams[team].retain_official_review(&mut self.store) {
            info!(
                "{} Team {team} official review retained: {}",
                self.status_string(),
                self.teams[team].official_review_retained()
            );
            Outcome::Applied
        } else {
            Outcome::Ignored(Ignored::NotRetainable(team))
        }
    }

    pub fn set_jammer(&mut self, team: TeamId, skater: &str) -> Result<()> {
        let positions = self.teams[team].set_jammer(skater, &mut self.store)?;
        self.record_positions(team, positions);
        Ok(())
    }

    pub fn set_pivot(&mut self, team: TeamId, skater: &str) -> Result<()> {
        let positions = self.teams[team].set_pivot(skater, &mut self.store)?;
        self.record_positions(team, positions);
        Ok(())
    }

    pub fn set_skater_position(&mut self, team: TeamId, skater: &str, position: SkaterPosition) {
        let positions = self.teams[team].set_skater_position(skater, position, &mut self.store);
        self.record_positions(team, positions);
    }

    pub fn delete_skater(&mut self, team: TeamId, skater: &str) -> Result<()> {
        let positions = self.teams[team].delete_skater(skater, &mut self.store)?;
        self.record_positions(team, positions);
        Ok(())
    }

    fn record_positions(&mut self, team: TeamId, positions: Positions) {
        if let Some(jam) = self.jams.last_mut() {
            jam.set_team_positions(team, positions, &mut self.store);
        }
    }

    /// Edits a recorded snapshot in place and republishes it
    pub fn update_snapshot(
        &mut self,
        index: &str,
        f: impl FnOnce(&mut StateSnapshot),
    ) -> Result<()> {
        let snapshot = index
            .parse::<usize>()
            .ok()
            .and_then(|i| self.snapshots.get_mut(i))
            .ok_or_else(|| ScoreboardError::SnapshotNotFound(index.to_string()))?;
        f(snapshot);
        snapshot.publish(&mut self.store);
        Ok(())
    }

    fn start_snapshot(&mut self) {
        let snapshot = StateSnapshot::new(
            self.snapshots.len(),
            self.state,
            &self.master_clock,
            &self.teams,
            self.jams.len(),
        );
        snapshot.publish(&mut self.store);
        self.snapshots.push(snapshot);
    }

    fn end_snapshot(&mut self, can_revert: bool) {
        if let Some(snapshot) = self.snapshots.last_mut() {
            snapshot.end(can_revert, &self.master_clock, &self.teams, self.jams.len());
            snapshot.publish(&mut self.store);
        }
    }

    fn unend_snapshot(&mut self) {
        if let Some(snapshot) = self.snapshots.last_mut() {
            snapshot.unend();
            snapshot.publish(&mut self.store);
        }
    }

    fn new_jam(&mut self) {
        let mut jam = Jam::new(self.jams.len() + 1);
        jam.update(&self.teams, &mut self.store);
        self.jams.push(jam);
    }

    fn publish_clocks(&mut self) {
        self.master_clock.publish(&mut self.store);
    }

    pub fn status_string(&self) -> String {
        let period = &self.master_clock[ClockName::Period];
        let ms = period.time();
        format!(
            "[P{} {:02}:{:02}.{} J{:02} {}]",
            period.number(),
            ms / 60_000,
            (ms / 1000) % 60,
            (ms % 1000) / 100,
            self.master_clock[ClockName::Jam].number(),
            self.state.tag()
        )
    }
}

fn requesting_team(state: GameState) -> TeamId {
    match state {
        GameState::TeamTimeout2 | GameState::OfficialReview2 => TeamId::Two,
        _ => TeamId::One,
    }
}

/// Result of a state transition. Being ignored is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored(Ignored),
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// Why a transition was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    WrongState(GameState),
    AlreadyInTimeout,
    NoTimeouts(TeamId),
    NoOfficialReviews(TeamId),
    NotRetainable(TeamId),
    PeriodNotOver,
    NothingToUndo,
    NotRevertible,
    OutOfRange,
}

impl Display for Ignored {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongState(state) => write!(f, "not allowed during {state}"),
            Self::AlreadyInTimeout => write!(f, "already in an official timeout"),
            Self::NoTimeouts(team) => write!(f, "team {team} has no timeouts left"),
            Self::NoOfficialReviews(team) => write!(f, "team {team} has no official reviews left"),
            Self::NotRetainable(team) => write!(f, "team {team} has no review to retain"),
            Self::PeriodNotOver => write!(f, "the period is still running"),
            Self::NothingToUndo => write!(f, "nothing to undo"),
            Self::NotRevertible => write!(f, "the last transition can't be undone"),
            Self::OutOfRange => write!(f, "value out of range"),
        }
    }
}

impl From<bool> for Outcome {
    fn from(applied: bool) -> Self {
        if applied {
            Self::Applied
        } else {
            Self::Ignored(Ignored::OutOfRange)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreboardError {
    #[error("Team {0} has no skater {1:?}")]
    SkaterNotFound(TeamId, String),
    #[error("No snapshot at index {0:?}")]
    SnapshotNotFound(String),
    #[error("Unknown command {0:?}")]
    UnknownCommand(String),
    #[error("Nothing handles updates to {0:?}")]
    NoUpdater(String),
    #[error("{path} takes a {expected} value, got a {found}")]
    WrongValueKind {
        path: String,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("Invalid value {value:?} for {path}")]
    InvalidValue { path: String, value: String },
    #[error("{0} needs an argument")]
    MissingArgument(String),
    #[error("Unknown clock {0:?}")]
    UnknownClock(String),
    #[error("Unknown team {0:?}")]
    UnknownTeam(String),
}

pub type Result<T> = std::result::Result<T, ScoreboardError>;

#[cfg(test)]
mod test {
    use super::*;
    use derby_common::state_store::MemoryStore;
    use more_asserts::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    pub fn initialize() {
        INIT.call_once(|| {
            env_logger::init();
        });
    }

    fn rules() -> Rules {
        Rules {
            period_duration: 60,
            jam_duration: 10,
            lineup_duration: 5,
            timeout_duration: 6,
            intermission_duration: 20,
            tick_millis: 1000,
            ..Default::default()
        }
    }

    fn new_scoreboard() -> Scoreboard<MemoryStore> {
        initialize();
        Scoreboard::new(rules(), MemoryStore::new())
    }

    fn tick_n(sb: &mut Scoreboard<MemoryStore>, n: usize) {
        for _ in 0..n {
            sb.tick();
        }
    }

    fn add_skaters(sb: &mut Scoreboard<MemoryStore>) {
        for team in [TeamId::One, TeamId::Two] {
            sb.with_team(team, |t, store| {
                t.set_skater_name("j", "Jay", store);
                t.set_skater_name("p", "Pea", store);
                t.set_skater_name("x", "Ex", store);
            });
        }
    }

    /// Everything undo promises to put back
    #[derive(Debug, PartialEq)]
    struct Observed {
        state: GameState,
        clocks: Vec<(ClockName, bool, i64, i64)>,
        counters: Vec<(i64, i64, bool)>,
        positions: Vec<Positions>,
        jams: Vec<Jam>,
        snapshots: usize,
        ticks: i64,
    }

    fn observe(sb: &Scoreboard<MemoryStore>) -> Observed {
        Observed {
            state: sb.state(),
            clocks: sb
                .master_clock()
                .clocks()
                .map(|c| (c.name(), c.is_running(), c.time(), c.number()))
                .collect(),
            counters: sb
                .teams()
                .iter()
                .map(|(_, t)| {
                    (
                        t.timeouts(),
                        t.official_reviews(),
                        t.official_review_retained(),
                    )
                })
                .collect(),
            positions: sb.teams().iter().map(|(_, t)| t.positions()).collect(),
            jams: sb.jams().to_vec(),
            snapshots: sb.snapshots().len(),
            ticks: sb.master_clock().current_time(),
        }
    }

    fn check_invariants(sb: &Scoreboard<MemoryStore>) {
        for (id, team) in sb.teams() {
            assert_le!(0, team.last_score());
            assert_le!(team.last_score(), team.score());
            assert_eq!(
                sb.store().get_int(&format!("Scoreboard.Team({id}).JamScore")),
                Some(team.score() - team.last_score())
            );
        }
        for clock in sb.master_clock().clocks() {
            let pos = clock.position();
            assert_le!(pos.min, pos.num);
            assert_le!(pos.num, pos.max);
        }
        assert_eq!(
            sb.snapshots().iter().filter(|s| s.in_progress).count(),
            1
        );
        assert!(sb.active_snapshot().unwrap().in_progress);
    }

    #[test]
    fn test_reset() {
        let sb = new_scoreboard();
        assert_eq!(sb.state(), GameState::NotRunning);
        assert_eq!(sb.snapshots().len(), 1);
        assert_eq!(sb.jams().len(), 1);
        assert!(sb.master_clock().running_clocks().is_empty());
        assert_eq!(sb.store().get_str("Scoreboard.State"), Some(""));
        assert_eq!(sb.store().get_int("Scoreboard.Clock(Period).Number"), Some(1));
        assert_eq!(sb.store().get_int("Scoreboard.Team(2).Timeouts"), Some(3));
        assert_eq!(sb.status_string(), "[P1 01:00.0 J00 NOTRUNG]");
        check_invariants(&sb);
    }

    #[test]
    fn test_start_and_stop_jam() {
        let mut sb = new_scoreboard();
        assert_eq!(sb.start_jam(), Outcome::Applied);
        assert_eq!(sb.state(), GameState::Jam);
        assert_eq!(sb.master_clock()[ClockName::Jam].number(), 1);
        assert_eq!(
            sb.master_clock().running_clocks(),
            vec![ClockName::Period, ClockName::Jam]
        );
        assert_eq!(sb.store().get_str("Scoreboard.State"), Some("Jam"));
        assert_eq!(sb.snapshots().len(), 2);
        check_invariants(&sb);

        tick_n(&mut sb, 3);
        assert_eq!(sb.stop_jam(), Outcome::Applied);
        assert_eq!(sb.state(), GameState::Lineup);
        assert_eq!(sb.jams().len(), 2);
        assert_eq!(
            sb.master_clock().running_clocks(),
            vec![ClockName::Period, ClockName::Lineup]
        );
        assert!(sb.snapshots()[1].can_revert);
        assert_eq!(sb.snapshots()[1].length(), 3);
        check_invariants(&sb);
    }

    #[test]
    fn test_stop_jam_without_movement_is_not_revertible() {
        let mut sb = new_scoreboard();
        sb.start_jam();
        sb.stop_jam();
        assert!(!sb.snapshots()[1].can_revert);
        assert_eq!(sb.undo(), Outcome::Ignored(Ignored::NotRevertible));
        assert_eq!(sb.state(), GameState::Lineup);
    }

    #[test]
    fn test_repeated_transitions_are_ignored() {
        let mut sb = new_scoreboard();
        let before = observe(&sb);
        assert_eq!(
            sb.stop_jam(),
            Outcome::Ignored(Ignored::WrongState(GameState::NotRunning))
        );
        assert_eq!(observe(&sb), before);

        sb.start_jam();
        tick_n(&mut sb, 2);
        let before = observe(&sb);
        assert_eq!(
            sb.start_jam(),
            Outcome::Ignored(Ignored::WrongState(GameState::Jam))
        );
        assert_eq!(observe(&sb), before);
        assert_eq!(
            sb.end_timeout(),
            Outcome::Ignored(Ignored::WrongState(GameState::Jam))
        );
        assert_eq!(observe(&sb), before);
    }

    #[test]
    fn test_start_jam_then_undo_round_trips() {
        let mut sb = new_scoreboard();
        add_skaters(&mut sb);
        sb.set_jammer(TeamId::One, "j").unwrap();
        sb.set_pivot(TeamId::Two, "p").unwrap();
        sb.start_jam();
        tick_n(&mut sb, 4);
        sb.stop_jam();
        tick_n(&mut sb, 2);
        sb.team_timeout(TeamId::Two);
        tick_n(&mut sb, 1);
        sb.end_timeout();
        tick_n(&mut sb, 2);

        let before = observe(&sb);
        assert_eq!(sb.start_jam(), Outcome::Applied);
        tick_n(&mut sb, 3);
        assert_eq!(sb.undo(), Outcome::Applied);
        assert_eq!(observe(&sb), before);
        check_invariants(&sb);
    }

    #[test]
    fn test_undo_stop_jam_restores_jam_log() {
        let mut sb = new_scoreboard();
        add_skaters(&mut sb);
        sb.set_jammer(TeamId::One, "j").unwrap();
        sb.start_jam();
        tick_n(&mut sb, 2);
        let before = observe(&sb);

        sb.stop_jam();
        assert_eq!(sb.jams().len(), 2);
        // Positions change during the lineup
        sb.set_jammer(TeamId::One, "x").unwrap();
        sb.set_pivot(TeamId::One, "j").unwrap();
        assert_eq!(sb.active_jam().unwrap().positions()[TeamId::One].jammer.as_deref(), Some("x"));

        assert_eq!(sb.undo(), Outcome::Applied);
        assert_eq!(sb.state(), GameState::Jam);
        assert_eq!(sb.jams().len(), 1);
        assert_eq!(sb.team(TeamId::One).jammer(), Some("j"));
        assert_eq!(sb.team(TeamId::One).pivot(), None);
        assert!(!sb.store().contains("Scoreboard.Jam(2).Team(1).Jammer"));
        assert_eq!(observe(&sb).clocks, before.clocks);
        assert_eq!(observe(&sb).ticks, before.ticks);
        check_invariants(&sb);
    }

    #[test]
    fn test_two_undos_return_to_before_first_jam() {
        let mut sb = new_scoreboard();
        add_skaters(&mut sb);
        sb.set_jammer(TeamId::Two, "j").unwrap();
        let before = observe(&sb);

        sb.start_jam();
        tick_n(&mut sb, 2);
        sb.stop_jam();
        sb.tick();
        assert_eq!(sb.undo(), Outcome::Applied);
        assert_eq!(sb.state(), GameState::Jam);
        assert_eq!(sb.undo(), Outcome::Applied);
        assert_eq!(observe(&sb), before);
        assert_eq!(sb.undo(), Outcome::Ignored(Ignored::NothingToUndo));
        check_invariants(&sb);
    }

    #[test]
    fn test_undo_period_end_returns_to_jam() {
        let mut sb = new_scoreboard();
        sb.set_clock_time(ClockName::Period, 1000);
        sb.start_jam();
        tick_n(&mut sb, 2);
        assert!(sb.master_clock()[ClockName::Period].is_expired());
        let before = observe(&sb);

        assert_eq!(sb.stop_jam(), Outcome::Applied);
        assert_eq!(sb.state(), GameState::Intermission);
        tick_n(&mut sb, 3);

        assert_eq!(sb.undo(), Outcome::Applied);
        assert_eq!(observe(&sb), before);
        check_invariants(&sb);

        // The jam runs out and ends the period for good
        tick_n(&mut sb, 8);
        assert_eq!(sb.state(), GameState::Intermission);
        assert_eq!(sb.undo(), Outcome::Ignored(Ignored::NotRevertible));
    }

    #[test]
    fn test_undo_stops_restored_clock_at_limit() {
        let mut sb = new_scoreboard();
        sb.set_clock_time(ClockName::Period, 1000);
        sb.start_jam();
        sb.tick();
        sb.stop_jam();
        assert_eq!(sb.state(), GameState::Intermission);
        tick_n(&mut sb, 2);

        // Resuming the period it already ran out runs the period clock at its
        // limit until the next tick
        sb.start_jam();
        assert_eq!(sb.master_clock()[ClockName::Period].number(), 1);
        assert!(sb.master_clock()[ClockName::Period].is_running());
        assert!(sb.master_clock()[ClockName::Period].is_expired());
        sb.timeout(None);
        assert_eq!(sb.state(), GameState::OfficialTimeout);

        assert_eq!(sb.undo(), Outcome::Applied);
        assert_eq!(sb.state(), GameState::Jam);
        assert_eq!(sb.master_clock().running_clocks(), vec![ClockName::Jam]);
        assert_eq!(
            sb.store().get_bool("Scoreboard.Clock(Period).Running"),
            Some(false)
        );
        check_invariants(&sb);

        tick_n(&mut sb, 9);
        assert_eq!(sb.state(), GameState::Jam);
        sb.tick();
        assert_eq!(sb.state(), GameState::Intermission);
    }

    #[test]
    fn test_undo_needs_history() {
        let mut sb = new_scoreboard();
        assert_eq!(sb.undo(), Outcome::Ignored(Ignored::NothingToUndo));
    }

    #[test]
    fn test_jam_expiry_starts_lineup() {
        let mut sb = new_scoreboard();
        sb.start_jam();
        tick_n(&mut sb, 9);
        assert_eq!(sb.state(), GameState::Jam);
        assert_eq!(sb.tick(), vec![ClockName::Jam]);
        assert_eq!(sb.state(), GameState::Lineup);
        assert!(sb.master_clock()[ClockName::Period].is_running());
        assert!(sb.master_clock()[ClockName::Lineup].is_running());
        assert_eq!(sb.master_clock()[ClockName::Period].time(), 50_000);
        check_invariants(&sb);
    }

    #[test]
    fn test_lineup_expiry_starts_jam() {
        let mut sb = new_scoreboard();
        sb.start_jam();
        tick_n(&mut sb, 2);
        sb.stop_jam();
        tick_n(&mut sb, 5);
        assert_eq!(sb.state(), GameState::Jam);
        assert_eq!(sb.master_clock()[ClockName::Jam].number(), 2);
    }

    #[test]
    fn test_period_expiry_lets_jam_finish() {
        let mut sb = new_scoreboard();
        sb.set_clock_time(ClockName::Period, 3000);
        sb.start_jam();
        tick_n(&mut sb, 3);
        assert_eq!(sb.state(), GameState::Jam);
        assert!(sb.master_clock()[ClockName::Period].is_expired());
        assert!(sb.master_clock()[ClockName::Jam].is_running());

        tick_n(&mut sb, 7);
        assert_eq!(sb.state(), GameState::Intermission);
        assert_eq!(
            sb.master_clock().running_clocks(),
            vec![ClockName::Intermission]
        );
        // Automatic period ends can't be undone
        assert_eq!(sb.undo(), Outcome::Ignored(Ignored::NotRevertible));
    }

    #[test]
    fn test_stop_jam_after_period_expired_ends_period() {
        let mut sb = new_scoreboard();
        sb.set_clock_time(ClockName::Period, 1000);
        sb.start_jam();
        sb.tick();
        assert_eq!(sb.stop_jam(), Outcome::Applied);
        assert_eq!(sb.state(), GameState::Intermission);
        assert_eq!(sb.jams().len(), 1);
        assert!(sb.snapshots()[1].can_revert);
    }

    #[test]
    fn test_period_expiry_during_lineup() {
        let mut sb = new_scoreboard();
        sb.start_jam();
        sb.tick();
        sb.stop_jam();
        sb.set_clock_time(ClockName::Period, 1000);
        sb.tick();
        assert_eq!(sb.state(), GameState::Intermission);
    }

    #[test]
    fn test_intermission_expiry_advances_period_once() {
        let mut sb = new_scoreboard();
        sb.set_clock_time(ClockName::Period, 1000);
        sb.start_jam();
        sb.tick();
        sb.stop_jam();
        assert_eq!(sb.state(), GameState::Intermission);

        tick_n(&mut sb, 20);
        assert_eq!(sb.state(), GameState::Intermission);
        assert_eq!(sb.master_clock()[ClockName::Period].number(), 2);
        assert_eq!(sb.master_clock()[ClockName::Period].time(), 60_000);
        assert_eq!(sb.master_clock()[ClockName::Jam].number(), 0);

        assert_eq!(sb.end_of_intermission(), Outcome::Ignored(Ignored::PeriodNotOver));
        sb.start_jam();
        assert_eq!(sb.master_clock()[ClockName::Period].number(), 2);
        assert_eq!(sb.master_clock()[ClockName::Jam].number(), 1);
        assert_eq!(sb.status_string(), "[P2 01:00.0 J01 JAM____]");
    }

    #[test]
    fn test_early_start_from_intermission_resumes_period() {
        let mut sb = new_scoreboard();
        sb.set_clock_time(ClockName::Period, 1000);
        sb.start_jam();
        sb.tick();
        sb.stop_jam();
        tick_n(&mut sb, 2);

        sb.start_jam();
        assert_eq!(sb.state(), GameState::Jam);
        assert_eq!(sb.master_clock()[ClockName::Period].number(), 1);
        assert_eq!(sb.master_clock()[ClockName::Jam].number(), 2);
    }

    #[test]
    fn test_late_start_from_intermission_begins_next_period() {
        let mut sb = new_scoreboard();
        sb.set_clock_time(ClockName::Period, 1000);
        sb.start_jam();
        sb.tick();
        sb.stop_jam();
        tick_n(&mut sb, 11);

        sb.start_jam();
        assert_eq!(sb.master_clock()[ClockName::Period].number(), 2);
        assert_eq!(sb.master_clock()[ClockName::Period].time(), 60_000);
        assert_eq!(sb.master_clock()[ClockName::Jam].number(), 1);
    }

    #[test]
    fn test_second_period_ends_in_unofficial_final() {
        let mut sb = new_scoreboard();
        sb.set_clock_time(ClockName::Period, 1000);
        sb.start_jam();
        sb.tick();
        sb.stop_jam();
        tick_n(&mut sb, 20);
        sb.start_jam();
        sb.set_clock_time(ClockName::Period, 1000);
        sb.tick();
        sb.stop_jam();
        assert_eq!(sb.state(), GameState::UnofficialFinal);
        assert!(sb.master_clock().running_clocks().is_empty());
    }

    #[test]
    fn test_refused_team_timeout_changes_nothing() {
        let mut sb = new_scoreboard();
        sb.with_team(TeamId::One, |t, store| t.set_timeouts(0, store));
        sb.start_jam();
        tick_n(&mut sb, 2);
        let before = observe(&sb);
        let active = sb.active_snapshot().cloned();

        assert_eq!(
            sb.team_timeout(TeamId::One),
            Outcome::Ignored(Ignored::NoTimeouts(TeamId::One))
        );
        assert_eq!(observe(&sb), before);
        let reopened = sb.active_snapshot().unwrap();
        assert_eq!(reopened.index, active.as_ref().unwrap().index);
        assert!(reopened.in_progress);
        assert_eq!(sb.store().get_str("Scoreboard.State"), Some("Jam"));
        check_invariants(&sb);
    }

    #[test]
    fn test_timeouts() {
        let mut sb = new_scoreboard();
        sb.start_jam();
        tick_n(&mut sb, 2);

        assert_eq!(sb.timeout(None), Outcome::Applied);
        assert_eq!(sb.state(), GameState::OfficialTimeout);
        assert_eq!(sb.master_clock().running_clocks(), vec![ClockName::Timeout]);
        assert!(sb.master_clock()[ClockName::Period].is_adjustable());
        assert_eq!(sb.timeout(None), Outcome::Ignored(Ignored::AlreadyInTimeout));

        assert_eq!(sb.timeout_requested("TTO2"), Outcome::Applied);
        assert_eq!(sb.state(), GameState::TeamTimeout2);
        assert_eq!(sb.team(TeamId::Two).timeouts(), 2);

        assert_eq!(sb.official_review(TeamId::One), Outcome::Applied);
        assert_eq!(sb.team(TeamId::One).official_reviews(), 0);
        assert_eq!(
            sb.official_review(TeamId::One),
            Outcome::Ignored(Ignored::NoOfficialReviews(TeamId::One))
        );

        // Unknown requests fall back to an official timeout
        assert_eq!(sb.timeout_requested("Halftime"), Outcome::Applied);
        assert_eq!(sb.state(), GameState::OfficialTimeout);

        tick_n(&mut sb, 6);
        assert_eq!(sb.state(), GameState::OfficialTimeout);
        assert!(!sb.master_clock()[ClockName::Timeout].is_running());

        assert_eq!(sb.end_timeout(), Outcome::Applied);
        assert_eq!(sb.state(), GameState::Lineup);
        assert_eq!(sb.master_clock().running_clocks(), vec![ClockName::Lineup]);
        assert!(!sb.master_clock()[ClockName::Period].is_adjustable());
        check_invariants(&sb);
    }

    #[test]
    fn test_lineup_after_timeout_starts_jam() {
        let mut sb = new_scoreboard();
        sb.start_jam();
        sb.tick();
        sb.timeout(None);
        sb.end_timeout();
        tick_n(&mut sb, 5);
        assert_eq!(sb.state(), GameState::Jam);
    }

    #[test]
    fn test_undo_timeout_restores_each_team() {
        let mut sb = new_scoreboard();
        sb.start_jam();
        tick_n(&mut sb, 2);
        sb.stop_jam();
        sb.team_timeout(TeamId::One);
        sb.end_timeout();
        let before = observe(&sb);

        sb.team_timeout(TeamId::Two);
        assert_eq!(sb.team(TeamId::Two).timeouts(), 2);
        assert_eq!(sb.undo(), Outcome::Applied);
        assert_eq!(sb.team(TeamId::One).timeouts(), 2);
        assert_eq!(sb.team(TeamId::Two).timeouts(), 3);
        assert_eq!(observe(&sb), before);
    }

    #[test]
    fn test_retain_official_review() {
        let mut sb = new_scoreboard();
        assert_eq!(
            sb.retain_official_review(TeamId::One),
            Outcome::Ignored(Ignored::NotRetainable(TeamId::One))
        );
        sb.with_team(TeamId::One, |t, store| t.set_official_reviews(0, store));
        assert_eq!(sb.retain_official_review(TeamId::One), Outcome::Applied);
        assert_eq!(sb.team(TeamId::One).official_reviews(), 1);
        assert!(sb.team(TeamId::One).official_review_retained());
        assert_eq!(sb.retain_official_review(TeamId::One), Outcome::Applied);
        assert_eq!(sb.team(TeamId::One).official_reviews(), 0);
        assert!(!sb.team(TeamId::One).official_review_retained());
    }

    #[test]
    fn test_positions_are_recorded_in_active_jam() {
        let mut sb = new_scoreboard();
        add_skaters(&mut sb);
        assert_eq!(
            sb.set_jammer(TeamId::Two, "nobody"),
            Err(ScoreboardError::SkaterNotFound(
                TeamId::Two,
                "nobody".to_string()
            ))
        );
        sb.set_jammer(TeamId::Two, "j").unwrap();
        sb.start_jam();
        assert_eq!(
            sb.store().get_str("Scoreboard.Jam(1).Team(2).Jammer"),
            Some("j")
        );
        sb.delete_skater(TeamId::Two, "j").unwrap();
        assert!(!sb.store().contains("Scoreboard.Jam(1).Team(2).Jammer"));
        assert!(!sb.store().contains("Scoreboard.Team(2).Skater(j).Name"));
    }

    #[test]
    fn test_update_snapshot() {
        let mut sb = new_scoreboard();
        sb.update_snapshot("0", |ss| ss.can_revert = true).unwrap();
        assert_eq!(
            sb.store().get_bool("Scoreboard.Snapshot(0).CanRevert"),
            Some(true)
        );
        assert_eq!(
            sb.update_snapshot("7", |_| {}),
            Err(ScoreboardError::SnapshotNotFound("7".to_string()))
        );
        assert_eq!(
            sb.update_snapshot("x", |_| {}),
            Err(ScoreboardError::SnapshotNotFound("x".to_string()))
        );
    }

    #[test]
    fn test_reset_clears_history() {
        let mut sb = new_scoreboard();
        sb.start_jam();
        tick_n(&mut sb, 2);
        sb.stop_jam();
        sb.with_team(TeamId::One, |t, store| t.inc_score(store));
        assert!(sb.store().contains("Scoreboard.Snapshot(2).State"));

        sb.reset();
        assert_eq!(sb.snapshots().len(), 1);
        assert_eq!(sb.jams().len(), 1);
        assert!(!sb.store().contains("Scoreboard.Snapshot(2).State"));
        assert!(!sb.store().contains("Scoreboard.Jam(2).Team(1).Jammer"));
        assert_eq!(sb.team(TeamId::One).score(), 0);
        assert_eq!(sb.state(), GameState::NotRunning);
        assert_eq!(sb.master_clock().current_time(), 0);
        check_invariants(&sb);
    }
}
