use super::{Result, ScoreboardError, jam::Positions, snapshot::TeamSnapshot};
use derby_common::{config::Rules, state_store::StateStore, team_id::TeamId};
use derivative::Derivative;
use indexmap::{IndexMap, map::Entry};
use log::*;

#[derive(Derivative)]
#[derivative(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Lead {
    Lead,
    #[derivative(Default)]
    No,
    Lost,
}

impl Lead {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lead => "Lead",
            Self::No => "No",
            Self::Lost => "Lost",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Lead" => Some(Self::Lead),
            "No" => Some(Self::No),
            "Lost" => Some(Self::Lost),
            _ => None,
        }
    }
}

#[derive(Derivative)]
#[derivative(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SkaterPosition {
    #[derivative(Default)]
    Bench,
    Jammer,
    Pivot,
    Blocker,
}

impl SkaterPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bench => "Bench",
            Self::Jammer => "Jammer",
            Self::Pivot => "Pivot",
            Self::Blocker => "Blocker",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Bench" | "" => Some(Self::Bench),
            "Jammer" => Some(Self::Jammer),
            "Pivot" => Some(Self::Pivot),
            "Blocker" => Some(Self::Blocker),
            _ => None,
        }
    }

    /// Positions only one skater per team may hold
    fn is_unique(self) -> bool {
        matches!(self, Self::Jammer | Self::Pivot)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Skater {
    pub id: String,
    pub name: String,
    pub number: String,
    pub position: SkaterPosition,
    pub in_box: bool,
}

impl Skater {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Team {
    id: TeamId,
    base: String,
    default_timeouts: i64,
    default_official_reviews: i64,
    default_name: String,
    default_color: String,
    name: String,
    color: String,
    score: i64,
    last_score: i64,
    timeouts: i64,
    official_reviews: i64,
    official_review_retained: bool,
    lead: Lead,
    star_pass: bool,
    jammer: Option<String>,
    pivot: Option<String>,
    skaters: IndexMap<String, Skater>,
}

impl Team {
    pub fn new(id: TeamId, rules: &Rules) -> Self {
        let default_timeouts = rules.timeouts_per_team.into();
        let default_official_reviews = rules.official_reviews_per_team.into();
        let default_name = format!("Team {id}");
        let default_color = default_color(id).to_string();
        Self {
            id,
            base: Self::base_path(id),
            default_timeouts,
            default_official_reviews,
            name: default_name.clone(),
            color: default_color.clone(),
            default_name,
            default_color,
            score: 0,
            last_score: 0,
            timeouts: default_timeouts,
            official_reviews: default_official_reviews,
            official_review_retained: false,
            lead: Lead::No,
            star_pass: false,
            jammer: None,
            pivot: None,
            skaters: IndexMap::new(),
        }
    }

    pub fn base_path(id: TeamId) -> String {
        format!("Scoreboard.Team({id})")
    }

    fn path(&self, field: &str) -> String {
        format!("{}.{field}", self.base)
    }

    /// Restores every bout value to its default. The roster is kept but nobody
    /// holds a position any more.
    pub fn reset(&mut self, store: &mut impl StateStore) {
        store.update(&self.path("ID"), i64::from(self.id.number()).into());
        self.set_name(&self.default_name.clone(), store);
        self.set_color(&self.default_color.clone(), store);
        self.set_score(0, store);
        self.set_last_score(0, store);
        self.set_timeouts(self.default_timeouts, store);
        self.set_official_reviews(self.default_official_reviews, store);
        self.set_official_review_retained(false, store);
        self.set_lead(Lead::No, store);
        self.set_star_pass(false, store);
        let ids: Vec<String> = self.skaters.keys().cloned().collect();
        for id in ids {
            self.place_skater(&id, SkaterPosition::Bench, store);
        }
        self.update_positions(store);
    }

    /// Changes the name and colour the team returns to on reset, and applies
    /// them now
    pub fn set_defaults(&mut self, name: &str, color: &str, store: &mut impl StateStore) {
        self.default_name = name.to_string();
        self.default_color = color.to_string();
        self.set_name(name, store);
        self.set_color(color, store);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn last_score(&self) -> i64 {
        self.last_score
    }

    pub fn jam_score(&self) -> i64 {
        self.score - self.last_score
    }

    pub fn timeouts(&self) -> i64 {
        self.timeouts
    }

    pub fn official_reviews(&self) -> i64 {
        self.official_reviews
    }

    pub fn official_review_retained(&self) -> bool {
        self.official_review_retained
    }

    pub fn lead(&self) -> Lead {
        self.lead
    }

    pub fn star_pass(&self) -> bool {
        self.star_pass
    }

    pub fn jammer(&self) -> Option<&str> {
        self.jammer.as_deref()
    }

    pub fn pivot(&self) -> Option<&str> {
        self.pivot.as_deref()
    }

    pub fn skater(&self, id: &str) -> Option<&Skater> {
        self.skaters.get(id)
    }

    pub fn set_name(&mut self, name: &str, store: &mut impl StateStore) {
        self.name = name.to_string();
        store.update(&self.path("Name"), name.into());
    }

    pub fn set_color(&mut self, color: &str, store: &mut impl StateStore) {
        self.color = color.to_string();
        store.update(&self.path("Color"), color.into());
    }

    /// Negative scores are ignored. Returns whether the score was applied.
    pub fn set_score(&mut self, score: i64, store: &mut impl StateStore) -> bool {
        if score < 0 {
            return false;
        }
        self.score = score;
        if score < self.last_score {
            self.set_last_score(score, store);
        }
        store.update(&self.path("Score"), score.into());
        self.publish_jam_score(store);
        true
    }

    /// Values outside `0..=score` are ignored. Returns whether the value was
    /// applied.
    pub fn set_last_score(&mut self, last_score: i64, store: &mut impl StateStore) -> bool {
        if !(0..=self.score).contains(&last_score) {
            return false;
        }
        self.last_score = last_score;
        store.update(&self.path("LastScore"), last_score.into());
        self.publish_jam_score(store);
        true
    }

    fn publish_jam_score(&self, store: &mut impl StateStore) {
        store.update(&self.path("JamScore"), self.jam_score().into());
    }

    pub fn inc_score(&mut self, store: &mut impl StateStore) -> bool {
        self.score
            .checked_add(1)
            .is_some_and(|score| self.set_score(score, store))
    }

    pub fn dec_score(&mut self, store: &mut impl StateStore) -> bool {
        self.set_score(self.score - 1, store)
    }

    pub fn inc_last_score(&mut self, store: &mut impl StateStore) -> bool {
        self.last_score
            .checked_add(1)
            .is_some_and(|last_score| self.set_last_score(last_score, store))
    }

    pub fn dec_last_score(&mut self, store: &mut impl StateStore) -> bool {
        self.set_last_score(self.last_score - 1, store)
    }

    pub fn set_timeouts(&mut self, timeouts: i64, store: &mut impl StateStore) {
        self.timeouts = timeouts;
        store.update(&self.path("Timeouts"), timeouts.into());
    }

    pub fn set_official_reviews(&mut self, reviews: i64, store: &mut impl StateStore) {
        self.official_reviews = reviews;
        store.update(&self.path("OfficialReviews"), reviews.into());
    }

    pub fn set_official_review_retained(&mut self, retained: bool, store: &mut impl StateStore) {
        self.official_review_retained = retained;
        store.update(&self.path("OfficialReviewRetained"), retained.into());
    }

    pub fn set_lead(&mut self, lead: Lead, store: &mut impl StateStore) {
        self.lead = lead;
        store.update(&self.path("Lead"), lead.as_str().into());
    }

    pub fn set_star_pass(&mut self, star_pass: bool, store: &mut impl StateStore) {
        self.star_pass = star_pass;
        store.update(&self.path("StarPass"), star_pass.into());
    }

    /// Takes one timeout if any remain
    pub fn use_timeout(&mut self, store: &mut impl StateStore) -> bool {
        if self.timeouts > 0 {
            self.set_timeouts(self.timeouts - 1, store);
            true
        } else {
            false
        }
    }

    /// Takes one official review if any remain
    pub fn use_official_review(&mut self, store: &mut impl StateStore) -> bool {
        if self.official_reviews > 0 {
            self.set_official_reviews(self.official_reviews - 1, store);
            true
        } else {
            false
        }
    }

    /// Toggles a retained review: 0 and not retained becomes 1 and retained,
    /// and back. Returns whether anything changed.
    pub fn retain_official_review(&mut self, store: &mut impl StateStore) -> bool {
        match (self.official_reviews, self.official_review_retained) {
            (0, false) => {
                self.set_official_reviews(1, store);
                self.set_official_review_retained(true, store);
                true
            }
            (1, true) => {
                self.set_official_reviews(0, store);
                self.set_official_review_retained(false, store);
                true
            }
            _ => false,
        }
    }

    pub fn counters(&self) -> TeamSnapshot {
        TeamSnapshot {
            timeouts: self.timeouts,
            official_reviews: self.official_reviews,
            official_review_retained: self.official_review_retained,
        }
    }

    pub fn restore_counters(&mut self, counters: &TeamSnapshot, store: &mut impl StateStore) {
        self.set_timeouts(counters.timeouts, store);
        self.set_official_reviews(counters.official_reviews, store);
        self.set_official_review_retained(counters.official_review_retained, store);
    }

    fn skater_path(&self, id: &str) -> String {
        format!("{}.Skater({id})", self.base)
    }

    fn publish_skater(base: &str, skater: &Skater, store: &mut impl StateStore) {
        store.update(&format!("{base}.ID"), skater.id.as_str().into());
        store.update(&format!("{base}.Name"), skater.name.as_str().into());
        store.update(&format!("{base}.Number"), skater.number.as_str().into());
        store.update(&format!("{base}.Position"), skater.position.as_str().into());
        store.update(&format!("{base}.InBox"), skater.in_box.into());
    }

    /// Returns the skater with `id`, adding an empty roster entry if needed
    fn upsert_skater(&mut self, id: &str, store: &mut impl StateStore) -> &mut Skater {
        let base = self.skater_path(id);
        match self.skaters.entry(id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("Team {}: adding skater {id}", self.id);
                let skater = entry.insert(Skater::new(id));
                Self::publish_skater(&base, skater, store);
                skater
            }
        }
    }

    pub fn set_skater_name(&mut self, id: &str, name: &str, store: &mut impl StateStore) {
        self.upsert_skater(id, store).name = name.to_string();
        store.update(&format!("{}.Name", self.skater_path(id)), name.into());
        self.refresh_position_details(id, store);
    }

    pub fn set_skater_number(&mut self, id: &str, number: &str, store: &mut impl StateStore) {
        self.upsert_skater(id, store).number = number.to_string();
        store.update(&format!("{}.Number", self.skater_path(id)), number.into());
        self.refresh_position_details(id, store);
    }

    pub fn set_skater_in_box(&mut self, id: &str, in_box: bool, store: &mut impl StateStore) {
        self.upsert_skater(id, store).in_box = in_box;
        store.update(&format!("{}.InBox", self.skater_path(id)), in_box.into());
        self.refresh_position_details(id, store);
    }

    /// Places a skater, creating the roster entry if needed. Returns the
    /// team's resulting positions.
    pub fn set_skater_position(
        &mut self,
        id: &str,
        position: SkaterPosition,
        store: &mut impl StateStore,
    ) -> Positions {
        self.upsert_skater(id, store);
        self.place_skater(id, position, store);
        self.update_positions(store)
    }

    pub fn set_jammer(&mut self, id: &str, store: &mut impl StateStore) -> Result<Positions> {
        self.assign(id, SkaterPosition::Jammer, store)
    }

    pub fn set_pivot(&mut self, id: &str, store: &mut impl StateStore) -> Result<Positions> {
        self.assign(id, SkaterPosition::Pivot, store)
    }

    pub fn set_jammer_in_box(&mut self, in_box: bool, store: &mut impl StateStore) -> Result<()> {
        let id = self.jammer.clone().ok_or_else(|| self.not_found(""))?;
        self.set_skater_in_box(&id, in_box, store);
        Ok(())
    }

    pub fn set_pivot_in_box(&mut self, in_box: bool, store: &mut impl StateStore) -> Result<()> {
        let id = self.pivot.clone().ok_or_else(|| self.not_found(""))?;
        self.set_skater_in_box(&id, in_box, store);
        Ok(())
    }

    fn not_found(&self, id: &str) -> ScoreboardError {
        ScoreboardError::SkaterNotFound(self.id, id.to_string())
    }

    fn assign(
        &mut self,
        id: &str,
        position: SkaterPosition,
        store: &mut impl StateStore,
    ) -> Result<Positions> {
        if !self.skaters.contains_key(id) {
            return Err(self.not_found(id));
        }
        self.place_skater(id, position, store);
        Ok(self.update_positions(store))
    }

    /// Moves a skater, benching whoever held a unique position before
    fn place_skater(&mut self, id: &str, position: SkaterPosition, store: &mut impl StateStore) {
        if position.is_unique() {
            let displaced: Vec<String> = self
                .skaters
                .values()
                .filter(|s| s.position == position && s.id != id)
                .map(|s| s.id.clone())
                .collect();
            for other in displaced {
                self.move_skater(&other, SkaterPosition::Bench, store);
            }
        }
        self.move_skater(id, position, store);
    }

    fn move_skater(&mut self, id: &str, position: SkaterPosition, store: &mut impl StateStore) {
        if let Some(skater) = self.skaters.get_mut(id) {
            skater.position = position;
            store.update(
                &format!("{}.Position", self.skater_path(id)),
                position.as_str().into(),
            );
        }
    }

    pub fn delete_skater(&mut self, id: &str, store: &mut impl StateStore) -> Result<Positions> {
        if self.skaters.shift_remove(id).is_none() {
            return Err(self.not_found(id));
        }
        info!("Team {}: deleted skater {id}", self.id);
        store.delete(&self.skater_path(id));
        Ok(self.update_positions(store))
    }

    pub fn positions(&self) -> Positions {
        Positions {
            jammer: self.jammer.clone(),
            pivot: self.pivot.clone(),
        }
    }

    /// Recomputes the jammer and pivot from the roster and republishes them
    pub fn update_positions(&mut self, store: &mut impl StateStore) -> Positions {
        self.jammer = None;
        self.pivot = None;
        store.delete(&self.path("Jammer"));
        store.delete(&self.path("Pivot"));
        for skater in self.skaters.values() {
            let (slot, prefix) = match skater.position {
                SkaterPosition::Jammer => (&mut self.jammer, "Jammer"),
                SkaterPosition::Pivot => (&mut self.pivot, "Pivot"),
                SkaterPosition::Bench | SkaterPosition::Blocker => continue,
            };
            *slot = Some(skater.id.clone());
            publish_holder(&self.base, prefix, skater, store);
        }
        self.positions()
    }

    /// Puts the recorded jammer and pivot back, benching current holders
    pub fn reinstate_positions(
        &mut self,
        positions: &Positions,
        store: &mut impl StateStore,
    ) -> Positions {
        let holders: Vec<String> = self
            .skaters
            .values()
            .filter(|s| s.position.is_unique())
            .map(|s| s.id.clone())
            .collect();
        for id in holders {
            self.move_skater(&id, SkaterPosition::Bench, store);
        }
        for (recorded, position) in [
            (&positions.jammer, SkaterPosition::Jammer),
            (&positions.pivot, SkaterPosition::Pivot),
        ] {
            match recorded {
                Some(id) if self.skaters.contains_key(id) => self.move_skater(id, position, store),
                Some(id) => warn!(
                    "Team {}: can't reinstate {id} as {}, no longer on the roster",
                    self.id,
                    position.as_str()
                ),
                None => {}
            }
        }
        self.update_positions(store)
    }

    fn refresh_position_details(&self, id: &str, store: &mut impl StateStore) {
        let Some(skater) = self.skaters.get(id) else {
            return;
        };
        match skater.position {
            SkaterPosition::Jammer => publish_holder(&self.base, "Jammer", skater, store),
            SkaterPosition::Pivot => publish_holder(&self.base, "Pivot", skater, store),
            SkaterPosition::Bench | SkaterPosition::Blocker => {}
        }
    }
}

fn publish_holder(base: &str, prefix: &str, skater: &Skater, store: &mut impl StateStore) {
    store.update(&format!("{base}.{prefix}.ID"), skater.id.as_str().into());
    store.update(&format!("{base}.{prefix}.Name"), skater.name.as_str().into());
    store.update(&format!("{base}.{prefix}.Number"), skater.number.as_str().into());
    store.update(&format!("{base}.{prefix}.InBox"), skater.in_box.into());
}

fn default_color(id: TeamId) -> &'static str {
    match id {
        TeamId::One => "Black",
        TeamId::Two => "White",
    }
}
