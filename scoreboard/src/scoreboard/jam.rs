use super::team::Team;
use derby_common::{bundles::TeamBundle, state_store::StateStore, team_id::TeamId};

/// Which skaters hold the jammer and pivot positions for one team
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Positions {
    pub jammer: Option<String>,
    pub pivot: Option<String>,
}

/// The positions each team fielded during one jam
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Jam {
    number: usize,
    positions: TeamBundle<Positions>,
}

impl Jam {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            positions: Default::default(),
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn positions(&self) -> &TeamBundle<Positions> {
        &self.positions
    }

    fn base_path(&self) -> String {
        format!("Scoreboard.Jam({})", self.number)
    }

    /// Copies the current positions of both teams
    pub fn update(&mut self, teams: &TeamBundle<Team>, store: &mut impl StateStore) {
        for (id, team) in teams {
            self.positions[id] = team.positions();
        }
        self.publish(store);
    }

    pub fn set_team_positions(
        &mut self,
        team: TeamId,
        positions: Positions,
        store: &mut impl StateStore,
    ) {
        self.positions[team] = positions;
        self.publish(store);
    }

    /// Puts the recorded jammers and pivots back on the teams
    pub fn reinstate(&mut self, teams: &mut TeamBundle<Team>, store: &mut impl StateStore) {
        for (id, team) in teams.iter_mut() {
            let restored = team.reinstate_positions(&self.positions[id], store);
            self.positions[id] = restored;
        }
        self.publish(store);
    }

    pub fn publish(&self, store: &mut impl StateStore) {
        let base = self.base_path();
        for (id, positions) in &self.positions {
            for (field, holder) in [("Jammer", &positions.jammer), ("Pivot", &positions.pivot)] {
                let path = format!("{base}.Team({id}).{field}");
                match holder {
                    Some(skater) => store.update(&path, skater.as_str().into()),
                    None => store.delete(&path),
                }
            }
        }
    }

    pub fn delete(&self, store: &mut impl StateStore) {
        store.delete(&self.base_path());
    }
}
