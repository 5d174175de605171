use crate::scoreboard::Scoreboard;
use derby_common::{bundles::TeamBundle, state_store::StateStore, team_id::TeamId};
use serde::{Deserialize, Serialize};
use derby_common::config::Rules;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDefaults {
    pub name: String,
    pub color: String,
}

impl TeamDefaults {
    fn for_team(id: TeamId) -> Self {
        Self {
            name: format!("Team {id}"),
            color: match id {
                TeamId::One => "Black",
                TeamId::Two => "White",
            }
            .to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Write state changes to stdout
    pub push_changes: bool,
    /// Start by writing every published value, not just changes
    pub push_initial_state: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            push_changes: true,
            push_initial_state: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rules: Rules,
    pub teams: TeamBundle<TeamDefaults>,
    pub output: Output,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules: Default::default(),
            teams: TeamBundle::from_fn(TeamDefaults::for_team),
            output: Default::default(),
        }
    }
}

impl Config {
    /// A scoreboard using these rules, with the configured team names and
    /// colours as the teams' defaults
    pub fn build_scoreboard<S: StateStore>(&self, store: S) -> Scoreboard<S> {
        let mut scoreboard = Scoreboard::new(self.rules.clone(), store);
        for (id, team) in &self.teams {
            scoreboard.set_team_defaults(id, &team.name, &team.color);
        }
        scoreboard
    }
}
