use crate::team_id::TeamId;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};

/// The phase of the bout the scoreboard is currently in
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Sequence, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    NotRunning,
    PreGame,
    Jam,
    Lineup,
    OfficialTimeout,
    TeamTimeout1,
    TeamTimeout2,
    OfficialReview1,
    OfficialReview2,
    Intermission,
    UnofficialFinal,
    Final,
}

impl GameState {
    /// The string published at `Scoreboard.State`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotRunning => "",
            Self::PreGame => "PreGame",
            Self::Jam => "Jam",
            Self::Lineup => "Lineup",
            Self::OfficialTimeout => "OTO",
            Self::TeamTimeout1 => "TTO1",
            Self::TeamTimeout2 => "TTO2",
            Self::OfficialReview1 => "OR1",
            Self::OfficialReview2 => "OR2",
            Self::Intermission => "Intermission",
            Self::UnofficialFinal => "UnofficialFinal",
            Self::Final => "Final",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        enum_iterator::all::<Self>().find(|state| state.as_str() == value)
    }

    pub fn is_timeout(self) -> bool {
        matches!(
            self,
            Self::OfficialTimeout
                | Self::TeamTimeout1
                | Self::TeamTimeout2
                | Self::OfficialReview1
                | Self::OfficialReview2
        )
    }

    pub fn team_timeout(team: TeamId) -> Self {
        match team {
            TeamId::One => Self::TeamTimeout1,
            TeamId::Two => Self::TeamTimeout2,
        }
    }

    pub fn official_review(team: TeamId) -> Self {
        match team {
            TeamId::One => Self::OfficialReview1,
            TeamId::Two => Self::OfficialReview2,
        }
    }

    /// Short fixed-width tag used in log lines
    pub fn tag(self) -> &'static str {
        match self {
            Self::NotRunning => "NOTRUNG",
            Self::PreGame => "PREGAME",
            Self::Jam => "JAM____",
            Self::Lineup => "LINEUP_",
            Self::OfficialTimeout => "OFFTMOT",
            Self::TeamTimeout1 => "TMTMOT1",
            Self::TeamTimeout2 => "TMTMOT2",
            Self::OfficialReview1 => "OFFREV1",
            Self::OfficialReview2 => "OFFREV2",
            Self::Intermission => "INTRMSN",
            Self::UnofficialFinal => "UNOFFNL",
            Self::Final => "FINAL__",
        }
    }
}

impl core::fmt::Display for GameState {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match *self {
            Self::NotRunning => write!(f, "Not Running"),
            Self::PreGame => write!(f, "Pre Game"),
            Self::Jam => write!(f, "Jam"),
            Self::Lineup => write!(f, "Lineup"),
            Self::OfficialTimeout => write!(f, "Official Timeout"),
            Self::TeamTimeout1 => write!(f, "Team 1 Timeout"),
            Self::TeamTimeout2 => write!(f, "Team 2 Timeout"),
            Self::OfficialReview1 => write!(f, "Team 1 Official Review"),
            Self::OfficialReview2 => write!(f, "Team 2 Official Review"),
            Self::Intermission => write!(f, "Intermission"),
            Self::UnofficialFinal => write!(f, "Unofficial Final"),
            Self::Final => write!(f, "Final"),
        }
    }
}
