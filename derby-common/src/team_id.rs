use derivative::Derivative;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};

#[derive(Derivative, Serialize, Deserialize, Sequence, Hash)]
#[derivative(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum TeamId {
    #[derivative(Default)]
    One,
    Two,
}

impl TeamId {
    /// The 1-based number used in published paths, e.g. `Team(1)`
    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }

    pub fn parse(index: &str) -> Option<Self> {
        index.trim().parse().ok().and_then(Self::from_number)
    }
}

impl core::fmt::Display for TeamId {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.number())
    }
}
