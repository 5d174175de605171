use crate::team_id::TeamId;
use core::ops::{Index, IndexMut};
use derivative::Derivative;
use serde::{Deserialize, Serialize};

/// One value per team, indexable by [`TeamId`]
#[derive(Derivative, Serialize, Deserialize)]
#[derivative(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamBundle<T> {
    pub one: T,
    pub two: T,
}

impl<T> TeamBundle<T> {
    pub fn from_fn(mut f: impl FnMut(TeamId) -> T) -> Self {
        Self {
            one: f(TeamId::One),
            two: f(TeamId::Two),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TeamId, &T)> {
        self.into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TeamId, &mut T)> {
        [(TeamId::One, &mut self.one), (TeamId::Two, &mut self.two)].into_iter()
    }

    pub fn map<U>(&self, mut f: impl FnMut(TeamId, &T) -> U) -> TeamBundle<U> {
        TeamBundle {
            one: f(TeamId::One, &self.one),
            two: f(TeamId::Two, &self.two),
        }
    }
}

impl<T> Index<TeamId> for TeamBundle<T> {
    type Output = T;

    fn index(&self, team: TeamId) -> &Self::Output {
        match team {
            TeamId::One => &self.one,
            TeamId::Two => &self.two,
        }
    }
}

impl<T> IndexMut<TeamId> for TeamBundle<T> {
    fn index_mut(&mut self, team: TeamId) -> &mut Self::Output {
        match team {
            TeamId::One => &mut self.one,
            TeamId::Two => &mut self.two,
        }
    }
}

impl<'a, T> IntoIterator for &'a TeamBundle<T> {
    type Item = (TeamId, &'a T);
    type IntoIter = std::array::IntoIter<Self::Item, 2>;

    fn into_iter(self) -> Self::IntoIter {
        [(TeamId::One, &self.one), (TeamId::Two, &self.two)].into_iter()
    }
}
