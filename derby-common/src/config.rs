use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and allowance rules for a bout. Clock lengths are in seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub period_duration: u32,
    pub jam_duration: u32,
    pub lineup_duration: u32,
    pub timeout_duration: u32,
    pub intermission_duration: u32,
    pub timeouts_per_team: u32,
    pub official_reviews_per_team: u32,
    pub tick_millis: u32,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            period_duration: 1800,
            jam_duration: 120,
            lineup_duration: 30,
            timeout_duration: 60,
            intermission_duration: 900,
            timeouts_per_team: 3,
            official_reviews_per_team: 1,
            tick_millis: 100,
        }
    }
}

impl Rules {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1).into())
    }

    pub fn tick_ms(&self) -> i64 {
        self.tick_millis.max(1).into()
    }

    pub fn period_ms(&self) -> i64 {
        secs_to_ms(self.period_duration)
    }

    pub fn jam_ms(&self) -> i64 {
        secs_to_ms(self.jam_duration)
    }

    pub fn lineup_ms(&self) -> i64 {
        secs_to_ms(self.lineup_duration)
    }

    pub fn timeout_ms(&self) -> i64 {
        secs_to_ms(self.timeout_duration)
    }

    pub fn intermission_ms(&self) -> i64 {
        secs_to_ms(self.intermission_duration)
    }
}

fn secs_to_ms(secs: u32) -> i64 {
    i64::from(secs) * 1000
}
