pub mod bundles;

pub mod config;

pub mod envelope;

pub mod game_state;

pub mod state_store;

pub mod team_id;
