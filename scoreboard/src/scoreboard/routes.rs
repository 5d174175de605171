//! The command names and key paths the scoreboard answers to

use super::{
    Outcome, Result, Scoreboard, ScoreboardError,
    clock::ClockName,
    team::{Lead, SkaterPosition},
};
use crate::dispatch::Dispatcher;
use derby_common::{game_state::GameState, state_store::StateStore, team_id::TeamId};
use enum_iterator::all;

pub const BASE: &str = "Scoreboard";

fn team(index: &str) -> Result<TeamId> {
    TeamId::parse(index).ok_or_else(|| ScoreboardError::UnknownTeam(index.to_string()))
}

fn clock(name: &str) -> Result<ClockName> {
    ClockName::parse(name).ok_or_else(|| ScoreboardError::UnknownClock(name.to_string()))
}

fn capture<'a>(caps: &[&'a str], i: usize) -> &'a str {
    caps.get(i).copied().unwrap_or_default()
}

fn invalid(path: &str, value: impl ToString) -> ScoreboardError {
    ScoreboardError::InvalidValue {
        path: path.to_string(),
        value: value.to_string(),
    }
}

/// Builds a dispatcher with every scoreboard command and updater registered
pub fn dispatcher<S: StateStore + 'static>() -> Dispatcher<Scoreboard<S>> {
    let mut d = Dispatcher::new();
    register_commands(&mut d);
    register_team_commands(&mut d);
    register_updaters(&mut d);
    register_team_updaters(&mut d);
    register_snapshot_updaters(&mut d);
    d
}

fn register_commands<S: StateStore + 'static>(d: &mut Dispatcher<Scoreboard<S>>) {
    d.on_command(&format!("{BASE}.StartJam"), |sb, _| Ok(sb.start_jam()))
        .on_command(&format!("{BASE}.StopJam"), |sb, _| Ok(sb.stop_jam()))
        .on_command(&format!("{BASE}.Timeout"), |sb, data| {
            Ok(match data.first() {
                Some(requested) => sb.timeout_requested(requested),
                None => sb.timeout(None),
            })
        })
        .on_command(&format!("{BASE}.EndTimeout"), |sb, _| Ok(sb.end_timeout()))
        .on_command(&format!("{BASE}.Undo"), |sb, _| Ok(sb.undo()))
        .on_command(&format!("{BASE}.Reset"), |sb, _| {
            sb.reset();
            Ok(Outcome::Applied)
        });
}

fn register_team_commands<S: StateStore + 'static>(d: &mut Dispatcher<Scoreboard<S>>) {
    for id in all::<TeamId>() {
        let base = format!("{BASE}.Team({id})");
        d.on_command(&format!("{base}.Score.Inc"), move |sb, _| {
            Ok(sb.with_team(id, |t, store| t.inc_score(store)).into())
        })
        .on_command(&format!("{base}.Score.Dec"), move |sb, _| {
            Ok(sb.with_team(id, |t, store| t.dec_score(store)).into())
        })
        .on_command(&format!("{base}.LastScore.Inc"), move |sb, _| {
            Ok(sb.with_team(id, |t, store| t.inc_last_score(store)).into())
        })
        .on_command(&format!("{base}.LastScore.Dec"), move |sb, _| {
            Ok(sb.with_team(id, |t, store| t.dec_last_score(store)).into())
        })
        .on_command(&format!("{base}.Timeouts.Start"), move |sb, _| {
            Ok(sb.team_timeout(id))
        })
        .on_command(&format!("{base}.OfficialReviews.Start"), move |sb, _| {
            Ok(sb.official_review(id))
        })
        .on_command(&format!("{base}.OfficialReviews.Retained"), move |sb, _| {
            Ok(sb.retain_official_review(id))
        });

        let delete = format!("{base}.DeleteSkater");
        let name = delete.clone();
        d.on_command(&delete, move |sb, data| {
            let skater = data
                .first()
                .ok_or_else(|| ScoreboardError::MissingArgument(name.clone()))?;
            sb.delete_skater(id, skater)?;
            Ok(Outcome::Applied)
        });
    }
}

fn register_updaters<S: StateStore + 'static>(d: &mut Dispatcher<Scoreboard<S>>) {
    d.on_string(&format!("{BASE}.State"), 0, |sb, _, v| {
        let state = GameState::parse(v).ok_or_else(|| invalid("Scoreboard.State", v))?;
        sb.set_state(state);
        Ok(())
    })
    .on_int(&format!("{BASE}.Clock(*).Time"), 0, |sb, caps, v| {
        sb.set_clock_time(clock(capture(caps, 0))?, v);
        Ok(())
    });
}

fn register_team_updaters<S: StateStore + 'static>(d: &mut Dispatcher<Scoreboard<S>>) {
    let base = format!("{BASE}.Team(*)");
    d.on_string(&format!("{base}.Name"), 0, |sb, caps, v| {
        sb.with_team(team(capture(caps, 0))?, |t, store| t.set_name(v, store));
        Ok(())
    })
    .on_string(&format!("{base}.Color"), 0, |sb, caps, v| {
        sb.with_team(team(capture(caps, 0))?, |t, store| t.set_color(v, store));
        Ok(())
    })
    .on_int(&format!("{base}.Score"), 0, |sb, caps, v| {
        sb.with_team(team(capture(caps, 0))?, |t, store| t.set_score(v, store));
        Ok(())
    })
    .on_int(&format!("{base}.LastScore"), 0, |sb, caps, v| {
        sb.with_team(team(capture(caps, 0))?, |t, store| {
            t.set_last_score(v, store)
        });
        Ok(())
    })
    .on_int(&format!("{base}.Timeouts"), 0, |sb, caps, v| {
        sb.with_team(team(capture(caps, 0))?, |t, store| t.set_timeouts(v, store));
        Ok(())
    })
    .on_int(&format!("{base}.OfficialReviews"), 0, |sb, caps, v| {
        sb.with_team(team(capture(caps, 0))?, |t, store| {
            t.set_official_reviews(v, store)
        });
        Ok(())
    })
    .on_bool(&format!("{base}.OfficialReviewRetained"), 0, |sb, caps, v| {
        sb.with_team(team(capture(caps, 0))?, |t, store| {
            t.set_official_review_retained(v, store)
        });
        Ok(())
    })
    .on_string(&format!("{base}.Lead"), 0, |sb, caps, v| {
        let lead = Lead::parse(v).ok_or_else(|| invalid("Lead", v))?;
        sb.with_team(team(capture(caps, 0))?, |t, store| t.set_lead(lead, store));
        Ok(())
    })
    .on_bool(&format!("{base}.StarPass"), 0, |sb, caps, v| {
        sb.with_team(team(capture(caps, 0))?, |t, store| t.set_star_pass(v, store));
        Ok(())
    })
    .on_string(&format!("{base}.Jammer.ID"), 1, |sb, caps, v| {
        sb.set_jammer(team(capture(caps, 0))?, v)
    })
    .on_string(&format!("{base}.Pivot.ID"), 1, |sb, caps, v| {
        sb.set_pivot(team(capture(caps, 0))?, v)
    })
    .on_bool(&format!("{base}.Jammer.InBox"), 1, |sb, caps, v| {
        sb.with_team(team(capture(caps, 0))?, |t, store| {
            t.set_jammer_in_box(v, store)
        })
    })
    .on_bool(&format!("{base}.Pivot.InBox"), 1, |sb, caps, v| {
        sb.with_team(team(capture(caps, 0))?, |t, store| t.set_pivot_in_box(v, store))
    })
    .on_string(&format!("{base}.Skater(*).Name"), 0, |sb, caps, v| {
        let skater = capture(caps, 1);
        sb.with_team(team(capture(caps, 0))?, |t, store| {
            t.set_skater_name(skater, v, store)
        });
        Ok(())
    })
    .on_string(&format!("{base}.Skater(*).Number"), 0, |sb, caps, v| {
        let skater = capture(caps, 1);
        sb.with_team(team(capture(caps, 0))?, |t, store| {
            t.set_skater_number(skater, v, store)
        });
        Ok(())
    })
    .on_bool(&format!("{base}.Skater(*).InBox"), 0, |sb, caps, v| {
        let skater = capture(caps, 1);
        sb.with_team(team(capture(caps, 0))?, |t, store| {
            t.set_skater_in_box(skater, v, store)
        });
        Ok(())
    })
    .on_string(&format!("{base}.Skater(*).Position"), 0, |sb, caps, v| {
        let position = SkaterPosition::parse(v).ok_or_else(|| invalid("Position", v))?;
        sb.set_skater_position(team(capture(caps, 0))?, capture(caps, 1), position);
        Ok(())
    });
}

fn register_snapshot_updaters<S: StateStore + 'static>(d: &mut Dispatcher<Scoreboard<S>>) {
    let base = format!("{BASE}.Snapshot(*)");
    d.on_string(&format!("{base}.State"), 0, |sb, caps, v| {
        let state = GameState::parse(v).ok_or_else(|| invalid("Snapshot.State", v))?;
        sb.update_snapshot(capture(caps, 0), |ss| ss.state = state)
    })
    .on_bool(&format!("{base}.InProgress"), 0, |sb, caps, v| {
        sb.update_snapshot(capture(caps, 0), |ss| ss.in_progress = v)
    })
    .on_bool(&format!("{base}.CanRevert"), 0, |sb, caps, v| {
        sb.update_snapshot(capture(caps, 0), |ss| ss.can_revert = v)
    })
    .on_int(&format!("{base}.StartTicks"), 0, |sb, caps, v| {
        sb.update_snapshot(capture(caps, 0), |ss| ss.start_ticks = v)
    })
    .on_int(&format!("{base}.EndTicks"), 0, |sb, caps, v| {
        sb.update_snapshot(capture(caps, 0), |ss| ss.end_ticks = v)
    })
    .on_int(&format!("{base}.Length"), 0, |sb, caps, v| {
        sb.update_snapshot(capture(caps, 0), |ss| ss.end_ticks = ss.start_ticks + v)
    })
    .on_time(&format!("{base}.StartTime"), 0, |sb, caps, v| {
        sb.update_snapshot(capture(caps, 0), |ss| ss.start_time = v)
    })
    .on_time(&format!("{base}.EndTime"), 0, |sb, caps, v| {
        sb.update_snapshot(capture(caps, 0), |ss| ss.end_time = Some(v))
    })
    .on_int(&format!("{base}.Clock(*).Number"), 0, |sb, caps, v| {
        let name = clock(capture(caps, 1))?;
        sb.update_snapshot(capture(caps, 0), |ss| {
            ss.clocks.entry(name).or_default().number = v
        })
    })
    .on_int(&format!("{base}.Clock(*).StartTime"), 0, |sb, caps, v| {
        let name = clock(capture(caps, 1))?;
        sb.update_snapshot(capture(caps, 0), |ss| {
            ss.clocks.entry(name).or_default().start_time = v
        })
    })
    .on_int(&format!("{base}.Clock(*).EndTime"), 0, |sb, caps, v| {
        let name = clock(capture(caps, 1))?;
        sb.update_snapshot(capture(caps, 0), |ss| {
            ss.clocks.entry(name).or_default().end_time = v
        })
    })
    .on_bool(&format!("{base}.Clock(*).Running"), 0, |sb, caps, v| {
        let name = clock(capture(caps, 1))?;
        sb.update_snapshot(capture(caps, 0), |ss| {
            ss.clocks.entry(name).or_default().running = v
        })
    })
    .on_int(&format!("{base}.Team(*).Timeouts"), 0, |sb, caps, v| {
        let id = team(capture(caps, 1))?;
        sb.update_snapshot(capture(caps, 0), |ss| ss.teams[id].timeouts = v)
    })
    .on_int(&format!("{base}.Team(*).OfficialReviews"), 0, |sb, caps, v| {
        let id = team(capture(caps, 1))?;
        sb.update_snapshot(capture(caps, 0), |ss| ss.teams[id].official_reviews = v)
    })
    .on_bool(
        &format!("{base}.Team(*).OfficialReviewRetained"),
        0,
        |sb, caps, v| {
            let id = team(capture(caps, 1))?;
            sb.update_snapshot(capture(caps, 0), |ss| {
                ss.teams[id].official_review_retained = v
            })
        },
    );
}
