use crate::{dispatch::Dispatcher, scoreboard::Scoreboard};
use derby_common::{
    envelope::{CommandEnvelope, StatePush},
    state_store::MemoryStore,
};
use indexmap::IndexMap;
use log::*;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task,
    time::{Duration, MissedTickBehavior, interval},
};

pub type SharedScoreboard = Arc<Mutex<Scoreboard<MemoryStore>>>;
pub type ScoreboardDispatcher = Dispatcher<Scoreboard<MemoryStore>>;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("The scoreboard lock was poisoned")]
    LockPoisoned,
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

/// Applies one line of client input and returns the changes it caused
pub fn handle_line(
    scoreboard: &mut Scoreboard<MemoryStore>,
    dispatcher: &ScoreboardDispatcher,
    line: &str,
) -> StatePush {
    match serde_json::from_str::<CommandEnvelope>(line) {
        Ok(envelope) => {
            match dispatcher.dispatch(scoreboard, &envelope) {
                Ok(outcome) if outcome.is_applied() => {
                    trace!("{} Applied {}", scoreboard.status_string(), envelope.action)
                }
                Ok(_) => {}
                Err(e) => warn!("{} {}: {e}", scoreboard.status_string(), envelope.action),
            }
        }
        Err(e) => warn!("Ignoring malformed command {line:?}: {e}"),
    }
    scoreboard.store_mut().drain_changes().into_iter().collect()
}

/// Every published value, for clients that join late
pub fn full_state(scoreboard: &mut Scoreboard<MemoryStore>) -> StatePush {
    scoreboard.store_mut().drain_changes();
    scoreboard
        .store()
        .iter()
        .map(|(path, value)| (path.clone(), Some(value.clone())))
        .collect()
}

/// Folds a captured stream of state pushes, one JSON object per line, into
/// the values that were current at the end of it
pub fn saved_state(text: &str) -> Result<Vec<(String, String)>, RunnerError> {
    let mut state = IndexMap::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let push: StatePush = serde_json::from_str(line)?;
        for (path, value) in push.state {
            match value {
                Some(value) => {
                    state.insert(path, value);
                }
                None => {
                    let nested = format!("{path}.");
                    state.retain(|p: &String, _| *p != path && !p.starts_with(&nested));
                }
            }
        }
    }
    Ok(state.into_iter().collect())
}

fn send(tx: &Option<UnboundedSender<StatePush>>, push: StatePush) {
    if let Some(tx) = tx {
        if !push.is_empty() && tx.send(push).is_err() {
            warn!("State push writer has stopped");
        }
    }
}

pub async fn tick_loop(
    scoreboard: SharedScoreboard,
    tick: Duration,
    tx: Option<UnboundedSender<StatePush>>,
) -> Result<(), RunnerError> {
    let mut interval = interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
    loop {
        interval.tick().await;
        let push: StatePush = {
            let mut sb = scoreboard.lock().map_err(|_| RunnerError::LockPoisoned)?;
            sb.tick();
            sb.store_mut().drain_changes().into_iter().collect()
        };
        send(&tx, push);
    }
}

pub async fn command_loop<R: AsyncBufRead + Unpin>(
    input: R,
    scoreboard: SharedScoreboard,
    dispatcher: Arc<ScoreboardDispatcher>,
    tx: Option<UnboundedSender<StatePush>>,
) -> Result<(), RunnerError> {
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let push = {
            let mut sb = scoreboard.lock().map_err(|_| RunnerError::LockPoisoned)?;
            handle_line(&mut sb, &dispatcher, line)
        };
        send(&tx, push);
    }
    info!("Command input closed");
    Ok(())
}

pub async fn push_loop<W: AsyncWrite + Unpin>(
    mut rx: UnboundedReceiver<StatePush>,
    mut output: W,
) -> Result<(), RunnerError> {
    while let Some(push) = rx.recv().await {
        let mut data = serde_json::to_vec(&push)?;
        data.push(b'\n');
        output.write_all(&data).await?;
        output.flush().await?;
    }
    Ok(())
}

/// Runs until the command input closes
pub async fn run(
    scoreboard: SharedScoreboard,
    dispatcher: ScoreboardDispatcher,
    tick: Duration,
    push_changes: bool,
    push_initial_state: bool,
) -> Result<(), RunnerError> {
    let (tx, writer) = if push_changes {
        let (tx, rx) = unbounded_channel();
        (Some(tx), Some(task::spawn(push_loop(rx, io::stdout()))))
    } else {
        (None, None)
    };

    if push_initial_state {
        let push = {
            let mut sb = scoreboard.lock().map_err(|_| RunnerError::LockPoisoned)?;
            full_state(&mut sb)
        };
        send(&tx, push);
    }

    let ticker = task::spawn(tick_loop(scoreboard.clone(), tick, tx.clone()));
    let input = io::BufReader::new(io::stdin());
    let result = command_loop(input, scoreboard, Arc::new(dispatcher), tx).await;

    ticker.abort();
    match ticker.await {
        Ok(Err(e)) => error!("Tick loop failed: {e}"),
        Ok(Ok(())) => {}
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!("Tick loop panicked: {e}"),
    }
    if let Some(writer) = writer {
        match writer.await {
            Ok(Err(e)) => error!("State push writer failed: {e}"),
            Ok(Ok(())) => {}
            Err(e) => error!("State push writer panicked: {e}"),
        }
    }
    result
}
