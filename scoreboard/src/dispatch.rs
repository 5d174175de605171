//! Routes commands and key-path updates to handlers.
//!
//! Commands are looked up by exact name. Updaters are registered against a
//! path pattern where each `(*)` captures one parenthesised index; exact paths
//! win over patterns. Every updater has a priority, and bulk loads apply lower
//! priorities first so dependent values see their prerequisites.

use crate::scoreboard::{Outcome, Result, ScoreboardError};
use derby_common::{
    envelope::CommandEnvelope,
    state_store::{PathPattern, StateValue, ValueKind},
};
use indexmap::IndexMap;
use log::*;
use time::OffsetDateTime;

type CommandHandler<T> = Box<dyn Fn(&mut T, &[String]) -> Result<Outcome> + Send + Sync>;
type UpdateHandler<T> = Box<dyn Fn(&mut T, &[&str], StateValue) -> Result<()> + Send + Sync>;

struct Updater<T> {
    pattern: PathPattern,
    kind: ValueKind,
    priority: u8,
    handler: UpdateHandler<T>,
}

pub struct Dispatcher<T> {
    commands: IndexMap<String, CommandHandler<T>>,
    exact: IndexMap<String, Updater<T>>,
    patterns: Vec<Updater<T>>,
}

impl<T> Default for Dispatcher<T> {
    fn default() -> Self {
        Self {
            commands: IndexMap::new(),
            exact: IndexMap::new(),
            patterns: vec![],
        }
    }
}

impl<T> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("exact", &self.exact.keys().collect::<Vec<_>>())
            .field(
                "patterns",
                &self.patterns.iter().map(|u| u.pattern.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<T> Dispatcher<T> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn on_command(
        &mut self,
        name: &str,
        handler: impl Fn(&mut T, &[String]) -> Result<Outcome> + Send + Sync + 'static,
    ) -> &mut Self {
        if self
            .commands
            .insert(name.to_string(), Box::new(handler))
            .is_some()
        {
            warn!("Replaced handler for command {name}");
        }
        self
    }

    pub fn on_update(
        &mut self,
        pattern: &str,
        kind: ValueKind,
        priority: u8,
        handler: impl Fn(&mut T, &[&str], StateValue) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        let updater = Updater {
            pattern: PathPattern::new(pattern),
            kind,
            priority,
            handler: Box::new(handler),
        };
        if updater.pattern.wildcards() == 0 {
            self.exact.insert(pattern.to_string(), updater);
        } else {
            self.patterns.push(updater);
        }
        self
    }

    pub fn on_string(
        &mut self,
        pattern: &str,
        priority: u8,
        handler: impl Fn(&mut T, &[&str], &str) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        let path = pattern.to_string();
        self.on_update(pattern, ValueKind::String, priority, move |t, caps, v| {
            match v.as_str() {
                Some(s) => handler(t, caps, s),
                None => Err(wrong_kind(&path, ValueKind::String, &v)),
            }
        })
    }

    pub fn on_bool(
        &mut self,
        pattern: &str,
        priority: u8,
        handler: impl Fn(&mut T, &[&str], bool) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        let path = pattern.to_string();
        self.on_update(pattern, ValueKind::Bool, priority, move |t, caps, v| {
            match v.as_bool() {
                Some(b) => handler(t, caps, b),
                None => Err(wrong_kind(&path, ValueKind::Bool, &v)),
            }
        })
    }

    pub fn on_int(
        &mut self,
        pattern: &str,
        priority: u8,
        handler: impl Fn(&mut T, &[&str], i64) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        let path = pattern.to_string();
        self.on_update(pattern, ValueKind::Int, priority, move |t, caps, v| {
            match v.as_int() {
                Some(i) => handler(t, caps, i),
                None => Err(wrong_kind(&path, ValueKind::Int, &v)),
            }
        })
    }

    pub fn on_time(
        &mut self,
        pattern: &str,
        priority: u8,
        handler: impl Fn(&mut T, &[&str], OffsetDateTime) -> Result<()> + Send + Sync + 'static,
    ) -> &mut Self {
        let path = pattern.to_string();
        self.on_update(pattern, ValueKind::Time, priority, move |t, caps, v| {
            match v.as_time() {
                Some(time) => handler(t, caps, time),
                None => Err(wrong_kind(&path, ValueKind::Time, &v)),
            }
        })
    }

    /// Runs a command. Ignored transitions are logged, not treated as errors.
    pub fn command(&self, target: &mut T, name: &str, data: &[String]) -> Result<Outcome> {
        let handler = self
            .commands
            .get(name)
            .ok_or_else(|| ScoreboardError::UnknownCommand(name.to_string()))?;
        let outcome = handler(target, data)?;
        if let Outcome::Ignored(reason) = outcome {
            debug!("Command {name} ignored: {reason}");
        }
        Ok(outcome)
    }

    fn find<'p>(&self, path: &'p str) -> Option<(&Updater<T>, Vec<&'p str>)> {
        if let Some(updater) = self.exact.get(path) {
            return Some((updater, vec![]));
        }
        self.patterns
            .iter()
            .find_map(|u| u.pattern.matches(path).map(|caps| (u, caps)))
    }

    /// The priority of the updater handling `path`, if any
    pub fn priority(&self, path: &str) -> Option<u8> {
        self.find(path).map(|(u, _)| u.priority)
    }

    pub fn update(&self, target: &mut T, path: &str, value: StateValue) -> Result<()> {
        let (updater, caps) = self
            .find(path)
            .ok_or_else(|| ScoreboardError::NoUpdater(path.to_string()))?;
        if value.kind() != updater.kind {
            return Err(wrong_kind(path, updater.kind, &value));
        }
        (updater.handler)(target, &caps, value)
    }

    /// Applies a textual value, parsed according to the updater's kind
    pub fn update_raw(&self, target: &mut T, path: &str, raw: &str) -> Result<()> {
        let (updater, caps) = self
            .find(path)
            .ok_or_else(|| ScoreboardError::NoUpdater(path.to_string()))?;
        let value = updater
            .kind
            .parse(raw)
            .ok_or_else(|| ScoreboardError::InvalidValue {
                path: path.to_string(),
                value: raw.to_string(),
            })?;
        (updater.handler)(target, &caps, value)
    }

    /// Applies a batch of values, lowest priority first. Values keep their
    /// relative order within a priority. Returns every failure.
    pub fn load(
        &self,
        target: &mut T,
        values: impl IntoIterator<Item = (String, StateValue)>,
    ) -> Vec<ScoreboardError> {
        let mut errors = vec![];
        let mut ordered = vec![];
        for (path, value) in values {
            match self.priority(&path) {
                Some(priority) => ordered.push((priority, path, value)),
                None => errors.push(ScoreboardError::NoUpdater(path)),
            }
        }
        ordered.sort_by_key(|(priority, _, _)| *priority);

        for (_, path, value) in ordered {
            if let Err(e) = self.update(target, &path, value) {
                warn!("Failed to load {path}: {e}");
                errors.push(e);
            }
        }
        errors
    }

    /// Like `load`, for textual values such as a saved state push. Each value
    /// is parsed by its updater's kind. Paths that are only ever published,
    /// with no updater, are skipped.
    pub fn load_raw(
        &self,
        target: &mut T,
        values: impl IntoIterator<Item = (String, String)>,
    ) -> Vec<ScoreboardError> {
        let mut errors = vec![];
        let mut parsed = vec![];
        for (path, raw) in values {
            let Some(kind) = self.find(&path).map(|(u, _)| u.kind) else {
                trace!("Not loading {path}, it has no updater");
                continue;
            };
            match kind.parse(&raw) {
                Some(value) => parsed.push((path, value)),
                None => errors.push(ScoreboardError::InvalidValue { path, value: raw }),
            }
        }
        errors.extend(self.load(target, parsed));
        errors
    }

    /// Runs an envelope from a client. `Set` envelopes carry raw updates,
    /// anything else names a command. For updates every value is tried and the
    /// first failure is returned.
    pub fn dispatch(&self, target: &mut T, envelope: &CommandEnvelope) -> Result<Outcome> {
        if !envelope.is_set() {
            return self.command(target, &envelope.action, &envelope.data);
        }

        let mut updates = envelope.updates();
        updates.sort_by_key(|(path, _)| self.priority(path).unwrap_or_default());
        let mut first_error = None;
        for (path, raw) in updates {
            if let Err(e) = self.update_raw(target, path, raw) {
                warn!("Failed to set {path}: {e}");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(Outcome::Applied),
        }
    }
}

fn wrong_kind(path: &str, expected: ValueKind, found: &StateValue) -> ScoreboardError {
    ScoreboardError::WrongValueKind {
        path: path.to_string(),
        expected,
        found: found.kind(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scoreboard::Ignored;

    #[derive(Debug, Default)]
    struct Recorder {
        log: Vec<String>,
    }

    fn dispatcher() -> Dispatcher<Recorder> {
        let mut d: Dispatcher<Recorder> = Dispatcher::new();
        d.on_command("Ping", |r, data| {
            r.log.push(format!("ping {}", data.join(",")));
            Ok(Outcome::Applied)
        })
        .on_command("Nope", |_, _| Ok(Outcome::Ignored(Ignored::NothingToUndo)))
        .on_string("Thing.Team(*).Name", 0, |r, caps, v| {
            r.log.push(format!("name {} {v}", caps[0]));
            Ok(())
        })
        .on_string("Thing.Team(*).Jammer.ID", 1, |r, caps, v| {
            r.log.push(format!("jammer {} {v}", caps[0]));
            Ok(())
        })
        .on_int("Thing.Snapshot(*).Clock(*).Number", 0, |r, caps, v| {
            r.log.push(format!("number {} {} {v}", caps[0], caps[1]));
            Ok(())
        })
        .on_bool("Thing.Team(2).Name", 0, |r, _, v| {
            r.log.push(format!("exact {v}"));
            Ok(())
        });
        d
    }

    #[test]
    fn test_commands() {
        let d = dispatcher();
        let mut r = Recorder::default();
        assert_eq!(
            d.command(&mut r, "Ping", &["a".to_string(), "b".to_string()]),
            Ok(Outcome::Applied)
        );
        assert_eq!(
            d.command(&mut r, "Nope", &[]),
            Ok(Outcome::Ignored(Ignored::NothingToUndo))
        );
        assert_eq!(
            d.command(&mut r, "Pong", &[]),
            Err(ScoreboardError::UnknownCommand("Pong".to_string()))
        );
        assert_eq!(r.log, vec!["ping a,b"]);
    }

    #[test]
    fn test_pattern_captures() {
        let d = dispatcher();
        let mut r = Recorder::default();
        d.update(&mut r, "Thing.Snapshot(4).Clock(Jam).Number", StateValue::Int(2))
            .unwrap();
        d.update(&mut r, "Thing.Team(1).Name", "Rollers".into()).unwrap();
        // The exact path shadows the pattern
        d.update(&mut r, "Thing.Team(2).Name", true.into()).unwrap();
        assert_eq!(r.log, vec!["number 4 Jam 2", "name 1 Rollers", "exact true"]);

        assert_eq!(
            d.update(&mut r, "Thing.Team(1).Color", "Red".into()),
            Err(ScoreboardError::NoUpdater("Thing.Team(1).Color".to_string()))
        );
        assert_eq!(
            d.update(&mut r, "Thing.Team(1).Name", StateValue::Int(1)),
            Err(ScoreboardError::WrongValueKind {
                path: "Thing.Team(1).Name".to_string(),
                expected: ValueKind::String,
                found: ValueKind::Int,
            })
        );
    }

    #[test]
    fn test_update_raw() {
        let d = dispatcher();
        let mut r = Recorder::default();
        d.update_raw(&mut r, "Thing.Snapshot(0).Clock(Period).Number", "7")
            .unwrap();
        assert_eq!(
            d.update_raw(&mut r, "Thing.Snapshot(0).Clock(Period).Number", "seven"),
            Err(ScoreboardError::InvalidValue {
                path: "Thing.Snapshot(0).Clock(Period).Number".to_string(),
                value: "seven".to_string(),
            })
        );
        assert_eq!(r.log, vec!["number 0 Period 7"]);
    }

    #[test]
    fn test_load_orders_by_priority() {
        let d = dispatcher();
        let mut r = Recorder::default();
        let errors = d.load(
            &mut r,
            vec![
                ("Thing.Team(1).Jammer.ID".to_string(), "a".into()),
                ("Thing.Unknown".to_string(), "x".into()),
                ("Thing.Team(1).Name".to_string(), "One".into()),
                ("Thing.Team(3).Jammer.ID".to_string(), "b".into()),
                ("Thing.Team(3).Name".to_string(), "Three".into()),
            ],
        );
        assert_eq!(
            r.log,
            vec!["name 1 One", "name 3 Three", "jammer 1 a", "jammer 3 b"]
        );
        assert_eq!(
            errors,
            vec![ScoreboardError::NoUpdater("Thing.Unknown".to_string())]
        );
    }

    #[test]
    fn test_load_raw_parses_by_kind() {
        let d = dispatcher();
        let mut r = Recorder::default();
        let errors = d.load_raw(
            &mut r,
            vec![
                ("Thing.Team(1).Jammer.ID".to_string(), "a".to_string()),
                ("Thing.Published".to_string(), "x".to_string()),
                ("Thing.Snapshot(0).Clock(Jam).Number".to_string(), "3".to_string()),
                ("Thing.Team(2).Name".to_string(), "maybe".to_string()),
            ],
        );
        assert_eq!(r.log, vec!["number 0 Jam 3", "jammer 1 a"]);
        assert_eq!(
            errors,
            vec![ScoreboardError::InvalidValue {
                path: "Thing.Team(2).Name".to_string(),
                value: "maybe".to_string(),
            }]
        );
    }

    #[test]
    fn test_dispatch_envelope() {
        let d = dispatcher();
        let mut r = Recorder::default();
        let command: CommandEnvelope =
            serde_json::from_str(r#"{"action":"Ping","data":["x"]}"#).unwrap();
        assert_eq!(d.dispatch(&mut r, &command), Ok(Outcome::Applied));

        let set: CommandEnvelope = serde_json::from_str(
            r#"{"action":"Set","field":"Thing.Team(1).Jammer.ID","data":["j"],
                "fieldData":{"Thing.Team(1).Name":"One","Thing.Nope":"1"}}"#,
        )
        .unwrap();
        assert_eq!(
            d.dispatch(&mut r, &set),
            Err(ScoreboardError::NoUpdater("Thing.Nope".to_string()))
        );
        assert_eq!(r.log, vec!["ping x", "name 1 One", "jammer 1 j"]);
    }
}
