//! The typed key/value contract the scoreboard publishes to.
//!
//! Paths are dotted, with parenthesised indices for repeated entities, e.g.
//! `Scoreboard.Team(1).Skater(abc).Name`. Deleting a path removes everything
//! nested under it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    String,
    Bool,
    Int,
    Time,
}

impl ValueKind {
    /// Parses the textual form used by the command envelope
    pub fn parse(self, raw: &str) -> Option<StateValue> {
        match self {
            Self::String => Some(StateValue::String(raw.to_string())),
            Self::Bool => match raw.trim() {
                "true" => Some(StateValue::Bool(true)),
                "false" => Some(StateValue::Bool(false)),
                _ => None,
            },
            Self::Int => raw.trim().parse().ok().map(StateValue::Int),
            Self::Time => OffsetDateTime::parse(raw.trim(), &Rfc3339)
                .ok()
                .map(StateValue::Time),
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Bool => write!(f, "boolean"),
            Self::Int => write!(f, "integer"),
            Self::Time => write!(f, "time"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValue {
    String(String),
    Bool(bool),
    Int(i64),
    Time(OffsetDateTime),
}

impl StateValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Time(_) => ValueKind::Time,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<OffsetDateTime> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }
}

impl Display for StateValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Time(t) => match t.format(&Rfc3339) {
                Ok(s) => write!(f, "{s}"),
                Err(_) => write!(f, "{t}"),
            },
        }
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for StateValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<OffsetDateTime> for StateValue {
    fn from(v: OffsetDateTime) -> Self {
        Self::Time(v)
    }
}

/// Receives every value the scoreboard publishes
pub trait StateStore {
    fn update(&mut self, path: &str, value: StateValue);

    /// Removes `path` and everything nested under it
    fn delete(&mut self, path: &str);
}

/// A key path that may contain `(*)` placeholders, each matching one
/// parenthesised index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    pattern: String,
    literals: Vec<String>,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            literals: pattern.split("(*)").map(str::to_string).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn wildcards(&self) -> usize {
        self.literals.len() - 1
    }

    /// Returns the captured indices if `path` matches
    pub fn matches<'a>(&self, path: &'a str) -> Option<Vec<&'a str>> {
        let mut rest = path;
        let mut captures = Vec::with_capacity(self.wildcards());
        for (i, literal) in self.literals.iter().enumerate() {
            rest = rest.strip_prefix(literal.as_str())?;
            if i + 1 < self.literals.len() {
                rest = rest.strip_prefix('(')?;
                let end = rest.find(')')?;
                let index = &rest[..end];
                if index.is_empty() || index.contains('(') {
                    return None;
                }
                captures.push(index);
                rest = &rest[end + 1..];
            }
        }
        rest.is_empty().then_some(captures)
    }
}

impl Display for PathPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

fn is_nested_under(path: &str, parent: &str) -> bool {
    path == parent
        || path
            .strip_prefix(parent)
            .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('('))
}

/// An ordered in-memory store that also records which paths changed since the
/// last drain
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: IndexMap<String, StateValue>,
    changes: IndexMap<String, Option<StateValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, path: &str) -> Option<&StateValue> {
        self.values.get(path)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(StateValue::as_str)
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(StateValue::as_bool)
    }

    pub fn get_int(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(StateValue::as_int)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.values.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StateValue)> {
        self.values.iter()
    }

    /// Paths under `parent`, including `parent` itself
    pub fn paths_under<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .keys()
            .map(String::as_str)
            .filter(move |path| is_nested_under(path, parent))
    }

    /// Returns every change since the previous call, `None` meaning deleted
    pub fn drain_changes(&mut self) -> Vec<(String, Option<StateValue>)> {
        self.changes.drain(..).collect()
    }
}

impl StateStore for MemoryStore {
    fn update(&mut self, path: &str, value: StateValue) {
        if self.values.get(path) == Some(&value) {
            return;
        }
        self.changes.insert(path.to_string(), Some(value.clone()));
        self.values.insert(path.to_string(), value);
    }

    fn delete(&mut self, path: &str) {
        let doomed: Vec<String> = self.paths_under(path).map(str::to_string).collect();
        for p in doomed {
            self.values.shift_remove(&p);
            self.changes.insert(p, None);
        }
    }
}
