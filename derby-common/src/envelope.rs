//! JSON shapes exchanged with display and control clients

use crate::state_store::StateValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Action name that applies raw field updates instead of running a command
pub const SET_ACTION: &str = "Set";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandEnvelope {
    pub action: String,
    pub data: Vec<String>,
    pub field: String,
    pub field_data: IndexMap<String, String>,
}

impl CommandEnvelope {
    pub fn is_set(&self) -> bool {
        self.action == SET_ACTION
    }

    /// The raw `(path, value)` pairs carried by a `Set` envelope
    pub fn updates(&self) -> Vec<(&str, &str)> {
        let mut updates = Vec::with_capacity(self.field_data.len() + 1);
        if !self.field.is_empty() {
            if let Some(value) = self.data.first() {
                updates.push((self.field.as_str(), value.as_str()));
            }
        }
        updates.extend(
            self.field_data
                .iter()
                .map(|(path, value)| (path.as_str(), value.as_str())),
        );
        updates
    }
}

/// Pushed to subscribers; a `None` value means the path was deleted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePush {
    pub state: IndexMap<String, Option<String>>,
}

impl StatePush {
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl FromIterator<(String, Option<StateValue>)> for StatePush {
    fn from_iter<I: IntoIterator<Item = (String, Option<StateValue>)>>(iter: I) -> Self {
        Self {
            state: iter
                .into_iter()
                .map(|(path, value)| (path, value.map(|v| v.to_string())))
                .collect(),
        }
    }
}
