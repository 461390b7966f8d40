//! Opt-in state details in a record's JSON representation.

use crate::state::{HistoryModel, State, StateMachine, Stateable};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Which computed maps to add. Nothing is added by default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializeOptions {
    /// Add `state`: the current state name.
    pub include_state: bool,
    /// Add `transitions`: `{event: can_attempt}` for every event.
    pub include_transitions: bool,
    /// Add `state_history`: the record's transition rows, oldest first.
    pub include_history: bool,
}

impl SerializeOptions {
    pub fn all() -> Self {
        Self {
            include_state: true,
            include_transitions: true,
            include_history: true,
        }
    }

    fn any(&self) -> bool {
        self.include_state || self.include_transitions || self.include_history
    }
}

/// Serialize `record` and add the opted-in state details.
///
/// `history` is only read when `include_history` is set; without a model
/// the history list is empty.
///
/// # Errors
///
/// Fails if the record does not serialize, or serializes to something other
/// than a JSON object while details were requested.
pub fn to_json<R>(
    record: &R,
    machine: &StateMachine<R>,
    history: Option<&HistoryModel>,
    options: SerializeOptions,
) -> Result<JsonValue, serde_json::Error>
where
    R: Stateable + Serialize,
{
    let value = serde_json::to_value(record)?;
    if !options.any() {
        return Ok(value);
    }
    let JsonValue::Object(mut object) = value else {
        return Err(serde::ser::Error::custom(
            "state details can only be added to records serialized as objects",
        ));
    };

    if options.include_state {
        object.insert(
            "state".to_string(),
            JsonValue::String(record.current_state().name().to_string()),
        );
    }

    if options.include_transitions {
        let transitions: Map<String, JsonValue> = machine
            .events()
            .into_iter()
            .map(|event| {
                (
                    event.to_string(),
                    JsonValue::Bool(machine.can_attempt(record, event)),
                )
            })
            .collect();
        object.insert("transitions".to_string(), JsonValue::Object(transitions));
    }

    if options.include_history {
        let rows = history
            .map(|model| model.history_for(record.owner_type(), &record.owner_id()))
            .unwrap_or_default();
        object.insert(
            "state_history".to_string(),
            serde_json::to_value(rows.transitions())?,
        );
    }

    Ok(JsonValue::Object(object))
}
