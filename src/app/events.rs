//! Outbound state events.
//!
//! Every state change the bridge announces on the bus is a two-element
//! JSON array `[behavior_name, state]`.  Consumers ignore names they do
//! not recognise.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Behavior name for the buzzer alarm.
pub const ALARM: &str = "alarm";
/// Behavior name for the talk button's mute state.
pub const MUTE: &str = "mute";

/// `[behavior_name, state]` record as carried on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorRecord(pub String, pub Value);

impl BehaviorRecord {
    pub fn new(name: &str, state: impl Serialize) -> Result<Self> {
        Ok(Self(name.to_owned(), serde_json::to_value(state)?))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn state(&self) -> &Value {
        &self.1
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a payload.  Anything other than a two-element array whose
    /// first element is a string is rejected.
    pub fn decode(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}
