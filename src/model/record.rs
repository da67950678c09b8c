use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One element of a board collection. The engine moves records around
/// without interpreting them; the only field it ever reads is `id`,
/// which identifies the record across replicas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Value);

impl Record {
    /// The record's replica-wide id, when it carries one. Records
    /// without a string `id` are passed through merges un-keyed.
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Record(value)
    }
}
