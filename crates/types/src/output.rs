//! Results produced by one program run and by the roll service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as Json};

use crate::value::Value;

/// Everything a successful run produced, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub messages: Vec<Message>,
    pub rolls: Vec<RollRecord>,
    pub templates: Vec<TemplateRecord>,
    /// Interleaved display log; hidden rolls are omitted.
    pub raw: Vec<RawEntry>,
    pub executed: DateTime<Utc>,
    /// Wall-clock run time in milliseconds.
    pub execution_time: u64,
    pub version: String,
}

impl Output {
    pub fn new(executed: DateTime<Utc>) -> Self {
        Self {
            messages: Vec::new(),
            rolls: Vec::new(),
            templates: Vec::new(),
            raw: Vec::new(),
            executed,
            execution_time: 0,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn push_message(&mut self, message: Message) {
        self.raw.push(RawEntry::Message(message.clone()));
        self.messages.push(message);
    }

    pub fn push_roll(&mut self, roll: RollRecord) {
        if !roll.is_hidden {
            self.raw.push(RawEntry::Roll(roll.clone()));
        }
        self.rolls.push(roll);
    }

    pub fn push_template(&mut self, template: TemplateRecord) {
        self.raw.push(RawEntry::Template(template.clone()));
        self.templates.push(template);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum RawEntry {
    Message(Message),
    Roll(RollRecord),
    Template(TemplateRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub from: Option<String>,
    pub to: Option<String>,
    pub message: String,
    #[serde(default)]
    pub is_test: bool,
    pub timestamp: DateTime<Utc>,
}

/// A submitted roll with its attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollRecord {
    pub command: String,
    pub value: Value,
    /// Service payload, relayed verbatim.
    pub roll: Json,
    /// Token the roll was made on behalf of.
    #[serde(rename = "as")]
    pub as_token: Option<String>,
    /// Token the roll was whispered to.
    pub to: Option<String>,
    /// Run-as identity at the time of the roll.
    pub token: Option<String>,
    #[serde(default)]
    pub is_test: bool,
    #[serde(default)]
    pub is_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub name: String,
    pub attributes: Map<String, Json>,
}

/// Response of the dice-resolution service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollResult {
    pub value: Value,
    pub roll: Json,
}

impl RollResult {
    pub fn new(value: impl Into<Value>, roll: Json) -> Self {
        Self {
            value: value.into(),
            roll,
        }
    }
}

impl<'de> Deserialize<'de> for RollResult {
    /// Accepts `{value, roll}` as well as `{roll: {value, ...}}`.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wire {
            #[serde(default)]
            value: Option<Json>,
            #[serde(default)]
            roll: Json,
        }

        let wire = Wire::deserialize(deserializer)?;
        let native = wire
            .value
            .or_else(|| wire.roll.get("value").cloned())
            .ok_or_else(|| serde::de::Error::missing_field("value"))?;
        let value = match &native {
            Json::Number(number) => match number.as_i64() {
                Some(integer) => Value::Number(integer),
                None => Value::from_f64(number.as_f64().unwrap_or_default()),
            },
            Json::String(text) => text
                .trim()
                .parse::<f64>()
                .map(Value::from_f64)
                .map_err(|_| serde::de::Error::custom(format!("roll value '{text}' is not numeric")))?,
            other => return Err(serde::de::Error::custom(format!("roll value {other} is not numeric"))),
        };
        Ok(Self { value, roll: wire.roll })
    }
}
