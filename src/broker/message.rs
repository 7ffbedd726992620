use serde::{Deserialize, Serialize};
use std::fmt;

/// What a message asks its owning worker to do.
///
/// The wire form is a plain string. Both the short names (`Create`, `Sub`,
/// `Unsub`, `Pub`) and the long names are accepted, case-insensitively.
/// Anything else survives decoding as `Unknown` so the worker can log and
/// drop it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    CreateTopic,
    Subscribe,
    Unsubscribe,
    Publish,
    Unknown(String),
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "create" | "createtopic" => Action::CreateTopic,
            "sub" | "subscribe" => Action::Subscribe,
            "unsub" | "unsubscribe" => Action::Unsubscribe,
            "pub" | "publish" => Action::Publish,
            _ => Action::Unknown(value.to_string()),
        }
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        Action::from(value.as_str())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateTopic => f.write_str("CreateTopic"),
            Action::Subscribe => f.write_str("Subscribe"),
            Action::Unsubscribe => f.write_str("Unsubscribe"),
            Action::Publish => f.write_str("Publish"),
            Action::Unknown(name) => f.write_str(name),
        }
    }
}

/// Processing status of a message. Only the owning worker mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Status {
    #[default]
    Pending,
    Success,
    Failed,
    Invalid,
}

/// A decoded ingress record, as handed over by the transport layer.
///
/// `sender` and `body` are optional on the wire and default to empty.
/// The older field names `act` and `queue` are accepted too.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct IngressRecord {
    #[serde(alias = "act")]
    pub action: String,
    #[serde(alias = "queue")]
    pub topic: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub body: String,
}

impl IngressRecord {
    pub fn new(action: &str, topic: &str, sender: &str, body: &str) -> Self {
        Self {
            action: action.to_string(),
            topic: topic.to_string(),
            sender: sender.to_string(),
            body: body.to_string(),
        }
    }
}

/// The unit of work travelling from ingress through a partition worker.
///
/// This is also the JSON document POSTed to a subscriber on delivery.
///
/// # Fields
///
/// - `id` - Assigned at ingress; used for tracing, not deduplication.
/// - `sender` - For Subscribe/Unsubscribe, the callback address being added or removed.
/// - `body` - Opaque payload, meaningful only for Publish.
/// - `retry_count` - Incremented once per failed delivery attempt.
/// - `timestamp` - Milliseconds since the Unix epoch at ingress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: u64,
    pub action: Action,
    pub topic: String,
    pub sender: String,
    pub body: String,
    pub status: Status,
    pub retry_count: u32,
    pub timestamp: i64,
}

impl Message {
    pub fn new(id: u64, action: Action, topic: &str, sender: &str, body: &str) -> Self {
        Self {
            id,
            action,
            topic: topic.to_string(),
            sender: sender.to_string(),
            body: body.to_string(),
            status: Status::Pending,
            retry_count: 0,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn from_record(id: u64, record: IngressRecord) -> Self {
        Self {
            id,
            action: Action::from(record.action),
            topic: record.topic,
            sender: record.sender,
            body: record.body,
            status: Status::Pending,
            retry_count: 0,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
