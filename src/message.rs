//! JSON messages exchanged with the browser agent.
//!
//! Requests go CLI → bridge → agent, events come back agent → bridge → every connected CLI.
//! Every message carries an `action` tag, except the bare `{"status": "submitted"}`
//! acknowledgement the agent sends once a submission went through.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One sample as downloaded by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePair {
    pub input: String,
    pub output: String,
}

/// Requests understood by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    /// Download every task (and its samples) of a contest.
    Gen { contest_id: String },
    /// Submit a source file.
    Submit {
        contest_id: String,
        task_screen_name: String,
        language_id: String,
        source_code: String,
    },
    /// Samples of the task currently opened in the browser.
    GetContext,
}

impl Request {
    /// Whether the CLI expects a stream of events back. Streamed requests are newline terminated
    /// on the wire, the others are sent as raw JSON.
    pub fn expects_stream(&self) -> bool {
        !matches!(self, Request::Submit { .. })
    }

    /// Whether `event` ends the exchange started by this request. Broadcasts meant for other
    /// clients (another CLI's submission acknowledgement, say) do not end it.
    pub fn is_final_reply(&self, event: &Event) -> bool {
        match self {
            Request::Gen { .. } => matches!(event, Event::GenResult(_) | Event::GenError(_)),
            Request::Submit { .. } => match event {
                Event::Submitted => true,
                Event::JudgeStatus(status) => status.is_done(),
                _ => false,
            },
            Request::GetContext => {
                matches!(event, Event::ContextResult(_) | Event::GenError(_))
            }
        }
    }
}

/// One task of a downloaded contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSamples {
    pub label: String,
    pub screen_name: String,
    #[serde(default)]
    pub samples: Vec<SamplePair>,
}

/// Payload of a `gen_result` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenResult {
    pub contest_id: String,
    #[serde(default)]
    pub tasks: Vec<TaskSamples>,
}

/// Nested `data` of a `judge_status` event. `score` and `time` are strings or numbers depending
/// on the page, so they are kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JudgeStatus {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub score: Value,
    #[serde(default)]
    pub time: Value,
}

impl JudgeStatus {
    pub const DONE: &'static str = "DONE";
    pub const JUDGING: &'static str = "JUDGING";

    pub fn is_done(&self) -> bool {
        self.state == Self::DONE
    }

    pub fn score_text(&self) -> String {
        display_value(&self.score)
    }

    pub fn time_text(&self) -> String {
        display_value(&self.time)
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum TaggedEvent {
    GenLog {
        #[serde(default)]
        message: String,
    },
    GenError {
        #[serde(default)]
        error: String,
    },
    GenResult(GenResult),
    JudgeStatus {
        #[serde(default)]
        data: JudgeStatus,
    },
    ContextResult {
        #[serde(default)]
        samples: Vec<SamplePair>,
    },
    #[serde(other)]
    Unknown,
}

/// Events a CLI may receive from the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    GenLog(String),
    GenError(String),
    GenResult(GenResult),
    JudgeStatus(JudgeStatus),
    ContextResult(Vec<SamplePair>),
    Submitted,
    /// Valid JSON with an action this client does not know about.
    Unknown(Value),
}

impl Event {
    /// Parse one line received from the bridge. `None` for anything that is not a JSON object.
    pub fn parse(line: &str) -> Option<Event> {
        let value: Value = serde_json::from_str(line).ok()?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Option<Event> {
        let object = value.as_object()?;
        if object.get("status").and_then(Value::as_str) == Some("submitted") {
            return Some(Event::Submitted);
        }
        if !object.contains_key("action") {
            return Some(Event::Unknown(value));
        }

        let event = match serde_json::from_value::<TaggedEvent>(value.clone()) {
            Ok(TaggedEvent::GenLog { message }) => Event::GenLog(message),
            Ok(TaggedEvent::GenError { error }) => Event::GenError(error),
            Ok(TaggedEvent::GenResult(result)) => Event::GenResult(result),
            Ok(TaggedEvent::JudgeStatus { data }) => Event::JudgeStatus(data),
            Ok(TaggedEvent::ContextResult { samples }) => Event::ContextResult(samples),
            Ok(TaggedEvent::Unknown) | Err(_) => Event::Unknown(value),
        };
        Some(event)
    }
}
