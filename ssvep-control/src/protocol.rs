use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use ssvep_core::{DisplayError, SsvepCommand};
use ssvep_engine::EngineContext;
use std::collections::BTreeMap;

// ═══════════════════════════════════════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Queue one SSVEP run
    #[serde(rename = "StartSSVEP")]
    StartSsvep(SsvepCommand),

    /// Replace the profile overlay; values may be any JSON scalar
    SetUserProfile {
        #[serde(default)]
        profile: BTreeMap<String, serde_json::Value>,
    },

    /// Read-only snapshot, answered without touching the task queue
    CheckoutDisplayStatus,

    SetPrompt {
        prompt: String,
    },
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::StartSsvep(_) => "StartSSVEP",
            Request::SetUserProfile { .. } => "SetUserProfile",
            Request::CheckoutDisplayStatus => "CheckoutDisplayStatus",
            Request::SetPrompt { .. } => "SetPrompt",
        }
    }
}

/// Flattens profile values to the text shown on screen
pub fn profile_strings(profile: BTreeMap<String, serde_json::Value>) -> BTreeMap<String, String> {
    profile
        .into_iter()
        .map(|(k, v)| {
            let text = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, text)
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// Responses
// ═══════════════════════════════════════════════════════════════════════════

pub const ACK: &str = "OK";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Status(StatusSnapshot),
    Error { error: String, suggestion: String },
    Ack(String),
}

impl Response {
    pub fn ok() -> Self {
        Response::Ack(ACK.to_string())
    }

    pub fn error(e: &DisplayError) -> Self {
        Response::Error {
            error: e.to_string(),
            suggestion: e.suggestion().to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ack(s) if s == ACK)
    }
}

/// Seconds, or `"N/A"` on the wire when there is nothing to report
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Seconds(f64),
    NotAvailable,
}

impl Reading {
    pub const NOT_AVAILABLE: &'static str = "N/A";

    pub fn seconds(&self) -> Option<f64> {
        match self {
            Reading::Seconds(s) => Some(*s),
            Reading::NotAvailable => None,
        }
    }
}

impl From<Option<f64>> for Reading {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Reading::NotAvailable, Reading::Seconds)
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reading::Seconds(s) => serializer.serialize_f64(*s),
            Reading::NotAvailable => serializer.serialize_str(Self::NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Reading {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(s) => Ok(Reading::Seconds(s)),
            Raw::Text(t) if t == Self::NOT_AVAILABLE => Ok(Reading::NotAvailable),
            Raw::Text(t) => Err(de::Error::custom(format!(
                "expected seconds or \"{}\", got \"{t}\"",
                Self::NOT_AVAILABLE
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub tasks_in_buffer: usize,
    pub passed: Reading,
    pub total: Reading,
    pub current_task: String,
    /// Oldest finished run, one event per line; empty when none is waiting
    pub event_buffer: String,
}

impl StatusSnapshot {
    /// Reads shared state. Pops the oldest finished run from the event history.
    pub fn capture(ctx: &EngineContext) -> Self {
        let status = ctx.current_status();
        let event_buffer = ctx
            .pop_completed_events()
            .map(|events| {
                events
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        Self {
            tasks_in_buffer: ctx.tasks.len(),
            passed: Reading::Seconds(status.elapsed),
            total: status.total.into(),
            current_task: status.state.as_wire().to_string(),
            event_buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ssvep_core::TimeSeriesSource;

    #[test]
    fn test_start_request_decodes() {
        let line = r#"{"type":"StartSSVEP","resolution_x":800,"resolution_y":600,"repeats":2,
            "cue":"!Random","patch_layout_text":"0,A,1,1,1,1,1,0","time_series":"alpha",
            "head_length":1,"body_length":2,"tail_length":1}"#;
        match serde_json::from_str::<Request>(line).unwrap() {
            Request::StartSsvep(cmd) => {
                assert_eq!(cmd.repeats, Some(2));
                assert_eq!(cmd.time_series, Some(TimeSeriesSource::Table("alpha".into())));
                assert_eq!(cmd.patch_shape, None);
            }
            other => panic!("decoded as {}", other.kind()),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"type":"Reboot"}"#).is_err());
        assert!(serde_json::from_str::<Request>(r#"{"prompt":"x"}"#).is_err());
        assert!(serde_json::from_str::<Request>("not json").is_err());
    }

    #[test]
    fn test_profile_values_flatten_to_text() {
        let req: Request = serde_json::from_value(json!({
            "type": "SetUserProfile",
            "profile": {"name": "Ada", "age": 36, "left_handed": false}
        }))
        .unwrap();
        let Request::SetUserProfile { profile } = req else {
            panic!("wrong variant");
        };
        let flat = profile_strings(profile);
        assert_eq!(flat["name"], "Ada");
        assert_eq!(flat["age"], "36");
        assert_eq!(flat["left_handed"], "false");
    }

    #[test]
    fn test_response_wire_forms() {
        assert_eq!(serde_json::to_string(&Response::ok()).unwrap(), r#""OK""#);

        let err = Response::error(&DisplayError::missing_field("repeats"));
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["error"], "command error: missing required field `repeats`");
        assert!(v["suggestion"].is_string());

        let status = Response::Status(StatusSnapshot {
            tasks_in_buffer: 0,
            passed: Reading::Seconds(1.5),
            total: Reading::NotAvailable,
            current_task: "IDLE".into(),
            event_buffer: String::new(),
        });
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v["tasksInBuffer"], 0);
        assert_eq!(v["passed"], 1.5);
        assert_eq!(v["total"], "N/A");
        assert_eq!(v["currentTask"], "IDLE");

        let back: Response = serde_json::from_value(v).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn test_idle_snapshot() {
        let ctx = EngineContext::default();
        let snap = StatusSnapshot::capture(&ctx);
        assert_eq!(snap.current_task, "IDLE");
        assert_eq!(snap.total, Reading::NotAvailable);
        assert_eq!(snap.tasks_in_buffer, 0);
        assert!(snap.event_buffer.is_empty());
    }
}
