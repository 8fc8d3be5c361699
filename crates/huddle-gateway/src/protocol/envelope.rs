//! Frame envelope
//!
//! `{ "type": u16, "seq": string?, "data": payload }` in both directions.
//! The payload of an incoming frame stays an untyped [`Value`] until the
//! type has been validated.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{EventType, ProtocolError};

/// Frame received from a client
#[derive(Debug, Deserialize)]
pub struct IncomingFrame {
    #[serde(rename = "type")]
    pub kind: u16,

    #[serde(default, deserialize_with = "deserialize_seq")]
    pub seq: Option<String>,

    #[serde(default)]
    pub data: Value,
}

impl IncomingFrame {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }
}

/// Frame written to a client
#[derive(Debug, Serialize)]
pub struct OutgoingFrame<'a, T: Serialize> {
    #[serde(rename = "type")]
    pub kind: EventType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<&'a str>,

    pub data: &'a T,
}

/// Encode one frame. Broadcasts encode once and share the text.
pub fn encode<T: Serialize>(
    kind: EventType,
    seq: Option<&str>,
    data: &T,
) -> Result<String, ProtocolError> {
    serde_json::to_string(&OutgoingFrame { kind, seq, data }).map_err(ProtocolError::Encode)
}

// Clients pick their own correlation tokens; numbers are accepted too
fn deserialize_seq<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        other => {
            return Err(serde::de::Error::custom(format!(
                "sequence token must be a string, got {other}"
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_frame() {
        let frame = IncomingFrame::parse(r#"{"type":31,"seq":"a1","data":{"username":"x"}}"#).unwrap();
        assert_eq!(frame.kind, 31);
        assert_eq!(frame.seq.as_deref(), Some("a1"));
        assert_eq!(frame.data["username"], "x");
    }

    #[test]
    fn test_parse_numeric_seq_and_missing_data() {
        let frame = IncomingFrame::parse(r#"{"type":33,"seq":7}"#).unwrap();
        assert_eq!(frame.seq.as_deref(), Some("7"));
        assert!(frame.data.is_null());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            IncomingFrame::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(IncomingFrame::parse(r#"{"seq":"1"}"#).is_err());
        assert!(IncomingFrame::parse(r#"{"type":3,"seq":{}}"#).is_err());
    }

    #[test]
    fn test_encode_omits_missing_seq() {
        let text = encode(EventType::UserPresence, None, &json!({"user": "4"})).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": 29, "data": {"user": "4"}}));

        let text = encode(EventType::TokenResponse, Some("q"), &json!({"token": "t"})).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["seq"], "q");
        assert_eq!(value["type"], 32);
    }
}
