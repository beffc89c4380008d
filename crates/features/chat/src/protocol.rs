//! Wire frames of the chat socket.
//!
//! Every frame is a JSON object tagged by `source`. Errors travel as
//! `{"source": "error", "error": {"type", "message"}}`.

use crate::error::ChatError;
use crate::repository::MessageRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// Who should receive a frame fanned out over the event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every open socket of one user.
    User(String),
    Everyone,
}

impl Recipient {
    #[must_use]
    pub fn reaches(&self, email: &str) -> bool {
        match self {
            Self::User(target) => target == email,
            Self::Everyone => true,
        }
    }
}

/// A frame travelling to other sockets.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub recipient: Recipient,
    pub frame: Value,
}

#[must_use]
pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

/// RFC 3339 with microseconds, UTC.
#[must_use]
pub fn iso(micros: i64) -> String {
    DateTime::from_timestamp_micros(micros)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[must_use]
pub fn frame(source: &str, data: Value) -> Value {
    json!({ "source": source, "data": data })
}

#[must_use]
pub fn error_frame(err: &ChatError) -> Value {
    json!({
        "source": "error",
        "error": { "type": err.error_type(), "message": err.client_message() },
    })
}

/// A message as announced on send and on pending delivery.
#[must_use]
pub fn message_view(message: &MessageRecord, delivered: bool) -> Value {
    let mut view = json!({
        "message_id": message.message_id,
        "room_id": message.room_id,
        "sender": message.sender,
        "receiver": message.receiver,
        "message": message.message,
        "timestamp": iso(message.timestamp),
        "delivered": delivered,
    });
    attach_file(&mut view, message);
    view
}

/// Id of the message a `message.send` frame carries to `email`, if it is addressed there.
#[must_use]
pub fn incoming_message_id<'a>(frame: &'a Value, email: &str) -> Option<&'a str> {
    if frame["source"] != "message.send" || frame["data"]["receiver"] != email {
        return None;
    }
    frame["data"]["message_id"].as_str()
}

/// A message as listed in room history.
#[must_use]
pub fn history_view(message: &MessageRecord) -> Value {
    let mut view = json!({
        "message_id": message.message_id,
        "room_id": message.room_id,
        "sender": message.sender,
        "receiver": message.receiver,
        "message": message.message,
        "timestamp": iso(message.timestamp),
        "is_read": message.is_read,
        "delivered": message.delivered,
        "edited": message.edited,
        "edited_at": message.edited_at.map(iso),
    });
    attach_file(&mut view, message);
    view
}

fn attach_file(view: &mut Value, message: &MessageRecord) {
    if let (Some(file), Some(object)) = (&message.file, view.as_object_mut()) {
        object.insert(
            "file".to_owned(),
            json!({ "filename": file.filename, "size": file.size, "content_type": file.content_type }),
        );
    }
}

/// The `data` object of a client frame (empty when absent).
#[must_use]
pub fn data_of(frame: &Value) -> Value {
    frame.get("data").filter(|d| d.is_object()).cloned().unwrap_or_else(|| Value::Object(Map::new()))
}

/// Deserializes the `data` object of a client frame.
///
/// # Errors
/// [`ChatError::Validation`] when a field has the wrong type.
pub fn payload<T: DeserializeOwned>(frame: &Value) -> Result<T, ChatError> {
    serde_json::from_value(data_of(frame))
        .map_err(|e| ChatError::validation(format!("Malformed data: {e}")))
}

/// Reads an integer that clients may send as a number or a numeric string.
///
/// # Errors
/// [`ChatError::Validation`] for anything else.
pub fn int_field(value: Option<&Value>, name: &str, default: i64) -> Result<i64, ChatError> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(default),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(_) => None,
    };
    parsed.ok_or_else(|| ChatError::validation(format!("{name} must be an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Attachment;

    fn record() -> MessageRecord {
        MessageRecord {
            message_id: "msg_1".into(),
            room_id: "room_1".into(),
            sender: "a@x.io".into(),
            receiver: "b@x.io".into(),
            message: "hi".into(),
            timestamp: 1_700_000_000_123_456,
            is_read: false,
            read_at: None,
            delivered: false,
            edited: false,
            edited_at: None,
            file: None,
        }
    }

    #[test]
    fn only_messages_to_the_reader_carry_an_incoming_id() {
        let send = frame("message.send", message_view(&record(), false));
        assert_eq!(incoming_message_id(&send, "b@x.io"), Some("msg_1"));
        assert_eq!(incoming_message_id(&send, "a@x.io"), None);
        assert_eq!(incoming_message_id(&frame("message.read", json!({"receiver": "b@x.io"})), "b@x.io"), None);
    }

    #[test]
    fn timestamps_render_with_microseconds() {
        assert_eq!(iso(1_700_000_000_123_456), "2023-11-14T22:13:20.123456Z");
    }

    #[test]
    fn error_frames_carry_type_and_message() {
        let err = ChatError::denied("Cannot send messages as another user");
        assert_eq!(
            error_frame(&err),
            json!({"source": "error", "error": {"type": "permission_denied", "message": "Cannot send messages as another user"}})
        );
    }

    #[test]
    fn file_metadata_never_includes_content() {
        let mut message = record();
        message.file = Some(Attachment {
            filename: "a.txt".into(),
            size: 5,
            content_type: "text/plain".into(),
            data: "aGVsbG8=".into(),
        });
        let view = message_view(&message, true);
        assert_eq!(view["file"], json!({"filename": "a.txt", "size": 5, "content_type": "text/plain"}));
        assert_eq!(view["delivered"], json!(true));
        assert!(history_view(&message)["file"].get("data").is_none());
    }

    #[test]
    fn history_view_exposes_edit_state() {
        let view = history_view(&record());
        assert_eq!(view["edited"], json!(false));
        assert_eq!(view["edited_at"], Value::Null);
        assert!(view.get("file").is_none());
    }

    #[test]
    fn integers_accept_numeric_strings() {
        assert_eq!(int_field(None, "page", 1).unwrap(), 1);
        assert_eq!(int_field(Some(&json!(3)), "page", 1).unwrap(), 3);
        assert_eq!(int_field(Some(&json!(" 4 ")), "page", 1).unwrap(), 4);
        assert!(int_field(Some(&json!("four")), "page", 1).is_err());
        assert!(int_field(Some(&json!(true)), "page", 1).is_err());
    }
}
