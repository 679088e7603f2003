//! Typed inbound RTM events.
//!
//! The wire format is a loosely-shaped JSON object; everything the bot
//! consumes is validated here, once, at the transport boundary. A chat event
//! with a missing or wrongly-typed field becomes a recoverable
//! [`EventError::Malformed`] instead of a crash further in.

use std::fmt;

/// Kind of conversation a chat message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// A two-party private conversation with the bot.
    Direct,
    /// A group/broadcast channel.
    Broadcast,
}

/// A validated inbound chat message. Ephemeral; nothing here is persisted.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub kind: ChannelKind,
    /// Sender user id.
    pub uid: String,
    /// Conversation channel id.
    pub vchannel_id: String,
    pub text: String,
    /// Key of a quoted prior message, when the sender replied to one.
    pub refer_key: Option<String>,
    /// Creation timestamp as sent on the wire (epoch-based, floating point).
    pub created_ts: f64,
}

/// One decoded websocket frame.
#[derive(Debug)]
pub enum RtmEvent {
    Message(InboundMessage),
    Pong,
    /// Presence updates, send acks, and other non-chat events.
    Ignored,
}

#[derive(Debug)]
pub enum EventError {
    /// Frame was not valid JSON.
    Json(serde_json::Error),
    /// Chat event missing a required field (or the field had the wrong type).
    Malformed { field: &'static str },
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "event is not valid JSON: {e}"),
            Self::Malformed { field } => write!(f, "chat event missing field '{field}'"),
        }
    }
}

impl std::error::Error for EventError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::Malformed { .. } => None,
        }
    }
}

impl RtmEvent {
    /// Decode one text frame from the websocket.
    pub fn parse(frame: &str) -> Result<Self, EventError> {
        let value: serde_json::Value = serde_json::from_str(frame).map_err(EventError::Json)?;

        let kind = match value.get("type").and_then(|t| t.as_str()) {
            Some("message") => ChannelKind::Direct,
            Some("channel_message") => ChannelKind::Broadcast,
            Some("pong") => return Ok(RtmEvent::Pong),
            // reply acks, presence changes, typing indicators, ...
            Some(_) => return Ok(RtmEvent::Ignored),
            None => return Err(EventError::Malformed { field: "type" }),
        };

        let str_field = |field: &'static str| -> Result<String, EventError> {
            value
                .get(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or(EventError::Malformed { field })
        };

        let uid = str_field("uid")?;
        let vchannel_id = str_field("vchannel_id")?;
        let text = str_field("text")?;
        let created_ts = value
            .get("created_ts")
            .and_then(|v| v.as_f64())
            .ok_or(EventError::Malformed { field: "created_ts" })?;
        let refer_key = value
            .get("refer_key")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(RtmEvent::Message(InboundMessage {
            kind,
            uid,
            vchannel_id,
            text,
            refer_key,
            created_ts,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direct_message() {
        let frame = r#"{
            "type": "message",
            "uid": "=bwQQQ",
            "vchannel_id": "=bwV11",
            "text": "todo buy milk",
            "refer_key": null,
            "created_ts": 1500000000.123
        }"#;
        let event = RtmEvent::parse(frame).unwrap();
        let msg = match event {
            RtmEvent::Message(m) => m,
            other => panic!("expected Message, got {other:?}"),
        };
        assert_eq!(msg.kind, ChannelKind::Direct);
        assert_eq!(msg.uid, "=bwQQQ");
        assert_eq!(msg.vchannel_id, "=bwV11");
        assert_eq!(msg.text, "todo buy milk");
        assert!(msg.refer_key.is_none());
        assert_eq!(msg.created_ts, 1500000000.123);
    }

    #[test]
    fn test_parse_channel_message_with_refer() {
        let frame = r#"{
            "type": "channel_message",
            "uid": "=bwQQQ",
            "vchannel_id": "=bwC22",
            "text": "todo",
            "refer_key": "k-123",
            "created_ts": 1500000001
        }"#;
        let event = RtmEvent::parse(frame).unwrap();
        match event {
            RtmEvent::Message(m) => {
                assert_eq!(m.kind, ChannelKind::Broadcast);
                assert_eq!(m.refer_key.as_deref(), Some("k-123"));
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn test_pong_frame() {
        let event = RtmEvent::parse(r#"{"type": "pong", "call_id": 7}"#).unwrap();
        assert!(matches!(event, RtmEvent::Pong));
    }

    #[test]
    fn test_non_chat_events_ignored() {
        for frame in [
            r#"{"type": "reply", "call_id": 3}"#,
            r#"{"type": "update_user_online_status", "uid": "=bwQQQ"}"#,
        ] {
            let event = RtmEvent::parse(frame).unwrap();
            assert!(matches!(event, RtmEvent::Ignored), "frame: {frame}");
        }
    }

    #[test]
    fn test_missing_uid_is_recoverable_error() {
        let frame = r#"{
            "type": "message",
            "vchannel_id": "=bwV11",
            "text": "hi",
            "created_ts": 1500000000
        }"#;
        let err = RtmEvent::parse(frame).unwrap_err();
        assert!(matches!(err, EventError::Malformed { field: "uid" }));
    }

    #[test]
    fn test_wrong_typed_text_is_recoverable_error() {
        let frame = r#"{
            "type": "message",
            "uid": "=bwQQQ",
            "vchannel_id": "=bwV11",
            "text": 42,
            "created_ts": 1500000000
        }"#;
        let err = RtmEvent::parse(frame).unwrap_err();
        assert!(matches!(err, EventError::Malformed { field: "text" }));
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(RtmEvent::parse("not json"), Err(EventError::Json(_))));
    }
}
