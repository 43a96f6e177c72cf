//! Relay wire messages.
//!
//! Every frame is a JSON array whose first element names the verb:
//!
//! ```text
//! client -> relay   ["EVENT", <event>]
//!                   ["REQ", <sub id>, <filter>, ...]
//!                   ["CLOSE", <sub id>]
//!
//! relay -> client   ["EVENT", <sub id>, <event>]
//!                   ["OK", <event id>, <accepted>, <message>]
//!                   ["EOSE", <sub id>]
//!                   ["CLOSED", <sub id>, <message>]
//!                   ["NOTICE", <message>]
//! ```
//!
//! Positional arrays do not map onto serde's derive model, so both
//! directions go through `serde_json::Value` by hand.

use serde_json::{json, Value};

use super::connection::RelayError;
use super::filter::Filter;
use crate::event::SignedEvent;

// ---------------------------------------------------------------------------
// Client -> relay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Publish an event.
    Event(SignedEvent),
    /// Open (or replace) a subscription.
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },
    /// Close a subscription.
    Close(String),
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, RelayError> {
        let value = match self {
            Self::Event(event) => json!(["EVENT", event]),
            Self::Req {
                subscription_id,
                filters,
            } => {
                let mut frame = vec![json!("REQ"), json!(subscription_id)];
                for filter in filters {
                    frame.push(serde_json::to_value(filter).map_err(protocol)?);
                }
                Value::Array(frame)
            }
            Self::Close(id) => json!(["CLOSE", id]),
        };
        serde_json::to_string(&value).map_err(protocol)
    }

    pub fn from_json(text: &str) -> Result<Self, RelayError> {
        let frame = parse_frame(text)?;
        match verb(&frame)? {
            "EVENT" => Ok(Self::Event(field(&frame, 1)?)),
            "REQ" => {
                let subscription_id: String = field(&frame, 1)?;
                let filters = frame[2..]
                    .iter()
                    .map(|v| serde_json::from_value(v.clone()).map_err(protocol))
                    .collect::<Result<Vec<Filter>, _>>()?;
                Ok(Self::Req {
                    subscription_id,
                    filters,
                })
            }
            "CLOSE" => Ok(Self::Close(field(&frame, 1)?)),
            other => Err(RelayError::Protocol(format!("unknown client verb '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Relay -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    Event {
        subscription_id: String,
        event: SignedEvent,
    },
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },
    Eose(String),
    Closed {
        subscription_id: String,
        message: String,
    },
    Notice(String),
}

impl RelayMessage {
    pub fn to_json(&self) -> Result<String, RelayError> {
        let value = match self {
            Self::Event {
                subscription_id,
                event,
            } => json!(["EVENT", subscription_id, event]),
            Self::Ok {
                event_id,
                accepted,
                message,
            } => json!(["OK", event_id, accepted, message]),
            Self::Eose(id) => json!(["EOSE", id]),
            Self::Closed {
                subscription_id,
                message,
            } => json!(["CLOSED", subscription_id, message]),
            Self::Notice(message) => json!(["NOTICE", message]),
        };
        serde_json::to_string(&value).map_err(protocol)
    }

    pub fn from_json(text: &str) -> Result<Self, RelayError> {
        let frame = parse_frame(text)?;
        match verb(&frame)? {
            "EVENT" => Ok(Self::Event {
                subscription_id: field(&frame, 1)?,
                event: field(&frame, 2)?,
            }),
            "OK" => Ok(Self::Ok {
                event_id: field(&frame, 1)?,
                accepted: field(&frame, 2)?,
                // Some relays omit the message on success.
                message: optional_field(&frame, 3)?.unwrap_or_default(),
            }),
            "EOSE" => Ok(Self::Eose(field(&frame, 1)?)),
            "CLOSED" => Ok(Self::Closed {
                subscription_id: field(&frame, 1)?,
                message: optional_field(&frame, 2)?.unwrap_or_default(),
            }),
            "NOTICE" => Ok(Self::Notice(field(&frame, 1)?)),
            other => Err(RelayError::Protocol(format!("unknown relay verb '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame helpers
// ---------------------------------------------------------------------------

fn protocol(e: serde_json::Error) -> RelayError {
    RelayError::Protocol(e.to_string())
}

fn parse_frame(text: &str) -> Result<Vec<Value>, RelayError> {
    match serde_json::from_str(text).map_err(protocol)? {
        Value::Array(items) if !items.is_empty() => Ok(items),
        _ => Err(RelayError::Protocol("frame is not a non-empty array".into())),
    }
}

fn verb(frame: &[Value]) -> Result<&str, RelayError> {
    frame[0]
        .as_str()
        .ok_or_else(|| RelayError::Protocol("frame verb is not a string".into()))
}

fn field<T: serde::de::DeserializeOwned>(frame: &[Value], index: usize) -> Result<T, RelayError> {
    optional_field(frame, index)?
        .ok_or_else(|| RelayError::Protocol(format!("frame is missing element {index}")))
}

fn optional_field<T: serde::de::DeserializeOwned>(
    frame: &[Value],
    index: usize,
) -> Result<Option<T>, RelayError> {
    frame
        .get(index)
        .map(|v| serde_json::from_value(v.clone()).map_err(protocol))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use crate::event::EventBuilder;

    fn event() -> SignedEvent {
        EventBuilder::new(1)
            .content("hi")
            .created_at(1)
            .sign(&Keypair::generate())
            .unwrap()
    }

    #[test]
    fn client_frames_have_expected_shape() {
        let ev = event();
        let json: Value =
            serde_json::from_str(&ClientMessage::Event(ev.clone()).to_json().unwrap()).unwrap();
        assert_eq!(json[0], "EVENT");
        assert_eq!(json[1]["id"], ev.id());

        let req = ClientMessage::Req {
            subscription_id: "abc".into(),
            filters: vec![Filter::new().kind(4).limit(10)],
        };
        assert_eq!(
            req.to_json().unwrap(),
            r#"["REQ","abc",{"kinds":[4],"limit":10}]"#
        );
        assert_eq!(ClientMessage::from_json(&req.to_json().unwrap()).unwrap(), req);

        assert_eq!(
            ClientMessage::Close("abc".into()).to_json().unwrap(),
            r#"["CLOSE","abc"]"#
        );
    }

    #[test]
    fn parses_relay_frames() {
        let ev = event();
        let frame = format!(r#"["EVENT","sub1",{}]"#, ev.to_json().unwrap());
        assert_eq!(
            RelayMessage::from_json(&frame).unwrap(),
            RelayMessage::Event {
                subscription_id: "sub1".into(),
                event: ev,
            }
        );

        assert_eq!(
            RelayMessage::from_json(r#"["OK","abcd",false,"blocked: spam"]"#).unwrap(),
            RelayMessage::Ok {
                event_id: "abcd".into(),
                accepted: false,
                message: "blocked: spam".into(),
            }
        );
        assert_eq!(
            RelayMessage::from_json(r#"["OK","abcd",true]"#).unwrap(),
            RelayMessage::Ok {
                event_id: "abcd".into(),
                accepted: true,
                message: String::new(),
            }
        );
        assert_eq!(
            RelayMessage::from_json(r#"["EOSE","sub1"]"#).unwrap(),
            RelayMessage::Eose("sub1".into())
        );
        assert_eq!(
            RelayMessage::from_json(r#"["NOTICE","slow down"]"#).unwrap(),
            RelayMessage::Notice("slow down".into())
        );
    }

    #[test]
    fn relay_frames_serialize_back() {
        let closed = RelayMessage::Closed {
            subscription_id: "s".into(),
            message: "error: shutting down".into(),
        };
        assert_eq!(RelayMessage::from_json(&closed.to_json().unwrap()).unwrap(), closed);
    }

    #[test]
    fn malformed_frames_are_protocol_errors() {
        for bad in [
            "",
            "{}",
            "[]",
            "[1]",
            r#"["PING"]"#,
            r#"["EOSE"]"#,
            r#"["OK","id","yes"]"#,
            r#"["EVENT","sub",{"id":"x"}]"#,
        ] {
            assert!(
                matches!(RelayMessage::from_json(bad), Err(RelayError::Protocol(_))),
                "accepted {bad:?}"
            );
        }
    }
}
