//! Frame codec — JSON text frames to typed events and back
//!
//! The server is inconsistent about key casing (`type` vs `Type`, `payload`
//! vs `Payload`) and about discriminant casing, so lookups here are
//! case-insensitive. Anything that does not decode cleanly is dropped: the
//! protocol is forward-compatible and unknown frames are not errors.

use super::types::{ComponentPayload, OutboundRequest, WireEvent};
use crate::error::Result;
use serde_json::{Map, Value};
use tracing::debug;

/// Decode one inbound text frame.
///
/// Returns `None` for malformed JSON, non-object frames, unknown
/// discriminants and payloads that cannot carry their event.
pub fn decode(raw: &str) -> Option<WireEvent> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Dropping malformed frame");
            return None;
        }
    };

    let Value::Object(frame) = value else {
        debug!("Dropping non-object frame");
        return None;
    };

    let kind = field(&frame, "type").and_then(Value::as_str)?;
    let payload = field(&frame, "payload");

    let event = match kind.to_ascii_lowercase().as_str() {
        "conversationcreated" => decode_conversation_created(payload),
        "component" => decode_component(payload),
        "token" => Some(WireEvent::Token {
            text: payload
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        "done" => Some(WireEvent::Done),
        other => {
            debug!(frame_type = %other, "Dropping frame with unknown type");
            None
        }
    };

    if event.is_none() {
        debug!(frame_type = %kind, "Frame did not decode to an event");
    }
    event
}

/// Serialize an outbound request.
///
/// Field order is fixed by the struct definition so output is deterministic.
pub fn encode(request: &OutboundRequest) -> Result<String> {
    Ok(serde_json::to_string(request)?)
}

/// Look up `name` in `obj`, exact spelling first, then ignoring ASCII case
fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).or_else(|| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

fn decode_conversation_created(payload: Option<&Value>) -> Option<WireEvent> {
    let id = match payload? {
        Value::String(s) => s.trim().to_string(),
        // some server builds send numeric ids
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if id.is_empty() {
        return None;
    }
    Some(WireEvent::ConversationCreated {
        conversation_id: id,
    })
}

fn decode_component(payload: Option<&Value>) -> Option<WireEvent> {
    let obj = payload?.as_object()?;
    let component = field(obj, "component")?.as_str()?.to_string();
    if component.is_empty() {
        return None;
    }
    let args = field(obj, "args").cloned().unwrap_or(Value::Null);
    Some(WireEvent::Component(ComponentPayload { component, args }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::{OutboundMessage, Role};
    use serde_json::json;

    #[test]
    fn test_decode_token() {
        let event = decode(r#"{"type":"Token","payload":"hel"}"#);
        assert_eq!(event, Some(WireEvent::Token { text: "hel".into() }));
    }

    #[test]
    fn test_decode_accepts_pascal_case_keys() {
        let event = decode(r#"{"Type":"Token","Payload":"lo"}"#);
        assert_eq!(event, Some(WireEvent::Token { text: "lo".into() }));

        let event = decode(r#"{"Type":"ConversationCreated","Payload":"abc"}"#);
        assert_eq!(
            event,
            Some(WireEvent::ConversationCreated {
                conversation_id: "abc".into()
            })
        );
    }

    #[test]
    fn test_decode_discriminant_is_case_insensitive() {
        assert_eq!(decode(r#"{"type":"done"}"#), Some(WireEvent::Done));
        assert_eq!(decode(r#"{"type":"DONE"}"#), Some(WireEvent::Done));
        assert_eq!(
            decode(r#"{"type":"token","payload":"x"}"#),
            Some(WireEvent::Token { text: "x".into() })
        );
    }

    #[test]
    fn test_decode_token_without_payload_is_empty() {
        assert_eq!(
            decode(r#"{"type":"Token"}"#),
            Some(WireEvent::Token {
                text: String::new()
            })
        );
        assert_eq!(
            decode(r#"{"type":"Token","payload":null}"#),
            Some(WireEvent::Token {
                text: String::new()
            })
        );
    }

    #[test]
    fn test_decode_component() {
        let raw = json!({
            "type": "Component",
            "payload": { "component": "SalesChart", "args": { "year": 1403, "series": [1, 2] } }
        })
        .to_string();
        let Some(WireEvent::Component(payload)) = decode(&raw) else {
            panic!("expected component");
        };
        assert_eq!(payload.component, "SalesChart");
        assert_eq!(payload.args["year"], 1403);
    }

    #[test]
    fn test_decode_component_without_args() {
        let Some(WireEvent::Component(payload)) =
            decode(r#"{"type":"Component","payload":{"Component":"Table"}}"#)
        else {
            panic!("expected component");
        };
        assert_eq!(payload.component, "Table");
        assert!(payload.args.is_null());
    }

    #[test]
    fn test_decode_component_missing_name_is_dropped() {
        assert_eq!(decode(r#"{"type":"Component","payload":{"args":{}}}"#), None);
        assert_eq!(decode(r#"{"type":"Component","payload":"Table"}"#), None);
        assert_eq!(decode(r#"{"type":"Component"}"#), None);
    }

    #[test]
    fn test_decode_conversation_created_requires_id() {
        assert_eq!(decode(r#"{"type":"ConversationCreated"}"#), None);
        assert_eq!(
            decode(r#"{"type":"ConversationCreated","payload":"  "}"#),
            None
        );
        assert_eq!(
            decode(r#"{"type":"ConversationCreated","payload":42}"#),
            Some(WireEvent::ConversationCreated {
                conversation_id: "42".into()
            })
        );
    }

    #[test]
    fn test_decode_drops_garbage() {
        assert_eq!(decode("not json"), None);
        assert_eq!(decode("[1,2,3]"), None);
        assert_eq!(decode(r#""Token""#), None);
        assert_eq!(decode(r#"{"payload":"orphan"}"#), None);
        assert_eq!(decode(r#"{"type":42}"#), None);
        assert_eq!(decode(r#"{"type":"Heartbeat","payload":1}"#), None);
        assert_eq!(decode(""), None);
    }

    #[test]
    fn test_encode_shape() {
        let request = OutboundRequest {
            token: "secret".into(),
            conversation_id: Some("abc".into()),
            messages: vec![
                OutboundMessage {
                    role: Role::User,
                    content: "hi".into(),
                },
                OutboundMessage {
                    role: Role::Assistant,
                    content: "hello".into(),
                },
            ],
        };
        let raw = encode(&request).unwrap();
        assert_eq!(
            raw,
            r#"{"token":"secret","conversationId":"abc","messages":[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]}"#
        );
    }

    #[test]
    fn test_encode_is_deterministic() {
        let request = OutboundRequest {
            token: "t".into(),
            conversation_id: None,
            messages: vec![OutboundMessage {
                role: Role::User,
                content: "سلام".into(),
            }],
        };
        assert_eq!(encode(&request).unwrap(), encode(&request).unwrap());
        assert!(encode(&request)
            .unwrap()
            .contains(r#""conversationId":null"#));
    }
}
