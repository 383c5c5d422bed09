//! Basic social-protocol relay framing over WebSocket (spec.md §6.1): the
//! four client→relay message types Crosstown uses (`REQ`/`CLOSE`/`EVENT`
//! publish) and the relay→client replies (`EVENT`/`EOSE`/`NOTICE`/`OK`).

use crosstown_protocol::SignedEvent;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message;

/// A subscription filter. Only the fields Crosstown needs are modeled;
/// an unset field is simply omitted from the wire object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// `["REQ", sub_id, filter]`
pub fn req_message(sub_id: &str, filter: &Filter) -> Message {
    let arr = serde_json::json!(["REQ", sub_id, filter]);
    Message::Text(arr.to_string())
}

/// `["CLOSE", sub_id]`
pub fn close_message(sub_id: &str) -> Message {
    let arr = serde_json::json!(["CLOSE", sub_id]);
    Message::Text(arr.to_string())
}

/// `["EVENT", event]` — publish.
pub fn publish_message(event: &SignedEvent) -> Message {
    let arr = serde_json::json!(["EVENT", event]);
    Message::Text(arr.to_string())
}

/// A parsed relay→client message. Anything the relay sends that doesn't
/// match one of these four shapes is ignored by the caller.
#[derive(Debug, Clone)]
pub enum RelayMessage {
    Event { sub_id: String, event: SignedEvent },
    Eose { sub_id: String },
    Notice(String),
    Ok { event_id: String, accepted: bool, message: String },
}

pub fn parse_relay_message(text: &str) -> Option<RelayMessage> {
    let arr: Vec<serde_json::Value> = serde_json::from_str(text).ok()?;
    let tag = arr.first()?.as_str()?;
    match tag {
        "EVENT" if arr.len() >= 3 => {
            let sub_id = arr[1].as_str()?.to_string();
            let event: SignedEvent = serde_json::from_value(arr[2].clone()).ok()?;
            Some(RelayMessage::Event { sub_id, event })
        }
        "EOSE" if arr.len() >= 2 => Some(RelayMessage::Eose {
            sub_id: arr[1].as_str()?.to_string(),
        }),
        "NOTICE" if arr.len() >= 2 => Some(RelayMessage::Notice(arr[1].as_str()?.to_string())),
        "OK" if arr.len() >= 3 => Some(RelayMessage::Ok {
            event_id: arr[1].as_str()?.to_string(),
            accepted: arr[2].as_bool().unwrap_or(false),
            message: arr.get(3).and_then(|v| v.as_str()).unwrap_or("").to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn req_message_shapes_array() {
        let filter = Filter {
            kinds: Some(vec![10032]),
            authors: None,
            limit: Some(1),
        };
        let msg = req_message("sub-1", &filter);
        let Message::Text(text) = msg else { panic!("expected text frame") };
        let arr: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(arr[0], "REQ");
        assert_eq!(arr[1], "sub-1");
        assert_eq!(arr[2]["kinds"], serde_json::json!([10032]));
    }

    #[test]
    fn parses_eose() {
        let msg = parse_relay_message(r#"["EOSE","sub-1"]"#).unwrap();
        assert!(matches!(msg, RelayMessage::Eose { sub_id } if sub_id == "sub-1"));
    }

    #[test]
    fn parses_notice() {
        let msg = parse_relay_message(r#"["NOTICE","rate limited"]"#).unwrap();
        assert!(matches!(msg, RelayMessage::Notice(m) if m == "rate limited"));
    }

    #[test]
    fn unknown_tag_is_none() {
        assert!(parse_relay_message(r#"["HELLO"]"#).is_none());
    }
}
