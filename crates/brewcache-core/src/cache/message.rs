use serde::{Deserialize, Serialize};

/// Messages a foreground client can post to the cache manager.
///
/// Wire form is a JSON object with a `type` discriminator, e.g.
/// `{"type":"SKIP_WAITING"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting generation now instead of waiting for every
    /// older client to close.
    SkipWaiting,
}

impl ControlMessage {
    /// Parse a raw message. Anything unrecognised yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn to_json(self) -> String {
        match self {
            ControlMessage::SkipWaiting => r#"{"type":"SKIP_WAITING"}"#.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skip_waiting() {
        assert_eq!(
            ControlMessage::parse(r#"{"type":"SKIP_WAITING"}"#),
            Some(ControlMessage::SkipWaiting)
        );
    }

    #[test]
    fn test_parse_ignores_unknown() {
        assert_eq!(ControlMessage::parse(r#"{"type":"REFRESH"}"#), None);
        assert_eq!(ControlMessage::parse("SKIP_WAITING"), None);
        assert_eq!(ControlMessage::parse(""), None);
    }

    #[test]
    fn test_to_json_matches_serde() {
        let json = ControlMessage::SkipWaiting.to_json();
        assert_eq!(
            serde_json::to_string(&ControlMessage::SkipWaiting).unwrap(),
            json
        );
        assert_eq!(ControlMessage::parse(&json), Some(ControlMessage::SkipWaiting));
    }
}
