//! The message value passed through channels, cogs, and combinators
//!
//! Messages are opaque to the runtime: payloads ride in a `serde_json::Value`
//! and are never inspected. The two structured shapes the runtime itself
//! produces are `Tuple` (ordered gather results from fanout and gate) and
//! `Error` (the envelope published when a transition faults).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A value traveling through the runtime
///
/// The `kind` of a message (`"value"`, `"tuple"`, `"error"`) is the enum tag;
/// downstream consumers distinguish error envelopes with [`Message::is_error`]
/// and treat everything else as payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// An opaque user payload
    Value(Value),

    /// An ordered gather result (fanout replies, gate pairs)
    Tuple(Vec<Message>),

    /// A transition fault, published as data on the output stream
    ///
    /// The faulted input is carried along so consumers can retry or log it.
    Error {
        /// Rendered fault chain
        cause: String,
        /// The input that triggered the fault
        input: Box<Message>,
    },
}

impl Message {
    /// Create a payload message from anything JSON-representable
    pub fn value(v: impl Into<Value>) -> Self {
        Message::Value(v.into())
    }

    /// Create a text payload
    pub fn text(s: impl Into<String>) -> Self {
        Message::Value(Value::String(s.into()))
    }

    /// Create a tuple message from ordered slots
    pub fn tuple(items: Vec<Message>) -> Self {
        Message::Tuple(items)
    }

    /// Create an error envelope
    pub fn error(cause: impl Into<String>, input: Message) -> Self {
        Message::Error {
            cause: cause.into(),
            input: Box::new(input),
        }
    }

    /// The message kind as a string: `"value"`, `"tuple"`, or `"error"`
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Value(_) => "value",
            Message::Tuple(_) => "tuple",
            Message::Error { .. } => "error",
        }
    }

    /// Check if this message is an error envelope
    pub fn is_error(&self) -> bool {
        matches!(self, Message::Error { .. })
    }

    /// Borrow the payload if this is a `Value`
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Message::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow the text if this is a string payload
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(|v| v.as_str())
    }

    /// Read the payload as an integer
    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(|v| v.as_i64())
    }

    /// Borrow the slots if this is a tuple
    pub fn as_tuple(&self) -> Option<&[Message]> {
        match self {
            Message::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

impl From<Value> for Message {
    fn from(v: Value) -> Self {
        Message::Value(v)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::text(s)
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::text(s)
    }
}

impl From<i64> for Message {
    fn from(n: i64) -> Self {
        Message::Value(Value::from(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_predicates() {
        assert_eq!(Message::text("hi").kind(), "value");
        assert_eq!(Message::tuple(vec![]).kind(), "tuple");
        assert_eq!(Message::error("boom", Message::text("x")).kind(), "error");

        assert!(Message::error("boom", Message::text("x")).is_error());
        assert!(!Message::text("hi").is_error());
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Message::text("hi").as_str(), Some("hi"));
        assert_eq!(Message::value(42).as_i64(), Some(42));
        assert!(Message::text("hi").as_tuple().is_none());

        let tuple = Message::tuple(vec![Message::value(1), Message::text("L")]);
        let slots = tuple.as_tuple().unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].as_i64(), Some(1));
        assert_eq!(slots[1].as_str(), Some("L"));
    }

    #[test]
    fn test_error_envelope_carries_input() {
        let envelope = Message::error("division by zero", Message::value(10));
        match envelope {
            Message::Error { cause, input } => {
                assert_eq!(cause, "division by zero");
                assert_eq!(input.as_i64(), Some(10));
            }
            _ => panic!("expected error envelope"),
        }
    }

    #[test]
    fn test_from_impls() {
        assert_eq!(Message::from("a"), Message::text("a"));
        assert_eq!(Message::from(7i64).as_i64(), Some(7));
        assert_eq!(
            Message::from(serde_json::json!({"k": 1})).kind(),
            "value"
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let msg = Message::error("boom", Message::tuple(vec![Message::value(1)]));
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
