//! Core types of the helper's line format.
//!
//! A helper line looks like this:
//!
//! ```text
//! rsp=$find hnd=h25 uuid='2a00 props=h2 vhnd=h26
//! ```
//!
//! Every token is `tag=value`, and the first character of the value says
//! how to read the rest of it. The same tag may appear several times; the
//! values then accumulate in order of appearance.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The reserved tag that names the response type of a record.
pub const RESPONSE_TAG: &str = "rsp";

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// One typed value from a `tag=value` token.
///
/// The wire prefix selects the variant:
///
/// | prefix     | variant        | example     |
/// |------------|----------------|-------------|
/// | `$` or `'` | [`Value::Str`] | `$stat`     |
/// | `h`        | [`Value::Int`] | `hFF` = 255 |
/// | `b`        | [`Value::Bytes`] | `b0A1B`   |
///
/// An empty value (`tag=`) has no variant at all: it is stored as `None`
/// in the record, next to the `Some` values of the same tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// A string or symbol. The helper uses `$` for symbols and `'` for
    /// strings, but both read back as plain text.
    Str(String),
    /// An unsigned integer, written in base 16 on the wire.
    Int(u64),
    /// Raw bytes, written as a hex string on the wire.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the text if this is a [`Value::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is a [`Value::Int`].
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the bytes if this is a [`Value::Bytes`].
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Writes the wire form, prefix included.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "'{s}"),
            Self::Int(n) => write!(f, "h{n:X}"),
            Self::Bytes(b) => write!(f, "b{}", hex::encode(b)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Int(n)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// What a record means to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Carries an `rsp` tag: routed by response type.
    Response,
    /// Only a comment (`#...`): logged, never routed to waiters.
    Comment,
    /// Blank line: legal, silently ignored.
    Empty,
    /// Tags but no `rsp`: the helper and the client are out of step.
    Malformed,
}

/// One decoded helper line.
///
/// Records are built fresh for every inbound line and never mutated after
/// decoding; the router hands each subscriber its own clone.
///
/// Tags live in a `BTreeMap` so that iteration, `Debug` output and
/// [`Record::encode`] are deterministic. The helper itself gives no meaning
/// to the relative order of distinct tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    tags: BTreeMap<String, Vec<Option<Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

impl Record {
    /// Creates an empty record (the record of a blank line).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a comment-only record.
    pub fn comment_only(text: impl Into<String>) -> Self {
        Self {
            tags: BTreeMap::new(),
            comment: Some(text.into()),
        }
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, tag: &str, value: impl Into<Value>) -> Self {
        self.push(tag, Some(value.into()));
        self
    }

    /// Builder-style push of an absent (`tag=`) value.
    pub fn with_null(mut self, tag: &str) -> Self {
        self.push(tag, None);
        self
    }

    /// Builder-style comment setter.
    pub fn with_comment(mut self, text: impl Into<String>) -> Self {
        self.comment = Some(text.into());
        self
    }

    /// Appends a value under `tag`, after any values already there.
    pub fn push(&mut self, tag: &str, value: Option<Value>) {
        self.tags.entry(tag.to_string()).or_default().push(value);
    }

    /// All values under `tag`, in order of appearance.
    pub fn get(&self, tag: &str) -> Option<&[Option<Value>]> {
        self.tags.get(tag).map(Vec::as_slice)
    }

    /// The first value under `tag`, if present and non-null.
    pub fn first(&self, tag: &str) -> Option<&Value> {
        self.tags.get(tag)?.first()?.as_ref()
    }

    /// The first value under `tag` as text.
    pub fn str(&self, tag: &str) -> Option<&str> {
        self.first(tag)?.as_str()
    }

    /// The first value under `tag` as an integer.
    pub fn int(&self, tag: &str) -> Option<u64> {
        self.first(tag)?.as_int()
    }

    /// The first value under `tag` as bytes.
    pub fn bytes(&self, tag: &str) -> Option<&[u8]> {
        self.first(tag)?.as_bytes()
    }

    /// Whether any value under `tag` is the string `text`.
    pub fn has_str(&self, tag: &str, text: &str) -> bool {
        self.get(tag).is_some_and(|values| {
            values
                .iter()
                .flatten()
                .any(|v| v.as_str() == Some(text))
        })
    }

    /// Whether `tag` appears at all (even with only null values).
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    /// Iterates over `(tag, values)` in tag order.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &[Option<Value>])> {
        self.tags.iter().map(|(t, v)| (t.as_str(), v.as_slice()))
    }

    /// The response type: the first value under `rsp`, when it is text.
    pub fn response_type(&self) -> Option<&str> {
        self.str(RESPONSE_TAG)
    }

    /// The comment text, without the leading `#`.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// `true` for the record of a blank line.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.comment.is_none()
    }

    /// Classifies the record for dispatch.
    ///
    /// Note that an `rsp` tag whose first value is not text still counts as
    /// a response here; the router reports it as a communication error when
    /// it can't extract a type.
    pub fn kind(&self) -> RecordKind {
        if self.contains(RESPONSE_TAG) {
            RecordKind::Response
        } else if self.tags.is_empty() && self.comment.is_some() {
            RecordKind::Comment
        } else if self.is_empty() {
            RecordKind::Empty
        } else {
            RecordKind::Malformed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display_uses_wire_prefixes() {
        assert_eq!(Value::from("stat").to_string(), "'stat");
        assert_eq!(Value::Int(255).to_string(), "hFF");
        assert_eq!(Value::Bytes(vec![0x0a, 0x1b]).to_string(), "b0a1b");
    }

    #[test]
    fn test_value_accessors_match_variant() {
        let v = Value::Int(7);
        assert_eq!(v.as_int(), Some(7));
        assert_eq!(v.as_str(), None);
        assert_eq!(v.as_bytes(), None);
    }

    #[test]
    fn test_record_accumulates_repeated_tags_in_order() {
        let rec = Record::new()
            .with("hnd", 1u64)
            .with("hnd", 2u64)
            .with_null("hnd");
        assert_eq!(
            rec.get("hnd").unwrap(),
            &[Some(Value::Int(1)), Some(Value::Int(2)), None]
        );
        assert_eq!(rec.int("hnd"), Some(1));
    }

    #[test]
    fn test_record_first_skips_nothing_on_null() {
        // A leading null is the first value; `first` reports it as absent.
        let rec = Record::new().with_null("d").with("d", vec![1u8]);
        assert_eq!(rec.first("d"), None);
        assert_eq!(rec.get("d").unwrap().len(), 2);
    }

    #[test]
    fn test_record_kind_classification() {
        assert_eq!(Record::new().kind(), RecordKind::Empty);
        assert_eq!(
            Record::comment_only("hello").kind(),
            RecordKind::Comment
        );
        assert_eq!(
            Record::new().with("rsp", "stat").kind(),
            RecordKind::Response
        );
        assert_eq!(
            Record::new().with("state", "conn").kind(),
            RecordKind::Malformed
        );
    }

    #[test]
    fn test_record_has_str_checks_every_value() {
        let rec = Record::new().with("mode", "scan").with("mode", "disc");
        assert!(rec.has_str("mode", "disc"));
        assert!(!rec.has_str("mode", "conn"));
        assert!(!rec.has_str("state", "disc"));
    }

    #[test]
    fn test_record_json_shape() {
        let rec = Record::new().with("rsp", "stat").with("mtu", 23u64);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["tags"]["rsp"][0]["type"], "str");
        assert_eq!(json["tags"]["rsp"][0]["value"], "stat");
        assert_eq!(json["tags"]["mtu"][0]["value"], 23);
        assert!(json.get("comment").is_none());
    }
}
