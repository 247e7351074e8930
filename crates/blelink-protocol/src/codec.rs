//! Decoding helper lines into [`Record`]s and encoding records back.
//!
//! Decoding is stateless and works one line at a time: the transport hands
//! us a line, we hand the router a record. The rules, in order:
//!
//! 1. Strip the line terminator and surrounding whitespace.
//! 2. A line starting with `#` is a comment; the rest of it is the text.
//! 3. A blank line is an empty record.
//! 4. Anything else is space-separated `tag=value` tokens, optionally
//!    followed by a `#comment` token that runs to the end of the line.

use crate::{ProtocolError, Record, Value};

/// Line delimiter used in both directions.
pub const LINE_DELIMITER: char = '\n';

impl Record {
    /// Decodes one helper line.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownPrefix`] for a value prefix outside
    ///   `$ ' h b`
    /// - [`ProtocolError::InvalidInteger`] / [`ProtocolError::InvalidBytes`]
    ///   for malformed hex
    /// - [`ProtocolError::MalformedToken`] for a token without `=`
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();

        if let Some(comment) = line.strip_prefix('#') {
            return Ok(Self::comment_only(comment));
        }

        let mut record = Self::new();
        if line.is_empty() {
            return Ok(record);
        }

        // Tokens never start with '#', so " #" can only open a trailing
        // comment.
        let body = match line.split_once(" #") {
            Some((body, comment)) => {
                record = record.with_comment(comment);
                body
            }
            None => line,
        };

        // Repeated spaces produce empty tokens; they carry nothing.
        for token in body.split(' ').filter(|t| !t.is_empty()) {
            let (tag, text) = token
                .split_once('=')
                .ok_or_else(|| ProtocolError::MalformedToken(token.to_string()))?;
            if tag.is_empty() {
                return Err(ProtocolError::MalformedToken(token.to_string()));
            }
            record.push(tag, decode_value(tag, text)?);
        }

        Ok(record)
    }

    /// Encodes the record as one `\n`-terminated helper line.
    ///
    /// Tags come out in sorted order. Text values use the `'` prefix, so a
    /// `$symbol` reads back as the same [`Value::Str`]. Text containing
    /// spaces can't survive the trip: the format has no quoting.
    pub fn encode(&self) -> String {
        let mut tokens: Vec<String> = Vec::new();
        for (tag, values) in self.tags() {
            for value in values {
                match value {
                    Some(v) => tokens.push(format!("{tag}={v}")),
                    None => tokens.push(format!("{tag}=")),
                }
            }
        }

        let mut line = tokens.join(" ");
        if let Some(comment) = self.comment() {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push('#');
            line.push_str(comment);
        }
        line.push(LINE_DELIMITER);
        line
    }
}

/// Decodes the text to the right of `=`.
///
/// Returns `Ok(None)` for an empty value.
fn decode_value(tag: &str, text: &str) -> Result<Option<Value>, ProtocolError> {
    let mut chars = text.chars();
    let Some(prefix) = chars.next() else {
        return Ok(None);
    };
    let rest = chars.as_str();

    let value = match prefix {
        '$' | '\'' => Value::Str(rest.to_string()),
        'h' => {
            let n = u64::from_str_radix(rest, 16).map_err(|source| {
                ProtocolError::InvalidInteger {
                    tag: tag.to_string(),
                    text: text.to_string(),
                    source,
                }
            })?;
            Value::Int(n)
        }
        'b' => {
            let bytes = hex::decode(rest).map_err(|source| {
                ProtocolError::InvalidBytes {
                    tag: tag.to_string(),
                    source,
                }
            })?;
            Value::Bytes(bytes)
        }
        _ => {
            return Err(ProtocolError::UnknownPrefix {
                tag: tag.to_string(),
                text: text.to_string(),
            });
        }
    };
    Ok(Some(value))
}
