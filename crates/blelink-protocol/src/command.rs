//! Outbound commands.
//!
//! Commands are simpler than responses: a name followed by positional
//! arguments, with no tags and no type prefixes. Integers go out as bare
//! uppercase hex (`char 1 FFFF`), byte strings as lowercase hex
//! (`wrr 25 0100`), symbols verbatim (`secu medium`).

use std::fmt;

use crate::codec::LINE_DELIMITER;
use crate::ProtocolError;

/// A single command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Written as uppercase hex without prefix.
    Hex(u64),
    /// Written as lowercase hex.
    Bytes(Vec<u8>),
    /// Written verbatim.
    Symbol(String),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex(n) => write!(f, "{n:X}"),
            Self::Bytes(b) => f.write_str(&hex::encode(b)),
            Self::Symbol(s) => f.write_str(s),
        }
    }
}

/// A command line for the helper, built argument by argument.
///
/// ```rust
/// use blelink_protocol::Command;
///
/// let cmd = Command::new("wrr").hex(0x25).bytes([0x01, 0x00]);
/// assert_eq!(cmd.encode().unwrap(), "wrr 25 0100\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Arg>,
}

impl Command {
    /// Starts a command with no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Appends an integer argument.
    pub fn hex(self, n: u64) -> Self {
        self.arg(Arg::Hex(n))
    }

    /// Appends a byte-string argument.
    pub fn bytes(self, b: impl AsRef<[u8]>) -> Self {
        self.arg(Arg::Bytes(b.as_ref().to_vec()))
    }

    /// Appends a symbol argument.
    pub fn symbol(self, s: impl Into<String>) -> Self {
        self.arg(Arg::Symbol(s.into()))
    }

    /// Appends any argument.
    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    /// The command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The arguments, in order.
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Encodes the command as one `\n`-terminated line.
    ///
    /// # Errors
    /// - [`ProtocolError::EmptyCommand`] when the name is empty
    /// - [`ProtocolError::EmbeddedDelimiter`] when the name or a symbol
    ///   contains `\n` or `\r`
    pub fn encode(&self) -> Result<String, ProtocolError> {
        if self.name.is_empty() {
            return Err(ProtocolError::EmptyCommand);
        }
        check_delimiter(&self.name)?;

        let mut line = self.name.clone();
        for arg in &self.args {
            if let Arg::Symbol(s) = arg {
                check_delimiter(s)?;
            }
            line.push(' ');
            line.push_str(&arg.to_string());
        }
        line.push(LINE_DELIMITER);
        Ok(line)
    }
}

fn check_delimiter(text: &str) -> Result<(), ProtocolError> {
    if text.contains(['\n', '\r']) {
        return Err(ProtocolError::EmbeddedDelimiter(text.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_bare_command() {
        assert_eq!(Command::new("stat").encode().unwrap(), "stat\n");
    }

    #[test]
    fn test_encode_hex_arguments_are_uppercase() {
        let cmd = Command::new("char").hex(1).hex(0xffff);
        assert_eq!(cmd.encode().unwrap(), "char 1 FFFF\n");
    }

    #[test]
    fn test_encode_symbol_argument() {
        let cmd = Command::new("conn").symbol("AA:BB:CC:DD:EE:FF");
        assert_eq!(cmd.encode().unwrap(), "conn AA:BB:CC:DD:EE:FF\n");
    }

    #[test]
    fn test_encode_rejects_embedded_newline() {
        let cmd = Command::new("conn").symbol("AA\nstat");
        assert!(matches!(
            cmd.encode(),
            Err(ProtocolError::EmbeddedDelimiter(_))
        ));
        let cmd = Command::new("st\rat");
        assert!(matches!(
            cmd.encode(),
            Err(ProtocolError::EmbeddedDelimiter(_))
        ));
    }

    #[test]
    fn test_encode_rejects_empty_name() {
        assert!(matches!(
            Command::new("").encode(),
            Err(ProtocolError::EmptyCommand)
        ));
    }

    #[test]
    fn test_accessors() {
        let cmd = Command::new("rd").hex(0x25);
        assert_eq!(cmd.name(), "rd");
        assert_eq!(cmd.args(), &[Arg::Hex(0x25)]);
    }
}
