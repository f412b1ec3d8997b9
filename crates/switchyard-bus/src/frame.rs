//! STOMP 1.2 frame codec.
//!
//! A frame is `COMMAND EOL *(header EOL) EOL body NUL`. Header names and
//! values are escaped (`\\`, `\n`, `\r`, `\c`) on every command except
//! CONNECT and CONNECTED. Input consisting only of EOLs is a heart-beat and
//! decodes to `None`.

use std::fmt;

use crate::errors::FrameError;

/// Protocol version sent in `accept-version`.
pub const STOMP_VERSION: &str = "1.2";

/// STOMP commands (client and server).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client handshake.
    Connect,
    /// Client handshake (STOMP 1.2 alias of CONNECT).
    Stomp,
    /// Server handshake reply.
    Connected,
    /// Client publish.
    Send,
    /// Client subscribe.
    Subscribe,
    /// Client unsubscribe.
    Unsubscribe,
    /// Client graceful disconnect.
    Disconnect,
    /// Server delivery.
    Message,
    /// Server receipt.
    Receipt,
    /// Server error.
    Error,
}

impl Command {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// Parse a command line.
    pub fn parse(line: &str) -> Result<Self, FrameError> {
        Ok(match line {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            "" => return Err(FrameError::MissingCommand),
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        })
    }

    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded STOMP frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    /// Headers in wire order. Repeated names are kept; the first one wins on lookup.
    pub headers: Vec<(String, String)>,
    /// Body text.
    pub body: String,
}

impl Frame {
    /// Empty frame with `command`.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    // ── Constructors ────────────────────────────────────────────────────

    /// CONNECT with heart-beating disabled.
    pub fn connect(host: &str) -> Self {
        Self::new(Command::Connect)
            .with_header("accept-version", STOMP_VERSION)
            .with_header("host", host)
            .with_header("heart-beat", "0,0")
    }

    /// CONNECTED reply.
    pub fn connected() -> Self {
        Self::new(Command::Connected)
            .with_header("version", STOMP_VERSION)
            .with_header("heart-beat", "0,0")
    }

    /// SUBSCRIBE with automatic acknowledgement.
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    /// UNSUBSCRIBE.
    pub fn unsubscribe(id: &str) -> Self {
        Self::new(Command::Unsubscribe).with_header("id", id)
    }

    /// SEND with an explicit `content-length`.
    pub fn send(destination: &str, content_type: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(Command::Send)
            .with_header("destination", destination)
            .with_header("content-type", content_type)
            .with_header("content-length", body.len().to_string())
            .with_body(body)
    }

    /// MESSAGE delivery.
    pub fn message(
        destination: &str,
        subscription: &str,
        message_id: &str,
        body: impl Into<String>,
    ) -> Self {
        Self::new(Command::Message)
            .with_header("destination", destination)
            .with_header("subscription", subscription)
            .with_header("message-id", message_id)
            .with_body(body)
    }

    /// ERROR with a `message` header.
    pub fn error(message: &str) -> Self {
        Self::new(Command::Error).with_header("message", message)
    }

    /// DISCONNECT.
    pub fn disconnect() -> Self {
        Self::new(Command::Disconnect)
    }

    // ── Codec ───────────────────────────────────────────────────────────

    /// Encode to wire text, NUL-terminated.
    pub fn encode(&self) -> String {
        let escape_headers = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape_headers {
                escape_into(&mut out, name);
                out.push(':');
                escape_into(&mut out, value);
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decode one frame. Heart-beats (EOL-only input) decode to `None`.
    pub fn parse(input: &str) -> Result<Option<Self>, FrameError> {
        let input = input.trim_start_matches(['\r', '\n']);
        if input.is_empty() {
            return Ok(None);
        }

        let mut rest = input;
        let command = Command::parse(next_line(&mut rest).ok_or(FrameError::UnterminatedHeaders)?)?;
        let unescape_headers = command.escapes_headers();

        let mut headers = Vec::new();
        loop {
            let line = next_line(&mut rest).ok_or(FrameError::UnterminatedHeaders)?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
            if unescape_headers {
                headers.push((unescape(name)?, unescape(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(n, _)| n == "content-length")
            .map(|(_, v)| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| FrameError::InvalidContentLength(v.clone()))
            })
            .transpose()?;

        let body = match content_length {
            Some(len) => {
                let terminated = rest.is_char_boundary(len) && rest.as_bytes().get(len) == Some(&0);
                if !terminated {
                    return Err(FrameError::UnterminatedBody);
                }
                &rest[..len]
            }
            None => {
                let end = rest.find('\0').ok_or(FrameError::UnterminatedBody)?;
                &rest[..end]
            }
        };

        Ok(Some(Self {
            command,
            headers,
            body: body.to_string(),
        }))
    }
}

/// Split off the next line, dropping `\n` and an optional preceding `\r`.
fn next_line<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let idx = rest.find('\n')?;
    let line = &rest[..idx];
    *rest = &rest[idx + 1..];
    Some(line.strip_suffix('\r').unwrap_or(line))
}

fn escape_into(out: &mut String, raw: &str) {
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
}

fn unescape(raw: &str) -> Result<String, FrameError> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
