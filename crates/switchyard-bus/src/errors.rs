//! Bus error types.

/// Errors decoding a STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The frame had no command line.
    #[error("frame has no command")]
    MissingCommand,

    /// The command line is not a STOMP 1.2 command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A header line without a `:` separator.
    #[error("malformed header line: {0}")]
    MalformedHeader(String),

    /// An escape sequence STOMP 1.2 does not define.
    #[error("invalid escape sequence in header: {0}")]
    InvalidEscape(String),

    /// The blank line separating headers from body is missing.
    #[error("frame headers are not terminated")]
    UnterminatedHeaders,

    /// The body is not NUL-terminated or is shorter than `content-length`.
    #[error("frame body is not terminated")]
    UnterminatedBody,

    /// `content-length` is not a number.
    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),
}

/// Errors from the bus client.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The operation needs an OPEN connection.
    #[error("not connected to the broker")]
    NotConnected,

    /// The connection task is gone (client deactivated or dropped).
    #[error("bus connection closed")]
    Closed,

    /// The connect attempt or STOMP handshake did not finish in time.
    #[error("timed out connecting to the broker")]
    Timeout,

    /// The broker answered with an ERROR frame.
    #[error("broker error: {0}")]
    Broker(String),

    /// The broker closed the connection during the handshake.
    #[error("broker closed the connection during handshake")]
    HandshakeClosed,

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Unparsable frame.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Payload could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_error_converts() {
        let err = BusError::from(FrameError::UnknownCommand("HELLO".into()));
        assert_eq!(err.to_string(), "frame error: unknown command: HELLO");
    }

    #[test]
    fn not_connected_display() {
        assert_eq!(BusError::NotConnected.to_string(), "not connected to the broker");
    }
}
