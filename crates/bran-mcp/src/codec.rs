//! Envelope codec: one JSON-RPC message per line.
//!
//! Encoding produces a single JSON object with no embedded newlines.
//! Decoding never fails: every line maps to a tagged [`Decoded`] outcome so
//! the transport can decide whether to correlate, ignore, or log. Blank
//! lines and the literal `0` are transport noise and are filtered by the
//! caller before decoding (see [`is_noise`]).

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Outcome of decoding one line.
#[derive(Debug, Clone)]
pub enum Decoded {
    /// A request (has `method` and `id`).
    Request(JsonRpcRequest),
    /// A notification (has `method`, no `id`).
    Notification(JsonRpcNotification),
    /// A response (has `id` and exactly one of `result`/`error`).
    Response(JsonRpcResponse),
    /// Not valid JSON, or valid JSON with none of the envelope shapes.
    Malformed,
}

/// Serialize an envelope to a single line (without the trailing newline).
pub fn encode<T: Serialize>(envelope: &T) -> Result<String> {
    Ok(serde_json::to_string(envelope)?)
}

/// True if the line is transport noise rather than a message: whitespace
/// only, or the literal digit `0`.
pub fn is_noise(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed == "0"
}

/// Classify and decode one line.
pub fn decode(line: &str) -> Decoded {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(_) => return Decoded::Malformed,
    };

    let Some(object) = value.as_object() else {
        return Decoded::Malformed;
    };

    if object.contains_key("method") {
        if object.contains_key("id") {
            match serde_json::from_value(value) {
                Ok(request) => Decoded::Request(request),
                Err(_) => Decoded::Malformed,
            }
        } else {
            match serde_json::from_value(value) {
                Ok(notification) => Decoded::Notification(notification),
                Err(_) => Decoded::Malformed,
            }
        }
    } else if object.contains_key("id")
        && (object.contains_key("result") ^ object.contains_key("error"))
    {
        match serde_json::from_value(value) {
            Ok(response) => Decoded::Response(response),
            Err(_) => Decoded::Malformed,
        }
    } else {
        Decoded::Malformed
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Line accumulation
// ─────────────────────────────────────────────────────────────────────────────

/// Accumulates raw bytes from a stream and yields complete lines.
///
/// A byte stream imposes arbitrary fragmentation: one message may span many
/// reads, or one read may carry many messages. The buffer grows with each
/// pushed chunk and shrinks by exactly the consumed prefix whenever a
/// newline is found; a partial trailing line stays buffered for the next
/// chunk and is never surfaced.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every complete line it unlocked, in order,
    /// without their terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let rest = self.buf.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buf, rest);
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Number of buffered bytes not yet forming a complete line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestId;

    #[test]
    fn decodes_request() {
        let line = r#"{"jsonrpc":"2.0","id":"init-1","method":"initialize","params":{}}"#;
        match decode(line) {
            Decoded::Request(req) => {
                assert_eq!(req.id, RequestId::from("init-1"));
                assert_eq!(req.method, "initialize");
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn decodes_notification() {
        let line = r#"{"jsonrpc":"2.0","method":"notifications/initialized","params":{}}"#;
        match decode(line) {
            Decoded::Notification(n) => assert_eq!(n.method, "notifications/initialized"),
            other => panic!("expected notification, got {:?}", other),
        }
    }

    #[test]
    fn decodes_result_and_error_responses() {
        match decode(r#"{"jsonrpc":"2.0","id":"a","result":{}}"#) {
            Decoded::Response(resp) => assert!(!resp.is_error()),
            other => panic!("expected response, got {:?}", other),
        }
        match decode(r#"{"jsonrpc":"2.0","id":"a","error":{"code":-32600,"message":"bad"}}"#) {
            Decoded::Response(resp) => assert!(resp.is_error()),
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn decode_tolerates_missing_jsonrpc_field() {
        match decode(r#"{"id":"a","result":{}}"#) {
            Decoded::Response(resp) => assert_eq!(resp.id, RequestId::from("a")),
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn malformed_lines_are_classified_not_thrown() {
        assert!(matches!(decode("not json"), Decoded::Malformed));
        assert!(matches!(decode("[1,2,3]"), Decoded::Malformed));
        assert!(matches!(decode(r#"{"jsonrpc":"2.0"}"#), Decoded::Malformed));
        // Both result and error present violates the xor shape.
        assert!(matches!(
            decode(r#"{"id":1,"result":{},"error":{"code":1,"message":"x"}}"#),
            Decoded::Malformed
        ));
        // An id alone is not a response.
        assert!(matches!(decode(r#"{"id":1}"#), Decoded::Malformed));
        // A null id cannot correlate to anything.
        assert!(matches!(
            decode(r#"{"id":null,"result":{}}"#),
            Decoded::Malformed
        ));
    }

    #[test]
    fn noise_lines_are_recognized() {
        assert!(is_noise(""));
        assert!(is_noise("   "));
        assert!(is_noise("0"));
        assert!(is_noise(" 0 "));
        assert!(!is_noise("{}"));
        assert!(!is_noise("00"));
    }

    #[test]
    fn encode_produces_single_line() {
        let req = JsonRpcRequest::new("init-1", "initialize", Some(serde_json::json!({})));
        let line = encode(&req).unwrap();
        assert!(!line.contains('\n'));
    }

    #[test]
    fn split_at_any_boundary_yields_identical_single_message() {
        let line = r#"{"jsonrpc":"2.0","id":"a","result":{"ok":true}}"#;
        let framed = format!("{}\n", line);
        let bytes = framed.as_bytes();

        for split in 1..bytes.len() {
            let mut buffer = LineBuffer::new();
            let mut lines = buffer.push(&bytes[..split]);
            lines.extend(buffer.push(&bytes[split..]));
            assert_eq!(lines, vec![line.to_string()], "split at byte {}", split);
            assert_eq!(buffer.pending(), 0);
        }
    }

    #[test]
    fn two_messages_in_one_chunk_both_surface() {
        let chunk =
            b"{\"jsonrpc\":\"2.0\",\"id\":\"a\",\"result\":{}}\n{\"jsonrpc\":\"2.0\",\"id\":\"b\",\"result\":{}}\n";
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(chunk);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"a\""));
        assert!(lines[1].contains("\"b\""));
    }

    #[test]
    fn partial_line_stays_buffered() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"{\"id\":\"a\",").is_empty());
        assert!(buffer.pending() > 0);
        let lines = buffer.push(b"\"result\":{}}\n{\"partial");
        assert_eq!(lines.len(), 1);
        assert_eq!(buffer.pending(), "{\"partial".len());
    }

    #[test]
    fn crlf_terminators_are_stripped() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"{\"id\":1,\"result\":{}}\r\n");
        assert_eq!(lines, vec!["{\"id\":1,\"result\":{}}".to_string()]);
    }
}
