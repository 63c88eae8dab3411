//! Frames exchanged with the session socket.
//!
//! Every text frame is a JSON object tagged with `type`. Binary frames
//! carry raw terminal bytes: inbound they are output deltas, outbound they
//! are keystrokes.

use serde::{Deserialize, Serialize};

use agentrix_core::{Dimensions, Error, Result};

/// Keystroke payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputData {
    /// Sent as `{"type":"input","data":...}`
    Text(String),
    /// Sent as a raw binary frame
    Bytes(Vec<u8>),
}

/// Client → server frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Keystrokes or paste
    Input(InputData),
    /// Viewport size change
    Resize(Dimensions),
}

/// Server → client event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Sent once per connection; `log` replaces the transcript
    Init {
        /// Full transcript so far
        log: Option<String>,
        /// The session ended before this connection was made
        closed: bool,
    },
    /// The remote process reached a displayable state
    Ready,
    /// Delta to append
    Output(Vec<u8>),
    /// The process ended
    Exit,
    /// Fatal stream error
    Error {
        /// Server-provided message
        message: String,
    },
}

/// Encoded frame, independent of the socket library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame
    Binary(Vec<u8>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireClientFrame {
    Input { data: String },
    Resize { cols: u16, rows: u16 },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireServerFrame {
    Init {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        log: Option<String>,
        #[serde(default)]
        closed: bool,
    },
    Ready,
    Output {
        chunk: String,
    },
    Exit,
    Error {
        #[serde(default)]
        message: String,
    },
}

impl ClientFrame {
    /// Encode for the socket.
    pub fn encode(&self) -> Payload {
        let wire = match self {
            ClientFrame::Input(InputData::Bytes(bytes)) => return Payload::Binary(bytes.clone()),
            ClientFrame::Input(InputData::Text(data)) => WireClientFrame::Input { data: data.clone() },
            ClientFrame::Resize(dims) => WireClientFrame::Resize {
                cols: dims.cols,
                rows: dims.rows,
            },
        };
        // Plain structs with string and integer fields always serialize.
        Payload::Text(serde_json::to_string(&wire).unwrap_or_default())
    }

    /// Whether this is a resize frame. Resize send failures are swallowed.
    pub fn is_resize(&self) -> bool {
        matches!(self, ClientFrame::Resize(_))
    }
}

impl ServerEvent {
    /// Decode an inbound frame.
    ///
    /// Anything that is not one of the typed events is a protocol error;
    /// callers drop it rather than treating it as output.
    pub fn decode(payload: Payload) -> Result<Self> {
        match payload {
            Payload::Binary(bytes) => Ok(ServerEvent::Output(bytes)),
            Payload::Text(text) => {
                let wire: WireServerFrame = serde_json::from_str(&text)
                    .map_err(|e| Error::Protocol(format!("unrecognized server frame: {e}")))?;
                Ok(match wire {
                    WireServerFrame::Init { log, closed } => ServerEvent::Init { log, closed },
                    WireServerFrame::Ready => ServerEvent::Ready,
                    WireServerFrame::Output { chunk } => ServerEvent::Output(chunk.into_bytes()),
                    WireServerFrame::Exit => ServerEvent::Exit,
                    WireServerFrame::Error { message } => ServerEvent::Error { message },
                })
            }
        }
    }

    /// Encode as a server would send it.
    ///
    /// Output that is not valid UTF-8 goes out as a binary frame.
    pub fn encode(&self) -> Payload {
        let wire = match self {
            ServerEvent::Init { log, closed } => WireServerFrame::Init {
                log: log.clone(),
                closed: *closed,
            },
            ServerEvent::Ready => WireServerFrame::Ready,
            ServerEvent::Output(bytes) => match std::str::from_utf8(bytes) {
                Ok(chunk) => WireServerFrame::Output {
                    chunk: chunk.to_string(),
                },
                Err(_) => return Payload::Binary(bytes.clone()),
            },
            ServerEvent::Exit => WireServerFrame::Exit,
            ServerEvent::Error { message } => WireServerFrame::Error {
                message: message.clone(),
            },
        };
        Payload::Text(serde_json::to_string(&wire).unwrap_or_default())
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Init { .. } => "init",
            ServerEvent::Ready => "ready",
            ServerEvent::Output(_) => "output",
            ServerEvent::Exit => "exit",
            ServerEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Payload {
        Payload::Text(s.to_string())
    }

    #[test]
    fn test_input_text_frame() {
        let frame = ClientFrame::Input(InputData::Text("ls\r".to_string()));
        let Payload::Text(json) = frame.encode() else {
            panic!("expected text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "input");
        assert_eq!(value["data"], "ls\r");
    }

    #[test]
    fn test_input_bytes_frame_is_binary() {
        let frame = ClientFrame::Input(InputData::Bytes(vec![0x1b, 0xff]));
        assert_eq!(frame.encode(), Payload::Binary(vec![0x1b, 0xff]));
    }

    #[test]
    fn test_resize_frame() {
        let frame = ClientFrame::Resize(Dimensions::new(40, 120));
        let Payload::Text(json) = frame.encode() else {
            panic!("expected text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "resize");
        assert_eq!(value["cols"], 120);
        assert_eq!(value["rows"], 40);
        assert!(frame.is_resize());
    }

    #[test]
    fn test_decode_init() {
        let event = ServerEvent::decode(text(r#"{"type":"init","log":"hi","closed":true}"#)).unwrap();
        assert_eq!(
            event,
            ServerEvent::Init {
                log: Some("hi".to_string()),
                closed: true
            }
        );

        let bare = ServerEvent::decode(text(r#"{"type":"init"}"#)).unwrap();
        assert_eq!(
            bare,
            ServerEvent::Init {
                log: None,
                closed: false
            }
        );
    }

    #[test]
    fn test_decode_lifecycle_events() {
        assert_eq!(
            ServerEvent::decode(text(r#"{"type":"ready"}"#)).unwrap(),
            ServerEvent::Ready
        );
        assert_eq!(
            ServerEvent::decode(text(r#"{"type":"exit"}"#)).unwrap(),
            ServerEvent::Exit
        );
        assert_eq!(
            ServerEvent::decode(text(r#"{"type":"error","message":"boom"}"#)).unwrap(),
            ServerEvent::Error {
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_decode_output_text_and_binary() {
        assert_eq!(
            ServerEvent::decode(text(r#"{"type":"output","chunk":"a\u001b[0m"}"#)).unwrap(),
            ServerEvent::Output(b"a\x1b[0m".to_vec())
        );
        assert_eq!(
            ServerEvent::decode(Payload::Binary(vec![1, 2, 3])).unwrap(),
            ServerEvent::Output(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_unrecognized_frames_are_protocol_errors() {
        for raw in ["plain text", r#"{"type":"bogus"}"#, r#"{"chunk":"x"}"#, "[]"] {
            let result = ServerEvent::decode(text(raw));
            assert!(matches!(result, Err(Error::Protocol(_))), "{raw}");
        }
    }

    #[test]
    fn test_server_encode_decodes_back() {
        let events = [
            ServerEvent::Init {
                log: Some("x".to_string()),
                closed: false,
            },
            ServerEvent::Output(vec![0xff, 0x00]),
            ServerEvent::Error {
                message: "gone".to_string(),
            },
        ];
        for event in events {
            assert_eq!(ServerEvent::decode(event.encode()).unwrap(), event);
        }
    }
}
