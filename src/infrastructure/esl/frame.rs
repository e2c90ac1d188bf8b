//! Event socket framing
//!
//! A frame is a block of `Name: value` lines ended by an empty line,
//! followed by `Content-Length` bytes of body when that header is present.

use crate::domain::shared::{FlowError, Result};
use crate::domain::switch::SwitchEvent;
use std::collections::HashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    headers: HashMap<String, String>,
    body: Option<String>,
}

impl Frame {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Text a reply frame carries: the body of `api/response`, the
    /// `Reply-Text` header of `command/reply`
    pub fn reply_text(&self) -> String {
        match self.content_type() {
            Some("command/reply") => self.header("Reply-Text").unwrap_or_default().to_string(),
            _ => self.body().unwrap_or_default().to_string(),
        }
    }
}

/// Read the next frame, `None` once the stream ends between frames
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Frame::default();

    loop {
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| FlowError::Transport(format!("read failed: {}", e)))?;

        if read == 0 {
            if frame.headers.is_empty() {
                return Ok(None);
            }
            return Err(FlowError::Transport("connection closed mid-frame".to_string()));
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            // Stray separators between frames
            if frame.headers.is_empty() {
                continue;
            }
            break;
        }

        if let Some((name, value)) = line.split_once(':') {
            frame.headers.insert(name.trim().to_string(), value.trim().to_string());
        }
    }

    if let Some(length) = frame.header("Content-Length") {
        let length: usize = length
            .parse()
            .map_err(|_| FlowError::Transport(format!("bad Content-Length: {}", length)))?;
        let mut body = vec![0u8; length];
        reader
            .read_exact(&mut body)
            .await
            .map_err(|e| FlowError::Transport(format!("read failed: {}", e)))?;
        frame.body = Some(String::from_utf8_lossy(&body).into_owned());
    }

    Ok(Some(frame))
}

/// Decode a `text/event-plain` body.
///
/// Header values are URL-encoded; an event body, if any, is kept under
/// `_body`.
pub fn parse_event(body: &str) -> SwitchEvent {
    let (head, rest) = match body.split_once("\n\n") {
        Some((head, rest)) => (head, Some(rest)),
        None => (body, None),
    };

    let mut headers = HashMap::new();
    for line in head.lines() {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            let decoded = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            headers.insert(name.trim().to_string(), decoded);
        }
    }

    if let Some(rest) = rest.filter(|r| !r.trim().is_empty()) {
        headers.insert("_body".to_string(), rest.to_string());
    }

    SwitchEvent::new(headers)
}

/// Wire form of a command
pub fn encode(command: &str) -> String {
    format!("{}\n\n", command)
}
