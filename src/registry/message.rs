//! Relayed message type

use std::borrow::Cow;

use bytes::Bytes;

use super::peer::ConnectionId;

/// One chat message on its way through the relay
///
/// Cheap to clone: all recipients share the payload allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Connection the message arrived on; excluded from its own broadcast
    pub origin: ConnectionId,
    /// Frame payload, forwarded verbatim
    pub payload: Bytes,
}

impl Message {
    pub fn new(origin: ConnectionId, payload: Bytes) -> Self {
        Self { origin, payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload as text, replacing invalid UTF-8 for display
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_lossy() {
        let msg = Message::new(ConnectionId(1), Bytes::from_static(b"hi \xff"));
        assert_eq!(msg.text(), "hi \u{fffd}");
        assert_eq!(msg.len(), 4);
    }

    #[test]
    fn test_clone_shares_payload() {
        let msg = Message::new(ConnectionId(1), Bytes::from(vec![1u8, 2, 3]));
        let copy = msg.clone();
        assert_eq!(msg.payload.as_ptr(), copy.payload.as_ptr());
    }
}
