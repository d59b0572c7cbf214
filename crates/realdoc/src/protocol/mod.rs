use serde::{Deserialize, Serialize};

/// Messages sent from client to server
///
/// The wire format is a JSON text frame with a `type` tag. Only
/// `content_update` is acted upon; anything else deserializes into
/// [`ClientMessage::Unknown`] and is ignored by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A peer replaced the document content
    ContentUpdate { content: String },
    /// Any message kind this server does not understand; ignored, never an error
    #[serde(other)]
    Unknown,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The document content changed; carries the full replacement text
    ContentUpdate { content: String },
}

/// Encode a message as a JSON text frame
pub fn encode_message<T: Serialize>(message: &T) -> crate::RealdocResult<String> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a message from a JSON text frame
pub fn decode_message<T: for<'de> Deserialize<'de>>(data: &str) -> crate::RealdocResult<T> {
    Ok(serde_json::from_str(data)?)
}
