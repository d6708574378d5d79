use serde::{Deserialize, Serialize};

/// One block of a structured chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum Block {
    /// A markdown paragraph.
    Section(String),
    Divider,
    /// Small print under the preceding section.
    Context(String),
}

/// Message handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Plain-text fallback for clients that do not render blocks.
    pub text: String,
    pub blocks: Vec<Block>,
}

/// Acknowledgement from the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub channel: String,
    /// Sink-side message id (Slack `ts`).
    pub message_id: String,
}
