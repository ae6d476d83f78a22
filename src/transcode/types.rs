use serde::{Deserialize, Serialize};

/// Badge held by a chat author: set id plus version id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeRef {
    pub set_id: String,
    pub version: String,
}

impl BadgeRef {
    pub fn new(set_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            set_id: set_id.into(),
            version: version.into(),
        }
    }
}

/// Destination-ready rendering of one chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    /// Badge emoji followed by the author name
    pub author_label: String,
    pub body_text: String,
}
