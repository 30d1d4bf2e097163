//! Conversation history types

use serde::{Deserialize, Serialize};

/// A single user/assistant exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// What the user asked
    pub user_message: String,
    /// What the assistant answered
    pub assistant_message: String,
}

impl ConversationTurn {
    /// Create a new turn
    pub fn new(user_message: impl Into<String>, assistant_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            assistant_message: assistant_message.into(),
        }
    }
}
