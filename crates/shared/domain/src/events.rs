//! Events shared between slices over the in-process bus.

use serde::{Deserialize, Serialize};

/// Something worth telling every connected notifications socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    pub message: String,
}

impl Notification {
    pub fn new(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self { topic: topic.into(), message: message.into() }
    }
}
