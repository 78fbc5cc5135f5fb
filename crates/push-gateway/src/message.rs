//! Push message types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Android delivery hints, static per deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndroidHints {
    pub channel_id: String,
    pub priority: String,
    pub default_sound: bool,
}

impl Default for AndroidHints {
    fn default() -> Self {
        Self {
            channel_id: "atelier_weekly".to_string(),
            priority: "high".to_string(),
            default_sound: true,
        }
    }
}

/// iOS delivery hints, static per deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApnsHints {
    pub sound: String,
    pub badge: u32,
}

impl Default for ApnsHints {
    fn default() -> Self {
        Self {
            sound: "default".to_string(),
            badge: 1,
        }
    }
}

/// A push message addressed to one device token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Opaque device token.
    pub token: String,
    pub title: String,
    pub body: String,
    /// Free-form key/value payload delivered alongside the notification.
    #[serde(default)]
    pub data: HashMap<String, String>,
    #[serde(default)]
    pub android: AndroidHints,
    #[serde(default)]
    pub apns: ApnsHints,
}

impl PushMessage {
    /// Build a message with deployment-default platform hints.
    pub fn new(token: &str, title: &str, body: &str) -> Self {
        Self {
            token: token.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            data: HashMap::new(),
            android: AndroidHints::default(),
            apns: ApnsHints::default(),
        }
    }

    /// Attach a data payload entry.
    pub fn with_data(mut self, key: &str, value: &str) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }
}
