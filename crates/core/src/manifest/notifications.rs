use serde::{Deserialize, Serialize};

/// Slack notification settings of a leaf task.
///
/// Tasks hold an `Option<Notifications>`: `None` means the author never set
/// the block, which is what the defaulting pass keys on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notifications {
    /// Channels notified when the task succeeds
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub on_success: Vec<String>,

    /// Message sent on success
    #[serde(skip_serializing_if = "String::is_empty")]
    pub on_success_message: String,

    /// Channels notified when the task fails
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub on_failure: Vec<String>,

    /// Message sent on failure
    #[serde(skip_serializing_if = "String::is_empty")]
    pub on_failure_message: String,
}

impl Notifications {
    /// Whether any channel is configured
    #[must_use]
    pub fn is_defined(&self) -> bool {
        !self.on_success.is_empty() || !self.on_failure.is_empty()
    }

    /// Success message or the fallback when blank
    #[must_use]
    pub fn success_message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.on_success_message.is_empty() {
            fallback
        } else {
            &self.on_success_message
        }
    }

    /// Failure message or the fallback when blank
    #[must_use]
    pub fn failure_message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.on_failure_message.is_empty() {
            fallback
        } else {
            &self.on_failure_message
        }
    }
}
