use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message as seen by the predictors: its raw header block and when it
/// arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub headers: String,
    pub date: DateTime<Utc>,
}

impl MailMessage {
    pub fn new(headers: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            headers: headers.into(),
            date,
        }
    }
}

/// A mailbox and every message it currently holds, used to (re)initialize a
/// predictor's model for that mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mailbox {
    pub qualified_name: String,
    #[serde(default)]
    pub messages: Vec<MailMessage>,
}

impl Mailbox {
    pub fn new(qualified_name: impl Into<String>, messages: Vec<MailMessage>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            messages,
        }
    }

    pub fn is_inbox(&self) -> bool {
        self.qualified_name.eq_ignore_ascii_case("INBOX")
    }

    pub fn header_blocks(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(|message| message.headers.as_str())
    }

    /// Arrival time of the newest message, if any.
    pub fn synced_to(&self) -> Option<DateTime<Utc>> {
        self.messages.iter().map(|message| message.date).max()
    }
}
