//! Inbound telephony events, as posted by the provider to the webhook.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Provider call status. Unrecognised values deserialize to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Queued,
    Ringing,
    InProgress,
    Completed,
    Busy,
    NoAnswer,
    Canceled,
    Failed,
    #[serde(other)]
    Unknown,
}

impl CallStatus {
    /// Statuses that mean the call ended without ever being answered.
    pub fn is_unanswered(self) -> bool {
        matches!(
            self,
            Self::Busy | Self::NoAnswer | Self::Canceled | Self::Failed
        )
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Ringing => "ringing",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Busy => "busy",
            Self::NoAnswer => "no-answer",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Answering-machine detection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnsweredBy {
    Human,
    MachineStart,
    Fax,
    #[serde(other)]
    Other,
}

/// One webhook delivery. Every field is optional: status callbacks, menu
/// actions and redirects each carry a different subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebhookEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_status: Option<CallStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered_by: Option<AnsweredBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<String>,
}

impl WebhookEvent {
    pub fn status(status: CallStatus) -> Self {
        Self {
            call_status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_call_sid(mut self, sid: impl Into<String>) -> Self {
        self.call_sid = Some(sid.into());
        self
    }

    pub fn with_digits(mut self, digits: impl Into<String>) -> Self {
        self.digits = Some(digits.into());
        self
    }

    pub fn with_answered_by(mut self, answered_by: AnsweredBy) -> Self {
        self.answered_by = Some(answered_by);
        self
    }

    /// The pressed key, ignoring an empty `Digits` field.
    pub fn digit(&self) -> Option<&str> {
        self.digits.as_deref().filter(|d| !d.is_empty())
    }

    pub fn is_status(&self, status: CallStatus) -> bool {
        self.call_status == Some(status)
    }

    pub fn is_machine(&self) -> bool {
        self.answered_by == Some(AnsweredBy::MachineStart)
    }
}
