//! Call-level and run-level outcomes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Result of a single call leg, handed back to the loop as `loopResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallOutcome {
    /// The callee listened to the message through to hangup.
    Success,
    /// The callee declined or hung up while the menu was playing.
    CallRefused,
    /// An answering machine picked up.
    Voicemail,
    Busy,
    NoAnswer,
    Canceled,
    /// The provider reported the call leg as failed.
    Failed,
    /// The provider refused to create the call at all.
    CallFailed,
}

impl CallOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::CallRefused => "call-refused",
            Self::Voicemail => "voicemail",
            Self::Busy => "busy",
            Self::NoAnswer => "no-answer",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
            Self::CallFailed => "call-failed",
        }
    }

    /// Whether this call leg ends the whole escalation run.
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "call-refused" => Ok(Self::CallRefused),
            "voicemail" => Ok(Self::Voicemail),
            "busy" => Ok(Self::Busy),
            "no-answer" => Ok(Self::NoAnswer),
            "canceled" => Ok(Self::Canceled),
            "failed" => Ok(Self::Failed),
            "call-failed" => Ok(Self::CallFailed),
            other => Err(other.to_string()),
        }
    }
}

/// Terminal result of an escalation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationOutcome {
    AcceptedBy(String),
    NotAccepted,
}

impl EscalationOutcome {
    pub fn accepted_by(&self) -> Option<&str> {
        match self {
            Self::AcceptedBy(number) => Some(number),
            Self::NotAccepted => None,
        }
    }

    /// Body posted to the requester's `callbackUrl`.
    pub fn status_payload(&self) -> StatusPayload {
        StatusPayload {
            call_accepted: self.accepted_by().is_some(),
            call_accepted_by: self.accepted_by().map(str::to_string),
        }
    }
}

impl fmt::Display for EscalationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcceptedBy(number) => write!(f, "accepted by {number}"),
            Self::NotAccepted => write!(f, "not accepted"),
        }
    }
}

/// Status callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub call_accepted: bool,
    pub call_accepted_by: Option<String>,
}
