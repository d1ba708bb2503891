//! Call phase carried in the continuation token.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::outcome::CallOutcome;

/// Where a single call leg is in its flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    /// Call placed; no menu or playback installed yet.
    Dialing,
    /// Menu script installed, waiting for a key press.
    AwaitingMenuDigit,
    /// Message playback installed.
    PlayingMessage,
    /// This machine already decided the call's result.
    Completed(CallOutcome),
}

impl CallPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

impl fmt::Display for CallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dialing => write!(f, "dialing"),
            Self::AwaitingMenuDigit => write!(f, "awaiting_menu_digit"),
            Self::PlayingMessage => write!(f, "playing_message"),
            Self::Completed(outcome) => write!(f, "completed({outcome})"),
        }
    }
}
