//! Candidate list: the ordered escalation ladder of phone numbers.
//!
//! The list travels between stateless handlers as a JSON array, so its
//! order is the dial priority and must survive every round-trip.

use serde::{Deserialize, Serialize};

use crate::error::CandidateError;

fn default_attempts() -> u32 {
    1
}

/// One phone number with the dial attempts it has left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub number: String,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

impl Candidate {
    pub fn new(number: impl Into<String>, attempts: u32) -> Self {
        Self {
            number: number.into(),
            attempts,
        }
    }
}

/// Ordered sequence of candidates, highest priority first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateList(Vec<Candidate>);

impl CandidateList {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self(candidates)
    }

    /// Parse the `numbers` parameter (a JSON array).
    pub fn from_json(raw: &str) -> Result<Self, CandidateError> {
        serde_json::from_str(raw).map_err(|e| CandidateError(e.to_string()))
    }

    /// Serialize back to the `numbers` parameter form.
    pub fn to_json(&self) -> String {
        // A Vec of plain string/integer structs cannot fail to serialize.
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.0
    }

    /// Upper bound on the number of dials left in this list.
    pub fn total_attempts(&self) -> u64 {
        self.0.iter().map(|c| u64::from(c.attempts)).sum()
    }

    /// Pick the next number to dial and consume one of its attempts.
    ///
    /// Leading entries with no attempts left are dropped first. The chosen
    /// entry is removed once its last attempt is consumed, so the returned
    /// list state is exactly what the next hop should carry.
    pub fn take_next(&mut self) -> Option<String> {
        while self.0.first().is_some_and(|c| c.attempts == 0) {
            self.0.remove(0);
        }

        let head = self.0.first_mut()?;
        let number = head.number.clone();
        head.attempts -= 1;
        if head.attempts == 0 {
            self.0.remove(0);
        }
        Some(number)
    }
}

impl From<Vec<Candidate>> for CandidateList {
    fn from(candidates: Vec<Candidate>) -> Self {
        Self(candidates)
    }
}
