//! Escalation loop controller.
//!
//! Each `/start` invocation makes exactly one decision: dial the next
//! candidate, or finish the run. The reduced candidate list rides along in
//! the continuation token so the next invocation picks up where this one
//! left off.

use tracing::{debug, info};
use uuid::Uuid;

use crate::continuation::ContinuationToken;
use crate::outcome::EscalationOutcome;
use crate::request::{EscalationRequest, StartCommand};

/// A run's final result and where to report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    pub run_id: Uuid,
    pub callback_url: Option<String>,
    pub outcome: EscalationOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopDecision {
    /// Place a call; the token carries the already-reduced list.
    Dial(ContinuationToken),
    /// Report and stop.
    Finish(Terminal),
}

/// Decide what a validated `/start` command leads to.
pub fn decide(command: StartCommand) -> LoopDecision {
    match command {
        StartCommand::Accepted {
            run_id,
            to,
            callback_url,
        } => {
            info!(%run_id, %to, "Escalation accepted");
            LoopDecision::Finish(Terminal {
                run_id,
                callback_url,
                outcome: EscalationOutcome::AcceptedBy(to),
            })
        }
        StartCommand::Continue { request, previous } => {
            if let Some((outcome, to)) = previous {
                info!(
                    run_id = %request.run_id,
                    to = to.as_deref().unwrap_or("-"),
                    %outcome,
                    "Previous call ended without acceptance"
                );
            }
            select_next(request)
        }
    }
}

/// Pick the next candidate from `request.numbers`, or finish when none is
/// left. Also the re-entry point after a dial could not be dispatched: the
/// list passed in has already had the failed attempt consumed.
pub fn select_next(mut request: EscalationRequest) -> LoopDecision {
    debug!(
        run_id = %request.run_id,
        numbers = %request.numbers.to_json(),
        "Escalation list"
    );

    match request.numbers.take_next() {
        Some(to) => {
            info!(
                run_id = %request.run_id,
                %to,
                remaining = request.numbers.total_attempts(),
                "Number to call"
            );
            LoopDecision::Dial(ContinuationToken::new(request, to))
        }
        None => {
            info!(run_id = %request.run_id, "Escalation list exhausted");
            LoopDecision::Finish(Terminal {
                run_id: request.run_id,
                callback_url: request.callback_url,
                outcome: EscalationOutcome::NotAccepted,
            })
        }
    }
}
