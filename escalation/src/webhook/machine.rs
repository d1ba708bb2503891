//! Pure transition function for a single call leg.
//!
//! Rules are evaluated in order and the first match wins. The order is what
//! tells a hangup that still carries a menu/playback phase apart from a
//! genuine mid-menu digit.

use serde::{Deserialize, Serialize};

use crate::outcome::CallOutcome;
use crate::request::KeyRequestMode;
use crate::script::ScriptKind;
use crate::webhook::event::{CallStatus, WebhookEvent};
use crate::webhook::state::CallPhase;

const KEY_ACCEPT: &str = "1";
const KEY_REFUSE: &str = "2";

/// Side effect requested by a transition, executed by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Replace the call's live script and point its status callback at the
    /// next phase.
    InstallScript(ScriptKind),
    /// End the call leg.
    HangUp,
    /// Hand the call's result back to the escalation loop.
    Report(CallOutcome),
}

/// Result of feeding one event to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: CallPhase,
    pub effects: Vec<Effect>,
    /// Which rule fired, for logs.
    pub reason: &'static str,
}

impl Transition {
    fn to(next: CallPhase, effects: Vec<Effect>, reason: &'static str) -> Self {
        Self {
            next,
            effects,
            reason,
        }
    }

    fn finish(outcome: CallOutcome, hang_up: bool, reason: &'static str) -> Self {
        let mut effects = Vec::with_capacity(2);
        if hang_up {
            effects.push(Effect::HangUp);
        }
        effects.push(Effect::Report(outcome));
        Self::to(CallPhase::Completed(outcome), effects, reason)
    }

    fn ignore(phase: CallPhase, reason: &'static str) -> Self {
        Self::to(phase, Vec::new(), reason)
    }

    /// No state change and nothing to do.
    pub fn is_noop(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn outcome(&self) -> Option<CallOutcome> {
        self.effects.iter().find_map(|e| match e {
            Effect::Report(outcome) => Some(*outcome),
            _ => None,
        })
    }

    pub fn script(&self) -> Option<ScriptKind> {
        self.effects.iter().find_map(|e| match e {
            Effect::InstallScript(kind) => Some(*kind),
            _ => None,
        })
    }

    pub fn hangs_up(&self) -> bool {
        self.effects.contains(&Effect::HangUp)
    }
}

fn menu() -> Transition {
    Transition::to(
        CallPhase::AwaitingMenuDigit,
        vec![Effect::InstallScript(ScriptKind::Menu)],
        "menu",
    )
}

fn playback(reason: &'static str) -> Transition {
    Transition::to(
        CallPhase::PlayingMessage,
        vec![Effect::InstallScript(ScriptKind::Playback)],
        reason,
    )
}

fn unanswered_outcome(status: CallStatus) -> CallOutcome {
    match status {
        CallStatus::Busy => CallOutcome::Busy,
        CallStatus::NoAnswer => CallOutcome::NoAnswer,
        CallStatus::Canceled => CallOutcome::Canceled,
        _ => CallOutcome::Failed,
    }
}

/// Decide what to do with `event` for a call in `phase`.
pub fn transition(phase: CallPhase, mode: KeyRequestMode, event: &WebhookEvent) -> Transition {
    if phase.is_terminal() {
        return Transition::ignore(phase, "call already decided");
    }

    let completed = event.is_status(CallStatus::Completed);

    if completed && phase == CallPhase::PlayingMessage {
        return Transition::finish(CallOutcome::Success, false, "hung up after playback");
    }

    if completed && phase == CallPhase::AwaitingMenuDigit {
        return Transition::finish(CallOutcome::CallRefused, false, "hung up in menu");
    }

    let menu_callback = phase == CallPhase::AwaitingMenuDigit
        && matches!(event.call_status, None | Some(CallStatus::InProgress));
    if event.digit().is_some() || menu_callback {
        return match event.digit() {
            Some(KEY_ACCEPT) => playback("accept key"),
            Some(KEY_REFUSE) if mode == KeyRequestMode::CanRefuse => {
                Transition::finish(CallOutcome::CallRefused, true, "refuse key")
            }
            _ => menu(),
        };
    }

    if event.is_machine() {
        return Transition::finish(CallOutcome::Voicemail, true, "answering machine");
    }

    if let Some(status) = event.call_status.filter(|s| s.is_unanswered()) {
        return Transition::finish(unanswered_outcome(status), false, "not answered");
    }

    if event.is_status(CallStatus::InProgress) {
        match phase {
            CallPhase::Dialing if mode.requires_key() => return menu(),
            CallPhase::Dialing => return playback("answered"),
            CallPhase::PlayingMessage => return playback("replay"),
            _ => {}
        }
    }

    Transition::ignore(phase, "unrecognised event")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(status: CallStatus) -> WebhookEvent {
        WebhookEvent::status(status).with_call_sid("CA1")
    }

    #[test]
    fn test_completed_during_playback_is_success() {
        let t = transition(
            CallPhase::PlayingMessage,
            KeyRequestMode::Read,
            &ev(CallStatus::Completed),
        );
        assert_eq!(t.next, CallPhase::Completed(CallOutcome::Success));
        assert_eq!(t.effects, vec![Effect::Report(CallOutcome::Success)]);
    }

    #[test]
    fn test_completed_during_menu_is_refusal() {
        let t = transition(
            CallPhase::AwaitingMenuDigit,
            KeyRequestMode::Read,
            &ev(CallStatus::Completed),
        );
        assert_eq!(t.outcome(), Some(CallOutcome::CallRefused));
        assert!(!t.hangs_up());
    }

    #[test]
    fn test_completion_beats_residual_digits() {
        // A hangup event that still carries the last menu digit.
        let event = ev(CallStatus::Completed).with_digits("1");
        let t = transition(CallPhase::AwaitingMenuDigit, KeyRequestMode::Read, &event);
        assert_eq!(t.outcome(), Some(CallOutcome::CallRefused));
    }

    #[test]
    fn test_key_one_plays_message_in_every_mode() {
        for mode in [
            KeyRequestMode::None,
            KeyRequestMode::Read,
            KeyRequestMode::CanRefuse,
        ] {
            let event = ev(CallStatus::InProgress).with_digits("1");
            let t = transition(CallPhase::AwaitingMenuDigit, mode, &event);
            assert_eq!(t.next, CallPhase::PlayingMessage);
            assert_eq!(t.script(), Some(ScriptKind::Playback));
        }
    }

    #[test]
    fn test_key_two_refuses_only_in_can_refuse_mode() {
        let event = ev(CallStatus::InProgress).with_digits("2");

        let t = transition(CallPhase::AwaitingMenuDigit, KeyRequestMode::CanRefuse, &event);
        assert_eq!(t.next, CallPhase::Completed(CallOutcome::CallRefused));
        assert_eq!(
            t.effects,
            vec![Effect::HangUp, Effect::Report(CallOutcome::CallRefused)]
        );

        let t = transition(CallPhase::AwaitingMenuDigit, KeyRequestMode::Read, &event);
        assert_eq!(t.next, CallPhase::AwaitingMenuDigit);
        assert_eq!(t.script(), Some(ScriptKind::Menu));
        assert_eq!(t.outcome(), None);
    }

    #[test]
    fn test_invalid_or_missing_digit_reprompts() {
        for event in [
            ev(CallStatus::InProgress).with_digits("7"),
            ev(CallStatus::InProgress),
            WebhookEvent::default(),
        ] {
            let t = transition(CallPhase::AwaitingMenuDigit, KeyRequestMode::Read, &event);
            assert_eq!(t.next, CallPhase::AwaitingMenuDigit);
            assert_eq!(t.effects, vec![Effect::InstallScript(ScriptKind::Menu)]);
        }
    }

    #[test]
    fn test_machine_answer_hangs_up_with_voicemail() {
        let event = ev(CallStatus::InProgress).with_answered_by(crate::webhook::AnsweredBy::MachineStart);
        let t = transition(CallPhase::Dialing, KeyRequestMode::Read, &event);
        assert_eq!(t.next, CallPhase::Completed(CallOutcome::Voicemail));
        assert!(t.hangs_up());
        assert_eq!(t.outcome(), Some(CallOutcome::Voicemail));
        assert_eq!(t.script(), None);
    }

    #[test]
    fn test_unanswered_statuses_report_their_status() {
        for (status, outcome) in [
            (CallStatus::Busy, CallOutcome::Busy),
            (CallStatus::NoAnswer, CallOutcome::NoAnswer),
            (CallStatus::Canceled, CallOutcome::Canceled),
            (CallStatus::Failed, CallOutcome::Failed),
        ] {
            let t = transition(CallPhase::Dialing, KeyRequestMode::None, &ev(status));
            assert_eq!(t.effects, vec![Effect::Report(outcome)]);
            assert!(!t.hangs_up());
        }
    }

    #[test]
    fn test_answer_selects_script_by_mode() {
        let answered = ev(CallStatus::InProgress);

        let t = transition(CallPhase::Dialing, KeyRequestMode::None, &answered);
        assert_eq!(t.next, CallPhase::PlayingMessage);
        assert_eq!(t.script(), Some(ScriptKind::Playback));

        for mode in [KeyRequestMode::Read, KeyRequestMode::CanRefuse] {
            let t = transition(CallPhase::Dialing, mode, &answered);
            assert_eq!(t.next, CallPhase::AwaitingMenuDigit);
            assert_eq!(t.script(), Some(ScriptKind::Menu));
        }
    }

    #[test]
    fn test_playback_redirect_replays_message() {
        let t = transition(
            CallPhase::PlayingMessage,
            KeyRequestMode::Read,
            &ev(CallStatus::InProgress),
        );
        assert_eq!(t.next, CallPhase::PlayingMessage);
        assert_eq!(t.script(), Some(ScriptKind::Playback));
    }

    #[test]
    fn test_unrecognised_events_are_noops() {
        for (phase, event) in [
            (CallPhase::Dialing, ev(CallStatus::Ringing)),
            (CallPhase::Dialing, ev(CallStatus::Completed)),
            (CallPhase::Dialing, WebhookEvent::default()),
            (CallPhase::PlayingMessage, ev(CallStatus::Unknown)),
        ] {
            let t = transition(phase, KeyRequestMode::Read, &event);
            assert!(t.is_noop(), "{phase} / {event:?} should be ignored");
            assert_eq!(t.next, phase);
        }
    }

    #[test]
    fn test_terminal_phase_absorbs_trailing_completion() {
        let phase = CallPhase::Completed(CallOutcome::CallRefused);
        let t = transition(phase, KeyRequestMode::CanRefuse, &ev(CallStatus::Completed));
        assert!(t.is_noop());
        assert_eq!(t.next, phase);
    }
}
