//! End-to-end flows through the pure core.
//!
//! Drives `/start` decisions, continuation URLs and webhook transitions the
//! way the server does, with a scripted "provider" instead of real calls.

use escalation::loop_controller::{decide, select_next};
use escalation::{
    AnsweredBy, CallOutcome, CallPhase, CallStatus, Candidate, CandidateList, ContinuationToken,
    Effect, EscalationOutcome, EscalationRequest, KeyRequestMode, LoopDecision, Message,
    SigningKey, StartCommand, StartParams, WebhookEvent,
};

const KEY: &str = "test-key";
const WEBHOOK: &str = "https://notify.example.com/call/webhook";

fn signing_key() -> SigningKey {
    SigningKey::new(KEY)
}

fn request(entries: &[(&str, u32)], mode: KeyRequestMode) -> EscalationRequest {
    EscalationRequest::new(
        "+15550000",
        Message::Text("Primary database unreachable".into()),
        CandidateList::new(
            entries
                .iter()
                .map(|(n, a)| Candidate::new(*n, *a))
                .collect(),
        ),
    )
    .with_callback_url("https://ops.example.com/escalations/42")
    .with_menu(mode, None)
}

/// Feed events for one call leg, round-tripping the token through its
/// callback URL between events. Returns the reported outcome, if any.
fn run_call(token: ContinuationToken, events: &[WebhookEvent]) -> Option<CallOutcome> {
    let mut url = token.callback_url(WEBHOOK, &signing_key()).unwrap();
    let mut reported = None;

    for event in events {
        let current = ContinuationToken::from_callback_url(&url, &signing_key()).unwrap();
        let t = escalation::transition(current.phase, current.request.menu.mode, event);
        for effect in &t.effects {
            if let Effect::Report(outcome) = effect {
                assert!(reported.is_none(), "a call leg reports at most once");
                reported = Some(*outcome);
            }
        }
        url = current.with_phase(t.next).callback_url(WEBHOOK, &signing_key()).unwrap();
    }
    reported
}

/// Re-enter `/start` the way the webhook runtime does.
fn reenter(token: &ContinuationToken, outcome: CallOutcome) -> LoopDecision {
    let params: StartParams = token.request.to_params(KEY, outcome, &token.to);
    decide(params.validate(KEY).unwrap())
}

#[test]
fn test_loop_terminates_within_total_attempts() {
    let lists: [&[(&str, u32)]; 5] = [
        &[],
        &[("A", 0)],
        &[("A", 1)],
        &[("A", 3), ("B", 0), ("C", 2)],
        &[("A", 1), ("B", 1), ("C", 1), ("D", 4)],
    ];

    for entries in lists {
        let req = request(entries, KeyRequestMode::None);
        let budget = req.numbers.total_attempts();
        let mut decision = select_next(req);
        let mut dials = 0u64;
        let mut finishes = 0;

        loop {
            match decision {
                LoopDecision::Dial(token) => {
                    dials += 1;
                    assert!(dials <= budget, "dialed more than sum(attempts)");
                    decision = reenter(&token, CallOutcome::NoAnswer);
                }
                LoopDecision::Finish(terminal) => {
                    finishes += 1;
                    assert_eq!(terminal.outcome, EscalationOutcome::NotAccepted);
                    break;
                }
            }
        }

        assert_eq!(dials, budget);
        assert_eq!(finishes, 1);
    }
}

#[test]
fn test_attempts_strictly_decrease_for_dialed_candidate() {
    let mut decision = select_next(request(&[("A", 3)], KeyRequestMode::None));
    let mut seen = Vec::new();
    while let LoopDecision::Dial(token) = decision {
        let left = token
            .request
            .numbers
            .candidates()
            .first()
            .map(|c| c.attempts)
            .unwrap_or(0);
        seen.push(left);
        decision = select_next(token.request);
    }
    assert_eq!(seen, vec![2, 1, 0]);
}

#[test]
fn test_create_failure_advances_to_next_candidate() {
    let LoopDecision::Dial(first) = select_next(request(&[("A", 1), ("B", 2)], KeyRequestMode::Read))
    else {
        panic!("expected a dial to A");
    };
    assert_eq!(first.to, "A");

    // The provider rejected the call: re-enter with call-failed.
    let LoopDecision::Dial(second) = reenter(&first, CallOutcome::CallFailed) else {
        panic!("expected a dial to B");
    };
    assert_eq!(second.to, "B");
    assert_eq!(
        second.request.numbers,
        CandidateList::new(vec![Candidate::new("B", 1)])
    );
}

#[test]
fn test_busy_then_accepted_reports_second_number() {
    let LoopDecision::Dial(first) = select_next(request(&[("A", 1), ("B", 1)], KeyRequestMode::Read))
    else {
        panic!("expected a dial");
    };

    let outcome = run_call(first.clone(), &[WebhookEvent::status(CallStatus::Busy)]);
    assert_eq!(outcome, Some(CallOutcome::Busy));

    let LoopDecision::Dial(second) = reenter(&first, CallOutcome::Busy) else {
        panic!("expected a dial to B");
    };
    assert_eq!(second.to, "B");

    let outcome = run_call(
        second.clone(),
        &[
            WebhookEvent::status(CallStatus::InProgress),
            // Menu timeout: redirect with no digit.
            WebhookEvent::status(CallStatus::InProgress),
            WebhookEvent::status(CallStatus::InProgress).with_digits("1"),
            // Playback finished once and looped.
            WebhookEvent::status(CallStatus::InProgress),
            WebhookEvent::status(CallStatus::Completed),
        ],
    );
    assert_eq!(outcome, Some(CallOutcome::Success));

    let LoopDecision::Finish(terminal) = reenter(&second, CallOutcome::Success) else {
        panic!("success must finish the run");
    };
    assert_eq!(terminal.outcome, EscalationOutcome::AcceptedBy("B".into()));
    assert_eq!(terminal.run_id, second.request.run_id);
}

#[test]
fn test_refusal_is_reported_once_despite_trailing_completion() {
    let token = ContinuationToken::new(request(&[], KeyRequestMode::CanRefuse), "A");
    let outcome = run_call(
        token,
        &[
            WebhookEvent::status(CallStatus::InProgress),
            WebhookEvent::status(CallStatus::InProgress).with_digits("2"),
            WebhookEvent::status(CallStatus::Completed),
        ],
    );
    assert_eq!(outcome, Some(CallOutcome::CallRefused));
}

#[test]
fn test_voicemail_ends_call_and_loop_moves_on() {
    let token = ContinuationToken::new(request(&[("B", 1)], KeyRequestMode::None), "A");
    let t = escalation::transition(
        CallPhase::Dialing,
        KeyRequestMode::None,
        &WebhookEvent::status(CallStatus::InProgress).with_answered_by(AnsweredBy::MachineStart),
    );
    assert!(t.hangs_up());
    assert_eq!(t.outcome(), Some(CallOutcome::Voicemail));
    // The machine itself never dials; the loop does on re-entry.
    assert!(t.effects.iter().all(|e| !matches!(e, Effect::InstallScript(_))));

    let LoopDecision::Dial(next) = reenter(&token, CallOutcome::Voicemail) else {
        panic!("expected the loop to continue");
    };
    assert_eq!(next.to, "B");
}

#[test]
fn test_none_mode_never_presents_menu() {
    let token = ContinuationToken::new(request(&[], KeyRequestMode::None), "A");
    let t = escalation::transition(
        token.phase,
        token.request.menu.mode,
        &WebhookEvent::status(CallStatus::InProgress),
    );
    assert_eq!(t.next, CallPhase::PlayingMessage);
    assert_eq!(
        t.effects,
        vec![Effect::InstallScript(escalation::ScriptKind::Playback)]
    );
}

#[test]
fn test_start_command_from_fresh_params() {
    let params = StartParams {
        key: Some(KEY.into()),
        from: Some("+15550000".into()),
        play_file_url: Some("https://cdn.example.com/alert.mp3".into()),
        numbers: Some(r#"[{"number":"A","attempts":1}]"#.into()),
        key_requested: Some("read".into()),
        ..Default::default()
    };
    let command = params.validate(KEY).unwrap();
    assert!(matches!(command, StartCommand::Continue { previous: None, .. }));
    let LoopDecision::Dial(token) = decide(command) else {
        panic!("expected a dial");
    };
    assert_eq!(token.to, "A");
    assert_eq!(token.request.menu.mode, KeyRequestMode::Read);
    assert!(token.request.numbers.is_empty());
}
