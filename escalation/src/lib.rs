//! Phone-call escalation core.
//!
//! Calls an ordered list of candidates one at a time until someone accepts
//! a message, then reports who did. Everything in this crate is pure: the
//! server crate feeds it webhook events and `/start` parameters and
//! executes the effects it returns.
//!
//! # Flow
//!
//! ```text
//! /start ──▶ loop_controller::decide ──▶ Dial(token) ──▶ provider places call
//!    ▲                │                                       │
//!    │                └──▶ Finish(outcome) ──▶ status callback │
//!    │                                                         ▼
//!    └──── loopResult ◀── Report(outcome) ◀── webhook::transition(phase, event)
//! ```

pub mod candidates;
pub mod continuation;
pub mod error;
pub mod loop_controller;
pub mod outcome;
pub mod request;
pub mod script;
pub mod webhook;

pub use candidates::{Candidate, CandidateList};
pub use continuation::{ContinuationToken, SigningKey, TokenQuery, TOKEN_VERSION};
pub use error::{CandidateError, ScriptError, TokenError, ValidationError};
pub use loop_controller::{LoopDecision, Terminal};
pub use outcome::{CallOutcome, EscalationOutcome, StatusPayload};
pub use request::{
    EscalationRequest, KeyRequestMode, MenuSettings, Message, StartCommand, StartParams,
    VoiceSettings,
};
pub use script::{DefaultPrompts, ScriptBuilder, ScriptKind, Verb, VoiceScript};
pub use webhook::{transition, AnsweredBy, CallPhase, CallStatus, Effect, Transition, WebhookEvent};
