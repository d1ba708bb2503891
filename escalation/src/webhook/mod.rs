//! Call-webhook state machine.
//!
//! ```text
//! Dialing ──in-progress──▶ AwaitingMenuDigit ──"1"──▶ PlayingMessage
//!    │   (none mode) ─────────────────────────────────▶   │
//!    │                         │  other / no digit: loop  │ redirect: replay
//!    │                         │                          │
//!    ├─ machine_start ──▶ Completed(voicemail)            │
//!    ├─ busy/no-answer/canceled/failed ──▶ Completed      │
//!    │                   "2" (canRefuse) ──▶ Completed(call-refused)
//!    │                   completed ──▶ Completed(call-refused)
//!    │                                          completed ──▶ Completed(success)
//! ```
//!
//! [`transition`] is pure: it returns the next phase and a list of effects
//! for the server runtime to execute.

pub mod event;
pub mod machine;
pub mod state;

pub use event::{AnsweredBy, CallStatus, WebhookEvent};
pub use machine::{transition, Effect, Transition};
pub use state::CallPhase;
