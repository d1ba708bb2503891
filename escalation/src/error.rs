//! Error types for the escalation core.
//!
//! Validation failures are the only errors surfaced to the caller
//! (as a client error). Token and script errors stay inside the webhook
//! runtime, which absorbs them by hanging up.

use thiserror::Error;

/// Rejection of a run-start request. No dialing happens after one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid key")]
    InvalidKey,

    #[error("Missing parameter: textToSay or playFileUrl")]
    MissingMessage,

    #[error("Missing parameter: from")]
    MissingFrom,

    #[error("Missing parameter: to")]
    MissingTo,

    #[error("Incorrectly formatted parameter: numbers")]
    MalformedNumbers(#[source] CandidateError),

    #[error("Incorrectly formatted parameter: runId")]
    MalformedRunId,

    #[error("Unknown loopResult: {0}")]
    UnknownLoopResult(String),
}

/// The candidate list could not be parsed from its JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("candidate list is not a JSON array of {{number, attempts}}: {0}")]
pub struct CandidateError(pub String);

/// Continuation token could not be signed, verified or decoded.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("unsupported continuation token version {0}")]
    UnsupportedVersion(u8),

    #[error("continuation token signature is missing or does not match")]
    BadSignature,

    #[error("continuation signing key rejected")]
    SigningKey,

    #[error("continuation token is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid webhook base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

/// A voice script could not be rendered to markup.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to render voice script: {0}")]
    Render(String),

    #[error("rendered voice script is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}
