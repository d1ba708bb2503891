//! Escalation request: run configuration and the run-start parameters.
//!
//! `StartParams` is the loose, string-typed form accepted on `/start` (from
//! the requester and from internal loop re-entries alike).
//! `StartParams::validate` turns it into a typed [`StartCommand`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::candidates::CandidateList;
use crate::error::ValidationError;
use crate::outcome::CallOutcome;

/// How the callee must confirm before the message is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyRequestMode {
    /// Deliver the message as soon as a human answers.
    #[default]
    None,
    /// Press 1 to hear the message; anything else re-prompts.
    Read,
    /// Press 1 to hear the message, 2 to decline.
    CanRefuse,
}

impl KeyRequestMode {
    /// Lenient parse: unknown or absent values fall back to `None`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("read") => Self::Read,
            Some("canRefuse") => Self::CanRefuse,
            _ => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::CanRefuse => "canRefuse",
        }
    }

    pub fn requires_key(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Something the call says or plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    Text(String),
    Audio(String),
}

impl Message {
    /// Text wins when both forms are supplied.
    fn pick(text: Option<String>, audio: Option<String>) -> Option<Self> {
        text.map(Self::Text).or_else(|| audio.map(Self::Audio))
    }

    fn split(&self) -> (Option<String>, Option<String>) {
        match self {
            Self::Text(t) => (Some(t.clone()), None),
            Self::Audio(u) => (None, Some(u.clone())),
        }
    }
}

/// Text-to-speech voice options for spoken prompts and messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Voice-menu configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSettings {
    pub mode: KeyRequestMode,
    /// Custom prompt; the configured default for `mode` is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Message>,
}

/// Immutable per-run configuration, minus the shared secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRequest {
    pub run_id: Uuid,
    pub from: String,
    pub message: Message,
    pub numbers: CandidateList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub voice: VoiceSettings,
    #[serde(default)]
    pub menu: MenuSettings,
}

impl EscalationRequest {
    pub fn new(from: impl Into<String>, message: Message, numbers: CandidateList) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            from: from.into(),
            message,
            numbers,
            callback_url: None,
            voice: VoiceSettings::default(),
            menu: MenuSettings::default(),
        }
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    pub fn with_menu(mut self, mode: KeyRequestMode, prompt: Option<Message>) -> Self {
        self.menu = MenuSettings { mode, prompt };
        self
    }

    pub fn with_voice(mut self, voice: VoiceSettings) -> Self {
        self.voice = voice;
        self
    }

    /// Re-entry parameters for `/start`, reporting how the last call ended.
    pub fn to_params(&self, key: &str, loop_result: CallOutcome, to: &str) -> StartParams {
        let (text_to_say, play_file_url) = self.message.split();
        let (key_request_text_to_say, key_request_file_url) = self
            .menu
            .prompt
            .as_ref()
            .map(Message::split)
            .unwrap_or_default();

        StartParams {
            key: Some(key.to_string()),
            from: Some(self.from.clone()),
            text_to_say,
            play_file_url,
            numbers: Some(self.numbers.to_json()),
            callback_url: self.callback_url.clone(),
            loop_result: Some(loop_result.as_str().to_string()),
            to: Some(to.to_string()),
            key_requested: Some(self.menu.mode.as_str().to_string()),
            key_request_text_to_say,
            key_request_file_url,
            text_voice: self.voice.voice.clone(),
            text_language: self.voice.language.clone(),
            run_id: Some(self.run_id.to_string()),
        }
    }
}

/// Raw `/start` parameters as they arrive on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_to_say: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numbers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_requested: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_request_text_to_say: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_request_file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// What `/start` has been asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartCommand {
    /// A call leg reported success: report acceptance and stop.
    Accepted {
        run_id: Uuid,
        to: String,
        callback_url: Option<String>,
    },
    /// Pick the next candidate. `previous` is how the last call ended, if
    /// this is a re-entry.
    Continue {
        request: EscalationRequest,
        previous: Option<(CallOutcome, Option<String>)>,
    },
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Fresh id for a new run; re-entries carry theirs.
fn parse_run_id(raw: Option<String>) -> Result<Uuid, ValidationError> {
    match non_empty(raw) {
        Some(raw) => Uuid::parse_str(&raw).map_err(|_| ValidationError::MalformedRunId),
        None => Ok(Uuid::new_v4()),
    }
}

impl StartParams {
    pub fn validate(self, expected_key: &str) -> Result<StartCommand, ValidationError> {
        let key_ok = non_empty(self.key).is_some_and(|key| key == expected_key);
        let loop_result = non_empty(self.loop_result).map(|raw| {
            raw.parse::<CallOutcome>()
                .map_err(ValidationError::UnknownLoopResult)
        });
        let to = non_empty(self.to);
        let callback_url = non_empty(self.callback_url);

        if let Some(Ok(CallOutcome::Success)) = loop_result {
            if !key_ok {
                return Err(ValidationError::InvalidKey);
            }
            let to = to.ok_or(ValidationError::MissingTo)?;
            return Ok(StartCommand::Accepted {
                run_id: parse_run_id(self.run_id)?,
                to,
                callback_url,
            });
        }

        // With several problems at once, precedence is numbers, then from,
        // then message, then key.
        let numbers = non_empty(self.numbers)
            .map(|raw| CandidateList::from_json(&raw))
            .transpose()
            .map_err(ValidationError::MalformedNumbers)?
            .unwrap_or_default();
        let from = non_empty(self.from).ok_or(ValidationError::MissingFrom)?;
        let message = Message::pick(non_empty(self.text_to_say), non_empty(self.play_file_url))
            .ok_or(ValidationError::MissingMessage)?;
        if !key_ok {
            return Err(ValidationError::InvalidKey);
        }

        let loop_result = loop_result.transpose()?;
        let run_id = parse_run_id(self.run_id)?;

        let request = EscalationRequest {
            run_id,
            from,
            message,
            numbers,
            callback_url,
            voice: VoiceSettings {
                voice: non_empty(self.text_voice),
                language: non_empty(self.text_language),
            },
            menu: MenuSettings {
                mode: KeyRequestMode::parse(self.key_requested.as_deref()),
                prompt: Message::pick(
                    non_empty(self.key_request_text_to_say),
                    non_empty(self.key_request_file_url),
                ),
            },
        };

        Ok(StartCommand::Continue {
            request,
            previous: loop_result.map(|outcome| (outcome, to)),
        })
    }
}
