//! Voice-menu script builder.
//!
//! Scripts are declarative call-flow documents installed on a live call.
//! Both shapes end by redirecting to the webhook URL they were built with,
//! so whatever happens on the call (digit, timeout, end of playback) comes
//! back to the state machine carrying the same continuation token.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};

use crate::error::ScriptError;
use crate::request::{EscalationRequest, KeyRequestMode, Message, VoiceSettings};

/// How long the menu waits for a key press.
pub const MENU_TIMEOUT_SECS: u32 = 5;
/// The menu collects exactly one key.
pub const MENU_NUM_DIGITS: u32 = 1;

/// Prompts used when the request carries no custom menu prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultPrompts {
    pub read: String,
    pub can_refuse: String,
}

impl Default for DefaultPrompts {
    fn default() -> Self {
        Self {
            read: "You have a new message. Press 1 to listen to it.".to_string(),
            can_refuse: "You have a new message. Press 1 to listen to it, or press 2 to decline."
                .to_string(),
        }
    }
}

impl DefaultPrompts {
    pub fn for_mode(&self, mode: KeyRequestMode) -> &str {
        match mode {
            KeyRequestMode::CanRefuse => &self.can_refuse,
            KeyRequestMode::Read | KeyRequestMode::None => &self.read,
        }
    }
}

/// A single instruction in a voice script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Say { text: String, voice: VoiceSettings },
    Play { url: String },
    Gather {
        action: String,
        timeout_secs: u32,
        num_digits: u32,
        prompt: Box<Verb>,
    },
    Redirect { url: String },
    Hangup,
}

impl Verb {
    fn speak(message: &Message, voice: &VoiceSettings) -> Self {
        match message {
            Message::Text(text) => Self::Say {
                text: text.clone(),
                voice: voice.clone(),
            },
            Message::Audio(url) => Self::Play { url: url.clone() },
        }
    }
}

/// An ordered list of verbs, rendered as TwiML.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceScript {
    verbs: Vec<Verb>,
}

/// Which script the state machine wants installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    Menu,
    Playback,
}

/// Pure builder from request settings to scripts.
#[derive(Debug, Clone, Default)]
pub struct ScriptBuilder {
    prompts: DefaultPrompts,
}

impl ScriptBuilder {
    pub fn new(prompts: DefaultPrompts) -> Self {
        Self { prompts }
    }

    pub fn build(&self, kind: ScriptKind, request: &EscalationRequest, url: &str) -> VoiceScript {
        match kind {
            ScriptKind::Menu => self.menu(request, url),
            ScriptKind::Playback => self.playback(request, url),
        }
    }

    /// Prompt for one key, then loop back to `url` whatever happened.
    pub fn menu(&self, request: &EscalationRequest, url: &str) -> VoiceScript {
        let prompt = match &request.menu.prompt {
            Some(custom) => Verb::speak(custom, &request.voice),
            // Default prompts are spoken with the provider's default voice.
            None => Verb::Say {
                text: self.prompts.for_mode(request.menu.mode).to_string(),
                voice: VoiceSettings::default(),
            },
        };

        VoiceScript {
            verbs: vec![
                Verb::Gather {
                    action: url.to_string(),
                    timeout_secs: MENU_TIMEOUT_SECS,
                    num_digits: MENU_NUM_DIGITS,
                    prompt: Box::new(prompt),
                },
                Verb::Redirect {
                    url: url.to_string(),
                },
            ],
        }
    }

    /// Deliver the message once, then loop back to `url`.
    pub fn playback(&self, request: &EscalationRequest, url: &str) -> VoiceScript {
        VoiceScript {
            verbs: vec![
                Verb::speak(&request.message, &request.voice),
                Verb::Redirect {
                    url: url.to_string(),
                },
            ],
        }
    }
}

fn render_err(e: impl std::fmt::Display) -> ScriptError {
    ScriptError::Render(e.to_string())
}

impl VoiceScript {
    pub fn hang_up() -> Self {
        Self {
            verbs: vec![Verb::Hangup],
        }
    }

    /// A script that does nothing; the call keeps its current instructions.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    pub fn to_twiml(&self) -> Result<String, ScriptError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(render_err)?;

        if self.verbs.is_empty() {
            writer
                .write_event(Event::Empty(BytesStart::new("Response")))
                .map_err(render_err)?;
        } else {
            writer
                .write_event(Event::Start(BytesStart::new("Response")))
                .map_err(render_err)?;
            for verb in &self.verbs {
                write_verb(&mut writer, verb)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("Response")))
                .map_err(render_err)?;
        }

        Ok(String::from_utf8(writer.into_inner())?)
    }
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    start: BytesStart<'_>,
    text: &str,
) -> Result<(), ScriptError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    writer.write_event(Event::Start(start)).map_err(render_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(render_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(render_err)?;
    Ok(())
}

fn write_verb(writer: &mut Writer<Vec<u8>>, verb: &Verb) -> Result<(), ScriptError> {
    match verb {
        Verb::Say { text, voice } => {
            let mut start = BytesStart::new("Say");
            if let Some(v) = &voice.voice {
                start.push_attribute(("voice", v.as_str()));
            }
            if let Some(lang) = &voice.language {
                start.push_attribute(("language", lang.as_str()));
            }
            write_text_element(writer, start, text)
        }
        Verb::Play { url } => write_text_element(writer, BytesStart::new("Play"), url),
        Verb::Redirect { url } => {
            let mut start = BytesStart::new("Redirect");
            start.push_attribute(("method", "POST"));
            write_text_element(writer, start, url)
        }
        Verb::Gather {
            action,
            timeout_secs,
            num_digits,
            prompt,
        } => {
            let timeout = timeout_secs.to_string();
            let digits = num_digits.to_string();
            let mut start = BytesStart::new("Gather");
            start.push_attribute(("input", "dtmf"));
            start.push_attribute(("timeout", timeout.as_str()));
            start.push_attribute(("numDigits", digits.as_str()));
            start.push_attribute(("action", action.as_str()));
            start.push_attribute(("method", "POST"));
            writer.write_event(Event::Start(start)).map_err(render_err)?;
            write_verb(writer, prompt)?;
            writer
                .write_event(Event::End(BytesEnd::new("Gather")))
                .map_err(render_err)?;
            Ok(())
        }
        Verb::Hangup => {
            writer
                .write_event(Event::Empty(BytesStart::new("Hangup")))
                .map_err(render_err)?;
            Ok(())
        }
    }
}
