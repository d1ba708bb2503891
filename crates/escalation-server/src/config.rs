use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use escalation::DefaultPrompts;
use serde::Deserialize;

/// Twilio REST credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Base URL of the REST API (overridable for staging or tests).
    pub api_base: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            api_base: "https://api.twilio.com".into(),
        }
    }
}

/// Top-level server configuration.
///
/// Resolved as defaults, then the optional TOML file, then `ESCALATION_*` /
/// `TWILIO_*` environment variables, then CLI flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind_addr: String,
    /// Externally reachable base URL of this server; self-addressed hops and
    /// provider webhooks are built from it.
    pub public_url: String,
    /// Shared secret required on `/start`.
    pub api_key: String,
    pub twilio: TwilioConfig,
    pub prompts: DefaultPrompts,
    /// Timeout for every outbound HTTP request.
    pub http_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            public_url: String::new(),
            api_key: String::new(),
            twilio: TwilioConfig::default(),
            prompts: DefaultPrompts::default(),
            http_timeout_secs: 15,
        }
    }
}

impl ServerConfig {
    /// Load from an optional TOML file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_toml_str(&raw)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Override fields from environment-style lookups.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };

        set(&mut self.bind_addr, "ESCALATION_BIND_ADDR");
        set(&mut self.public_url, "ESCALATION_PUBLIC_URL");
        set(&mut self.api_key, "ESCALATION_API_KEY");
        set(&mut self.prompts.read, "ESCALATION_PROMPT_READ");
        set(&mut self.prompts.can_refuse, "ESCALATION_PROMPT_CAN_REFUSE");
        set(&mut self.twilio.account_sid, "TWILIO_ACCOUNT_SID");
        set(&mut self.twilio.auth_token, "TWILIO_AUTH_TOKEN");
        set(&mut self.twilio.api_base, "TWILIO_API_BASE");

        if let Some(secs) =
            lookup("ESCALATION_HTTP_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok())
        {
            self.http_timeout_secs = secs;
        }
    }

    /// Check that everything needed to run is present.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            bail!("API key is not configured (set ESCALATION_API_KEY)");
        }
        if self.public_url.is_empty() {
            bail!("Public URL is not configured (set ESCALATION_PUBLIC_URL)");
        }
        url::Url::parse(&self.public_url)
            .with_context(|| format!("Public URL is not a valid URL: {}", self.public_url))?;
        if self.twilio.account_sid.is_empty() || self.twilio.auth_token.is_empty() {
            bail!("Twilio credentials are not configured (set TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN)");
        }
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.public_url.trim_end_matches('/'), path)
    }

    pub fn launch_url(&self) -> String {
        self.endpoint("/call/start")
    }

    pub fn webhook_url(&self) -> String {
        self.endpoint("/call/webhook")
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn complete() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.api_key = "k".into();
        config.public_url = "https://notify.example.com/".into();
        config.twilio.account_sid = "AC1".into();
        config.twilio.auth_token = "tok".into();
        config
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.twilio.api_base, "https://api.twilio.com");
        assert_eq!(config.http_timeout(), Duration::from_secs(15));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoints_strip_trailing_slash() {
        let config = complete();
        assert_eq!(config.launch_url(), "https://notify.example.com/call/start");
        assert_eq!(
            config.webhook_url(),
            "https://notify.example.com/call/webhook"
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = ServerConfig::from_toml_str(
            r#"
            api_key = "from-file"
            public_url = "https://file.example.com"

            [twilio]
            account_sid = "ACfile"
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            ("ESCALATION_API_KEY", "from-env"),
            ("TWILIO_AUTH_TOKEN", "secret"),
            ("ESCALATION_HTTP_TIMEOUT_SECS", "3"),
            ("ESCALATION_PUBLIC_URL", ""),
        ]
        .into_iter()
        .collect();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_key, "from-env");
        assert_eq!(config.public_url, "https://file.example.com");
        assert_eq!(config.twilio.account_sid, "ACfile");
        assert_eq!(config.twilio.auth_token, "secret");
        assert_eq!(config.twilio.api_base, "https://api.twilio.com");
        assert_eq!(config.http_timeout_secs, 3);
    }

    #[test]
    fn test_load_reads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            bind_addr = "127.0.0.1:9000"

            [prompts]
            read = "Press one."
            "#
        )
        .unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.prompts.read, "Press one.");
        assert_eq!(
            config.prompts.can_refuse,
            DefaultPrompts::default().can_refuse
        );
    }

    #[test]
    fn test_invalid_public_url_fails_validation() {
        let mut config = complete();
        config.public_url = "not a url".into();
        assert!(config.validate().is_err());
    }
}
