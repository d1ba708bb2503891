//! Telephony provider client.
//!
//! The runtime only needs two capabilities: place an outbound call and
//! replace a live call's script. `TwilioProvider` implements both against
//! the Twilio REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TwilioConfig;

/// Errors from the voice provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Parameters of one outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCall {
    pub to: String,
    pub from: String,
    /// Fetched by the provider when the call is answered.
    pub url: String,
    /// Receives terminal status changes.
    pub status_callback: String,
}

/// New instructions for a live call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallUpdate {
    pub twiml: String,
    pub status_callback: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Place a call with answering-machine detection. Returns the call id.
    async fn create_call(&self, call: &OutboundCall) -> Result<String, ProviderError>;

    /// Replace the live script and status callback of `call_sid`.
    async fn update_call(&self, call_sid: &str, update: &CallUpdate) -> Result<(), ProviderError>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateCallForm<'a> {
    to: &'a str,
    from: &'a str,
    url: &'a str,
    status_callback: &'a str,
    machine_detection: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateCallForm<'a> {
    twiml: &'a str,
    status_callback: &'a str,
}

#[derive(Deserialize)]
struct CallResource {
    sid: String,
}

/// Twilio REST implementation.
pub struct TwilioProvider {
    client: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
}

impl TwilioProvider {
    pub fn new(config: &TwilioConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls",
            self.api_base, self.account_sid
        )
    }

    async fn post_form<T: Serialize + ?Sized>(
        &self,
        url: &str,
        form: &T,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl VoiceProvider for TwilioProvider {
    async fn create_call(&self, call: &OutboundCall) -> Result<String, ProviderError> {
        let form = CreateCallForm {
            to: &call.to,
            from: &call.from,
            url: &call.url,
            status_callback: &call.status_callback,
            machine_detection: "Enable",
        };
        let url = format!("{}.json", self.calls_url());
        let resource: CallResource = self.post_form(&url, &form).await?.json().await?;
        Ok(resource.sid)
    }

    async fn update_call(&self, call_sid: &str, update: &CallUpdate) -> Result<(), ProviderError> {
        let form = UpdateCallForm {
            twiml: &update.twiml,
            status_callback: &update.status_callback,
        };
        let url = format!("{}/{}.json", self.calls_url(), call_sid);
        self.post_form(&url, &form).await?;
        Ok(())
    }
}
