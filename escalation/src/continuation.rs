//! Continuation token: the only state carried between webhook round-trips.
//!
//! No handler keeps memory between invocations, so everything the next
//! event needs travels in the callback URL as
//! `?v=<version>&state=<json>&sig=<hmac>`. The shared secret is never part
//! of the token; it only keys the HMAC, so a token that did not come from
//! this server is rejected before its state is looked at.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use url::Url;

use crate::error::TokenError;
use crate::request::EscalationRequest;
use crate::webhook::CallPhase;

/// Current token schema version. Bump when a field changes meaning.
pub const TOKEN_VERSION: u8 = 1;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 key for continuation tokens.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self(secret.as_ref().to_vec())
    }

    fn mac(&self, v: u8, state: &str) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.0).map_err(|_| TokenError::SigningKey)?;
        mac.update(&[v]);
        mac.update(state.as_bytes());
        Ok(mac)
    }

    fn sign(&self, v: u8, state: &str) -> Result<String, TokenError> {
        Ok(hex::encode(self.mac(v, state)?.finalize().into_bytes()))
    }

    fn verify(&self, v: u8, state: &str, sig: &str) -> Result<(), TokenError> {
        let sig = hex::decode(sig).map_err(|_| TokenError::BadSignature)?;
        self.mac(v, state)?
            .verify_slice(&sig)
            .map_err(|_| TokenError::BadSignature)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// State of one in-flight call attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken {
    pub request: EscalationRequest,
    /// Number dialed for this call leg.
    pub to: String,
    pub phase: CallPhase,
}

/// Wire form of a token: webhook query string, or the `/call/start` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenQuery {
    pub v: u8,
    pub state: String,
    #[serde(default)]
    pub sig: String,
}

impl ContinuationToken {
    pub fn new(request: EscalationRequest, to: impl Into<String>) -> Self {
        Self {
            request,
            to: to.into(),
            phase: CallPhase::Dialing,
        }
    }

    /// Same call, moved to another phase.
    pub fn with_phase(&self, phase: CallPhase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }

    pub fn to_query(&self, key: &SigningKey) -> Result<TokenQuery, TokenError> {
        let state = serde_json::to_string(self)?;
        let sig = key.sign(TOKEN_VERSION, &state)?;
        Ok(TokenQuery {
            v: TOKEN_VERSION,
            state,
            sig,
        })
    }

    pub fn from_query(query: &TokenQuery, key: &SigningKey) -> Result<Self, TokenError> {
        if query.v != TOKEN_VERSION {
            return Err(TokenError::UnsupportedVersion(query.v));
        }
        key.verify(query.v, &query.state, &query.sig)?;
        Ok(serde_json::from_str(&query.state)?)
    }

    /// Webhook URL carrying this token, e.g.
    /// `https://host/call/webhook?v=1&state=...&sig=...`.
    pub fn callback_url(
        &self,
        webhook_base: &str,
        key: &SigningKey,
    ) -> Result<String, TokenError> {
        let query = self.to_query(key)?;
        let mut url = Url::parse(webhook_base)?;
        url.query_pairs_mut()
            .append_pair("v", &query.v.to_string())
            .append_pair("state", &query.state)
            .append_pair("sig", &query.sig);
        Ok(url.into())
    }

    /// Inverse of [`Self::callback_url`].
    pub fn from_callback_url(url: &str, key: &SigningKey) -> Result<Self, TokenError> {
        let url = Url::parse(url)?;
        let mut query = TokenQuery {
            v: 0,
            state: String::new(),
            sig: String::new(),
        };
        for (k, value) in url.query_pairs() {
            match k.as_ref() {
                "v" => query.v = value.parse::<u8>().unwrap_or(0),
                "state" => query.state = value.into_owned(),
                "sig" => query.sig = value.into_owned(),
                _ => {}
            }
        }
        Self::from_query(&query, key)
    }
}
