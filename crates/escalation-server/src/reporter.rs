//! Status reporter: tells the requester how the run ended.
//!
//! Delivery is best-effort. A failed POST is logged and never retried; the
//! outcome it carried stands regardless.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use escalation::{StatusPayload, Terminal};
use thiserror::Error;
use tracing::{info, warn};

use crate::ledger::ReportLedger;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("status callback request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("status callback answered {status}")]
    Rejected { status: u16 },
}

/// Transport for the status callback.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn deliver(&self, url: &str, payload: &StatusPayload) -> Result<(), ReportError>;
}

/// POSTs the payload as JSON.
pub struct HttpStatusSink {
    client: reqwest::Client,
}

impl HttpStatusSink {
    pub fn new(timeout: Duration) -> Result<Self, ReportError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl StatusSink for HttpStatusSink {
    async fn deliver(&self, url: &str, payload: &StatusPayload) -> Result<(), ReportError> {
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(ReportError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// What happened to a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDisposition {
    Delivered,
    /// Delivery failed; logged and dropped.
    Failed,
    /// The run has no `callbackUrl`.
    NoCallback,
    /// This run was already reported by this instance.
    Duplicate,
}

pub struct StatusReporter {
    sink: Arc<dyn StatusSink>,
    ledger: ReportLedger,
}

impl StatusReporter {
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self {
            sink,
            ledger: ReportLedger::default(),
        }
    }

    pub async fn report(&self, terminal: &Terminal) -> ReportDisposition {
        let run_id = terminal.run_id;

        if !self.ledger.claim(run_id) {
            warn!(%run_id, outcome = %terminal.outcome, "Outcome already reported, skipping");
            return ReportDisposition::Duplicate;
        }

        let Some(url) = terminal.callback_url.as_deref() else {
            info!(%run_id, outcome = %terminal.outcome, "No callback URL, outcome not sent");
            return ReportDisposition::NoCallback;
        };

        match self
            .sink
            .deliver(url, &terminal.outcome.status_payload())
            .await
        {
            Ok(()) => {
                info!(%run_id, %url, outcome = %terminal.outcome, "Feedback sent");
                ReportDisposition::Delivered
            }
            Err(e) => {
                warn!(%run_id, %url, error = %e, "Error in feedback");
                ReportDisposition::Failed
            }
        }
    }
}
