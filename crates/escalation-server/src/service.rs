//! Escalation runtime: executes the decisions and effects of the pure core.
//!
//! Three entry points mirror the three HTTP endpoints:
//! - [`EscalationService::start`]: loop controller (`/start`)
//! - [`EscalationService::launch`]: call launch (`/call/start`)
//! - [`EscalationService::handle_webhook`]: webhook state machine (`/call/webhook`)
//!
//! Work that outlives a request (placing a call, feeding a call's result
//! back into the loop) runs on a task tracker, so no endpoint waits on the
//! next hop before answering.

use std::sync::Arc;

use escalation::loop_controller::{self, LoopDecision};
use escalation::{
    CallOutcome, CallPhase, ContinuationToken, Effect, EscalationOutcome, ScriptBuilder,
    ScriptKind, SigningKey, StartParams, TokenError, TokenQuery, ValidationError, VoiceScript,
    WebhookEvent,
};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::dispatch::CallDispatcher;
use crate::ledger::HopLedger;
use crate::provider::{CallUpdate, OutboundCall, VoiceProvider};
use crate::reporter::StatusReporter;

/// Reply of the loop controller to a `/start` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartReply {
    /// A call to this number is being placed.
    Dialing(String),
    /// The list ran out without anyone accepting.
    LoopOver,
    /// A success marker was received and reported.
    Accepted(String),
}

/// Result of placing one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchReply {
    Placed { call_sid: String },
    /// The provider refused the call; the loop was re-entered with
    /// `call-failed`. `None` if that re-entry had already happened.
    Failed { next: Option<StartReply> },
}

pub struct EscalationService {
    api_key: String,
    webhook_url: String,
    tokens: SigningKey,
    scripts: ScriptBuilder,
    provider: Arc<dyn VoiceProvider>,
    dispatcher: Arc<dyn CallDispatcher>,
    reporter: StatusReporter,
    hops: HopLedger,
    tasks: TaskTracker,
}

impl EscalationService {
    pub fn new(
        api_key: impl Into<String>,
        webhook_url: impl Into<String>,
        scripts: ScriptBuilder,
        provider: Arc<dyn VoiceProvider>,
        dispatcher: Arc<dyn CallDispatcher>,
        reporter: StatusReporter,
    ) -> Self {
        let api_key = api_key.into();
        Self {
            tokens: SigningKey::new(&api_key),
            api_key,
            webhook_url: webhook_url.into(),
            scripts,
            provider,
            dispatcher,
            reporter,
            hops: HopLedger::default(),
            tasks: TaskTracker::new(),
        }
    }

    /// Wait for all background work started so far to finish.
    pub async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Loop controller entry point.
    pub async fn start(&self, params: StartParams) -> Result<StartReply, ValidationError> {
        let command = params.validate(&self.api_key).inspect_err(|e| {
            warn!(error = %e, "Rejected start request");
        })?;
        Ok(self.drive(loop_controller::decide(command)).await)
    }

    /// Run the loop until a call is dispatched or the run finishes.
    ///
    /// A dial the launcher certainly never received counts as a failed call:
    /// its attempt is already consumed, so selection restarts from the
    /// reduced list. A dial that may have been received is assumed to be
    /// starting; dialing past it could ring two people at once.
    async fn drive(&self, mut decision: LoopDecision) -> StartReply {
        loop {
            let token = match decision {
                LoopDecision::Finish(terminal) => {
                    self.reporter.report(&terminal).await;
                    return match terminal.outcome {
                        EscalationOutcome::AcceptedBy(to) => StartReply::Accepted(to),
                        EscalationOutcome::NotAccepted => StartReply::LoopOver,
                    };
                }
                LoopDecision::Dial(token) => token,
            };

            let run_id = token.request.run_id;
            let delivered = match token.to_query(&self.tokens) {
                Ok(query) => match self.dispatcher.launch(&query).await {
                    Ok(()) => true,
                    Err(e) if e.is_undelivered() => {
                        warn!(%run_id, to = %token.to, error = %e, "Could not dispatch call, treating as call-failed");
                        false
                    }
                    Err(e) => {
                        warn!(%run_id, to = %token.to, error = %e, "Launch unconfirmed, assuming the call is starting");
                        true
                    }
                },
                Err(e) => {
                    error!(%run_id, to = %token.to, error = %e, "Cannot sign continuation token");
                    false
                }
            };

            if delivered {
                info!(%run_id, to = %token.to, "Call starting");
                return StartReply::Dialing(token.to);
            }
            decision = loop_controller::select_next(token.request);
        }
    }

    /// Feed a call's result back into the loop, the way `/start` receives it.
    ///
    /// Each call leg re-enters at most once per instance, so a duplicated
    /// terminal webhook cannot dial the next candidate twice.
    async fn reenter(&self, token: &ContinuationToken, outcome: CallOutcome) -> Option<StartReply> {
        let run_id = token.request.run_id;
        let hop = (run_id, token.to.clone(), token.request.numbers.total_attempts());
        if !self.hops.claim(hop) {
            info!(%run_id, to = %token.to, %outcome, "Call result already fed back, skipping");
            return None;
        }

        info!(%run_id, to = %token.to, %outcome, "Sending status back to escalation loop");
        let params = token.request.to_params(&self.api_key, outcome, &token.to);
        match self.start(params).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                // Only reachable if the token itself was built inconsistently.
                error!(%run_id, error = %e, "Loop re-entry rejected");
                Some(StartReply::LoopOver)
            }
        }
    }

    fn spawn_reenter(self: &Arc<Self>, token: ContinuationToken, outcome: CallOutcome) {
        let this = Arc::clone(self);
        self.tasks.spawn(async move {
            this.reenter(&token, outcome).await;
        });
    }

    /// Call launch entry point. Verifies the token and places the call in
    /// the background; returns the number being dialed.
    pub fn launch(self: &Arc<Self>, query: &TokenQuery) -> Result<String, TokenError> {
        let token = ContinuationToken::from_query(query, &self.tokens)
            .inspect_err(|e| warn!(error = %e, "Rejected launch request"))?;
        let to = token.to.clone();
        let this = Arc::clone(self);
        self.tasks.spawn(async move {
            this.place_call(token).await;
        });
        Ok(to)
    }

    /// Place exactly one call; on failure, re-enter the loop with
    /// `call-failed`.
    pub async fn place_call(&self, token: ContinuationToken) -> LaunchReply {
        let run_id = token.request.run_id;
        let url = match token.callback_url(&self.webhook_url, &self.tokens) {
            Ok(url) => url,
            Err(e) => {
                error!(%run_id, error = %e, "Cannot build webhook URL");
                let next = self.reenter(&token, CallOutcome::CallFailed).await;
                return LaunchReply::Failed { next };
            }
        };

        let call = OutboundCall {
            to: token.to.clone(),
            from: token.request.from.clone(),
            url: url.clone(),
            status_callback: url,
        };

        match self.provider.create_call(&call).await {
            Ok(call_sid) => {
                info!(%run_id, to = %token.to, %call_sid, "Call created");
                LaunchReply::Placed { call_sid }
            }
            Err(e) => {
                warn!(%run_id, to = %token.to, error = %e, "Error while issuing the call");
                let next = self.reenter(&token, CallOutcome::CallFailed).await;
                LaunchReply::Failed { next }
            }
        }
    }

    /// Webhook entry point. Returns the script to answer the provider with.
    ///
    /// Never fails: a broken or forged token and a failed call update all
    /// end in a hang-up, since there is nothing to retry against.
    pub async fn handle_webhook(
        self: &Arc<Self>,
        query: &TokenQuery,
        event: WebhookEvent,
    ) -> VoiceScript {
        let token = match ContinuationToken::from_query(query, &self.tokens) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, call_sid = ?event.call_sid, "Undecodable webhook state, hanging up");
                return VoiceScript::hang_up();
            }
        };

        let t = escalation::transition(token.phase, token.request.menu.mode, &event);
        if t.is_noop() {
            info!(
                run_id = %token.request.run_id,
                phase = %token.phase,
                event = ?event,
                reason = t.reason,
                "Unknown case for call webhook"
            );
            return VoiceScript::empty();
        }

        info!(
            run_id = %token.request.run_id,
            to = %token.to,
            call_sid = ?event.call_sid,
            from_phase = %token.phase,
            to_phase = %t.next,
            reason = t.reason,
            "Call webhook transition"
        );

        let next = token.with_phase(t.next);
        let mut response = VoiceScript::empty();
        for effect in &t.effects {
            match effect {
                Effect::InstallScript(kind) => {
                    response = self.install(&next, *kind, event.call_sid.as_deref()).await;
                }
                Effect::HangUp => {
                    self.hang_up(&next, event.call_sid.as_deref()).await;
                    response = VoiceScript::hang_up();
                }
                Effect::Report(outcome) => self.spawn_reenter(token.clone(), *outcome),
            }
        }
        response
    }

    /// Install a script on the live call and move its status callback to
    /// the next phase.
    async fn install(
        &self,
        next: &ContinuationToken,
        kind: ScriptKind,
        call_sid: Option<&str>,
    ) -> VoiceScript {
        let url = match next.callback_url(&self.webhook_url, &self.tokens) {
            Ok(url) => url,
            Err(e) => {
                error!(run_id = %next.request.run_id, error = %e, "Cannot build webhook URL");
                return VoiceScript::hang_up();
            }
        };
        let script = self.scripts.build(kind, &next.request, &url);

        // Without a call id there is nothing to update; answer inline.
        let Some(call_sid) = call_sid else {
            debug!(run_id = %next.request.run_id, ?kind, "No CallSid, answering with script");
            return script;
        };

        let twiml = match script.to_twiml() {
            Ok(twiml) => twiml,
            Err(e) => {
                error!(run_id = %next.request.run_id, error = %e, "Cannot render script");
                return VoiceScript::hang_up();
            }
        };
        debug!(run_id = %next.request.run_id, %call_sid, %twiml, "Installing script");

        let update = CallUpdate {
            twiml,
            status_callback: url,
        };
        match self.provider.update_call(call_sid, &update).await {
            Ok(()) => VoiceScript::empty(),
            Err(e) => {
                warn!(
                    run_id = %next.request.run_id,
                    %call_sid,
                    error = %e,
                    "Call update failed, hanging up"
                );
                VoiceScript::hang_up()
            }
        }
    }

    /// Best-effort hang-up through the provider, pointing the trailing
    /// completion event at a terminal phase so it is ignored.
    async fn hang_up(&self, next: &ContinuationToken, call_sid: Option<&str>) {
        debug_assert!(matches!(next.phase, CallPhase::Completed(_)));
        let Some(call_sid) = call_sid else {
            return;
        };
        let (Ok(url), Ok(twiml)) = (
            next.callback_url(&self.webhook_url, &self.tokens),
            VoiceScript::hang_up().to_twiml(),
        ) else {
            return;
        };
        let update = CallUpdate {
            twiml,
            status_callback: url,
        };
        if let Err(e) = self.provider.update_call(call_sid, &update).await {
            debug!(%call_sid, error = %e, "Hang-up update failed; call likely already ended");
        }
    }
}
