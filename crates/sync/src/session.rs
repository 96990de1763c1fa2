//! One reviewer's view of one campaign: the live campaign slot, pending
//! decisions, and the poller that keeps the slot in step with the backend.

use std::sync::Arc;
use std::time::Duration;

use outreach_core::{
    ApprovalSubmission, AppConfig, Campaign, CampaignStartRequest, Channel, OutreachError,
    OutreachResult, Stage, StageInfo, StagePipeline,
};
use outreach_review::{
    can_force_complete, force_complete, parse_decision_token, start_campaign, ApprovalController,
    CampaignInputs, Decision,
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::client::CampaignBackend;
use crate::poller::{CampaignCell, PollState, PollingSynchronizer};

/// Result of handing a decision batch to the backend.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Accepted; polling now follows the backend's execution.
    Submitted,
    /// Rejected or unreachable. Local edits are kept and polling is not started.
    Failed(OutreachError),
    /// Nothing was decided, so nothing was sent.
    NothingToSubmit,
}

impl SubmitOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted)
    }
}

pub struct CampaignSession {
    backend: Arc<dyn CampaignBackend>,
    campaign: CampaignCell,
    controller: ApprovalController,
    poller: PollingSynchronizer,
}

impl CampaignSession {
    pub fn new(backend: Arc<dyn CampaignBackend>, config: &AppConfig) -> OutreachResult<Self> {
        let controller = ApprovalController::from_config(&config.review)?;
        Ok(Self::with_controller(
            backend,
            config.polling.interval(),
            controller,
        ))
    }

    pub fn with_controller(
        backend: Arc<dyn CampaignBackend>,
        poll_interval: Duration,
        controller: ApprovalController,
    ) -> Self {
        let (tx, _rx) = watch::channel(None);
        let campaign = Arc::new(tx);
        let poller = PollingSynchronizer::new(Arc::clone(&backend), Arc::clone(&campaign), poll_interval);
        Self {
            backend,
            campaign,
            controller,
            poller,
        }
    }

    // -- Starting -----------------------------------------------------------

    /// Start a local campaign that is already waiting for review. Any running
    /// poll is stopped first so it cannot overwrite the new campaign.
    pub fn start_demo(&mut self, inputs: &CampaignInputs) -> OutreachResult<Campaign> {
        self.reset();
        let range = self.controller.score_range();
        let campaign = start_campaign(inputs, self.controller.sampler_mut(), range)?;
        self.campaign.send_replace(Some(campaign.clone()));
        Ok(campaign)
    }

    /// Create the campaign on the backend and follow it until it needs review
    /// or finishes.
    pub async fn start_remote(&mut self, request: &CampaignStartRequest) -> OutreachResult<Campaign> {
        self.reset();
        let campaign = self.backend.create_campaign(request).await?;
        self.campaign.send_replace(Some(campaign.clone()));
        if !campaign.status.is_terminal() {
            self.poller.start(&campaign.id);
        }
        info!(campaign_id = %campaign.id, "Remote campaign started");
        Ok(campaign)
    }

    fn reset(&mut self) {
        self.poller.cancel();
        self.controller.clear();
    }

    // -- Reviewing ----------------------------------------------------------

    /// Store or overwrite the pending decision for a channel of the live campaign.
    pub fn record_decision(&mut self, channel: Channel, decision: Decision) -> OutreachResult<()> {
        {
            let current = self.campaign.borrow();
            let campaign = current
                .as_ref()
                .ok_or_else(|| OutreachError::InvalidState("no campaign to review".to_string()))?;
            if !campaign.has_draft(channel) {
                return Err(OutreachError::InvalidState(format!(
                    "campaign {} has no {channel} draft",
                    campaign.id
                )));
            }
        }
        self.controller.record_decision(channel, decision);
        Ok(())
    }

    /// Parse and record a `channel=decision` token.
    pub fn record_token(&mut self, token: &str) -> OutreachResult<(Channel, Decision)> {
        let (channel, decision) = parse_decision_token(token)?;
        self.record_decision(channel, decision)?;
        Ok((channel, decision))
    }

    pub fn pending_decisions(&self) -> usize {
        self.controller.pending().len()
    }

    /// Apply every pending decision to the live campaign and return the
    /// updated campaign with the batch to submit. Pending is empty afterwards.
    pub fn apply_decisions(&mut self) -> OutreachResult<(Campaign, ApprovalSubmission)> {
        let current = self
            .campaign()
            .ok_or_else(|| OutreachError::InvalidState("no campaign to review".to_string()))?;
        let (updated, batch) = self.controller.apply(&current);
        self.campaign.send_replace(Some(updated.clone()));
        Ok((updated, batch))
    }

    /// Send a decision batch. On success polling restarts for the campaign;
    /// on failure the local campaign stays as it is.
    pub async fn submit_decisions(
        &mut self,
        campaign_id: &str,
        batch: &ApprovalSubmission,
    ) -> SubmitOutcome {
        if batch.is_empty() {
            return SubmitOutcome::NothingToSubmit;
        }
        match self.backend.submit_approval(campaign_id, batch).await {
            Ok(()) => {
                metrics::counter!("sync.submit.accepted").increment(1);
                info!(campaign_id = %campaign_id, decisions = batch.len(), "Decisions submitted");
                self.poller.start(campaign_id);
                SubmitOutcome::Submitted
            }
            Err(e) => {
                metrics::counter!("sync.submit.failures").increment(1);
                warn!(campaign_id = %campaign_id, error = %e, "Decision submission failed");
                SubmitOutcome::Failed(e)
            }
        }
    }

    /// Apply pending decisions locally, then submit them. The local update is
    /// visible before the request is sent.
    pub async fn review(&mut self) -> OutreachResult<SubmitOutcome> {
        let (campaign, batch) = self.apply_decisions()?;
        Ok(self.submit_decisions(&campaign.id, &batch).await)
    }

    pub fn can_force_complete(&self) -> bool {
        self.campaign
            .borrow()
            .as_ref()
            .is_some_and(|c| can_force_complete(c, &self.controller))
    }

    /// Finish the campaign locally. Stops polling so the backend copy cannot
    /// overwrite the result.
    pub fn force_complete(&mut self) -> OutreachResult<Campaign> {
        if !self.can_force_complete() {
            return Err(OutreachError::InvalidState(
                "force-complete needs applied decisions and nothing pending".to_string(),
            ));
        }
        let current = self
            .campaign()
            .ok_or_else(|| OutreachError::InvalidState("no campaign to complete".to_string()))?;
        self.poller.cancel();
        let done = force_complete(&current);
        self.campaign.send_replace(Some(done.clone()));
        Ok(done)
    }

    // -- Observing ----------------------------------------------------------

    pub fn campaign(&self) -> Option<Campaign> {
        self.campaign.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Campaign>> {
        self.campaign.subscribe()
    }

    /// Status of all seven stages in pipeline order; pending when unknown.
    pub fn stage_snapshot(&self) -> Vec<(Stage, StageInfo)> {
        match self.campaign.borrow().as_ref() {
            Some(campaign) => StagePipeline::snapshot(campaign),
            None => StagePipeline::STAGES
                .into_iter()
                .map(|stage| (stage, StageInfo::pending()))
                .collect(),
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    pub fn poll_state(&self) -> PollState {
        self.poller.state()
    }

    /// Wait until the live campaign satisfies `predicate`. Returns `None`
    /// once polling has stopped, or the campaign has reached a terminal
    /// status, without that happening.
    pub async fn wait_until<F>(&self, predicate: F) -> Option<Campaign>
    where
        F: Fn(&Campaign) -> bool,
    {
        let mut rx = self.subscribe();
        loop {
            {
                let current = rx.borrow_and_update();
                if let Some(campaign) = current.as_ref() {
                    if predicate(campaign) {
                        return Some(campaign.clone());
                    }
                    if campaign.status.is_terminal() {
                        return None;
                    }
                }
            }
            if !self.is_polling() {
                return self.campaign().filter(|c| predicate(c));
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Stop polling and drop the session.
    pub fn teardown(mut self) {
        self.poller.cancel();
        info!("Campaign session closed");
    }
}
