//! Stub pipeline executor.
//!
//! Walks each campaign through the seven stages with a fixed delay per stage,
//! reporting progress into the store the same way a real worker would:
//! `running` with "Processing <stage>...", then `completed` with
//! "<Stage> completed". The run pauses at approval until decisions arrive.
//! A batch asking for regeneration sends the campaign back through scoring
//! and approval, at most [`MAX_REGEN_ROUNDS`] times.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use outreach_core::{
    AppConfig, ApprovalSubmission, Campaign, CampaignStartRequest, CampaignStatus, InputType,
    OutreachResult, Stage, StageInfo, StagePipeline, StageStatus,
};
use outreach_review::drafts::draft_set;
use outreach_review::start::AWAITING_APPROVAL_MESSAGE;
use outreach_review::{
    apply_decisions, score_drafts, CampaignInputs, Decision, PendingDecisions, ScoreRange,
    ScoreSampler, UniformSampler,
};
use tracing::{debug, info, warn};

use crate::store::CampaignStore;

const PRE_APPROVAL: [Stage; 4] = [Stage::Ingestion, Stage::Persona, Stage::Drafting, Stage::Scoring];

/// Regeneration rounds allowed per campaign. Later regen requests are ignored
/// and the campaign proceeds to execution.
pub const MAX_REGEN_ROUNDS: u32 = 3;

/// What happened to a decision batch sent for a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDisposition {
    /// The campaign was waiting; decisions were applied and execution resumed.
    Resumed,
    /// Decisions were applied and regenerated drafts went back to scoring.
    Regenerating { round: u32 },
    /// Stored only. The campaign was not waiting for approval.
    Recorded,
}

#[derive(Clone)]
pub struct PipelineExecutor {
    store: Arc<CampaignStore>,
    stage_delay: Duration,
    range: ScoreRange,
    sampler: Arc<Mutex<Box<dyn ScoreSampler>>>,
}

impl PipelineExecutor {
    pub fn new(
        store: Arc<CampaignStore>,
        stage_delay: Duration,
        range: ScoreRange,
        sampler: Box<dyn ScoreSampler>,
    ) -> Self {
        Self {
            store,
            stage_delay,
            range,
            sampler: Arc::new(Mutex::new(sampler)),
        }
    }

    pub fn from_config(store: Arc<CampaignStore>, config: &AppConfig) -> OutreachResult<Self> {
        Ok(Self::new(
            store,
            Duration::from_millis(config.server.stage_delay_ms),
            ScoreRange::from_config(&config.review)?,
            Box::new(UniformSampler),
        ))
    }

    pub fn store(&self) -> &Arc<CampaignStore> {
        &self.store
    }

    /// Create a campaign and start running it in the background.
    pub fn submit(&self, request: &CampaignStartRequest) -> Campaign {
        let created = self.store.create();
        let campaign = match request.input_type {
            InputType::Text => {
                let (company, role) = CampaignInputs::from_text(&request.content).target();
                self.store
                    .update(&created.id, |c| {
                        c.target_company = company;
                        c.target_role = role;
                    })
                    .unwrap_or(created)
            }
            InputType::Url | InputType::File => created,
        };

        metrics::counter!("backend.campaigns.created").increment(1);
        info!(
            campaign_id = %campaign.id,
            input_type = ?request.input_type,
            "Campaign created"
        );

        self.launch(campaign.id.clone());
        campaign
    }

    fn launch(&self, campaign_id: String) {
        let executor = self.clone();
        tokio::spawn(async move { executor.run_until_approval(&campaign_id).await });
    }

    /// Handle a decision batch. `None` when the campaign is unknown.
    pub fn on_approval(&self, campaign_id: &str, batch: ApprovalSubmission) -> Option<ApprovalDisposition> {
        if !self.store.record_submission(campaign_id, batch.clone()) {
            return None;
        }

        let mut decisions = decision_map(&batch);
        let mut disposition = ApprovalDisposition::Recorded;
        self.store.update(campaign_id, |campaign| {
            if !awaiting_approval(campaign) {
                return;
            }
            let wants_regen = !batch.regen.is_empty();
            let loop_back = wants_regen && campaign.regen_round < MAX_REGEN_ROUNDS;
            if wants_regen && !loop_back {
                warn!(
                    campaign_id = %campaign.id,
                    max_rounds = MAX_REGEN_ROUNDS,
                    "Regeneration limit reached, ignoring regen requests"
                );
                decisions.retain(|_, decision| *decision != Decision::Regenerate);
            }

            let (updated, _) = self.with_sampler(|sampler| {
                apply_decisions(campaign, &decisions, sampler, self.range, Utc::now())
            });
            *campaign = updated;

            if loop_back {
                campaign.regen_round += 1;
                campaign.set_stage(Stage::Approval, StageInfo::pending());
                disposition = ApprovalDisposition::Regenerating {
                    round: campaign.regen_round,
                };
            } else {
                campaign.set_stage(
                    Stage::Approval,
                    StageInfo::new(StageStatus::Completed, Stage::Approval.completed_message()),
                );
                disposition = ApprovalDisposition::Resumed;
            }
        })?;

        let executor = self.clone();
        let id = campaign_id.to_string();
        match disposition {
            ApprovalDisposition::Resumed => {
                info!(campaign_id = %campaign_id, decisions = batch.len(), "Approval received, resuming execution");
                tokio::spawn(async move { executor.run_after_approval(&id).await });
            }
            ApprovalDisposition::Regenerating { round } => {
                metrics::counter!("backend.regen.rounds").increment(1);
                info!(
                    campaign_id = %campaign_id,
                    channels = batch.regen.len(),
                    round,
                    max_rounds = MAX_REGEN_ROUNDS,
                    "Regenerating drafts, back to scoring"
                );
                tokio::spawn(async move { executor.rescore(&id).await });
            }
            ApprovalDisposition::Recorded => {
                debug!(campaign_id = %campaign_id, "Approval recorded for campaign not awaiting review");
            }
        }
        Some(disposition)
    }

    pub fn fail(&self, campaign_id: &str, message: &str) -> Option<Campaign> {
        self.store.fail(campaign_id, message)
    }

    async fn run_until_approval(&self, id: &str) {
        for stage in PRE_APPROVAL {
            let finished = self
                .run_stage(id, stage, |executor, campaign| match stage {
                    Stage::Drafting => {
                        campaign.drafts = draft_set(
                            campaign.target_company.as_deref(),
                            campaign.target_role.as_deref(),
                        );
                    }
                    Stage::Scoring => {
                        executor.with_sampler(|sampler| {
                            score_drafts(&mut campaign.drafts, sampler, executor.range)
                        });
                        campaign.status = CampaignStatus::Running;
                    }
                    _ => {}
                })
                .await;
            if !finished {
                return;
            }
        }
        self.await_review(id);
    }

    /// Score the drafts again after a regeneration round and wait for review.
    async fn rescore(&self, id: &str) {
        let finished = self
            .run_stage(id, Stage::Scoring, |executor, campaign| {
                executor.with_sampler(|sampler| {
                    score_drafts(&mut campaign.drafts, sampler, executor.range)
                });
            })
            .await;
        if finished {
            self.await_review(id);
        }
    }

    fn await_review(&self, id: &str) {
        if self
            .store
            .set_stage(id, Stage::Approval, StageStatus::Running, AWAITING_APPROVAL_MESSAGE)
            .is_some()
        {
            info!(campaign_id = %id, "Drafts ready for review");
        }
    }

    async fn run_after_approval(&self, id: &str) {
        if !self.run_stage(id, Stage::Execution, |_, _| {}).await {
            return;
        }
        let finished = self
            .run_stage(id, Stage::Persistence, |_, campaign| {
                campaign.status = CampaignStatus::Completed;
            })
            .await;
        if finished {
            metrics::counter!("backend.campaigns.completed").increment(1);
            info!(campaign_id = %id, "Campaign completed");
        }
    }

    /// Report `stage` running, wait, then complete it together with whatever
    /// `on_complete` changes, in one store update. False if the campaign is
    /// gone or has failed meanwhile.
    async fn run_stage<F>(&self, id: &str, stage: Stage, on_complete: F) -> bool
    where
        F: FnOnce(&Self, &mut Campaign),
    {
        let mut started = false;
        self.store.update(id, |campaign| {
            if campaign.status == CampaignStatus::Failed {
                return;
            }
            campaign.current_stage = stage.as_str().to_string();
            campaign.set_stage(
                stage,
                StageInfo::new(StageStatus::Running, stage.running_message()),
            );
            started = true;
        });
        if !started {
            warn!(campaign_id = %id, stage = %stage, "Campaign gone or failed, stage not started");
            return false;
        }

        tokio::time::sleep(self.stage_delay).await;

        let mut completed = false;
        self.store.update(id, |campaign| {
            if campaign.status == CampaignStatus::Failed {
                return;
            }
            on_complete(self, campaign);
            campaign.current_stage = stage.as_str().to_string();
            campaign.set_stage(
                stage,
                StageInfo::new(StageStatus::Completed, stage.completed_message()),
            );
            completed = true;
        });

        if completed {
            debug!(campaign_id = %id, stage = %stage, "Stage completed");
        }
        completed
    }

    fn with_sampler<R>(&self, f: impl FnOnce(&mut dyn ScoreSampler) -> R) -> R {
        let mut guard = self.sampler.lock().unwrap_or_else(PoisonError::into_inner);
        f(guard.as_mut())
    }
}

fn awaiting_approval(campaign: &Campaign) -> bool {
    campaign.status == CampaignStatus::Running
        && StagePipeline::status_of(campaign, Stage::Approval).status == StageStatus::Running
}

fn decision_map(batch: &ApprovalSubmission) -> PendingDecisions {
    let mut decisions = PendingDecisions::new();
    for (channels, decision) in [
        (&batch.approved, Decision::Approve),
        (&batch.regen, Decision::Regenerate),
        (&batch.skipped, Decision::Skip),
    ] {
        for channel in channels {
            decisions.insert(*channel, decision);
        }
    }
    decisions
}
