//! In-memory campaign store backed by DashMap.

use dashmap::DashMap;
use outreach_core::{
    ApprovalSubmission, Campaign, CampaignStatus, Stage, StageInfo, StagePipeline, StageStatus,
};
use tracing::{info, warn};
use uuid::Uuid;

/// Thread-safe store for campaigns and the decision batches submitted for them.
pub struct CampaignStore {
    campaigns: DashMap<String, Campaign>,
    submissions: DashMap<String, Vec<ApprovalSubmission>>,
}

impl CampaignStore {
    pub fn new() -> Self {
        info!("Campaign store initialized (in-memory)");
        Self {
            campaigns: DashMap::new(),
            submissions: DashMap::new(),
        }
    }

    /// New campaign: pending, at ingestion, every stage pending with an empty
    /// message, no drafts.
    pub fn create(&self) -> Campaign {
        let mut campaign = Campaign {
            id: Uuid::new_v4().to_string(),
            status: CampaignStatus::Pending,
            current_stage: Stage::Ingestion.as_str().to_string(),
            target_company: None,
            target_role: None,
            drafts: Vec::new(),
            stages: Default::default(),
            error: None,
            regen_round: 0,
        };
        for stage in StagePipeline::STAGES {
            campaign.set_stage(stage, StageInfo::new(StageStatus::Pending, ""));
        }
        self.campaigns.insert(campaign.id.clone(), campaign.clone());
        campaign
    }

    pub fn get(&self, id: &str) -> Option<Campaign> {
        self.campaigns.get(id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    /// Mutate a stored campaign in place. All changes made by `f` land in one update.
    pub fn update<F>(&self, id: &str, f: F) -> Option<Campaign>
    where
        F: FnOnce(&mut Campaign),
    {
        self.campaigns.get_mut(id).map(|mut entry| {
            f(entry.value_mut());
            entry.value().clone()
        })
    }

    /// Set one stage's status and message and move the current-stage pointer to it.
    pub fn set_stage(
        &self,
        id: &str,
        stage: Stage,
        status: StageStatus,
        message: impl Into<String>,
    ) -> Option<Campaign> {
        let message = message.into();
        self.update(id, |campaign| {
            campaign.current_stage = stage.as_str().to_string();
            campaign.set_stage(stage, StageInfo::new(status, message));
        })
    }

    pub fn record_submission(&self, id: &str, batch: ApprovalSubmission) -> bool {
        if !self.campaigns.contains_key(id) {
            return false;
        }
        self.submissions.entry(id.to_string()).or_default().push(batch);
        true
    }

    pub fn submissions(&self, id: &str) -> Vec<ApprovalSubmission> {
        self.submissions
            .get(id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Mark the current stage failed and the campaign as failed with `message`.
    pub fn fail(&self, id: &str, message: &str) -> Option<Campaign> {
        let updated = self.update(id, |campaign| {
            if let Some(stage) = campaign.current_stage() {
                campaign.set_stage(stage, StageInfo::new(StageStatus::Failed, message));
            }
            campaign.status = CampaignStatus::Failed;
            campaign.error = Some(message.to_string());
        });
        if updated.is_some() {
            metrics::counter!("backend.campaigns.failed").increment(1);
            warn!(campaign_id = %id, error = message, "Campaign failed");
        }
        updated
    }
}

impl Default for CampaignStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_core::Channel;

    #[test]
    fn test_create_starts_pending_at_ingestion() {
        let store = CampaignStore::new();
        let campaign = store.create();

        assert_eq!(campaign.status, CampaignStatus::Pending);
        assert_eq!(campaign.current_stage(), Some(Stage::Ingestion));
        assert!(campaign.drafts.is_empty());
        assert_eq!(campaign.regen_round, 0);
        assert_eq!(campaign.stages.len(), 7);
        assert!(campaign
            .stages
            .values()
            .all(|info| info.status == StageStatus::Pending && info.message.is_empty()));
        assert_eq!(store.get(&campaign.id), Some(campaign));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_stage_moves_pointer() {
        let store = CampaignStore::new();
        let id = store.create().id;

        let updated = store
            .set_stage(&id, Stage::Persona, StageStatus::Running, "Processing persona...")
            .unwrap();
        assert_eq!(updated.current_stage(), Some(Stage::Persona));
        assert_eq!(
            StagePipeline::status_of(&updated, Stage::Persona).message,
            "Processing persona..."
        );
        assert!(store.set_stage("missing", Stage::Persona, StageStatus::Running, "").is_none());
    }

    #[test]
    fn test_fail_marks_current_stage() {
        let store = CampaignStore::new();
        let id = store.create().id;
        store.set_stage(&id, Stage::Drafting, StageStatus::Running, "Processing drafting...");

        let failed = store.fail(&id, "model unavailable").unwrap();
        assert_eq!(failed.status, CampaignStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("model unavailable"));
        assert_eq!(
            StagePipeline::status_of(&failed, Stage::Drafting).status,
            StageStatus::Failed
        );
        assert!(store.fail("missing", "x").is_none());
    }

    #[test]
    fn test_submissions_only_for_known_campaigns() {
        let store = CampaignStore::new();
        let id = store.create().id;
        let batch = ApprovalSubmission {
            approved: vec![Channel::Email],
            ..Default::default()
        };

        assert!(store.record_submission(&id, batch.clone()));
        assert!(!store.record_submission("missing", batch.clone()));
        assert_eq!(store.submissions(&id), vec![batch]);
        assert!(store.submissions("missing").is_empty());
    }
}
