//! Manual force-complete override for a review that has no backend
//! execution behind it.

use outreach_core::{Campaign, CampaignStatus, Draft, Stage, StageInfo, StagePipeline, StageStatus};
use tracing::info;

use crate::decisions::ApprovalController;
use crate::drafts::{is_regenerated, is_skipped};

/// Mark all seven stages completed and finish the campaign at `persistence`.
pub fn force_complete(campaign: &Campaign) -> Campaign {
    let mut updated = campaign.clone();
    for stage in StagePipeline::STAGES {
        updated.set_stage(
            stage,
            StageInfo::new(StageStatus::Completed, stage.completed_message()),
        );
    }
    updated.status = CampaignStatus::Completed;
    updated.current_stage = Stage::Persistence.as_str().to_string();

    metrics::counter!("review.force_completed").increment(1);
    info!(campaign_id = %campaign.id, "Campaign force-completed by reviewer");
    updated
}

/// A draft carries the mark of an applied decision.
pub fn has_decision_evidence(draft: &Draft) -> bool {
    draft.approved || is_regenerated(&draft.body) || is_skipped(&draft.body)
}

/// Whether force-complete should be offered: nothing is left pending and at
/// least one draft shows an applied decision.
pub fn can_force_complete(campaign: &Campaign, controller: &ApprovalController) -> bool {
    !controller.has_pending() && campaign.drafts.iter().any(has_decision_evidence)
}
