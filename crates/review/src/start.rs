//! Campaign start inputs and the local (demo) start path, which produces a
//! campaign already waiting in the approval stage.

use std::path::PathBuf;

use outreach_core::{
    Campaign, CampaignStartRequest, CampaignStatus, Draft, InputType, OutreachError,
    OutreachResult, Stage, StageInfo, StagePipeline, StageStatus,
};
use tracing::info;
use uuid::Uuid;

use crate::drafts::draft_set;
use crate::sampler::{ScoreRange, ScoreSampler};

/// Message shown on the approval stage while drafts wait for the reviewer.
pub const AWAITING_APPROVAL_MESSAGE: &str = "Waiting for user approval...";

/// Profile sources a campaign can be started from. At least one is required.
#[derive(Debug, Clone, Default)]
pub struct CampaignInputs {
    pub profile_url: Option<String>,
    pub text: Option<String>,
    pub file: Option<PathBuf>,
}

impl CampaignInputs {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            profile_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn url(&self) -> Option<&str> {
        non_blank(self.profile_url.as_deref())
    }

    fn free_text(&self) -> Option<&str> {
        non_blank(self.text.as_deref())
    }

    fn file_path(&self) -> Option<&PathBuf> {
        self.file
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn ensure_present(&self) -> OutreachResult<()> {
        if self.url().is_none() && self.free_text().is_none() && self.file_path().is_none() {
            return Err(OutreachError::InvalidState(
                "a profile URL, free text or file is required to start a campaign".to_string(),
            ));
        }
        Ok(())
    }

    /// Request body for the backend start path. URL wins over text, text over file.
    pub fn to_start_request(&self) -> OutreachResult<CampaignStartRequest> {
        self.ensure_present()?;
        let (input_type, content) = if let Some(url) = self.url() {
            (InputType::Url, url.to_string())
        } else if let Some(text) = self.free_text() {
            (InputType::Text, text.to_string())
        } else {
            let path = self.file_path().map(|p| p.display().to_string());
            (InputType::File, path.unwrap_or_default())
        };
        Ok(CampaignStartRequest {
            input_type,
            content,
        })
    }

    /// `Company:` / `Role:` lines from the free text.
    pub fn target(&self) -> (Option<String>, Option<String>) {
        let Some(text) = self.free_text() else {
            return (None, None);
        };
        (labelled_value(text, "company"), labelled_value(text, "role"))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn labelled_value(text: &str, label: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(label) {
            non_blank(Some(value)).map(str::to_string)
        } else {
            None
        }
    })
}

/// Give every draft a freshly sampled score.
pub fn score_drafts(drafts: &mut [Draft], sampler: &mut dyn ScoreSampler, range: ScoreRange) {
    for draft in drafts {
        draft.score = Some(range.clamp(sampler.sample(range.min, range.max)));
    }
}

/// Start a campaign locally: drafts for every channel, stages up to scoring
/// completed, approval running, the rest pending.
pub fn start_campaign(
    inputs: &CampaignInputs,
    sampler: &mut dyn ScoreSampler,
    range: ScoreRange,
) -> OutreachResult<Campaign> {
    inputs.ensure_present()?;

    let (company, role) = inputs.target();
    let mut drafts = draft_set(company.as_deref(), role.as_deref());
    score_drafts(&mut drafts, sampler, range);

    let mut campaign = Campaign::new(
        Uuid::new_v4().to_string(),
        CampaignStatus::Running,
        Stage::Approval,
        drafts,
    )?;
    campaign.target_company = company;
    campaign.target_role = role;

    for stage in StagePipeline::STAGES {
        let info = match stage.cmp(&Stage::Approval) {
            std::cmp::Ordering::Less => {
                StageInfo::new(StageStatus::Completed, stage.completed_message())
            }
            std::cmp::Ordering::Equal => {
                StageInfo::new(StageStatus::Running, AWAITING_APPROVAL_MESSAGE)
            }
            std::cmp::Ordering::Greater => StageInfo::pending(),
        };
        campaign.set_stage(stage, info);
    }

    metrics::counter!("review.campaigns.started").increment(1);
    info!(
        campaign_id = %campaign.id,
        drafts = campaign.drafts.len(),
        company = campaign.target_company.as_deref().unwrap_or("-"),
        "Demo campaign started"
    );

    Ok(campaign)
}
