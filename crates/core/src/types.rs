use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OutreachError, OutreachResult};
use crate::stages::{Stage, StagePipeline};

// ─── Channels & Drafts ──────────────────────────────────────────────────

/// Communication medium a draft is written for. A campaign holds at most
/// one draft per channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Linkedin,
    Instagram,
    Whatsapp,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Email,
        Channel::Sms,
        Channel::Linkedin,
        Channel::Instagram,
        Channel::Whatsapp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Linkedin => "linkedin",
            Channel::Instagram => "instagram",
            Channel::Whatsapp => "whatsapp",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Channel::Email => "Email",
            Channel::Sms => "SMS",
            Channel::Linkedin => "LinkedIn",
            Channel::Instagram => "Instagram",
            Channel::Whatsapp => "WhatsApp",
        }
    }

    /// Only email drafts carry a subject line.
    pub fn has_subject(&self) -> bool {
        matches!(self, Channel::Email)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = OutreachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| OutreachError::InvalidState(format!("unknown channel '{s}'")))
    }
}

/// One generated outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub channel: Channel,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    /// Quality score in `[0, 10]`, absent until scored.
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub approved: bool,
}

impl Draft {
    pub fn new(channel: Channel, subject: Option<String>, body: impl Into<String>) -> Self {
        Self {
            channel,
            subject,
            body: body.into(),
            score: None,
            approved: false,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

// ─── Stages ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    #[default]
    Pending,
    /// The executor reports `waiting` while approval sits with the reviewer.
    #[serde(alias = "waiting")]
    Running,
    Completed,
    Failed,
}

/// Reported status of one pipeline stage. Purely descriptive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInfo {
    pub status: StageStatus,
    #[serde(default)]
    pub message: String,
}

impl StageInfo {
    pub const WAITING_MESSAGE: &'static str = "Waiting...";

    pub fn new(status: StageStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn pending() -> Self {
        Self::new(StageStatus::Pending, Self::WAITING_MESSAGE)
    }
}

impl Default for StageInfo {
    fn default() -> Self {
        Self::pending()
    }
}

// ─── Campaign ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[default]
    #[serde(alias = "created")]
    Pending,
    Running,
    Completed,
    Failed,
}

impl CampaignStatus {
    /// Polling stops once a campaign reaches one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Failed)
    }
}

/// One end-to-end run of the outreach pipeline for a single target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(rename = "campaign_id", alias = "id")]
    pub id: String,
    pub status: CampaignStatus,
    pub current_stage: String,
    #[serde(default)]
    pub target_company: Option<String>,
    #[serde(default)]
    pub target_role: Option<String>,
    #[serde(default)]
    pub drafts: Vec<Draft>,
    #[serde(default)]
    pub stages: BTreeMap<Stage, StageInfo>,
    #[serde(default)]
    pub error: Option<String>,
    /// Regeneration rounds the backend has run for this campaign.
    #[serde(default)]
    pub regen_round: u32,
}

impl Campaign {
    /// Build a campaign, rejecting a draft set that repeats a channel.
    pub fn new(
        id: impl Into<String>,
        status: CampaignStatus,
        current_stage: Stage,
        drafts: Vec<Draft>,
    ) -> OutreachResult<Self> {
        ensure_unique_channels(&drafts)?;
        Ok(Self {
            id: id.into(),
            status,
            current_stage: current_stage.as_str().to_string(),
            target_company: None,
            target_role: None,
            drafts,
            stages: BTreeMap::new(),
            error: None,
            regen_round: 0,
        })
    }

    /// The current stage pointer, if it names one of the seven stages.
    pub fn current_stage(&self) -> Option<Stage> {
        self.current_stage.parse().ok()
    }

    pub fn set_stage(&mut self, stage: Stage, info: StageInfo) {
        self.stages.insert(stage, info);
    }

    pub fn draft(&self, channel: Channel) -> Option<&Draft> {
        self.drafts.iter().find(|d| d.channel == channel)
    }

    pub fn has_draft(&self, channel: Channel) -> bool {
        self.draft(channel).is_some()
    }

    /// Check the data-model invariants: unique channels, scores in `[0, 10]`,
    /// and `completed` only when every stage is completed.
    pub fn validate(&self) -> OutreachResult<()> {
        ensure_unique_channels(&self.drafts)?;

        for draft in &self.drafts {
            if let Some(score) = draft.score {
                if !(0.0..=10.0).contains(&score) {
                    return Err(OutreachError::InvalidState(format!(
                        "score {score} for {} is outside [0, 10]",
                        draft.channel
                    )));
                }
            }
        }

        if self.status == CampaignStatus::Completed && !StagePipeline::all_completed(self) {
            return Err(OutreachError::InvalidState(format!(
                "campaign {} is completed but not every stage is",
                self.id
            )));
        }

        Ok(())
    }
}

fn ensure_unique_channels(drafts: &[Draft]) -> OutreachResult<()> {
    let mut seen = HashSet::with_capacity(drafts.len());
    for draft in drafts {
        if !seen.insert(draft.channel) {
            return Err(OutreachError::InvalidState(format!(
                "duplicate draft for channel '{}'",
                draft.channel
            )));
        }
    }
    Ok(())
}

// ─── Wire payloads ──────────────────────────────────────────────────────

/// Body of `POST /api/v1/campaigns/{id}/approve`. The three lists are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSubmission {
    #[serde(default)]
    pub approved: Vec<Channel>,
    #[serde(default)]
    pub regen: Vec<Channel>,
    #[serde(default)]
    pub skipped: Vec<Channel>,
}

impl ApprovalSubmission {
    pub fn is_empty(&self) -> bool {
        self.approved.is_empty() && self.regen.is_empty() && self.skipped.is_empty()
    }

    pub fn len(&self) -> usize {
        self.approved.len() + self.regen.len() + self.skipped.len()
    }

    /// Reject a batch in which a channel appears more than once.
    pub fn ensure_disjoint(&self) -> OutreachResult<()> {
        let mut seen = HashSet::with_capacity(self.len());
        for channel in self.approved.iter().chain(&self.regen).chain(&self.skipped) {
            if !seen.insert(*channel) {
                return Err(OutreachError::InvalidState(format!(
                    "channel '{channel}' appears in more than one decision list"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Url,
    Text,
    File,
}

/// Body of `POST /api/v1/campaigns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStartRequest {
    pub input_type: InputType,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_campaign() -> Campaign {
        Campaign::new(
            "c-1",
            CampaignStatus::Running,
            Stage::Approval,
            vec![
                Draft::new(Channel::Email, Some("Hi".to_string()), "Hello there").with_score(7.5),
                Draft::new(Channel::Sms, None, "Quick note"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_channels_rejected() {
        let result = Campaign::new(
            "c-1",
            CampaignStatus::Running,
            Stage::Drafting,
            vec![
                Draft::new(Channel::Sms, None, "one"),
                Draft::new(Channel::Sms, None, "two"),
            ],
        );
        assert!(matches!(result, Err(OutreachError::InvalidState(_))));
    }

    #[test]
    fn test_completed_requires_all_stages_completed() {
        let mut campaign = sample_campaign();
        campaign.status = CampaignStatus::Completed;
        assert!(campaign.validate().is_err());

        for stage in StagePipeline::STAGES {
            campaign.set_stage(stage, StageInfo::new(StageStatus::Completed, "done"));
        }
        assert!(campaign.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_score_rejected() {
        let mut campaign = sample_campaign();
        campaign.drafts[1].score = Some(11.0);
        assert!(matches!(campaign.validate(), Err(OutreachError::InvalidState(_))));
    }

    #[test]
    fn test_backend_payload_decodes() {
        let json = r#"{
            "campaign_id": "abc",
            "status": "created",
            "current_stage": "pending",
            "target_company": null,
            "drafts": [
                {"channel": "email", "subject": "Hello", "body": "Hi", "score": 8.1, "approved": false}
            ],
            "stages": {
                "approval": {"status": "waiting", "message": "Waiting for user approval..."}
            },
            "error": null
        }"#;
        let campaign: Campaign = serde_json::from_str(json).unwrap();
        assert_eq!(campaign.id, "abc");
        assert_eq!(campaign.status, CampaignStatus::Pending);
        assert_eq!(campaign.current_stage(), None);
        assert_eq!(campaign.stages[&Stage::Approval].status, StageStatus::Running);
        assert_eq!(campaign.draft(Channel::Email).unwrap().score, Some(8.1));

        let encoded = serde_json::to_value(&campaign).unwrap();
        assert_eq!(encoded["campaign_id"], "abc");
        assert_eq!(encoded["stages"]["approval"]["status"], "running");
        assert_eq!(encoded["regen_round"], 0);
    }

    #[test]
    fn test_id_alias_and_missing_collections() {
        let campaign: Campaign =
            serde_json::from_str(r#"{"id": "x", "status": "running", "current_stage": "persona"}"#)
                .unwrap();
        assert_eq!(campaign.id, "x");
        assert!(campaign.drafts.is_empty());
        assert!(campaign.stages.is_empty());
        assert_eq!(campaign.regen_round, 0);
        assert_eq!(campaign.current_stage(), Some(Stage::Persona));
    }

    #[test]
    fn test_channel_parsing() {
        assert_eq!("LinkedIn".parse::<Channel>().unwrap(), Channel::Linkedin);
        assert_eq!(" whatsapp ".parse::<Channel>().unwrap(), Channel::Whatsapp);
        assert!(matches!(
            "fax".parse::<Channel>(),
            Err(OutreachError::InvalidState(_))
        ));
    }

    #[test]
    fn test_submission_disjointness() {
        let ok = ApprovalSubmission {
            approved: vec![Channel::Email],
            regen: vec![Channel::Sms],
            skipped: vec![Channel::Instagram],
        };
        assert!(ok.ensure_disjoint().is_ok());
        assert_eq!(ok.len(), 3);

        let overlapping = ApprovalSubmission {
            approved: vec![Channel::Email],
            regen: vec![],
            skipped: vec![Channel::Email],
        };
        assert!(overlapping.ensure_disjoint().is_err());

        let body = serde_json::to_value(&ok).unwrap();
        assert_eq!(body["approved"][0], "email");
        assert_eq!(body["regen"][0], "sms");
        assert_eq!(body["skipped"][0], "instagram");
    }
}
