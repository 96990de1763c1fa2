//! The fixed seven-stage outreach pipeline and status lookup.
//!
//! A campaign's `stages` map may be partial: the backend fills it in as it
//! goes. Lookups never fail; a missing stage is reported as pending.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OutreachError;
use crate::types::{Campaign, StageInfo, StageStatus};

/// One named phase of the pipeline. Ordering follows pipeline order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Ingestion,
    Persona,
    Drafting,
    Scoring,
    Approval,
    Execution,
    Persistence,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingestion => "ingestion",
            Stage::Persona => "persona",
            Stage::Drafting => "drafting",
            Stage::Scoring => "scoring",
            Stage::Approval => "approval",
            Stage::Execution => "execution",
            Stage::Persistence => "persistence",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Ingestion => "Ingestion",
            Stage::Persona => "Persona",
            Stage::Drafting => "Drafting",
            Stage::Scoring => "Scoring",
            Stage::Approval => "Approval",
            Stage::Execution => "Execution",
            Stage::Persistence => "Persistence",
        }
    }

    /// Message reported when the stage finishes, e.g. `"Scoring completed"`.
    pub fn completed_message(&self) -> String {
        format!("{} completed", self.display_name())
    }

    /// Message reported while the stage is being worked on.
    pub fn running_message(&self) -> String {
        format!("Processing {}...", self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = OutreachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StagePipeline::STAGES
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| OutreachError::InvalidState(format!("unknown stage '{s}'")))
    }
}

/// Status lookups over a campaign's stage map.
pub struct StagePipeline;

impl StagePipeline {
    pub const STAGES: [Stage; 7] = [
        Stage::Ingestion,
        Stage::Persona,
        Stage::Drafting,
        Stage::Scoring,
        Stage::Approval,
        Stage::Execution,
        Stage::Persistence,
    ];

    /// Reported status of `stage`, or `{Pending, "Waiting..."}` when the
    /// campaign has no entry for it.
    pub fn status_of(campaign: &Campaign, stage: Stage) -> StageInfo {
        campaign
            .stages
            .get(&stage)
            .cloned()
            .unwrap_or_else(StageInfo::pending)
    }

    /// One lookup per stage, in pipeline order. Call once per refresh.
    pub fn snapshot(campaign: &Campaign) -> Vec<(Stage, StageInfo)> {
        Self::STAGES
            .into_iter()
            .map(|stage| (stage, Self::status_of(campaign, stage)))
            .collect()
    }

    pub fn all_completed(campaign: &Campaign) -> bool {
        Self::STAGES
            .into_iter()
            .all(|stage| Self::status_of(campaign, stage).status == StageStatus::Completed)
    }
}
