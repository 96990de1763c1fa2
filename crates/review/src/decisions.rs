//! Pending reviewer decisions and their local application to a campaign.
//!
//! Applying is synchronous and never touches the network: the updated
//! campaign is returned together with the decision batch that the caller
//! then submits to the backend.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use outreach_core::config::ReviewConfig;
use outreach_core::{ApprovalSubmission, Campaign, Channel, OutreachError, OutreachResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::drafts::{annotate_skipped, regenerate_body};
use crate::sampler::{ScoreRange, ScoreSampler, UniformSampler};

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// A reviewer's choice for one channel's draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    #[serde(alias = "regen")]
    Regenerate,
    Skip,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Regenerate => "regenerate",
            Decision::Skip => "skip",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = OutreachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(Decision::Approve),
            "regenerate" | "regen" => Ok(Decision::Regenerate),
            "skip" => Ok(Decision::Skip),
            other => Err(OutreachError::InvalidState(format!(
                "unknown decision '{other}' (expected approve, regenerate or skip)"
            ))),
        }
    }
}

/// channel -> decision, at most one per channel.
pub type PendingDecisions = BTreeMap<Channel, Decision>;

/// Parse a `channel=decision` token, e.g. `email=approve` or `sms=regen`.
pub fn parse_decision_token(token: &str) -> OutreachResult<(Channel, Decision)> {
    let (channel, decision) = token.split_once('=').ok_or_else(|| {
        OutreachError::InvalidState(format!("decision '{token}' must look like channel=decision"))
    })?;
    Ok((channel.parse()?, decision.parse()?))
}

// ---------------------------------------------------------------------------
// Applying decisions
// ---------------------------------------------------------------------------

/// Apply `decisions` to a copy of `campaign`.
///
/// Drafts without a decision are carried over untouched. Decisions for
/// channels that have no draft are dropped and left out of the batch.
pub fn apply_decisions(
    campaign: &Campaign,
    decisions: &PendingDecisions,
    sampler: &mut dyn ScoreSampler,
    range: ScoreRange,
    now: DateTime<Utc>,
) -> (Campaign, ApprovalSubmission) {
    let mut updated = campaign.clone();
    let mut batch = ApprovalSubmission::default();

    for draft in &mut updated.drafts {
        let Some(decision) = decisions.get(&draft.channel) else {
            continue;
        };

        match decision {
            Decision::Approve => {
                draft.approved = true;
                batch.approved.push(draft.channel);
            }
            Decision::Regenerate => {
                draft.body = regenerate_body(&draft.body, now);
                draft.score = Some(range.clamp(sampler.sample(range.min, range.max)));
                draft.approved = false;
                batch.regen.push(draft.channel);
            }
            Decision::Skip => {
                draft.body = annotate_skipped(&draft.body);
                draft.approved = false;
                batch.skipped.push(draft.channel);
            }
        }

        debug!(
            campaign_id = %campaign.id,
            channel = %draft.channel,
            decision = %decision,
            "Decision applied"
        );
    }

    for channel in decisions.keys().filter(|c| !campaign.has_draft(**c)) {
        warn!(
            campaign_id = %campaign.id,
            channel = %channel,
            "Dropping decision for channel without a draft"
        );
    }

    (updated, batch)
}

// ---------------------------------------------------------------------------
// Approval Controller
// ---------------------------------------------------------------------------

/// Collects pending decisions and applies them to the live campaign.
pub struct ApprovalController {
    pending: PendingDecisions,
    sampler: Box<dyn ScoreSampler>,
    range: ScoreRange,
}

impl ApprovalController {
    pub fn new(range: ScoreRange, sampler: Box<dyn ScoreSampler>) -> Self {
        Self {
            pending: PendingDecisions::new(),
            sampler,
            range,
        }
    }

    /// Controller with a uniform random sampler over the configured range.
    pub fn from_config(config: &ReviewConfig) -> OutreachResult<Self> {
        Ok(Self::new(
            ScoreRange::from_config(config)?,
            Box::new(UniformSampler),
        ))
    }

    /// Store or overwrite the pending decision for `channel`.
    pub fn record_decision(&mut self, channel: Channel, decision: Decision) {
        self.pending.insert(channel, decision);
    }

    /// Parse and record a `channel=decision` token such as `sms=regen`.
    pub fn record_token(&mut self, token: &str) -> OutreachResult<(Channel, Decision)> {
        let (channel, decision) = parse_decision_token(token)?;
        self.record_decision(channel, decision);
        Ok((channel, decision))
    }

    pub fn pending(&self) -> &PendingDecisions {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn score_range(&self) -> ScoreRange {
        self.range
    }

    pub fn sampler_mut(&mut self) -> &mut dyn ScoreSampler {
        self.sampler.as_mut()
    }

    /// Apply every pending decision to `campaign`, stamping regenerated
    /// bodies with the current time. The pending map is empty afterwards.
    pub fn apply(&mut self, campaign: &Campaign) -> (Campaign, ApprovalSubmission) {
        self.apply_at(campaign, Utc::now())
    }

    pub fn apply_at(
        &mut self,
        campaign: &Campaign,
        now: DateTime<Utc>,
    ) -> (Campaign, ApprovalSubmission) {
        let decisions = std::mem::take(&mut self.pending);
        let (updated, batch) =
            apply_decisions(campaign, &decisions, self.sampler.as_mut(), self.range, now);

        metrics::counter!("review.decisions.applied").increment(batch.len() as u64);
        info!(
            campaign_id = %campaign.id,
            approved = batch.approved.len(),
            regen = batch.regen.len(),
            skipped = batch.skipped.len(),
            "Pending decisions applied locally"
        );

        (updated, batch)
    }
}

impl Default for ApprovalController {
    fn default() -> Self {
        Self::new(ScoreRange::default(), Box::new(UniformSampler))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
