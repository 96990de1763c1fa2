//! Reviewer-side draft approval: pending decisions, their local application
//! to a campaign, the force-complete override, and the demo start path.

pub mod completion;
pub mod decisions;
pub mod drafts;
pub mod sampler;
pub mod start;

pub use completion::{can_force_complete, force_complete, has_decision_evidence};
pub use decisions::{
    apply_decisions, parse_decision_token, ApprovalController, Decision, PendingDecisions,
};
pub use sampler::{FixedSampler, ScoreRange, ScoreSampler, SeededSampler, UniformSampler};
pub use start::{score_drafts, start_campaign, CampaignInputs, AWAITING_APPROVAL_MESSAGE};
