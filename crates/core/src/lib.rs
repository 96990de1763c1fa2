pub mod config;
pub mod error;
pub mod stages;
pub mod types;

pub use config::AppConfig;
pub use error::{OutreachError, OutreachResult};
pub use stages::{Stage, StagePipeline};
pub use types::{
    ApprovalSubmission, Campaign, CampaignStartRequest, CampaignStatus, Channel, Draft,
    InputType, StageInfo, StageStatus,
};
