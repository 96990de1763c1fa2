#![warn(clippy::unwrap_used)]

//! Client side of the review flow: the backend client, the polling
//! synchronizer that reconciles local state with the backend, and the
//! session that owns both.

pub mod client;
pub mod poller;
pub mod session;

pub use client::{CampaignBackend, HttpBackend};
pub use poller::{CampaignCell, PollState, PollingSynchronizer};
pub use session::{CampaignSession, SubmitOutcome};
