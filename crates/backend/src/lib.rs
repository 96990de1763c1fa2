#![warn(clippy::unwrap_used)]

//! Development backend for the review flow: an in-memory campaign store, a
//! stub executor that walks campaigns through the seven stages, and the
//! REST surface the sync client talks to.

pub mod executor;
pub mod handlers;
pub mod router;
pub mod server;
pub mod store;

pub use executor::{ApprovalDisposition, PipelineExecutor, MAX_REGEN_ROUNDS};
pub use handlers::BackendState;
pub use router::backend_router;
pub use server::BackendServer;
pub use store::CampaignStore;
