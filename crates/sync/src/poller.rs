//! Periodic reconciliation of the local campaign with the backend's copy.
//!
//! At most one poll task runs per synchronizer. Every successful fetch
//! replaces the local campaign wholesale; a terminal status ends the task.
//! Failed fetches are logged and retried on the next tick, without limit.

use std::sync::Arc;
use std::time::Duration;

use outreach_core::Campaign;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::CampaignBackend;

/// Shared slot holding the live campaign. Writers replace, readers subscribe.
pub type CampaignCell = Arc<watch::Sender<Option<Campaign>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Active { campaign_id: String },
}

struct ActivePoll {
    campaign_id: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActivePoll {
    fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }
}

pub struct PollingSynchronizer {
    backend: Arc<dyn CampaignBackend>,
    target: CampaignCell,
    interval: Duration,
    active: Option<ActivePoll>,
}

impl PollingSynchronizer {
    pub fn new(backend: Arc<dyn CampaignBackend>, target: CampaignCell, interval: Duration) -> Self {
        Self {
            backend,
            target,
            interval,
            active: None,
        }
    }

    /// Begin polling `campaign_id`, replacing any poll already running.
    /// The first fetch happens one interval after the call.
    pub fn start(&mut self, campaign_id: &str) {
        self.cancel();

        let token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.backend),
            campaign_id.to_string(),
            self.interval,
            Arc::clone(&self.target),
            token.clone(),
        ));

        metrics::counter!("sync.poll.started").increment(1);
        info!(
            campaign_id = %campaign_id,
            interval_ms = self.interval.as_millis() as u64,
            "Polling started"
        );

        self.active = Some(ActivePoll {
            campaign_id: campaign_id.to_string(),
            token,
            handle,
        });
    }

    /// Stop the running poll, if any. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
            active.handle.abort();
            debug!(campaign_id = %active.campaign_id, "Polling cancelled");
        }
    }

    pub fn state(&self) -> PollState {
        match &self.active {
            Some(active) if active.is_running() => PollState::Active {
                campaign_id: active.campaign_id.clone(),
            },
            _ => PollState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(ActivePoll::is_running)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for PollingSynchronizer {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn poll_loop(
    backend: Arc<dyn CampaignBackend>,
    campaign_id: String,
    period: Duration,
    target: CampaignCell,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // A fetch still in flight when the poll is cancelled is dropped unread.
        let fetched = tokio::select! {
            _ = token.cancelled() => break,
            result = backend.fetch_campaign(&campaign_id) => result,
        };

        match fetched {
            Ok(campaign) => {
                if token.is_cancelled() {
                    break;
                }
                let status = campaign.status;
                // Observers woken by a terminal write must already see the poll as stopped.
                if status.is_terminal() {
                    token.cancel();
                }
                target.send_replace(Some(campaign));
                metrics::counter!("sync.poll.applied").increment(1);
                debug!(campaign_id = %campaign_id, status = ?status, "Campaign refreshed");

                if status.is_terminal() {
                    info!(campaign_id = %campaign_id, status = ?status, "Campaign finished, polling stopped");
                    break;
                }
            }
            Err(e) => {
                metrics::counter!("sync.poll.failures").increment(1);
                warn!(
                    campaign_id = %campaign_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Poll failed, retrying on next tick"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::ScriptedBackend;
    use outreach_core::{CampaignStatus, Channel, Draft, OutreachError, Stage};

    const PERIOD: Duration = Duration::from_secs(2);

    fn campaign(id: &str, status: CampaignStatus) -> Campaign {
        let campaign = Campaign::new(
            id,
            CampaignStatus::Running,
            Stage::Approval,
            vec![Draft::new(Channel::Sms, None, "Hi")],
        )
        .unwrap();
        match status {
            CampaignStatus::Completed => outreach_review::force_complete(&campaign),
            other => Campaign {
                status: other,
                ..campaign
            },
        }
    }

    fn synchronizer(backend: Arc<ScriptedBackend>) -> (PollingSynchronizer, CampaignCell) {
        let (tx, _rx) = watch::channel(None);
        let cell = Arc::new(tx);
        let poller = PollingSynchronizer::new(backend, Arc::clone(&cell), PERIOD);
        (poller, cell)
    }

    fn current_status(cell: &CampaignCell) -> Option<CampaignStatus> {
        cell.borrow().as_ref().map(|c| c.status)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fetch_waits_one_interval() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(campaign(
            "c-1",
            CampaignStatus::Running,
        ))]));
        let (mut poller, cell) = synchronizer(Arc::clone(&backend));

        poller.start("c-1");
        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(backend.fetch_count(), 0);
        assert!(cell.borrow().is_none());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(backend.fetch_count(), 1);
        assert_eq!(current_status(&cell), Some(CampaignStatus::Running));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_status_stops_polling() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(campaign("c-1", CampaignStatus::Running)),
            Ok(campaign("c-1", CampaignStatus::Completed)),
        ]));
        let (mut poller, cell) = synchronizer(Arc::clone(&backend));

        poller.start("c-1");
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(current_status(&cell), Some(CampaignStatus::Running));
        assert!(poller.is_active());

        tokio::time::sleep(PERIOD).await;
        assert_eq!(current_status(&cell), Some(CampaignStatus::Completed));
        assert_eq!(poller.state(), PollState::Idle);

        tokio::time::sleep(PERIOD * 5).await;
        assert_eq!(backend.fetch_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_terminal_write_observed_after_stop() {
        for _ in 0..100 {
            let backend = Arc::new(ScriptedBackend::new(vec![Ok(campaign(
                "c-1",
                CampaignStatus::Failed,
            ))]));
            let (tx, mut rx) = watch::channel(None);
            let cell = Arc::new(tx);
            let mut poller =
                PollingSynchronizer::new(backend, Arc::clone(&cell), Duration::from_millis(5));

            poller.start("c-1");
            tokio::time::timeout(Duration::from_secs(2), rx.changed())
                .await
                .unwrap()
                .unwrap();
            assert!(!poller.is_active());
            assert_eq!(poller.state(), PollState::Idle);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_keeps_state_and_polling() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(campaign("c-1", CampaignStatus::Running)),
            Err(OutreachError::Transport("connection reset".to_string())),
            Err(OutreachError::InvalidResponse("truncated body".to_string())),
            Ok(campaign("c-1", CampaignStatus::Failed)),
        ]));
        let (mut poller, cell) = synchronizer(Arc::clone(&backend));

        poller.start("c-1");
        tokio::time::sleep(Duration::from_millis(2100)).await;
        let before = cell.borrow().clone();

        tokio::time::sleep(PERIOD * 2).await;
        assert_eq!(backend.fetch_count(), 3);
        assert_eq!(*cell.borrow(), before);
        assert_eq!(
            poller.state(),
            PollState::Active {
                campaign_id: "c-1".to_string()
            }
        );

        tokio::time::sleep(PERIOD).await;
        assert_eq!(current_status(&cell), Some(CampaignStatus::Failed));
        assert!(!poller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_supersedes_previous_poll() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(campaign("c-2", CampaignStatus::Running)),
            Ok(campaign("c-2", CampaignStatus::Running)),
        ]));
        let (mut poller, _cell) = synchronizer(Arc::clone(&backend));

        poller.start("c-1");
        poller.start("c-2");
        assert_eq!(
            poller.state(),
            PollState::Active {
                campaign_id: "c-2".to_string()
            }
        );

        tokio::time::sleep(Duration::from_millis(4100)).await;
        assert_eq!(*backend.fetched.lock().unwrap(), vec!["c-2", "c-2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(campaign(
            "c-1",
            CampaignStatus::Running,
        ))]));
        let (mut poller, cell) = synchronizer(Arc::clone(&backend));

        poller.cancel();
        poller.start("c-1");
        poller.cancel();
        poller.cancel();
        assert_eq!(poller.state(), PollState::Idle);

        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(backend.fetch_count(), 0);
        assert!(cell.borrow().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_in_flight_fetch() {
        let backend = Arc::new(
            ScriptedBackend::new(vec![Ok(campaign("c-1", CampaignStatus::Completed))])
                .with_fetch_delay(Duration::from_secs(5)),
        );
        let (mut poller, cell) = synchronizer(Arc::clone(&backend));

        poller.start("c-1");
        tokio::time::sleep(Duration::from_millis(2500)).await;
        poller.cancel();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(cell.borrow().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(campaign(
            "c-1",
            CampaignStatus::Running,
        ))]));
        let (mut poller, cell) = synchronizer(Arc::clone(&backend));

        poller.start("c-1");
        drop(poller);

        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(backend.fetch_count(), 0);
        assert!(cell.borrow().is_none());
    }
}
