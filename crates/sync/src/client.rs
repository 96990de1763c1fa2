//! Backend client: the [`CampaignBackend`] seam and its HTTP implementation.

use async_trait::async_trait;
use outreach_core::config::BackendConfig;
use outreach_core::{
    ApprovalSubmission, Campaign, CampaignStartRequest, OutreachError, OutreachResult,
};
use tracing::debug;
use url::Url;

const CAMPAIGNS_PATH: [&str; 3] = ["api", "v1", "campaigns"];

/// Operations the review flow needs from the campaign backend.
#[async_trait]
pub trait CampaignBackend: Send + Sync {
    /// Current full state of one campaign.
    async fn fetch_campaign(&self, campaign_id: &str) -> OutreachResult<Campaign>;

    /// Report a batch of reviewer decisions.
    async fn submit_approval(
        &self,
        campaign_id: &str,
        batch: &ApprovalSubmission,
    ) -> OutreachResult<()>;

    /// Start a campaign on the backend.
    async fn create_campaign(&self, request: &CampaignStartRequest) -> OutreachResult<Campaign>;
}

/// JSON-over-HTTP backend client.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> OutreachResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            OutreachError::Config(format!("invalid backend URL '{}': {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(OutreachError::Config(format!(
                "backend URL '{base_url}' cannot carry a path"
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| OutreachError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<base>/api/v1/campaigns[/<segment>...]`, with each segment percent-encoded.
    fn campaigns_url(&self, segments: &[&str]) -> OutreachResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| OutreachError::Config(format!("backend URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(CAMPAIGNS_PATH)
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl CampaignBackend for HttpBackend {
    async fn fetch_campaign(&self, campaign_id: &str) -> OutreachResult<Campaign> {
        let url = self.campaigns_url(&[campaign_id])?;
        debug!(%url, "Fetching campaign");
        let response = self.client.get(url).send().await.map_err(transport)?;
        decode_campaign(response).await
    }

    async fn submit_approval(
        &self,
        campaign_id: &str,
        batch: &ApprovalSubmission,
    ) -> OutreachResult<()> {
        let url = self.campaigns_url(&[campaign_id, "approve"])?;
        debug!(%url, decisions = batch.len(), "Submitting approval batch");
        let response = self
            .client
            .post(url)
            .json(batch)
            .send()
            .await
            .map_err(transport)?;
        ensure_success(&response)?;
        Ok(())
    }

    async fn create_campaign(&self, request: &CampaignStartRequest) -> OutreachResult<Campaign> {
        let url = self.campaigns_url(&[])?;
        debug!(%url, input_type = ?request.input_type, "Creating campaign");
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        decode_campaign(response).await
    }
}

fn transport(err: reqwest::Error) -> OutreachError {
    OutreachError::Transport(err.to_string())
}

fn ensure_success(response: &reqwest::Response) -> OutreachResult<()> {
    let status = response.status();
    if !status.is_success() {
        return Err(OutreachError::Transport(format!(
            "backend answered {status} for {}",
            response.url()
        )));
    }
    Ok(())
}

async fn decode_campaign(response: reqwest::Response) -> OutreachResult<Campaign> {
    ensure_success(&response)?;
    let body = response.bytes().await.map_err(transport)?;
    let campaign: Campaign = serde_json::from_slice(&body)
        .map_err(|e| OutreachError::InvalidResponse(format!("undecodable campaign: {e}")))?;
    campaign
        .validate()
        .map_err(|e| OutreachError::InvalidResponse(e.to_string()))?;
    Ok(campaign)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(&BackendConfig {
            base_url: base.to_string(),
            request_timeout_ms: None,
        })
        .unwrap()
    }

    #[test]
    fn test_campaign_urls() {
        let client = backend("http://localhost:8080");
        assert_eq!(
            client.campaigns_url(&["c-1"]).unwrap().as_str(),
            "http://localhost:8080/api/v1/campaigns/c-1"
        );
        assert_eq!(
            client.campaigns_url(&["c-1", "approve"]).unwrap().as_str(),
            "http://localhost:8080/api/v1/campaigns/c-1/approve"
        );
        assert_eq!(
            client.campaigns_url(&[]).unwrap().as_str(),
            "http://localhost:8080/api/v1/campaigns"
        );
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let client = backend("http://gateway.local/outreach/");
        assert_eq!(
            client.campaigns_url(&["a b"]).unwrap().as_str(),
            "http://gateway.local/outreach/api/v1/campaigns/a%20b"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpBackend::new(&BackendConfig {
            base_url: "not a url".to_string(),
            request_timeout_ms: Some(500),
        });
        assert!(matches!(result, Err(OutreachError::Config(_))));

        let result = HttpBackend::new(&BackendConfig {
            base_url: "mailto:someone@example.com".to_string(),
            request_timeout_ms: None,
        });
        assert!(matches!(result, Err(OutreachError::Config(_))));
    }
}
