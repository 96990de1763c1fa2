//! Campaign API router. Mounts the campaign endpoints under /api/v1/campaigns;
//! the health check answers on both `/` and `/health`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{self, BackendState};

pub fn backend_router(state: BackendState) -> Router {
    Router::new()
        .route("/api/v1/campaigns", post(handlers::create_campaign))
        .route("/api/v1/campaigns/:campaign_id", get(handlers::get_campaign))
        .route("/api/v1/campaigns/:campaign_id/approve", post(handlers::approve_campaign))
        .route("/", get(handlers::health_check))
        .route("/health", get(handlers::health_check))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use outreach_core::{Campaign, CampaignStatus};
    use outreach_review::{FixedSampler, ScoreRange};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::executor::PipelineExecutor;
    use crate::store::CampaignStore;

    fn app() -> Router {
        let executor = PipelineExecutor::new(
            Arc::new(CampaignStore::new()),
            Duration::from_millis(10),
            ScoreRange::default(),
            Box::new(FixedSampler(8.0)),
        );
        backend_router(BackendState { executor })
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        for uri in ["/", "/health"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
            assert_eq!(
                body_json(response).await,
                json!({"status": "ok", "service": "Outreach Engine API"})
            );
        }
    }

    #[tokio::test]
    async fn test_create_then_fetch() {
        let app = app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/campaigns",
                json!({"input_type": "text", "content": "Company: Acme"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let created: Campaign = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(created.status, CampaignStatus::Pending);
        assert_eq!(created.current_stage, "ingestion");

        let response = app
            .oneshot(get(&format!("/api/v1/campaigns/{}", created.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["campaign_id"], json!(created.id));
        assert_eq!(body["target_company"], json!("Acme"));
    }

    #[tokio::test]
    async fn test_blank_content_rejected() {
        let response = app()
            .oneshot(post_json(
                "/api/v1/campaigns",
                json!({"input_type": "url", "content": "   "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_campaign_is_404() {
        let app = app();
        let response = app
            .clone()
            .oneshot(get("/api/v1/campaigns/nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(post_json(
                "/api/v1/campaigns/nope/approve",
                json!({"approved": ["email"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_approve_acknowledges_batch() {
        let app = app();
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/campaigns",
                json!({"input_type": "url", "content": "https://linkedin.com/in/someone"}),
            ))
            .await
            .unwrap();
        let id = body_json(response).await["campaign_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/campaigns/{id}/approve"),
                json!({"approved": ["email"], "regen": ["sms"], "skipped": []}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "ok", "approved": ["email"], "regen": ["sms"], "skipped": []})
        );

        let response = app
            .oneshot(post_json(
                &format!("/api/v1/campaigns/{id}/approve"),
                json!({"approved": ["email"], "skipped": ["email"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
