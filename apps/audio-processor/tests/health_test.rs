//! Integration tests for the health endpoint

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, http::StatusCode};
use tower::ServiceExt;

use common::*;
use multitune_audio_processor::health::health_router;
use multitune_audio_processor::{JobIntake, JobStatus};

async fn get_health(router: axum::Router) -> (StatusCode, serde_json::Value) {
    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_reports_idle_pool() {
    let (_store, repository) = memory_repository();
    let pool = pool(2, &repository, Arc::new(FailingProcessor));

    let (status, body) = get_health(health_router(pool)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"status": "healthy", "active_jobs": 0}));
}

#[tokio::test]
async fn test_health_counts_active_jobs() {
    let (_store, repository) = memory_repository();
    let processor = Arc::new(GatedProcessor::default());
    let pool = pool(1, &repository, processor.clone());
    let intake = JobIntake::new(repository.clone(), pool.clone());

    intake.handle_message(&message("j1", 1)).await;
    processor.started.notified().await;

    let (_, body) = get_health(health_router(pool.clone())).await;
    assert_eq!(body["active_jobs"], 1);

    processor.release.notify_one();
    wait_for_status(&repository, "j1", JobStatus::Completed).await;
    assert!(pool.wait_idle(Duration::from_secs(2)).await);

    let (_, body) = get_health(health_router(pool)).await;
    assert_eq!(body["active_jobs"], 0);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (_store, repository) = memory_repository();
    let router = health_router(pool(1, &repository, Arc::new(FailingProcessor)));

    let response = router
        .oneshot(Request::builder().uri("/jobs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
