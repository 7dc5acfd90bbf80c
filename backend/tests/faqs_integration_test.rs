//! Integration tests for the ordered FAQ list on Postgres
//!
//! The list is global, so every scenario runs inside a single test.

mod common;

use axum::http::{Method, StatusCode};
use kummerkasten_backend::services::RepositionOutcome;
use kummerkasten_shared::UserRole;
use serde_json::{json, Value};
use uuid::Uuid;

fn order(list: &Value) -> Vec<(String, i64)> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|p| {
            (
                p["question"].as_str().unwrap().to_string(),
                p["position"].as_i64().unwrap(),
            )
        })
        .collect()
}

fn expected(labels: &[&str]) -> Vec<(String, i64)> {
    labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.to_string(), i as i64))
        .collect()
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_faq_ordering_on_postgres() {
    let app = common::TestApp::new().await;
    app.cleanup().await;

    let admin = app.create_user(UserRole::Admin, "admin-password").await;
    let session = app.login(&admin.email, "admin-password").await;

    let mut ids = Vec::new();
    for question in ["A", "B", "C", "D"] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/faqs",
                Some(&session),
                Some(json!({ "question": question, "answer": format!("Answer {}", question) })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        ids.push(response.json()["id"].as_str().unwrap().parse::<Uuid>().unwrap());
    }

    // Earlier move: D to 1
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/faqs/{}/position", ids[3]),
            Some(&session),
            Some(json!({ "position": 1 })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(order(&response.json()), expected(&["A", "D", "B", "C"]));

    // Later move: A to 3
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/faqs/{}/position", ids[0]),
            Some(&session),
            Some(json!({ "position": 3 })),
        )
        .await;
    assert_eq!(order(&response.json()), expected(&["D", "B", "C", "A"]));

    // Out of range leaves the list alone
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/faqs/{}/position", ids[0]),
            Some(&session),
            Some(json!({ "position": 4 })),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    // Remove closes the gap
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/faqs/{}", ids[1]),
            Some(&session),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    let response = app.get("/api/v1/faqs").await;
    assert_eq!(order(&response.json()), expected(&["D", "C", "A"]));

    // Concurrent moves either succeed or report a conflict, never corrupt
    let faqs = app.state.faqs().clone();
    let tasks: Vec<_> = [(ids[3], 2), (ids[2], 0), (ids[0], 1)]
        .into_iter()
        .map(|(id, target)| {
            let faqs = faqs.clone();
            tokio::spawn(async move { faqs.reposition(id, target).await })
        })
        .collect();
    for task in tasks {
        match task.await.unwrap() {
            Ok(RepositionOutcome::Moved { .. }) | Ok(RepositionOutcome::Unchanged) => {}
            Err(e) => assert!(
                matches!(e, kummerkasten_backend::error::RepositionError::ConcurrentModification),
                "unexpected error: {}",
                e
            ),
        }
    }
    let positions: Vec<i64> = order(&app.get("/api/v1/faqs").await.json())
        .into_iter()
        .map(|(_, p)| p)
        .collect();
    assert_eq!(positions, vec![0, 1, 2]);

    app.cleanup().await;
}
