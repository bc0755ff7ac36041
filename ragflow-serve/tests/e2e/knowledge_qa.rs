use super::common;
use std::time::Duration;

#[tokio::test]
async fn knowledge_qa_streams_sse_events_to_completion() {
    let (url, _handle) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = tokio::time::timeout(
        Duration::from_secs(10),
        client
            .post(format!("{url}/api/v1/sessions/s1/knowledge-qa"))
            .json(&serde_json::json!({ "query": "what is ragflow?" }))
            .send(),
    )
    .await
    .expect("request should not time out")
    .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("event: message"));
    assert!(body.contains("\"response_type\":\"complete\""));
}

#[tokio::test]
async fn agent_qa_streams_sse_events_to_completion() {
    let (url, _handle) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = tokio::time::timeout(
        Duration::from_secs(10),
        client
            .post(format!("{url}/api/v1/sessions/s2/agent-qa"))
            .json(&serde_json::json!({ "query": "hello", "agent_enabled": true }))
            .send(),
    )
    .await
    .expect("request should not time out")
    .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("event: message"));
}
