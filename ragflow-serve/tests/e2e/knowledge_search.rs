use super::common;

#[tokio::test]
async fn knowledge_search_with_no_registered_engines_returns_empty_results() {
    let (url, _handle) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{url}/api/v1/knowledge-search"))
        .json(&serde_json::json!({
            "query": "what is ragflow?",
            "knowledge_base_ids": ["kb1"],
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["results"].as_array().unwrap().len(), 0);
}
