use super::common;

#[tokio::test]
async fn healthz_returns_ok() {
    let (url, _handle) = common::spawn_server().await;
    let resp = reqwest::get(format!("{url}/healthz")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}
