//! Health endpoint integration tests.

#[cfg(test)]
mod tests {
    use crate::{client, endpoint_url};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_edge_and_origin_running() {
        let resp = client()
            .get(format!("{}/health", endpoint_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let health: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(
            health,
            serde_json::json!({"services": {"edge": "running", "origin": "running"}})
        );
    }
}
