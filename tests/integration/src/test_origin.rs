//! Origin verification integration tests.
//!
//! Assume the server runs without `ORIGIN_ACCESS_KEY_ID`, so only digests
//! are checked.

#[cfg(test)]
mod tests {
    use crate::{client, endpoint_url, invoke_edge, origin_request_event};

    const BODY: &[u8] = b"{\"count\":10}";

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_accept_request_forwarded_by_edge() {
        let client = client();
        let event = origin_request_event("/count", BODY);
        let forwarded: serde_json::Value = invoke_edge(&client, &event)
            .await
            .json()
            .await
            .unwrap();
        let digest = forwarded["headers"]["x-content-sha256"][0]["value"]
            .as_str()
            .unwrap()
            .to_owned();

        let resp = client
            .post(format!("{}/count", endpoint_url()))
            .header("x-content-sha256", &digest)
            .body(BODY)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let verified: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(verified["digest"], digest);
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_forbid_body_changed_after_edge() {
        let client = client();
        let resp = client
            .post(format!("{}/count", endpoint_url()))
            .header(
                "x-content-sha256",
                "4c9caa2c9fbb5e5f0099ac08ff7a74fd9c6711d307d1e88705cb791b157d3404",
            )
            .body(&b"{\"count\":11}"[..])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403);
        let error: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(error["error"], "XAmzContentSHA256Mismatch");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_forbid_body_without_digest() {
        let client = client();
        let resp = client
            .post(format!("{}/count", endpoint_url()))
            .body(BODY)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403);
    }
}
