//! Edge interceptor integration tests.

#[cfg(test)]
mod tests {
    use crate::{client, invoke_edge, origin_request_event};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_inject_digest_of_decoded_body() {
        let client = client();
        let event = origin_request_event("/count", b"{\"count\":10}");

        let resp = invoke_edge(&client, &event).await;
        assert_eq!(resp.status(), 200);

        let request: serde_json::Value = resp.json().await.unwrap();
        let digest = &request["headers"]["x-content-sha256"];
        assert_eq!(digest.as_array().map(Vec::len), Some(1));
        assert_eq!(
            digest[0]["value"],
            "4c9caa2c9fbb5e5f0099ac08ff7a74fd9c6711d307d1e88705cb791b157d3404"
        );
        // Untouched fields survive the round trip.
        assert_eq!(request["clientIp"], "203.0.113.178");
        assert_eq!(request["uri"], "/count");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_leave_bodiless_request_unchanged() {
        let client = client();
        let mut event = origin_request_event("/count", b"");
        event["Records"][0]["cf"]["request"]
            .as_object_mut()
            .unwrap()
            .remove("body");

        let resp = invoke_edge(&client, &event).await;
        assert_eq!(resp.status(), 200);
        let request: serde_json::Value = resp.json().await.unwrap();
        assert!(request["headers"].get("x-content-sha256").is_none());
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_replace_spoofed_digest_header() {
        let client = client();
        let mut event = origin_request_event("/count", b"{\"count\":11}");
        event["Records"][0]["cf"]["request"]["headers"]["x-content-sha256"] =
            serde_json::json!([{ "key": "X-Content-SHA256", "value": "0".repeat(64) }]);

        let resp = invoke_edge(&client, &event).await;
        assert_eq!(resp.status(), 200);
        let request: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(
            request["headers"]["x-content-sha256"],
            serde_json::json!([{
                "key": "x-content-sha256",
                "value": "7512669ba3d728b7c043f6d90372533fbd036755844fb231b0bf242e2f712bbf"
            }])
        );
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_fail_closed_on_malformed_base64() {
        let client = client();
        let mut event = origin_request_event("/count", b"x");
        event["Records"][0]["cf"]["request"]["body"]["data"] = "%%%".into();

        let resp = invoke_edge(&client, &event).await;
        assert_eq!(resp.status(), 400);
        let error: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(error["error"], "MalformedBodyEncoding");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_truncated_body() {
        let client = client();
        let mut event = origin_request_event("/count", b"{\"count\":10}");
        event["Records"][0]["cf"]["request"]["body"]["inputTruncated"] = true.into();

        let resp = invoke_edge(&client, &event).await;
        assert_eq!(resp.status(), 400);
        let error: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(error["error"], "BodyTruncated");
    }
}
