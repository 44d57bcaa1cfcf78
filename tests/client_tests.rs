//! Integration tests for the request engine and token lifecycle.
//!
//! All tests run against a local `httpmock` server standing in for both
//! the API gateway and the identity provider; no network access needed.
//!
//! Run with: cargo test --test client_tests

use std::sync::Once;

use chrono::Utc;
use futures::StreamExt;
use httpmock::prelude::*;
use serde_json::json;

use omnia_rs::auth::AuthConfig;
use omnia_rs::{
    ClientConfig, DataPointsQuery, Error, OmniaClient, TimeSeriesFilter, TimeSeriesId,
};

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

const TENANT: &str = "test-tenant";
const RESOURCE: &str = "resource-1";
const CLIENT_ID: &str = "client-1";

/// Stand up an identity-provider token endpoint issuing a token that
/// expires `expires_in_secs` from now.
async fn mock_idp(server: &MockServer, expires_in_secs: i64) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/{}/oauth2/token", TENANT));
            then.status(200).json_body(json!({
                "accessToken": "test-token",
                "expiresOn": Utc::now().timestamp() + expires_in_secs,
                "resource": RESOURCE,
                "clientId": CLIENT_ID,
            }));
        })
        .await
}

/// Build a client pointing both the gateway and the identity provider at
/// the mock server.
fn make_client(server: &MockServer) -> OmniaClient {
    init_logging();

    let auth = AuthConfig::with_secret(TENANT, RESOURCE, CLIENT_ID, "shared-secret")
        .expect("valid auth config")
        .with_idp_base_url(server.base_url());

    OmniaClient::new(
        ClientConfig::default().with_base_url(server.base_url()),
        auth,
    )
    .expect("client should build")
}

mod token_tests {
    use super::*;

    #[tokio::test]
    async fn cached_token_is_reused_without_network_calls() {
        let server = MockServer::start_async().await;
        let idp = mock_idp(&server, 3600).await;
        let api = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/timeseries/v1.5/")
                    .header("authorization", "Bearer test-token");
                then.status(200)
                    .json_body(json!({"data": {"items": []}}));
            })
            .await;

        let client = make_client(&server);
        client.time_series().list(None).await.unwrap();
        client.time_series().list(None).await.unwrap();

        // Two API calls, one token exchange.
        idp.assert_hits_async(1).await;
        api.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn expired_token_triggers_exactly_one_refresh_per_call() {
        let server = MockServer::start_async().await;
        let idp = mock_idp(&server, -60).await;
        let api = server
            .mock_async(|when, then| {
                when.method(GET).path("/timeseries/v1.5/");
                then.status(200)
                    .json_body(json!({"data": {"items": []}}));
            })
            .await;

        let client = make_client(&server);
        client.time_series().list(None).await.unwrap();
        client.time_series().list(None).await.unwrap();

        // Always-expired tokens force a fresh exchange on every call.
        idp.assert_hits_async(2).await;
        api.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn failed_exchange_prevents_the_api_request() {
        let server = MockServer::start_async().await;
        let idp = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("/{}/oauth2/token", TENANT));
                then.status(401)
                    .json_body(json!({"error": "invalid_client"}));
            })
            .await;
        let api = server
            .mock_async(|when, then| {
                when.method(GET).path("/timeseries/v1.5/");
                then.status(200)
                    .json_body(json!({"data": {"items": []}}));
            })
            .await;

        let client = make_client(&server);
        let err = client.time_series().list(None).await.unwrap_err();

        assert!(matches!(err, Error::Authentication(_)), "{:?}", err);
        idp.assert_hits_async(1).await;
        api.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn concurrent_callers_share_a_single_token_exchange() {
        let server = MockServer::start_async().await;
        let idp = mock_idp(&server, 3600).await;

        let client = make_client(&server);
        let manager = client.token_manager();

        // Both callers race on the empty slot; the write lock serializes
        // them and the second finds the fresh token.
        let (a, b) = tokio::join!(
            manager.get_valid_token(chrono::Duration::zero()),
            manager.get_valid_token(chrono::Duration::zero()),
        );
        a.unwrap();
        b.unwrap();

        idp.assert_hits_async(1).await;
    }
}

mod device_code_tests {
    use super::*;
    use chrono::Duration;
    use omnia_rs::auth::TokenManager;

    fn interactive_manager(server: &MockServer) -> TokenManager {
        init_logging();

        let auth = AuthConfig::interactive(TENANT, RESOURCE, CLIENT_ID)
            .expect("valid auth config")
            .with_idp_base_url(server.base_url());
        TokenManager::new(auth, reqwest::Client::new())
    }

    /// Stand up the device-code endpoint handing out a code that expires
    /// `expires_in` seconds from now, with the minimum poll interval.
    async fn mock_device_code(server: &MockServer, expires_in: u64) -> httpmock::Mock<'_> {
        server
            .mock_async(move |when, then| {
                when.method(POST)
                    .path(format!("/{}/oauth2/devicecode", TENANT));
                then.status(200).json_body(json!({
                    "deviceCode": "dev-1",
                    "userCode": "ABCD-EFGH",
                    "verificationUrl": "https://aka.ms/devicelogin",
                    "expiresIn": expires_in,
                    "interval": 0,
                    "message": "enter ABCD-EFGH at https://aka.ms/devicelogin",
                }));
            })
            .await
    }

    #[tokio::test]
    async fn pending_polls_continue_until_the_token_is_granted() {
        let server = MockServer::start_async().await;
        let device = mock_device_code(&server, 900).await;
        let mut pending = server
            .mock_async(|when, then| {
                when.method(POST).path(format!("/{}/oauth2/token", TENANT));
                then.status(400)
                    .json_body(json!({"error": "authorization_pending"}));
            })
            .await;

        let manager = interactive_manager(&server);
        let task = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_valid_token(Duration::zero()).await })
        };

        // Let the first poll land on the pending response, then have the
        // provider grant the token.
        while pending.hits_async().await < 1 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        pending.delete_async().await;
        let granted = mock_idp(&server, 3600).await;

        let credential = task.await.unwrap().unwrap();
        assert_eq!(credential.client_id, CLIENT_ID);
        device.assert_hits_async(1).await;
        granted.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn slow_down_backs_off_and_keeps_polling() {
        let server = MockServer::start_async().await;
        mock_device_code(&server, 900).await;
        let mut slow = server
            .mock_async(|when, then| {
                when.method(POST).path(format!("/{}/oauth2/token", TENANT));
                then.status(400).json_body(json!({"error": "slow_down"}));
            })
            .await;

        let manager = interactive_manager(&server);
        let task = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_valid_token(Duration::zero()).await })
        };

        // A slow_down answer must not abort the flow; once the provider
        // grants the token on the next (delayed) poll, the flow succeeds.
        while slow.hits_async().await < 1 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        slow.delete_async().await;
        let granted = mock_idp(&server, 3600).await;

        let credential = task.await.unwrap().unwrap();
        assert!(credential.is_valid_at(Utc::now(), Duration::zero()));
        granted.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn a_terminal_provider_error_aborts_the_flow() {
        let server = MockServer::start_async().await;
        mock_device_code(&server, 900).await;
        let token = server
            .mock_async(|when, then| {
                when.method(POST).path(format!("/{}/oauth2/token", TENANT));
                then.status(400).json_body(json!({"error": "access_denied"}));
            })
            .await;

        let manager = interactive_manager(&server);
        let err = manager.get_valid_token(Duration::zero()).await.unwrap_err();

        assert!(matches!(err, Error::Authentication(_)), "{:?}", err);
        assert!(err.to_string().contains("access_denied"), "{}", err);
        token.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn an_expired_device_code_ends_the_flow_without_polling() {
        let server = MockServer::start_async().await;
        mock_device_code(&server, 0).await;
        let token = server
            .mock_async(|when, then| {
                when.method(POST).path(format!("/{}/oauth2/token", TENANT));
                then.status(400)
                    .json_body(json!({"error": "authorization_pending"}));
            })
            .await;

        let manager = interactive_manager(&server);
        let err = manager.get_valid_token(Duration::zero()).await.unwrap_err();

        assert!(matches!(err, Error::Authentication(_)), "{:?}", err);
        assert!(err.to_string().contains("expired"), "{}", err);
        token.assert_hits_async(0).await;
    }
}

mod pagination_tests {
    use super::*;

    #[tokio::test]
    async fn continuation_tokens_are_followed_until_exhausted() {
        let server = MockServer::start_async().await;
        mock_idp(&server, 3600).await;

        let page1 = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/timeseries/v1.5/")
                    .query_param_missing("continuationToken");
                then.status(200).json_body(json!({
                    "data": {"items": [
                        {"id": "ts-1", "name": "first"},
                        {"id": "ts-2", "name": "second"},
                    ]},
                    "continuationToken": "tok-2",
                }));
            })
            .await;
        let page2 = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/timeseries/v1.5/")
                    .query_param("continuationToken", "tok-2");
                then.status(200).json_body(json!({
                    "data": {"items": [
                        {"id": "ts-3", "name": "third"},
                    ]},
                }));
            })
            .await;

        let client = make_client(&server);
        let series = client.time_series().list(None).await.unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series[2].id, TimeSeriesId::new("ts-3"));
        page1.assert_hits_async(1).await;
        page2.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn limit_stops_pagination_at_the_page_boundary() {
        let server = MockServer::start_async().await;
        mock_idp(&server, 3600).await;

        let page1 = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/timeseries/v1.5/")
                    .query_param("limit", "2")
                    .query_param_missing("continuationToken");
                then.status(200).json_body(json!({
                    "data": {"items": [
                        {"id": "ts-1", "name": "first"},
                        {"id": "ts-2", "name": "second"},
                    ]},
                    "continuationToken": "tok-2",
                }));
            })
            .await;
        let page2 = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/timeseries/v1.5/")
                    .query_param("continuationToken", "tok-2");
                then.status(200).json_body(json!({
                    "data": {"items": [
                        {"id": "ts-3", "name": "third"},
                        {"id": "ts-4", "name": "fourth"},
                    ]},
                }));
            })
            .await;

        let client = make_client(&server);
        let filter = TimeSeriesFilter {
            limit: Some(2),
            ..Default::default()
        };
        let series = client.time_series().list(Some(filter)).await.unwrap();

        // 2 >= limit after the first page, so the token is not followed.
        assert_eq!(series.len(), 2);
        page1.assert_hits_async(1).await;
        page2.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn excess_items_on_the_final_page_are_trimmed_to_the_limit() {
        let server = MockServer::start_async().await;
        mock_idp(&server, 3600).await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/timeseries/v1.5/");
                then.status(200).json_body(json!({
                    "data": {"items": [
                        {"id": "ts-1", "name": "first"},
                        {"id": "ts-2", "name": "second"},
                        {"id": "ts-3", "name": "third"},
                    ]},
                }));
            })
            .await;

        let client = make_client(&server);
        let filter = TimeSeriesFilter {
            limit: Some(2),
            ..Default::default()
        };
        let series = client.time_series().list(Some(filter)).await.unwrap();

        assert_eq!(series.len(), 2);
    }

    #[tokio::test]
    async fn data_point_pages_are_counted_by_point_not_item() {
        let server = MockServer::start_async().await;
        mock_idp(&server, 3600).await;

        let page1 = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/timeseries/v1.5/ts-1/data/")
                    .query_param_missing("continuationToken");
                then.status(200).json_body(json!({
                    "data": {"items": [{
                        "id": "ts-1",
                        "name": "series",
                        "unit": "bar",
                        "datapoints": [
                            {"time": "2020-01-01T12:00:00Z", "value": 100, "status": 0},
                            {"time": "2020-01-02T12:00:00Z", "value": 200, "status": 0},
                            {"time": "2020-01-03T12:00:00Z", "value": 150, "status": 0},
                        ],
                    }]},
                    "continuationToken": "tok-2",
                }));
            })
            .await;
        let page2 = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/timeseries/v1.5/ts-1/data/")
                    .query_param("continuationToken", "tok-2");
                then.status(200).json_body(json!({
                    "data": {"items": []},
                }));
            })
            .await;

        let client = make_client(&server);
        let query = DataPointsQuery {
            limit: Some(3),
            ..Default::default()
        };
        let data = client
            .time_series()
            .data(&TimeSeriesId::new("ts-1"), query)
            .await
            .unwrap();

        // Three points satisfy limit=3 at the first page boundary.
        assert_eq!(data.len(), 3);
        assert_eq!(data.unit.as_deref(), Some("bar"));
        page1.assert_hits_async(1).await;
        page2.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn list_stream_yields_items_across_pages() {
        let server = MockServer::start_async().await;
        mock_idp(&server, 3600).await;

        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/timeseries/v1.5/")
                    .query_param_missing("continuationToken");
                then.status(200).json_body(json!({
                    "data": {"items": [
                        {"id": "ts-1", "name": "first"},
                        {"id": "ts-2", "name": "second"},
                    ]},
                    "continuationToken": "tok-2",
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/timeseries/v1.5/")
                    .query_param("continuationToken", "tok-2");
                then.status(200).json_body(json!({
                    "data": {"items": [
                        {"id": "ts-3", "name": "third"},
                    ]},
                }));
            })
            .await;

        let client = make_client(&server);
        let stream = client.time_series().list_stream(None);
        let series: Vec<_> = stream
            .map(|result| result.unwrap())
            .collect::<Vec<_>>()
            .await;

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].name, "first");
        assert_eq!(series[2].name, "third");
    }
}

mod error_tests {
    use super::*;

    #[tokio::test]
    async fn non_2xx_responses_become_typed_api_errors() {
        let server = MockServer::start_async().await;
        mock_idp(&server, 3600).await;

        let api = server
            .mock_async(|when, then| {
                when.method(GET).path("/timeseries/v1.5/missing-id/");
                then.status(404).json_body(json!({"message": "not found"}));
            })
            .await;

        let client = make_client(&server);
        let err = client
            .time_series()
            .retrieve(&TimeSeriesId::new("missing-id"))
            .await
            .unwrap_err();

        match err {
            Error::Api {
                status,
                reason,
                message,
                ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(reason, "Not Found");
                assert_eq!(message, "not found");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
        api.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn malformed_success_bodies_are_a_protocol_error() {
        let server = MockServer::start_async().await;
        mock_idp(&server, 3600).await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/timeseries/v1.5/");
                then.status(200).json_body(json!({"unexpected": "shape"}));
            })
            .await;

        let client = make_client(&server);
        let err = client.time_series().list(None).await.unwrap_err();

        assert!(matches!(err, Error::Protocol(_)), "{:?}", err);
    }
}

mod mapping_tests {
    use super::*;

    #[tokio::test]
    async fn wire_camel_case_items_map_into_snake_case_models() {
        let server = MockServer::start_async().await;
        mock_idp(&server, 3600).await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/timeseries/v1.5/");
                then.status(200).json_body(json!({
                    "data": {"items": [{
                        "id": "ts-1",
                        "name": "PT-1073",
                        "assetId": "asset-9",
                        "externalId": "ext-3",
                        "createdTime": "2019-10-14T09:46:49.606Z",
                        "step": false,
                        "unit": "bar",
                    }]},
                }));
            })
            .await;

        let client = make_client(&server);
        let series = client.time_series().list(None).await.unwrap();

        assert_eq!(series.len(), 1);
        let ts = &series[0];
        assert_eq!(ts.asset_id.as_ref().map(|a| a.as_str()), Some("asset-9"));
        assert_eq!(ts.external_id.as_deref(), Some("ext-3"));
        assert!(ts.created_time.is_some());
    }

    #[tokio::test]
    async fn create_posts_a_camel_case_body_and_maps_the_result() {
        let server = MockServer::start_async().await;
        mock_idp(&server, 3600).await;

        let api = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/timeseries/v1.5/")
                    .json_body_includes(r#"{"name": "PT-1073", "assetId": "asset-9"}"#);
                then.status(200).json_body(json!({
                    "data": {"items": [{
                        "id": "ts-new",
                        "name": "PT-1073",
                        "assetId": "asset-9",
                        "step": false,
                    }]},
                }));
            })
            .await;

        let client = make_client(&server);
        let created = client
            .time_series()
            .create(
                omnia_rs::NewTimeSeries::new("PT-1073")
                    .with_asset_id(omnia_rs::AssetId::new("asset-9")),
            )
            .await
            .unwrap();

        assert_eq!(created.id, TimeSeriesId::new("ts-new"));
        api.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn latest_data_on_an_empty_window_is_none() {
        let server = MockServer::start_async().await;
        mock_idp(&server, 3600).await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/timeseries/v1.5/ts-1/data/latest/");
                then.status(200).json_body(json!({
                    "data": {"items": [{
                        "id": "ts-1",
                        "name": "series",
                        "datapoints": [],
                    }]},
                }));
            })
            .await;

        let client = make_client(&server);
        let point = client
            .time_series()
            .latest_data(&TimeSeriesId::new("ts-1"), None)
            .await
            .unwrap();

        // A series with no points before the bound is not an error.
        assert!(point.is_none());
    }
}
