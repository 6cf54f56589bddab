// =============================================================================
// HTTP feed client — plain JSON GETs for the series source and order feed
// =============================================================================
//
// Both collaborators share one `reqwest::Client` (connection pool).  The
// client-level timeout is a backstop; the refresh cycle applies its own
// per-pass deadline on top.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::parse::{parse_orders, parse_series};
use super::{FeedError, OrderFeed, SeriesSource};
use crate::types::{OrderAnnotation, PriceBar};

/// Thin wrapper around a pooled HTTP client.
#[derive(Clone)]
pub struct FeedClient {
    client: reqwest::Client,
}

impl FeedClient {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("shadowpips/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build reqwest client")?;

        debug!(timeout_ms = timeout.as_millis() as u64, "FeedClient initialised");
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    #[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    /// Serve a fixed JSON document at `/data.json` on a random local port.
    async fn serve_fixture(status: StatusCode, body: &'static str) -> String {
        let app = Router::new().route(
            "/data.json",
            get(move || async move { (status, [(header::CONTENT_TYPE, "application/json")], body) }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}/data.json")
    }

    fn client() -> Arc<FeedClient> {
        let inner = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        Arc::new(FeedClient::from_client(inner))
    }

    #[tokio::test]
    async fn series_source_parses_document() {
        let url = serve_fixture(
            StatusCode::OK,
            r#"[{"time":1,"open":1,"high":2,"low":0.5,"close":1.5}]"#,
        )
        .await;
        let bars = HttpSeriesSource::new(client(), url).fetch_series().await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 1.5);
    }

    #[tokio::test]
    async fn order_feed_parses_document() {
        let url = serve_fixture(StatusCode::OK, r#"[{"price":"150.25","label":"buy limit"}]"#).await;
        let orders = HttpOrderFeed::new(client(), url).fetch_orders().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].price, 150.25);
        assert_eq!(orders[0].label, "buy limit");
    }

    #[tokio::test]
    async fn non_2xx_is_fetch_error() {
        let url = serve_fixture(StatusCode::SERVICE_UNAVAILABLE, "{}").await;
        let err = HttpOrderFeed::new(client(), url).fetch_orders().await.unwrap_err();
        assert!(matches!(err, FeedError::Fetch(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn missing_document_is_fetch_error() {
        let url = serve_fixture(StatusCode::OK, "[]").await;
        let url = url.replace("data.json", "other.json");
        let err = HttpSeriesSource::new(client(), url).fetch_series().await.unwrap_err();
        assert!(matches!(err, FeedError::Fetch(ref m) if m.contains("404")));
    }

    #[tokio::test]
    async fn bad_body_is_malformed() {
        let url = serve_fixture(StatusCode::OK, r#"{"orders": []}"#).await;
        let err = HttpOrderFeed::new(client(), url).fetch_orders().await.unwrap_err();
        assert!(matches!(err, FeedError::Malformed(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_fetch_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = format!("http://{addr}/nothing.json");
        let err = HttpSeriesSource::new(client(), url).fetch_series().await.unwrap_err();
        assert!(matches!(err, FeedError::Fetch(_)));
    }
}
