//! # Remote Endpoints
//!
//! Where transactions go, and where reference data comes from.
//!
//! ## Submission Contract
//! ```text
//! POST <endpoint_url>
//! Content-Type: application/json
//! Idempotency-Key: <transaction id>
//!
//! { "id": "trx-1760779800000-3fa1b2c4", "items": [...], "subtotal": ..., ... }
//!
//! 2xx            → success
//! 409 Conflict   → success (already recorded by an earlier attempt)
//! 5xx            → RemoteUnavailable (retryable)
//! other 4xx      → Rejected
//! no response    → ConnectionFailed / Timeout
//! ```
//!
//! Submissions are at-least-once: a response lost after the remote committed
//! leads to a resend, which the idempotency key lets the remote ignore.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use std::marker::PhantomData;
use std::time::Duration;
use tally_core::{ReferenceRecord, Transaction};
use tracing::debug;
use url::Url;

use crate::error::{SyncError, SyncResult};

/// Header carrying the transaction id on every submission.
pub const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

// =============================================================================
// Traits
// =============================================================================

/// The remote transaction sink.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    /// Submits one transaction. `Ok` means the remote has it.
    async fn submit(&self, tx: &Transaction) -> SyncResult<()>;
}

/// A remote source of reference records.
#[async_trait]
pub trait ReferenceSource<R: ReferenceRecord>: Send + Sync {
    /// Fetches the full current set.
    async fn fetch_all(&self) -> SyncResult<Vec<R>>;
}

// =============================================================================
// HTTP Endpoint
// =============================================================================

/// Submits transactions as JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

fn build_client(timeout: Duration) -> SyncResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SyncError::Internal(format!("HTTP client: {e}")))
}

fn map_send_error(err: reqwest::Error, timeout: Duration) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout(timeout)
    } else {
        SyncError::from(err)
    }
}

impl HttpEndpoint {
    /// Creates an endpoint posting to `url`, giving up after `timeout`.
    pub fn new(url: &str, timeout: Duration) -> SyncResult<Self> {
        Ok(HttpEndpoint {
            client: build_client(timeout)?,
            url: Url::parse(url)?,
            timeout,
        })
    }

    /// The URL submissions go to.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl RemoteEndpoint for HttpEndpoint {
    async fn submit(&self, tx: &Transaction) -> SyncResult<()> {
        // Encode up front: an encoding failure is local, not a network error.
        let body = serde_json::to_vec(tx)?;
        let key = HeaderValue::from_str(&tx.id)
            .map_err(|e| SyncError::Unsendable(format!("idempotency key {:?}: {e}", tx.id)))?;

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(IDEMPOTENCY_KEY, key)
            .body(body)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::CONFLICT {
            debug!(id = %tx.id, status = status.as_u16(), "Remote accepted transaction");
            return Ok(());
        }

        if status.is_server_error() {
            return Err(SyncError::RemoteUnavailable {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Fetches a JSON array of reference records with a GET.
#[derive(Debug, Clone)]
pub struct HttpReferenceSource<R> {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
    _record: PhantomData<fn() -> R>,
}

impl<R> HttpReferenceSource<R> {
    /// Creates a source reading from `url`.
    pub fn new(url: &str, timeout: Duration) -> SyncResult<Self> {
        Ok(HttpReferenceSource {
            client: build_client(timeout)?,
            url: Url::parse(url)?,
            timeout,
            _record: PhantomData,
        })
    }
}

#[async_trait]
impl<R: ReferenceRecord> ReferenceSource<R> for HttpReferenceSource<R> {
    async fn fetch_all(&self) -> SyncResult<Vec<R>> {
        let records = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| map_send_error(e, self.timeout))?
            .json::<Vec<R>>()
            .await
            .map_err(|e| SyncError::ConnectionFailed(format!("decode {}: {e}", R::KIND)))?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sale_at;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::Utc;
    use std::sync::{Arc, Mutex};
    use tally_core::{Money, Product};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_submit_posts_json_with_idempotency_key() {
        let seen: Arc<Mutex<Vec<(String, Transaction)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let router = Router::new().route(
            "/transactions",
            post(move |headers: HeaderMap, Json(tx): Json<Transaction>| {
                let sink = Arc::clone(&sink);
                async move {
                    let key = headers
                        .get(IDEMPOTENCY_KEY)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    sink.lock().unwrap().push((key, tx));
                    AxumStatus::CREATED
                }
            }),
        );
        let base = serve(router).await;

        let endpoint =
            HttpEndpoint::new(&format!("{base}/transactions"), Duration::from_secs(5)).unwrap();
        let tx = sale_at(1_700_000_000_000);
        endpoint.submit(&tx).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, tx.id);
        assert_eq!(seen[0].1, tx);
    }

    #[tokio::test]
    async fn test_conflict_counts_as_success() {
        let router = Router::new().route("/tx", post(|| async { AxumStatus::CONFLICT }));
        let base = serve(router).await;

        let endpoint = HttpEndpoint::new(&format!("{base}/tx"), Duration::from_secs(5)).unwrap();
        assert!(endpoint.submit(&sale_at(1_000)).await.is_ok());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let router =
            Router::new().route("/tx", post(|| async { AxumStatus::SERVICE_UNAVAILABLE }));
        let base = serve(router).await;

        let endpoint = HttpEndpoint::new(&format!("{base}/tx"), Duration::from_secs(5)).unwrap();
        let err = endpoint.submit(&sale_at(1_000)).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteUnavailable { status: 503 }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_client_error_is_rejected() {
        let router = Router::new().route(
            "/tx",
            post(|| async { (AxumStatus::UNPROCESSABLE_ENTITY, "bad totals") }),
        );
        let base = serve(router).await;

        let endpoint = HttpEndpoint::new(&format!("{base}/tx"), Duration::from_secs(5)).unwrap();
        match endpoint.submit(&sale_at(1_000)).await.unwrap_err() {
            SyncError::Rejected { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "bad totals");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_is_connection_failure() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint =
            HttpEndpoint::new(&format!("http://{addr}/tx"), Duration::from_secs(2)).unwrap();
        let err = endpoint.submit(&sale_at(1_000)).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!err.is_storage_error());
    }

    #[tokio::test]
    async fn test_bad_header_id_fails_only_that_item() {
        let router = Router::new().route("/tx", post(|| async { AxumStatus::CREATED }));
        let base = serve(router).await;
        let endpoint = HttpEndpoint::new(&format!("{base}/tx"), Duration::from_secs(5)).unwrap();

        let mut bad = sale_at(1_000);
        bad.id = "trx-\u{7f}".into();
        let err = endpoint.submit(&bad).await.unwrap_err();
        assert!(matches!(err, SyncError::Unsendable(_)));
        assert!(!err.is_storage_error());

        // The endpoint keeps working for the next item.
        endpoint.submit(&sale_at(2_000)).await.unwrap();
    }

    #[tokio::test]
    async fn test_reference_source_fetches_records() {
        let products = vec![Product {
            id: "p-1".into(),
            name: "Kopi".into(),
            sku: None,
            category: None,
            price: Money::from_minor(12_000),
            unit: "cup".into(),
            last_updated: Utc::now(),
        }];
        let served = products.clone();
        let router = Router::new().route(
            "/products",
            get(move || {
                let served = served.clone();
                async move { Json(served) }
            }),
        );
        let base = serve(router).await;

        let source: HttpReferenceSource<Product> =
            HttpReferenceSource::new(&format!("{base}/products"), Duration::from_secs(5)).unwrap();
        assert_eq!(source.fetch_all().await.unwrap(), products);
    }
}
