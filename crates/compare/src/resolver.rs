//! Resolution of a historical year into a tile source.
//!
//! The remote resolver answers `GET /api/tile-url/{year}` with
//! `{ success, tileUrl?, error? }`. Every [`HistoricalSourceResolver::begin`]
//! allocates a new generation; only the latest generation is authoritative,
//! so a late response for a superseded year can be recognised and dropped.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ResolveError, TransportError};
use crate::source::TileSourceDescriptor;

/// Years offered by the imagery resolver, newest first.
pub const SUPPORTED_YEARS: [&str; 10] = [
    "2025", "2024", "2023", "2022", "2021", "2020", "2019", "2018", "2017", "2016",
];

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileUrlResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TileUrlResponse {
    pub fn found(tile_url: impl Into<String>) -> Self {
        Self {
            success: true,
            tile_url: Some(tile_url.into()),
            error: None,
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            tile_url: None,
            error: Some(reason.into()),
        }
    }
}

/// Transport to the imagery resolver service.
///
/// The returned future owns everything it needs so several requests can be
/// outstanding at once.
pub trait TileUrlClient: Send + Sync {
    fn fetch_tile_url(&self, year: &str) -> BoxFuture<'static, Result<TileUrlResponse, TransportError>>;
}

impl<C: TileUrlClient + ?Sized> TileUrlClient for Arc<C> {
    fn fetch_tile_url(&self, year: &str) -> BoxFuture<'static, Result<TileUrlResponse, TransportError>> {
        (**self).fetch_tile_url(year)
    }
}

#[derive(Debug, Clone)]
pub struct HttpTileUrlClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTileUrlClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn endpoint(&self, year: &str) -> String {
        format!("{}/api/tile-url/{year}", self.base_url.trim_end_matches('/'))
    }
}

impl TileUrlClient for HttpTileUrlClient {
    fn fetch_tile_url(&self, year: &str) -> BoxFuture<'static, Result<TileUrlResponse, TransportError>> {
        let http = self.http.clone();
        let url = self.endpoint(year);
        Box::pin(async move {
            let resp = http.get(&url).send().await?;
            // The resolver reports declines in the body, sometimes with a
            // non-2xx status, so the body is parsed regardless of status.
            let status = resp.status();
            let body = resp.bytes().await?;
            serde_json::from_slice::<TileUrlResponse>(&body)
                .map_err(|e| TransportError::Malformed(format!("HTTP {status}: {e}")))
        })
    }
}

/// Identifies one resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveTicket {
    pub generation: u64,
    pub year: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOutcome {
    pub ticket: ResolveTicket,
    pub result: Result<TileSourceDescriptor, ResolveError>,
}

/// An issued but not yet awaited resolution.
pub struct PendingResolve {
    ticket: ResolveTicket,
    request: BoxFuture<'static, Result<TileUrlResponse, TransportError>>,
    timeout: Duration,
}

impl std::fmt::Debug for PendingResolve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResolve")
            .field("ticket", &self.ticket)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PendingResolve {
    pub fn ticket(&self) -> &ResolveTicket {
        &self.ticket
    }

    pub async fn run(self) -> ResolveOutcome {
        let PendingResolve {
            ticket,
            request,
            timeout,
        } = self;
        let result = match tokio::time::timeout(timeout, request).await {
            Err(_) => Err(ResolveError::Transport(TransportError::Timeout)),
            Ok(Err(err)) => Err(err.into()),
            Ok(Ok(resp)) => interpret(&ticket.year, resp),
        };
        ResolveOutcome { ticket, result }
    }
}

fn interpret(year: &str, resp: TileUrlResponse) -> Result<TileSourceDescriptor, ResolveError> {
    match resp {
        TileUrlResponse {
            success: true,
            tile_url: Some(tile_url),
            ..
        } => Ok(TileSourceDescriptor::historical(year, tile_url)?),
        TileUrlResponse { success: true, .. } => Err(TransportError::Malformed(
            "success reported without a tileUrl".to_string(),
        )
        .into()),
        TileUrlResponse { error, .. } => Err(ResolveError::Resolution {
            year: year.to_string(),
            reason: error.unwrap_or_else(|| "unknown error".to_string()),
        }),
    }
}

pub struct HistoricalSourceResolver<C> {
    client: C,
    supported_years: Vec<String>,
    timeout: Duration,
    generation: u64,
}

impl<C: TileUrlClient> HistoricalSourceResolver<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            supported_years: SUPPORTED_YEARS.iter().map(|y| y.to_string()).collect(),
            timeout: DEFAULT_RESOLVE_TIMEOUT,
            generation: 0,
        }
    }

    pub fn with_supported_years(mut self, years: Vec<String>) -> Self {
        self.supported_years = years;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn supported_years(&self) -> &[String] {
        &self.supported_years
    }

    pub fn is_supported(&self, year: &str) -> bool {
        self.supported_years.iter().any(|y| y == year)
    }

    /// Issues a request for `year`, superseding any earlier one.
    ///
    /// Unsupported years fail without a request and leave the current
    /// generation untouched.
    pub fn begin(&mut self, year: &str) -> Result<PendingResolve, ResolveError> {
        if !self.is_supported(year) {
            return Err(ResolveError::UnsupportedYear(year.to_string()));
        }
        self.generation += 1;
        let ticket = ResolveTicket {
            generation: self.generation,
            year: year.to_string(),
        };
        debug!("resolving {year} (generation {})", ticket.generation);
        Ok(PendingResolve {
            request: self.client.fetch_tile_url(year),
            ticket,
            timeout: self.timeout,
        })
    }

    pub fn is_current(&self, ticket: &ResolveTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Marks every outstanding request as superseded.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub async fn resolve(&mut self, year: &str) -> Result<TileSourceDescriptor, ResolveError> {
        self.begin(year)?.run().await.result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::{BoxFuture, HistoricalSourceResolver, TileUrlClient, TileUrlResponse};
    use crate::error::{ResolveError, TransportError};

    #[derive(Default)]
    struct StubClient {
        answers: HashMap<String, Result<TileUrlResponse, TransportError>>,
        calls: AtomicUsize,
    }

    impl StubClient {
        fn answer(mut self, year: &str, answer: Result<TileUrlResponse, TransportError>) -> Self {
            self.answers.insert(year.to_string(), answer);
            self
        }
    }

    impl TileUrlClient for StubClient {
        fn fetch_tile_url(
            &self,
            year: &str,
        ) -> BoxFuture<'static, Result<TileUrlResponse, TransportError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let answer = self
                .answers
                .get(year)
                .cloned()
                .unwrap_or_else(|| Err(TransportError::Unreachable("no route".to_string())));
            Box::pin(async move { answer })
        }
    }

    struct HangingClient;

    impl TileUrlClient for HangingClient {
        fn fetch_tile_url(
            &self,
            _year: &str,
        ) -> BoxFuture<'static, Result<TileUrlResponse, TransportError>> {
            Box::pin(std::future::pending::<Result<TileUrlResponse, TransportError>>())
        }
    }

    #[tokio::test]
    async fn success_produces_a_descriptor() {
        let client = StubClient::default().answer(
            "2024",
            Ok(TileUrlResponse::found("https://ee.example/2024/{z}/{x}/{y}")),
        );
        let mut resolver = HistoricalSourceResolver::new(client);
        let d = resolver.resolve("2024").await.unwrap();
        assert_eq!(d.url_template, "https://ee.example/2024/{z}/{x}/{y}");
        assert_eq!(d.attribution, "© Google Earth Engine - Sentinel-2 2024");
    }

    #[tokio::test]
    async fn remote_decline_is_a_resolution_error() {
        let client =
            StubClient::default().answer("2024", Ok(TileUrlResponse::declined("no imagery")));
        let mut resolver = HistoricalSourceResolver::new(client);
        assert_eq!(
            resolver.resolve("2024").await.unwrap_err(),
            ResolveError::Resolution {
                year: "2024".to_string(),
                reason: "no imagery".to_string()
            }
        );
    }

    #[tokio::test]
    async fn success_without_url_is_malformed() {
        let resp = TileUrlResponse {
            success: true,
            tile_url: None,
            error: None,
        };
        let client = StubClient::default().answer("2023", Ok(resp));
        let mut resolver = HistoricalSourceResolver::new(client);
        assert!(matches!(
            resolver.resolve("2023").await,
            Err(ResolveError::Transport(TransportError::Malformed(_)))
        ));
    }

    #[tokio::test]
    async fn unusable_template_is_a_transport_error() {
        let client =
            StubClient::default().answer("2022", Ok(TileUrlResponse::found("not a template")));
        let mut resolver = HistoricalSourceResolver::new(client);
        assert!(matches!(
            resolver.resolve("2022").await,
            Err(ResolveError::Transport(TransportError::InvalidTemplate(_)))
        ));
    }

    #[tokio::test]
    async fn unsupported_year_fails_without_a_request() {
        let client = Arc::new(StubClient::default());
        let mut resolver = HistoricalSourceResolver::new(Arc::clone(&client));
        assert_eq!(
            resolver.begin("1999").unwrap_err(),
            ResolveError::UnsupportedYear("1999".to_string())
        );
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hung_request_times_out() {
        let mut resolver =
            HistoricalSourceResolver::new(HangingClient).with_timeout(Duration::from_millis(20));
        assert_eq!(
            resolver.resolve("2020").await.unwrap_err(),
            ResolveError::Transport(TransportError::Timeout)
        );
    }

    #[tokio::test]
    async fn later_begin_supersedes_earlier_ticket() {
        let client = StubClient::default()
            .answer("2024", Ok(TileUrlResponse::found("https://e.example/2024/{z}/{x}/{y}")))
            .answer("2019", Ok(TileUrlResponse::found("https://e.example/2019/{z}/{x}/{y}")));
        let mut resolver = HistoricalSourceResolver::new(client);
        let first = resolver.begin("2024").unwrap();
        let second = resolver.begin("2019").unwrap();

        let late = first.run().await;
        assert!(!resolver.is_current(&late.ticket));
        let latest = second.run().await;
        assert!(resolver.is_current(&latest.ticket));

        resolver.invalidate();
        assert!(!resolver.is_current(&latest.ticket));
    }
}
