//! Corpus provider client for the eCFR versioner API.
//!
//! [`CorpusSource`] is the seam the sync engine depends on; [`EcfrClient`]
//! is the production implementation over HTTP. The base URL is injectable
//! so tests can point the client at a mock server.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use regsync_shared::{RegSyncError, Result};

/// User-Agent string for corpus requests.
const USER_AGENT: &str = concat!("regsync/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// CorpusSource trait
// ---------------------------------------------------------------------------

/// Revision metadata for a corpus title.
#[derive(Debug, Clone, Default)]
pub struct TitleMeta {
    /// Date of the most recent amendment upstream.
    pub latest_amended_on: Option<String>,
    /// Date through which the corpus text is current.
    pub up_to_date_as_of: Option<String>,
}

/// External corpus provider: revision metadata plus full-text markup.
pub trait CorpusSource {
    /// Fetch revision metadata for the configured title.
    fn title_meta(&self) -> impl Future<Output = Result<TitleMeta>> + Send;

    /// Fetch the raw markup for the configured part as of `date`
    /// (YYYY-MM-DD).
    fn part_markup(&self, date: &str) -> impl Future<Output = Result<String>> + Send;
}

// ---------------------------------------------------------------------------
// eCFR client
// ---------------------------------------------------------------------------

/// HTTP client for the eCFR versioner endpoints.
pub struct EcfrClient {
    client: reqwest::Client,
    base_url: Url,
    cfr_title: u32,
    cfr_part: u32,
}

/// Wire shape of the `/api/versioner/v1/titles` response.
#[derive(Debug, Deserialize)]
struct TitlesResponse {
    #[serde(default)]
    titles: Vec<TitleEntry>,
}

#[derive(Debug, Deserialize)]
struct TitleEntry {
    number: u32,
    #[serde(default)]
    latest_amended_on: Option<String>,
    #[serde(default)]
    up_to_date_as_of: Option<String>,
}

impl EcfrClient {
    /// Create a client against `base_url` for one (title, part) corpus key.
    pub fn new(base_url: &str, cfr_title: u32, cfr_part: u32) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RegSyncError::config(format!("invalid corpus base_url: {e}")))?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RegSyncError::fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            cfr_title,
            cfr_part,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RegSyncError::fetch(format!("invalid endpoint {path}: {e}")))
    }
}

impl CorpusSource for EcfrClient {
    async fn title_meta(&self) -> Result<TitleMeta> {
        let url = self.endpoint("/api/versioner/v1/titles")?;
        debug!(%url, "fetching title metadata");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RegSyncError::fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegSyncError::fetch(format!(
                "titles metadata returned HTTP {status}"
            )));
        }

        let body: TitlesResponse = response
            .json()
            .await
            .map_err(|e| RegSyncError::fetch(format!("titles metadata decode: {e}")))?;

        let entry = body.titles.into_iter().find(|t| t.number == self.cfr_title);
        Ok(entry
            .map(|t| TitleMeta {
                latest_amended_on: t.latest_amended_on,
                up_to_date_as_of: t.up_to_date_as_of,
            })
            .unwrap_or_default())
    }

    async fn part_markup(&self, date: &str) -> Result<String> {
        let path = format!(
            "/api/versioner/v1/full/{date}/title-{}.xml?part={}",
            self.cfr_title, self.cfr_part
        );
        let url = self.endpoint(&path)?;
        info!(%url, "fetching corpus markup");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RegSyncError::fetch(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegSyncError::fetch(format!(
                "corpus markup returned HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RegSyncError::fetch(format!("{url}: {e}")))?;

        debug!(kib = body.len() / 1024, "corpus markup fetched");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> EcfrClient {
        EcfrClient::new(&server.uri(), 29, 1926).expect("build client")
    }

    #[tokio::test]
    async fn title_meta_finds_the_configured_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/versioner/v1/titles"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"titles":[
                    {"number":28,"latest_amended_on":"2025-01-01","up_to_date_as_of":"2025-07-01"},
                    {"number":29,"latest_amended_on":"2025-06-17","up_to_date_as_of":"2025-08-01"}
                ]}"#,
            ))
            .mount(&server)
            .await;

        let meta = client_for(&server).await.title_meta().await.expect("meta");
        assert_eq!(meta.latest_amended_on.as_deref(), Some("2025-06-17"));
        assert_eq!(meta.up_to_date_as_of.as_deref(), Some("2025-08-01"));
    }

    #[tokio::test]
    async fn title_meta_missing_title_yields_empty_meta() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/versioner/v1/titles"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"titles":[{"number":40}]}"#),
            )
            .mount(&server)
            .await;

        let meta = client_for(&server).await.title_meta().await.expect("meta");
        assert!(meta.latest_amended_on.is_none());
        assert!(meta.up_to_date_as_of.is_none());
    }

    #[tokio::test]
    async fn title_meta_http_error_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/versioner/v1/titles"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).await.title_meta().await.unwrap_err();
        assert!(matches!(err, RegSyncError::Fetch(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn part_markup_requests_the_dated_part() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/versioner/v1/full/2025-08-01/title-29.xml"))
            .and(query_param("part", "1926"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<DIV5 N=\"1926\" TYPE=\"PART\"></DIV5>"),
            )
            .mount(&server)
            .await;

        let xml = client_for(&server)
            .await
            .part_markup("2025-08-01")
            .await
            .expect("markup");
        assert!(xml.contains("DIV5"));
    }

    #[tokio::test]
    async fn part_markup_http_error_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/versioner/v1/full/2025-08-01/title-29.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .part_markup("2025-08-01")
            .await
            .unwrap_err();
        assert!(matches!(err, RegSyncError::Fetch(_)));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = EcfrClient::new("not a url", 29, 1926);
        assert!(matches!(result, Err(RegSyncError::Config { .. })));
    }
}
