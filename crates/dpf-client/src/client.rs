//! DPF HTTP client implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dpf_ratelimit::TokenBucket;
use futures_util::future::FutureExt;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::ReferenceCache;
use crate::config::DpfConfig;
use crate::error::DpfClientError;
use crate::normalize::{
    self, MunicipalityMatch, NormalizeRequest, NormalizedCodes, match_municipality,
    match_prefecture,
};
use crate::operation::{GraphqlRequest, GraphqlResponse};
use crate::pagination::AllDataPages;
use crate::query::{
    self, CountDataRequest, GetAllDataRequest, SearchRequest, SuggestRequest,
};
use crate::retry::RetryDecision;
use crate::types::{
    AllDataPage, CatalogData, CatalogEntry, CountData, DataData, DataResults, DownloadUrl,
    FileRef, FileUrlsData, Municipality, MunicipalitiesData, Prefecture, PrefectureData,
    SearchData, SearchResults, SuggestData, Suggestions, ThumbnailUrlsData, ZipUrlData,
};

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// DPF client metrics.
#[derive(Debug, Default)]
#[allow(clippy::struct_field_names)]
pub struct DpfClientMetrics {
    requests_total: AtomicU64,
    requests_success: AtomicU64,
    requests_error: AtomicU64,
    requests_retried: AtomicU64,
}

impl DpfClientMetrics {
    /// Snapshot current metrics.
    #[must_use]
    pub fn snapshot(&self) -> DpfClientMetricsSnapshot {
        DpfClientMetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_success: self.requests_success.load(Ordering::Relaxed),
            requests_error: self.requests_error.load(Ordering::Relaxed),
            requests_retried: self.requests_retried.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_field_names)]
pub struct DpfClientMetricsSnapshot {
    /// Total operations executed.
    pub requests_total: u64,
    /// Successful operations.
    pub requests_success: u64,
    /// Failed operations.
    pub requests_error: u64,
    /// Retries performed.
    pub requests_retried: u64,
}

/// DPF client builder.
#[derive(Debug, Clone)]
pub struct DpfClientBuilder {
    config: DpfConfig,
}

impl DpfClientBuilder {
    /// Create a builder for the production endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            config: DpfConfig::new(api_key),
        }
    }

    /// Create a builder from a prepared configuration.
    #[must_use]
    pub const fn from_config(config: DpfConfig) -> Self {
        Self { config }
    }

    /// Override the endpoint (primarily for testing).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Set the sustained request rate and matching burst.
    #[must_use]
    pub const fn with_rate(mut self, requests_per_second: f64) -> Self {
        self.config.requests_per_second = requests_per_second;
        self.config.burst = requests_per_second;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: crate::retry::RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<DpfClient, DpfClientError> {
        DpfClient::new(self.config)
    }
}

#[derive(Debug)]
struct ClientInner {
    http: reqwest::Client,
    config: DpfConfig,
    limiter: TokenBucket,
    cache: ReferenceCache,
    metrics: DpfClientMetrics,
}

/// Client for the MLIT Data Platform GraphQL API.
///
/// Every operation follows the same pipeline: build a typed query,
/// take a rate-limiter token, POST under the retry policy, then parse
/// the data/errors envelope. Cloning is cheap and clones share the
/// limiter, cache and metrics.
#[derive(Debug, Clone)]
pub struct DpfClient {
    inner: Arc<ClientInner>,
}

impl DpfClient {
    /// Create a client from a configuration.
    pub fn new(config: DpfConfig) -> Result<Self, DpfClientError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let api_key =
            HeaderValue::from_str(&config.api_key).map_err(|_| DpfClientError::Config {
                message: "API key contains invalid header characters".to_string(),
            })?;
        headers.insert(HeaderName::from_static("apikey"), api_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        let limiter = TokenBucket::with_burst(config.requests_per_second, config.burst);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                limiter,
                cache: ReferenceCache::default(),
                metrics: DpfClientMetrics::default(),
            }),
        })
    }

    /// Builder for the production endpoint.
    #[must_use]
    pub fn builder(api_key: impl Into<String>) -> DpfClientBuilder {
        DpfClientBuilder::new(api_key)
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &DpfConfig {
        &self.inner.config
    }

    /// Metrics snapshot.
    #[must_use]
    pub fn metrics(&self) -> DpfClientMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Execute a prepared request and return the envelope's `data`.
    ///
    /// This is the raw escape hatch under every typed operation: it
    /// rate-limits, retries transients, and classifies the envelope.
    /// Any GraphQL `errors` entry is terminal; a 2xx body with neither
    /// `data` nor `errors` is an envelope error.
    pub async fn execute<V, D>(&self, request: GraphqlRequest<V>) -> Result<D, DpfClientError>
    where
        V: Serialize,
        D: DeserializeOwned,
    {
        self.inner
            .metrics
            .requests_total
            .fetch_add(1, Ordering::Relaxed);
        let result = self.execute_inner(request).await;
        match &result {
            Ok(_) => self
                .inner
                .metrics
                .requests_success
                .fetch_add(1, Ordering::Relaxed),
            Err(_) => self
                .inner
                .metrics
                .requests_error
                .fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    async fn execute_inner<V, D>(&self, request: GraphqlRequest<V>) -> Result<D, DpfClientError>
    where
        V: Serialize,
        D: DeserializeOwned,
    {
        let rid = Uuid::new_v4();
        let body_bytes = serde_json::to_vec(&request)?;
        if self.inner.config.debug_query {
            debug!(
                rid = %rid,
                operation = request.operation_name.unwrap_or("-"),
                query = %truncate_text(request.query, self.inner.config.body_log_limit),
                "dpf_query"
            );
        }

        let bytes = self.send_with_retry(&body_bytes, rid).await?;
        if self.inner.config.debug_response {
            debug!(
                rid = %rid,
                body = %truncate_body(&bytes, self.inner.config.body_log_limit),
                "dpf_response"
            );
        }

        let response: GraphqlResponse<D> = serde_json::from_slice(&bytes)?;
        if !response.errors.is_empty() {
            warn!(rid = %rid, errors = response.errors.len(), "dpf_graphql_errors");
            return Err(DpfClientError::GraphqlErrors {
                errors: response.errors,
            });
        }
        response.data.ok_or_else(|| {
            warn!(rid = %rid, "dpf_response_missing_data");
            DpfClientError::Envelope {
                message: "response carries neither data nor errors".to_string(),
            }
        })
    }

    async fn send_with_retry(
        &self,
        body_bytes: &[u8],
        rid: Uuid,
    ) -> Result<Vec<u8>, DpfClientError> {
        let mut attempt = 1;
        loop {
            // Each attempt takes its own token so retries cannot exceed
            // the configured rate either.
            self.inner.limiter.acquire().await;
            let started = Instant::now();
            match self.send_once(body_bytes, rid).await {
                Ok(bytes) => {
                    debug!(
                        rid = %rid,
                        attempt,
                        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "dpf_http_ok"
                    );
                    return Ok(bytes);
                }
                Err(err) => match self.inner.config.retry.decide(&err, attempt) {
                    RetryDecision::RetryAfter(delay) => {
                        self.inner
                            .metrics
                            .requests_retried
                            .fetch_add(1, Ordering::Relaxed);
                        warn!(
                            rid = %rid,
                            attempt,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "dpf_retry"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::DoNotRetry => {
                        if err.is_retryable() {
                            return Err(DpfClientError::RetriesExhausted {
                                attempts: attempt,
                                last: Box::new(err),
                            });
                        }
                        return Err(err);
                    }
                },
            }
        }
    }

    async fn send_once(&self, body_bytes: &[u8], rid: Uuid) -> Result<Vec<u8>, DpfClientError> {
        let response = self
            .inner
            .http
            .post(&self.inner.config.base_url)
            .header(REQUEST_ID_HEADER, rid.to_string())
            .body(body_bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(DpfClientError::HttpStatus {
                status,
                body: truncate_body(&bytes, self.inner.config.body_log_limit),
                retry_after,
            });
        }
        Ok(bytes.to_vec())
    }

    // ---------- search family ----------

    /// Run a `search` query.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResults, DpfClientError> {
        let built = query::build_search(request)?;
        let data: SearchData = self.execute(built).await?;
        Ok(data.search)
    }

    /// Keyword search with default paging and detail.
    pub async fn search_keyword(&self, term: &str) -> Result<SearchResults, DpfClientError> {
        self.search(&SearchRequest::keyword(term)).await
    }

    /// Search restricted to place names resolved through
    /// [`normalize_codes`](Self::normalize_codes). Fails with
    /// `MalformedRequest` when a given prefecture or municipality
    /// cannot be resolved rather than silently searching a wider area;
    /// the resolution warnings (including ambiguity candidates) are
    /// carried in the error message.
    pub async fn search_in_place(
        &self,
        place: &NormalizeRequest,
        mut request: SearchRequest,
    ) -> Result<SearchResults, DpfClientError> {
        let codes = self.normalize_codes(place).await?;
        let wants_prefecture = place
            .prefecture
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty());
        if wants_prefecture && codes.prefecture_code.is_none() {
            return Err(DpfClientError::MalformedRequest {
                message: format!(
                    "could not resolve prefecture {:?}",
                    place.prefecture.as_deref().unwrap_or("")
                ),
            });
        }
        let wants_municipality = place
            .municipality
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty());
        if wants_municipality && codes.municipality_code.is_none() {
            return Err(DpfClientError::MalformedRequest {
                message: format!(
                    "could not resolve municipality {:?} ({})",
                    place.municipality.as_deref().unwrap_or(""),
                    codes.warnings.join("; ")
                ),
            });
        }
        if let Some(code) = &codes.prefecture_code {
            request.attributes.prefecture_code = Some(code.clone());
        }
        if let Some(code) = &codes.municipality_code {
            request.attributes.municipality_code = Some(code.clone());
        }
        self.search(&request).await
    }

    /// Completion suggestions for a partial term.
    pub async fn suggest(&self, request: &SuggestRequest) -> Result<Suggestions, DpfClientError> {
        let built = query::build_suggest(request)?;
        let data: SuggestData = self.execute(built).await?;
        Ok(data.suggest)
    }

    /// Total matching-record count.
    pub async fn count_data(&self, request: &CountDataRequest) -> Result<u64, DpfClientError> {
        let built = query::build_count_data(request)?;
        let data: CountData = self.execute(built).await?;
        Ok(data.count_data.data_count)
    }

    // ---------- catalogs and records ----------

    /// Catalog entries; `None` fetches every catalog.
    pub async fn data_catalog(
        &self,
        ids: Option<Vec<String>>,
        include_datasets: bool,
    ) -> Result<Vec<CatalogEntry>, DpfClientError> {
        let built = query::build_data_catalog(ids, include_datasets);
        let data: CatalogData = self.execute(built).await?;
        Ok(data.data_catalog)
    }

    /// One record with files, thumbnail flag and tileset attachment.
    pub async fn get_data(
        &self,
        dataset_id: &str,
        data_id: &str,
    ) -> Result<DataResults, DpfClientError> {
        let built = query::build_get_data(dataset_id, data_id)?;
        let data: DataData = self.execute(built).await?;
        Ok(data.data)
    }

    /// One record, `id` and `title` only.
    pub async fn get_data_summary(
        &self,
        dataset_id: &str,
        data_id: &str,
    ) -> Result<DataResults, DpfClientError> {
        let built = query::build_get_data_summary(dataset_id, data_id)?;
        let data: DataData = self.execute(built).await?;
        Ok(data.data)
    }

    /// File references attached to one record.
    pub async fn get_data_files(
        &self,
        dataset_id: &str,
        data_id: &str,
    ) -> Result<Vec<FileRef>, DpfClientError> {
        let results = self.get_data(dataset_id, data_id).await?;
        Ok(results
            .get_data_results
            .into_iter()
            .flat_map(|record| record.files)
            .collect())
    }

    // ---------- bulk export ----------

    /// Open a forward-only page cursor over `getAllData`. Batch bounds
    /// are validated here, before any I/O.
    pub fn all_data(&self, request: GetAllDataRequest) -> Result<AllDataPages, DpfClientError> {
        request.validate()?;
        Ok(AllDataPages::new(self.clone(), request))
    }

    pub(crate) async fn fetch_all_data_first(
        &self,
        request: &GetAllDataRequest,
    ) -> Result<AllDataPage, DpfClientError> {
        let built = query::build_all_data_first(request)?;
        let data: crate::types::AllDataData = self.execute(built).await?;
        Ok(data.get_all_data)
    }

    pub(crate) async fn fetch_all_data_next(
        &self,
        batch_size: u32,
        token: String,
    ) -> Result<AllDataPage, DpfClientError> {
        let built = query::build_all_data_next(batch_size, token);
        let data: crate::types::AllDataData = self.execute(built).await?;
        Ok(data.get_all_data)
    }

    // ---------- administrative codes ----------

    /// The prefecture table, cached for the life of the client.
    pub async fn prefectures(&self) -> Result<Arc<Vec<Prefecture>>, DpfClientError> {
        let client = self.clone();
        self.inner
            .cache
            .prefectures(move || {
                async move {
                    let data: PrefectureData = client.execute(query::build_prefectures()).await?;
                    Ok(Arc::new(data.prefecture))
                }
                .boxed()
            })
            .await
    }

    /// One prefecture's municipality table, cached for the life of the
    /// client.
    pub async fn municipalities(
        &self,
        pref_code: &str,
    ) -> Result<Arc<Vec<Municipality>>, DpfClientError> {
        let client = self.clone();
        let code = pref_code.to_string();
        self.inner
            .cache
            .municipalities(pref_code, move || {
                async move {
                    let built = query::build_municipalities(Some(vec![code]), None)?;
                    let data: MunicipalitiesData = client.execute(built).await?;
                    Ok(Arc::new(data.municipalities))
                }
                .boxed()
            })
            .await
    }

    /// Resolve free-text place names to administrative codes.
    ///
    /// Prefecture strategies, in order: code passthrough, exact
    /// Japanese name (suffix-insensitive), romaji alias, substring.
    /// Municipalities resolve within the matched prefecture; an
    /// ambiguous substring match returns candidates and a warning
    /// instead of guessing.
    pub async fn normalize_codes(
        &self,
        request: &NormalizeRequest,
    ) -> Result<NormalizedCodes, DpfClientError> {
        let mut out = NormalizedCodes::default();

        let pref_input = request.prefecture.as_deref().unwrap_or("").trim();
        if !pref_input.is_empty() {
            let rows = self.prefectures().await?;
            if let Some(matched) = match_prefecture(pref_input, &rows) {
                out.prefecture_code = Some(matched.code);
                out.prefecture_name = Some(matched.name);
                out.matched_strategy = Some(matched.strategy);
            } else {
                out.warnings.push(format!("unknown_prefecture: {pref_input}"));
            }
        }

        let muni_input = request.municipality.as_deref().unwrap_or("").trim();
        if !muni_input.is_empty() {
            if let Some(pref_code) = out.prefecture_code.clone() {
                let rows = self.municipalities(&pref_code).await?;
                match match_municipality(muni_input, &rows) {
                    MunicipalityMatch::Resolved {
                        code,
                        name,
                        strategy,
                    } => {
                        out.municipality_code = Some(code);
                        out.municipality_name = Some(name);
                        out.matched_strategy = Some(strategy);
                    }
                    MunicipalityMatch::Ambiguous(candidates) => {
                        out.candidates = candidates;
                        out.matched_strategy = Some("muni:jp_contains_ambiguous");
                        out.warnings
                            .push("ambiguous_municipality: multiple candidates".to_string());
                    }
                    MunicipalityMatch::NotFound => {
                        out.warnings
                            .push(format!("unknown_municipality: {muni_input}"));
                    }
                }
            } else if normalize::looks_like_municipality_code(muni_input) {
                out.warnings
                    .push("municipality_code_provided_but_prefecture_unknown".to_string());
            } else {
                out.warnings.push(
                    "municipality_without_prefecture: provide prefecture for disambiguation"
                        .to_string(),
                );
            }
        }

        Ok(out)
    }

    // ---------- download URLs ----------
    //
    // Minted URLs are valid for roughly 60 seconds. They are never
    // cached; call again when one expires.

    /// Fresh download URLs, one per file reference.
    pub async fn file_download_urls(
        &self,
        files: &[FileRef],
    ) -> Result<Vec<DownloadUrl>, DpfClientError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let built = query::build_file_download_urls(files)?;
        let data: FileUrlsData = self.execute(built).await?;
        Ok(data.file_download_urls)
    }

    /// Fresh download URL for a zip bundle of the given files.
    pub async fn zipfile_download_url(
        &self,
        files: &[FileRef],
    ) -> Result<Option<String>, DpfClientError> {
        if files.is_empty() {
            return Ok(None);
        }
        let built = query::build_zipfile_download_url(files)?;
        let data: ZipUrlData = self.execute(built).await?;
        Ok(data.zipfile_download_url)
    }

    /// Fresh thumbnail URLs, one per thumbnail reference.
    pub async fn thumbnail_urls(
        &self,
        thumbnails: &[FileRef],
    ) -> Result<Vec<DownloadUrl>, DpfClientError> {
        if thumbnails.is_empty() {
            return Ok(Vec::new());
        }
        let built = query::build_thumbnail_urls(thumbnails)?;
        let data: ThumbnailUrlsData = self.execute(built).await?;
        Ok(data.thumbnail_urls)
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get(RETRY_AFTER)?;
    let value = header.to_str().ok()?;
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    None
}

fn truncate_body(bytes: &[u8], limit: usize) -> String {
    truncate_text(&String::from_utf8_lossy(bytes), limit)
}

fn truncate_text(text: &str, limit: usize) -> String {
    let mut body = text.to_string();
    if body.len() > limit {
        let mut cut = limit;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}
