//! Main TMDB client implementation.

use crate::cache::{cache_key, CacheStore, MemoryCache};
use crate::error::{Error, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_CACHE_PREFIX: &str = "tmdb";

/// Builder for constructing a [`Client`].
pub struct ClientBuilder {
    api_key: Option<String>,
    access_token: Option<String>,
    base_url: String,
    language: Option<String>,
    region: Option<String>,
    cache: Option<Arc<dyn CacheStore>>,
    cache_enabled: bool,
    cache_ttl: Duration,
    cache_prefix: String,
    timeout: Duration,
    connect_timeout: Duration,
    verify_tls: bool,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            api_key: None,
            access_token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            language: None,
            region: None,
            cache: None,
            cache_enabled: true,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            verify_tls: true,
        }
    }

    /// Set the TMDB API key (v3 auth).
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the TMDB read access token (v4 bearer auth).
    ///
    /// Preferred over the API key when both are configured.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default language for all requests (e.g. `en-US`).
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set the default region for all requests (e.g. `US`).
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set a custom cache store implementation.
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Enable or disable response caching.
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Set the default TTL for cached responses.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the cache key prefix.
    pub fn cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// Set the total request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable TLS certificate verification.
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        if self.api_key.is_none() && self.access_token.is_none() {
            return Err(Error::Config(
                "an API key or access token is required".into(),
            ));
        }

        if !self.base_url.starts_with("https://") {
            warn!(
                base_url = %self.base_url,
                "API base URL is not using HTTPS. This is insecure."
            );
        }

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout);
        if !self.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build().map_err(Error::Http)?;

        let cache: Arc<dyn CacheStore> = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::default()));

        Ok(Client {
            config: Config {
                api_key: self.api_key,
                access_token: self.access_token,
                base_url: self.base_url,
                language: self.language,
                region: self.region,
                cache_enabled: self.cache_enabled,
                cache_ttl: self.cache_ttl,
                cache_prefix: self.cache_prefix,
            },
            http,
            cache,
        })
    }
}

/// Immutable client configuration, snapshotted at build time.
///
/// Timeouts and the TLS-verify flag are applied to the underlying HTTP
/// client once during [`ClientBuilder::build`].
struct Config {
    #[allow(dead_code)] // v3 key auth is carried by callers at the query layer
    api_key: Option<String>,
    access_token: Option<String>,
    base_url: String,
    language: Option<String>,
    region: Option<String>,
    cache_enabled: bool,
    cache_ttl: Duration,
    cache_prefix: String,
}

/// Per-call request options.
///
/// Collected by [`RequestBuilder`] and consumed by exactly one request, so
/// an override can never leak into a later call.
#[derive(Debug, Clone, Default)]
struct RequestOptions {
    language: Option<String>,
    region: Option<String>,
    no_cache: bool,
    cache_ttl: Option<Duration>,
}

/// The main TMDB client.
///
/// All request state is per-call; a single `Client` can be shared freely
/// across tasks.
///
/// # Example
///
/// ```rust,no_run
/// use tmdb_client::Client;
///
/// #[tokio::main]
/// async fn main() -> Result<(), tmdb_client::Error> {
///     let client = Client::builder()
///         .access_token("your-read-access-token")
///         .build()?;
///
///     let movie = client.get("movie/550", &[]).await?;
///     println!("{}", movie["title"]);
///     Ok(())
/// }
/// ```
pub struct Client {
    config: Config,
    http: reqwest::Client,
    cache: Arc<dyn CacheStore>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Make a GET request to the TMDB API.
    pub async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.execute(Method::GET, endpoint, None, params, RequestOptions::default())
            .await
    }

    /// Make a POST request to the TMDB API.
    pub async fn post(
        &self,
        endpoint: &str,
        body: Value,
        params: &[(&str, &str)],
    ) -> Result<Value> {
        self.execute(
            Method::POST,
            endpoint,
            Some(body),
            params,
            RequestOptions::default(),
        )
        .await
    }

    /// Make a PUT request to the TMDB API.
    pub async fn put(&self, endpoint: &str, body: Value, params: &[(&str, &str)]) -> Result<Value> {
        self.execute(
            Method::PUT,
            endpoint,
            Some(body),
            params,
            RequestOptions::default(),
        )
        .await
    }

    /// Make a DELETE request to the TMDB API.
    pub async fn delete(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.execute(
            Method::DELETE,
            endpoint,
            None,
            params,
            RequestOptions::default(),
        )
        .await
    }

    /// Override the language for the next request only.
    pub fn language(&self, language: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self).language(language)
    }

    /// Override the region for the next request only.
    pub fn region(&self, region: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self).region(region)
    }

    /// Skip the cache for the next request only.
    pub fn without_cache(&self) -> RequestBuilder<'_> {
        RequestBuilder::new(self).without_cache()
    }

    /// Override the cache TTL for the next request only.
    pub fn cache_ttl(&self, ttl: Duration) -> RequestBuilder<'_> {
        RequestBuilder::new(self).cache_ttl(ttl)
    }

    // === Internal methods ===

    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        params: &[(&str, &str)],
        options: RequestOptions,
    ) -> Result<Value> {
        let url = self.build_url(endpoint);
        let params = self.prepare_params(params, &options);
        let key = cache_key(
            &self.config.cache_prefix,
            method.as_str(),
            endpoint,
            &params,
            body.as_ref(),
        );
        let use_cache = self.config.cache_enabled && !options.no_cache;

        // Serve GET requests from the cache when possible
        if method == Method::GET && use_cache && self.cache.has(&key) {
            if let Some(hit) = self.cache.get(&key) {
                debug!(%url, key = %key, "cache hit");
                return Ok(hit);
            }
        }

        debug!(method = %method, %url, "dispatching request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .query(&params);

        // Bearer auth is preferred; key-only configurations authenticate
        // through the api_key query parameter instead.
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        if let Some(body) = &body {
            if matches!(method, Method::POST | Method::PUT) && has_payload(body) {
                request = request.json(body);
            }
        }

        let response = request.send().await.map_err(Error::Http)?;

        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }

        let bytes = response.bytes().await.map_err(Error::Http)?;
        let value: Value = serde_json::from_slice(&bytes)?;

        if method == Method::GET && use_cache {
            let ttl = options.cache_ttl.unwrap_or(self.config.cache_ttl);
            debug!(key = %key, ttl_secs = ttl.as_secs(), "caching response");
            self.cache.put(&key, value.clone(), ttl);
        }

        Ok(value)
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Merge language/region defaults into the query parameters.
    ///
    /// A per-call override wins over the configured default; either wins
    /// over a caller-supplied parameter of the same name. Applied to every
    /// verb, not just GET.
    fn prepare_params(
        &self,
        params: &[(&str, &str)],
        options: &RequestOptions,
    ) -> BTreeMap<String, String> {
        let mut prepared: BTreeMap<String, String> = params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        if let Some(language) = options.language.as_ref().or(self.config.language.as_ref()) {
            prepared.insert("language".into(), language.clone());
        }
        if let Some(region) = options.region.as_ref().or(self.config.region.as_ref()) {
            prepared.insert("region".into(), region.clone());
        }

        prepared
    }
}

fn has_payload(body: &Value) -> bool {
    match body {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// A single-use request builder carrying per-call overrides.
///
/// Created by the fluent methods on [`Client`]; consumed by the verb that
/// finishes it:
///
/// ```rust,no_run
/// # use tmdb_client::Client;
/// # async fn demo(client: &Client) -> Result<(), tmdb_client::Error> {
/// let movie = client.language("es-ES").get("movie/550", &[]).await?;
/// # Ok(())
/// # }
/// ```
#[must_use = "request overrides apply to a single call; finish with get/post/put/delete"]
pub struct RequestBuilder<'a> {
    client: &'a Client,
    options: RequestOptions,
}

impl<'a> RequestBuilder<'a> {
    fn new(client: &'a Client) -> Self {
        Self {
            client,
            options: RequestOptions::default(),
        }
    }

    /// Override the language for this request.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.options.language = Some(language.into());
        self
    }

    /// Override the region for this request.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.options.region = Some(region.into());
        self
    }

    /// Skip the cache for this request.
    pub fn without_cache(mut self) -> Self {
        self.options.no_cache = true;
        self
    }

    /// Override the cache TTL for this request.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.options.cache_ttl = Some(ttl);
        self
    }

    /// Make a GET request with these overrides.
    pub async fn get(self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.client
            .execute(Method::GET, endpoint, None, params, self.options)
            .await
    }

    /// Make a POST request with these overrides.
    pub async fn post(
        self,
        endpoint: &str,
        body: Value,
        params: &[(&str, &str)],
    ) -> Result<Value> {
        self.client
            .execute(Method::POST, endpoint, Some(body), params, self.options)
            .await
    }

    /// Make a PUT request with these overrides.
    pub async fn put(self, endpoint: &str, body: Value, params: &[(&str, &str)]) -> Result<Value> {
        self.client
            .execute(Method::PUT, endpoint, Some(body), params, self.options)
            .await
    }

    /// Make a DELETE request with these overrides.
    pub async fn delete(self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.client
            .execute(Method::DELETE, endpoint, None, params, self.options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::builder()
            .api_key("test-key")
            .language("en-US")
            .region("US")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_a_credential() {
        let err = Client::builder().build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_build_url_normalizes_slashes() {
        let client = Client::builder()
            .api_key("k")
            .base_url("https://api.example.com/3/")
            .build()
            .unwrap();

        assert_eq!(
            client.build_url("/movie/550"),
            "https://api.example.com/3/movie/550"
        );
        assert_eq!(
            client.build_url("movie/550"),
            "https://api.example.com/3/movie/550"
        );
    }

    #[test]
    fn test_prepare_params_uses_configured_defaults() {
        let client = client();
        let prepared = client.prepare_params(&[("page", "2")], &RequestOptions::default());

        assert_eq!(prepared.get("page").map(String::as_str), Some("2"));
        assert_eq!(prepared.get("language").map(String::as_str), Some("en-US"));
        assert_eq!(prepared.get("region").map(String::as_str), Some("US"));
    }

    #[test]
    fn test_prepare_params_override_wins() {
        let client = client();
        let options = RequestOptions {
            language: Some("es-ES".into()),
            ..Default::default()
        };
        let prepared = client.prepare_params(&[("language", "fr-FR")], &options);

        assert_eq!(prepared.get("language").map(String::as_str), Some("es-ES"));
        assert_eq!(prepared.get("region").map(String::as_str), Some("US"));
    }

    #[test]
    fn test_prepare_params_without_defaults_keeps_caller_params() {
        let client = Client::builder().api_key("k").build().unwrap();
        let prepared =
            client.prepare_params(&[("language", "de-DE")], &RequestOptions::default());

        assert_eq!(prepared.get("language").map(String::as_str), Some("de-DE"));
        assert!(!prepared.contains_key("region"));
    }

    #[test]
    fn test_has_payload() {
        assert!(!has_payload(&Value::Null));
        assert!(!has_payload(&serde_json::json!({})));
        assert!(has_payload(&serde_json::json!({"media_type": "movie"})));
        assert!(has_payload(&serde_json::json!([1, 2])));
    }
}
