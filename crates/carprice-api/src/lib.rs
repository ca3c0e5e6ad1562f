// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use carprice_app::{
    CSRF_HEADER, EstimatorRuntime, OptionRequest, SelectorLevel, SubmitRequest, SubmitResponse,
    TablePage, TableResponse,
};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default)]
struct OptionCache {
    entries: HashMap<String, (Instant, Vec<String>)>,
}

impl OptionCache {
    fn get(&mut self, key: &str, ttl: Duration) -> Option<Vec<String>> {
        let (stored, options) = self.entries.get(key)?;
        if stored.elapsed() < ttl {
            return Some(options.clone());
        }
        self.entries.remove(key);
        None
    }

    /// Stores a fresh entry and drops every entry older than `ttl`.
    fn put(&mut self, key: String, options: Vec<String>, ttl: Duration) {
        self.entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
        self.entries.insert(key, (Instant::now(), options));
    }
}

/// Blocking client for the vehicle data backend.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    cache_ttl: Duration,
    http: HttpClient,
    cache: Arc<Mutex<OptionCache>>,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration, cache_ttl: Duration) -> Result<Self> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            bail!("api.base_url must not be empty -- set it to the backend address");
        }
        let mut base_url = Url::parse(trimmed)
            .with_context(|| format!("api.base_url {trimmed:?} is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?}",
                base_url.scheme()
            );
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            cache_ttl,
            http,
            cache: Arc::new(Mutex::new(OptionCache::default())),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Resolves `path` against the base URL and appends `query`.
    pub fn endpoint_url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("invalid endpoint path {path:?}"))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Option list for one selector level. Answers are cached per URL for
    /// the configured TTL; a zero TTL disables caching.
    pub fn options(
        &self,
        level: SelectorLevel,
        params: &[(String, String)],
    ) -> Result<Vec<String>> {
        let url = self.endpoint_url(level.endpoint(), params)?;
        let key = url.to_string();

        if !self.cache_ttl.is_zero()
            && let Some(options) = self.lock_cache()?.get(&key, self.cache_ttl)
        {
            debug!(url = %key, "option cache hit");
            return Ok(options);
        }

        let values: Vec<Value> = self.get_json(url)?;
        let options = values
            .into_iter()
            .map(|value| match value {
                Value::String(text) => Ok(text),
                Value::Number(number) => Ok(number.to_string()),
                other => Err(anyhow!(
                    "unexpected {} option {other} -- expected strings or numbers",
                    level.as_str()
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        if !self.cache_ttl.is_zero() {
            self.lock_cache()?.put(key, options.clone(), self.cache_ttl);
        }
        Ok(options)
    }

    pub fn categories(&self) -> Result<Vec<String>> {
        self.options(SelectorLevel::Category, &[])
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.lock_cache()?.entries.clear();
        Ok(())
    }

    /// Confirms the backend answers the category endpoint.
    pub fn ping(&self) -> Result<usize> {
        let url = self.endpoint_url(SelectorLevel::Category.endpoint(), &[])?;
        let categories: Vec<Value> = self.get_json(url)?;
        info!(base_url = %self.base_url, categories = categories.len(), "backend reachable");
        Ok(categories.len())
    }

    pub fn table(&self, endpoint: &str, query: &[(String, String)]) -> Result<TablePage> {
        let url = self.endpoint_url(endpoint, query)?;
        let response: TableResponse = self.get_json(url)?;
        Ok(response.into())
    }

    /// Posts the form body as JSON. A 4xx whose body is a submission
    /// response is returned as a rejection rather than an error.
    pub fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse> {
        let url = self.endpoint_url(&request.action, &[])?;
        let mut builder = self.http.post(url.clone()).json(&request.body);
        if let Some(csrf) = &request.csrf {
            builder = builder.header(CSRF_HEADER, csrf.as_str());
        }
        let response = builder
            .send()
            .map_err(|error| connection_error(&url, error))?;

        let status = response.status();
        let body = response.text().context("read submit response")?;
        let parsed = serde_json::from_str::<SubmitResponse>(&body).ok();
        match parsed {
            Some(parsed) if status.is_success() => {
                debug!(status = status.as_u16(), success = parsed.success, "form submitted");
                Ok(parsed)
            }
            Some(parsed)
                if status.is_client_error()
                    && (parsed.error.is_some() || !parsed.errors.is_empty()) =>
            {
                debug!(status = status.as_u16(), "form rejected");
                Ok(parsed)
            }
            None if status.is_success() => {
                bail!("decode submit response from {} -- expected a JSON object", url.path())
            }
            _ => Err(clean_error_response(status, &body)),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "GET");
        let response = self
            .http
            .get(url.clone())
            .send()
            .map_err(|error| connection_error(&url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        response
            .json()
            .with_context(|| format!("decode response from {}", url.path()))
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, OptionCache>> {
        self.cache
            .lock()
            .map_err(|_| anyhow!("option cache lock poisoned"))
    }
}

impl EstimatorRuntime for Client {
    fn fetch_options(&mut self, request: &OptionRequest) -> Result<Vec<String>> {
        self.options(request.level, &request.params)
    }

    fn fetch_table(&mut self, endpoint: &str, query: &[(String, String)]) -> Result<TablePage> {
        self.table(endpoint, query)
    }

    fn submit_form(&mut self, request: &SubmitRequest) -> Result<SubmitResponse> {
        self.submit(request)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<String>,
}

fn connection_error(url: &Url, error: reqwest::Error) -> anyhow::Error {
    let origin = url.origin().ascii_serialization();
    if error.is_timeout() {
        warn!(%url, "request timed out");
        return anyhow!("request to {origin} timed out -- check the backend or raise api.timeout");
    }
    warn!(%url, error = %error, "request failed");
    anyhow!("cannot reach {origin} -- is the backend running? ({error})")
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .filter(|error| !error.is_empty())
        .or_else(|| {
            let body = body.trim();
            (!body.is_empty() && body.len() < 100 && !body.contains('{')).then(|| body.to_owned())
        });

    match (status, detail) {
        (StatusCode::NOT_FOUND, _) => anyhow!("not found (404) -- check the endpoint path"),
        (status, Some(detail)) if status.is_server_error() => {
            anyhow!("server error ({}): {detail}", status.as_u16())
        }
        (status, None) if status.is_server_error() => {
            anyhow!("server error ({})", status.as_u16())
        }
        (status, Some(detail)) => anyhow!("request rejected ({}): {detail}", status.as_u16()),
        (status, None) => anyhow!("server returned {}", status.as_u16()),
    }
}
