use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::de::IgnoredAny;
use tracing::{debug, warn};

use crate::{
    cache::{Payload, ResponseCache},
    errors::Error,
    limiter::RateLimiter,
    Result,
};

/// Raw HTTP response as seen by the fetcher.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Outbound HTTP seam (reqwest in production, fakes in tests).
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// reqwest-backed [`HttpClient`] sending a fixed identifying User-Agent.
#[derive(Clone, Debug)]
pub struct ReqwestHttp {
    http: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("couldn't build http client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let resp = self.http.get(url).send().await.map_err(|e| {
            Error::Transport(format!("couldn't fetch url \"{}\": {e}", redact_url(url)))
        })?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| {
            Error::Transport(format!(
                "couldn't read body of url \"{}\": {e}",
                redact_url(url)
            ))
        })?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Cached, rate-limited GET of JSON documents.
///
/// A cache hit consumes neither a limiter slot nor a network call. Only
/// successful, well-formed responses are stored.
pub struct Fetcher {
    http: Arc<dyn HttpClient>,
    limiter: Arc<RateLimiter>,
    cache: Arc<dyn ResponseCache>,
}

impl Fetcher {
    pub fn new(
        http: Arc<dyn HttpClient>,
        limiter: Arc<RateLimiter>,
        cache: Arc<dyn ResponseCache>,
    ) -> Self {
        Self {
            http,
            limiter,
            cache,
        }
    }

    pub async fn fetch(&self, url: &str, cache_key: &str) -> Result<Payload> {
        match self.cache.get(cache_key).await {
            Ok(Some(cached)) => {
                debug!(cache_key, bytes = cached.len(), "cache hit");
                return Ok(cached);
            }
            Ok(None) => {}
            // Cache might be down; keep working without it.
            Err(e) => warn!(cache_key, "couldn't read cache: {e}"),
        }

        self.limiter.acquire().await;

        let resp = self.http.get(url).await?;
        if resp.status != 200 {
            return Err(Error::Status {
                status: resp.status,
                url: redact_url(url),
            });
        }
        if serde_json::from_slice::<IgnoredAny>(&resp.body).is_err() {
            return Err(Error::Format(redact_url(url)));
        }

        let payload: Payload = resp.body.into();
        if let Err(e) = self.cache.set(cache_key, payload.clone()).await {
            warn!(cache_key, "couldn't store cache entry: {e}");
        }
        Ok(payload)
    }

    /// Plain GET for media bytes: rate-limited, never cached, no JSON check.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.limiter.acquire().await;
        let resp = self.http.get(url).await?;
        if resp.status != 200 {
            return Err(Error::Status {
                status: resp.status,
                url: redact_url(url),
            });
        }
        Ok(resp.body)
    }
}

/// Hide credentials (`key`, `api_key`, `login`) before a URL reaches logs or users.
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = reqwest::Url::parse(raw) else {
        return raw.to_string();
    };
    if url.query().is_none() {
        return raw.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if matches!(k.as_ref(), "key" | "api_key" | "login") {
                "REDACTED".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}
