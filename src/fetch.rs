// src/fetch.rs

use anyhow::{bail, Context, Result};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, StatusCode,
};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::config::Config;

pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Why a single GET did not produce JSON.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error {status} from {url}")]
    Status { url: Url, status: StatusCode },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: Url,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Status,
    Transport,
    Decode,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Status { .. } => FetchErrorKind::Status,
            FetchError::Transport { .. } => FetchErrorKind::Transport,
            FetchError::Decode { .. } => FetchErrorKind::Decode,
        }
    }

    pub fn url(&self) -> &Url {
        match self {
            FetchError::Status { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Decode { url, .. } => url,
        }
    }
}

/// One GET, no retries. A non-2xx status or a body that is not JSON is an error.
pub async fn fetch_json(
    client: &Client,
    url: &Url,
    headers: &HeaderMap,
    timeout: Duration,
) -> Result<Value, FetchError> {
    debug!(%url, "GET");
    let transport = |source| FetchError::Transport {
        url: url.clone(),
        source,
    };

    let resp = client
        .get(url.clone())
        .headers(headers.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            error!(%url, error = %e, "request failed");
            transport(e)
        })?;

    let status = resp.status();
    if !status.is_success() {
        error!(%url, %status, "HTTP error");
        return Err(FetchError::Status {
            url: url.clone(),
            status,
        });
    }

    let body = resp.text().await.map_err(|e| {
        error!(%url, error = %e, "reading body failed");
        transport(e)
    })?;

    serde_json::from_str(&body).map_err(|source| {
        error!(%url, error = %source, "invalid JSON");
        FetchError::Decode {
            url: url.clone(),
            source,
        }
    })
}

/// A client bound to one API host and key.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    base_url: Url,
    headers: HeaderMap,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let mut key = HeaderValue::from_str(config.api_key.as_deref().unwrap_or(""))
            .with_context(|| format!("{} is not a valid header value", API_KEY_HEADER))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("x-api-key"), key);

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            headers,
            timeout: config.timeout,
        })
    }

    /// Append `path` (e.g. `/api/esr/countries`) to the base URL.
    /// Any path prefix on the base is kept.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        if self.base_url.cannot_be_a_base() {
            bail!("{} cannot take a path", self.base_url);
        }
        let mut url = self.base_url.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}/{}", prefix, path.trim_start_matches('/')));
        Ok(url)
    }

    pub async fn get(&self, url: &Url) -> Result<Value, FetchError> {
        fetch_json(&self.client, url, &self.headers, self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{init_logging, spawn_server};
    use serde_json::json;
    use warp::{http::StatusCode as WarpStatus, Filter};

    fn config_for(base: &Url, key: Option<&str>) -> Config {
        Config {
            api_key: key.map(str::to_string),
            base_url: base.clone(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn returns_parsed_body_on_success() {
        init_logging();
        let body = json!([{"countryCode": "1220", "countryName": "United States"}, {"n": 1.5}]);
        let served = body.clone();
        let base = spawn_server(
            warp::path!("ok").map(move || warp::reply::json(&served)),
        );

        let fetcher = Fetcher::new(&config_for(&base, Some("k"))).unwrap();
        let got = fetcher.get(&fetcher.url_for("/ok").unwrap()).await.unwrap();
        assert_eq!(got, body);
    }

    #[tokio::test]
    async fn sends_api_key_header() {
        init_logging();
        let base = spawn_server(
            warp::path!("echo")
                .and(warp::header::optional::<String>("x-api-key"))
                .map(|key: Option<String>| warp::reply::json(&json!({ "key": key }))),
        );

        let fetcher = Fetcher::new(&config_for(&base, Some("secret"))).unwrap();
        let got = fetcher.get(&fetcher.url_for("/echo").unwrap()).await.unwrap();
        assert_eq!(got, json!({"key": "secret"}));

        let anon = Fetcher::new(&config_for(&base, None)).unwrap();
        let got = anon.get(&anon.url_for("/echo").unwrap()).await.unwrap();
        assert_eq!(got, json!({"key": ""}));
    }

    #[tokio::test]
    async fn error_status_is_reported_as_status() {
        init_logging();
        let base = spawn_server(warp::path!("denied").map(|| {
            warp::reply::with_status("forbidden", WarpStatus::FORBIDDEN)
        }));

        let fetcher = Fetcher::new(&config_for(&base, None)).unwrap();
        let url = fetcher.url_for("/denied").unwrap();
        let err = fetcher.get(&url).await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Status);
        assert_eq!(err.url(), &url);
        match err {
            FetchError::Status { status, .. } => assert_eq!(status.as_u16(), 403),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_is_reported_as_status() {
        init_logging();
        let base = spawn_server(warp::path!("boom").map(|| {
            warp::reply::with_status(
                warp::reply::json(&json!({"error": "x"})),
                WarpStatus::INTERNAL_SERVER_ERROR,
            )
        }));

        let fetcher = Fetcher::new(&config_for(&base, None)).unwrap();
        let err = fetcher
            .get(&fetcher.url_for("/boom").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Status);
    }

    #[tokio::test]
    async fn non_json_body_is_reported_as_decode() {
        init_logging();
        let base = spawn_server(warp::path!("html").map(|| "<html>maintenance</html>"));

        let fetcher = Fetcher::new(&config_for(&base, None)).unwrap();
        let err = fetcher
            .get(&fetcher.url_for("/html").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Decode);
    }

    #[tokio::test]
    async fn unreachable_host_is_reported_as_transport() {
        init_logging();
        // Bind then drop a listener so the port is very likely closed.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let base = Url::parse(&format!("http://127.0.0.1:{}", port)).unwrap();

        let fetcher = Fetcher::new(&config_for(&base, None)).unwrap();
        let err = fetcher
            .get(&fetcher.url_for("/anything").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Transport);
    }

    #[test]
    fn url_for_keeps_base_path_prefix() {
        for base in ["http://proxy.local/usda", "http://proxy.local/usda/"] {
            let cfg = Config {
                base_url: Url::parse(base).unwrap(),
                ..Config::default()
            };
            let fetcher = Fetcher::new(&cfg).unwrap();
            assert_eq!(
                fetcher.url_for("/api/esr/countries").unwrap().as_str(),
                "http://proxy.local/usda/api/esr/countries"
            );
            assert_eq!(
                fetcher.url_for("api/gats/commodities").unwrap().as_str(),
                "http://proxy.local/usda/api/gats/commodities"
            );
        }
    }

    #[tokio::test]
    async fn requests_go_through_base_path_prefix() {
        init_logging();
        let base = spawn_server(
            warp::path!("usda" / "api" / "esr" / "countries")
                .map(|| warp::reply::json(&json!([{"countryCode": "1220"}]))),
        );
        let prefixed = base.join("usda").unwrap();

        let fetcher = Fetcher::new(&config_for(&prefixed, None)).unwrap();
        let got = fetcher
            .get(&fetcher.url_for("/api/esr/countries").unwrap())
            .await
            .unwrap();
        assert_eq!(got, json!([{"countryCode": "1220"}]));
    }

    #[test]
    fn url_for_on_bare_host() {
        let cfg = Config::default();
        let fetcher = Fetcher::new(&cfg).unwrap();
        assert_eq!(
            fetcher.url_for("/api/esr/countries").unwrap().as_str(),
            "https://api.fas.usda.gov/api/esr/countries"
        );
    }
}
