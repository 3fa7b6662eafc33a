pub mod cookies;
pub mod limit;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use regex::Regex;
use reqwest::header::{self, HeaderMap};
use reqwest::{Method, StatusCode};
use scraper::Html;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::config::FetchConfig;
use crate::error::{FetchError, classify};
use crate::utils::normalize_language;
use cookies::RedirectState;
use limit::BodyLimit;

static DOCUMENT_TYPES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(text/html|application/xhtml\+xml)").expect("document type pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    Get,
    Head,
}

impl From<FetchMethod> for Method {
    fn from(method: FetchMethod) -> Self {
        match method {
            FetchMethod::Get => Method::GET,
            FetchMethod::Head => Method::HEAD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    url: Url,
    method: FetchMethod,
    headers: BTreeMap<String, String>,
    type_filter: Option<Regex>,
}

impl FetchRequest {
    pub fn new(url: Url, method: FetchMethod) -> Self {
        Self {
            url,
            method,
            headers: BTreeMap::new(),
            type_filter: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(url, FetchMethod::Get)
    }

    pub fn head(url: Url) -> Self {
        Self::new(url, FetchMethod::Head)
    }

    pub fn header<V: Into<String>>(mut self, name: &str, value: Option<V>) -> Self {
        let name = name.to_ascii_lowercase();
        match value {
            Some(value) => {
                self.headers.insert(name, value.into());
            }
            None => {
                self.headers.remove(&name);
            }
        }
        self
    }

    pub fn type_filter(mut self, pattern: Regex) -> Self {
        self.type_filter = Some(pattern);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> FetchMethod {
        self.method
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

#[derive(Debug)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn content_type(&self) -> Option<&str> {
        header_str(&self.headers, header::CONTENT_TYPE)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub url: Url,
    pub html: String,
}

impl FetchedDocument {
    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub async fn execute(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        self.execute_cancellable(request, CancellationToken::new())
            .await
    }

    /// One deadline spans every redirect hop and the whole body. Any failure,
    /// including timeout, cancels `cancel` so holders of a clone see the abort.
    pub async fn execute_cancellable(
        &self,
        request: FetchRequest,
        cancel: CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        let deadline = Instant::now() + self.config.timeout;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            outcome = tokio::time::timeout_at(deadline, self.follow(&request, &cancel)) => {
                outcome.unwrap_or(Err(FetchError::Timeout))
            }
        };

        if let Err(err) = &result {
            if matches!(err, FetchError::Timeout) {
                warn!(url = %request.url, timeout = ?self.config.timeout, "fetch timed out");
            }
            cancel.cancel();
        }
        result
    }

    pub async fn get(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        self.execute(FetchRequest::get(url.clone()).header("accept", Some("*/*")))
            .await
    }

    pub async fn head(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        self.execute(FetchRequest::head(url.clone()).header("accept", Some("*/*")))
            .await
    }

    pub async fn fetch_document(
        &self,
        url: &Url,
        language: Option<&str>,
    ) -> Result<FetchedDocument, FetchError> {
        let request = FetchRequest::get(url.clone())
            .header("accept", Some("text/html,application/xhtml+xml"))
            .header("user-agent", Some(self.config.user_agent.as_str()))
            .header("accept-language", language.and_then(normalize_language))
            .type_filter(DOCUMENT_TYPES.clone());

        let response = self.execute(request).await?;
        Ok(FetchedDocument {
            html: response.text(),
            url: response.url,
        })
    }

    async fn follow(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        let mut url = request.url.clone();
        let mut state = RedirectState::new(request.headers.get("cookie").cloned());
        let mut hops = 0usize;

        loop {
            ensure_http(&url)?;
            let response = self.send(request, &url, &state).await?;
            let status = response.status();
            if !status.is_redirection() {
                return self.finish(request, url, response, cancel).await;
            }

            if hops >= self.config.max_redirects {
                return Err(FetchError::TooManyRedirects(self.config.max_redirects));
            }
            hops += 1;

            let location = header_str(response.headers(), header::LOCATION)
                .map(str::trim)
                .filter(|location| !location.is_empty())
                .ok_or(FetchError::MissingLocation(status.as_u16()))?;
            let next = url.join(location)?;

            let set_cookie = response
                .headers()
                .get_all(header::SET_COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .collect::<Vec<_>>()
                .join(", ");
            state = state.absorb(&set_cookie);

            debug!(
                from = %url,
                to = %next,
                status = status.as_u16(),
                hop = hops,
                "following redirect"
            );
            url = next;
        }
    }

    async fn send(
        &self,
        request: &FetchRequest,
        url: &Url,
        state: &RedirectState,
    ) -> Result<reqwest::Response, FetchError> {
        let mut builder = self
            .client
            .request(request.method.into(), url.clone())
            .header(header::CACHE_CONTROL, "no-cache");
        for (name, value) in request.headers.iter().filter(|(name, _)| *name != "cookie") {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = state.cookie() {
            builder = builder.header(header::COOKIE, cookie);
        }
        Ok(builder.send().await?)
    }

    async fn finish(
        &self,
        request: &FetchRequest,
        url: Url,
        response: reqwest::Response,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(classify(status.as_u16(), &status_text(&response)).into());
        }

        let headers = response.headers().clone();
        if let Some(filter) = &request.type_filter {
            let content_type = header_str(&headers, header::CONTENT_TYPE);
            if !content_type.is_some_and(|value| filter.is_match(value)) {
                warn!(url = %url, content_type = ?content_type, "rejected by type filter");
                cancel.cancel();
                return Err(FetchError::RejectedContentType(content_type.map(str::to_string)));
            }
        }

        let mut limit = BodyLimit::new(self.config.max_size);
        let declared = header_str(&headers, header::CONTENT_LENGTH)
            .and_then(|value| value.trim().parse::<u64>().ok());
        if let Err(err) = limit.check_declared(declared) {
            warn!(url = %url, %err, "declared length over limit");
            cancel.cancel();
            return Err(err);
        }

        if request.method == FetchMethod::Head {
            return Ok(FetchResponse {
                status,
                headers,
                url,
                body: Bytes::new(),
            });
        }

        // Bodies without a usable length are only bounded here.
        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            let chunk = chunk?;
            if let Err(err) = limit.accept(chunk.len()) {
                warn!(url = %url, %err, "aborting oversized response");
                cancel.cancel();
                return Err(err);
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, status = status.as_u16(), bytes = limit.received(), "fetched");
        Ok(FetchResponse {
            status,
            headers,
            url,
            body: body.freeze(),
        })
    }
}

fn ensure_http(url: &Url) -> Result<(), FetchError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(FetchError::UnsupportedScheme(other.to_string())),
    }
}

fn status_text(response: &reqwest::Response) -> String {
    match response.extensions().get::<hyper::ext::ReasonPhrase>() {
        Some(reason) => String::from_utf8_lossy(reason.as_bytes()).into_owned(),
        None => response
            .status()
            .canonical_reason()
            .unwrap_or_default()
            .to_string(),
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
