//! HTTP fetch transport shared by every source.

mod origin;

use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};

use crate::error::ScraperError;
use crate::settings::Settings;

pub use origin::{extract_origin, resolve_reference};

const DEFAULT_QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// A fetched document, ready for a strategy.
#[derive(Debug, Clone)]
pub struct Document {
    /// Final URL after redirects; relative references resolve against it.
    pub url: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl Document {
    #[must_use]
    pub fn new(url: &str, content_type: Option<&str>, body: &str) -> Self {
        Self {
            url: url.to_owned(),
            content_type: content_type.map(str::to_owned),
            body: body.to_owned(),
        }
    }

    /// True when the declared content type mentions `needle` (case-insensitive).
    #[must_use]
    pub fn content_type_contains(&self, needle: &str) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains(needle))
    }
}

/// Everything needed to issue one source's request, resolved up front so a
/// bad URL or header is a configuration failure rather than a fetch failure.
#[derive(Debug, Clone)]
pub struct RequestPlan {
    pub url: Url,
    pub headers: HeaderMap,
}

impl RequestPlan {
    /// Builds the request for `source_url`.
    ///
    /// Default headers are `Accept` (chosen by the strategy), `Accept-Language`,
    /// and `Origin`/`Referer` taken from the URL origin. The `headers` setting
    /// overrides any of them. The `query` setting is appended to the URL with
    /// `{today}` and `{window_end}` rendered using `query_date_format`.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::InvalidSourceUrl`] if the URL is not absolute http(s).
    /// - [`ScraperError::InvalidSetting`] for a bad header, query map, or
    ///   date format.
    pub fn build(
        source_url: &str,
        settings: &Settings<'_>,
        accept: &'static str,
        today: NaiveDate,
        window_days: u64,
    ) -> Result<Self, ScraperError> {
        let mut url = Url::parse(source_url).map_err(|e| ScraperError::InvalidSourceUrl {
            url: source_url.to_owned(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ScraperError::InvalidSourceUrl {
                url: source_url.to_owned(),
                reason: format!("unsupported scheme \"{}\"", url.scheme()),
            });
        }

        let query = settings.str_map("query")?;
        if !query.is_empty() {
            let date_format = settings
                .optional_str("query_date_format")?
                .unwrap_or(DEFAULT_QUERY_DATE_FORMAT);
            if StrftimeItems::new(date_format).any(|item| matches!(item, Item::Error)) {
                return Err(ScraperError::InvalidSetting {
                    setting: "query_date_format".to_owned(),
                    reason: format!("\"{date_format}\" is not a valid date format"),
                });
            }
            let window_end = today
                .checked_add_days(chrono::Days::new(window_days))
                .unwrap_or(today);
            let today_text = today.format(date_format).to_string();
            let window_end_text = window_end.format(date_format).to_string();

            let mut pairs = url.query_pairs_mut();
            for (name, value) in &query {
                let rendered = value
                    .replace("{today}", &today_text)
                    .replace("{window_end}", &window_end_text);
                pairs.append_pair(name, &rendered);
            }
        }

        let origin = extract_origin(&url);
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static(accept));
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        if let Ok(value) = HeaderValue::from_str(&origin) {
            headers.insert(reqwest::header::ORIGIN, value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("{origin}/")) {
            headers.insert(reqwest::header::REFERER, value);
        }

        for (name, value) in settings.str_map("headers")? {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| ScraperError::InvalidSetting {
                    setting: "headers".to_owned(),
                    reason: format!("bad header name \"{name}\": {e}"),
                })?;
            let header_value =
                HeaderValue::from_str(&value).map_err(|e| ScraperError::InvalidSetting {
                    setting: "headers".to_owned(),
                    reason: format!("bad value for header \"{name}\": {e}"),
                })?;
            headers.insert(header_name, header_value);
        }

        Ok(Self { url, headers })
    }
}

/// Thin wrapper over `reqwest::Client` that turns responses into
/// [`Document`]s and HTTP failures into classified [`ScraperError`]s.
///
/// Retrying is the coordinator's job; [`FetchClient::fetch`] makes exactly one
/// request.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Client,
}

impl FetchClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(user_agent: &str) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Issues one GET for `plan`, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Timeout`] if the request or body read exceeds `timeout`.
    /// - [`ScraperError::UnexpectedStatus`] for any non-2xx status.
    /// - [`ScraperError::EmptyBody`] if the body is blank.
    /// - [`ScraperError::Http`] for connection, DNS, or TLS failures.
    pub async fn fetch(
        &self,
        plan: &RequestPlan,
        timeout: Duration,
    ) -> Result<Document, ScraperError> {
        let url = plan.url.to_string();
        let on_error = |e: reqwest::Error| {
            if e.is_timeout() {
                ScraperError::Timeout {
                    url: url.clone(),
                    timeout_ms: timeout.as_millis(),
                }
            } else {
                ScraperError::Http(e)
            }
        };

        let response = self
            .client
            .get(plan.url.clone())
            .headers(plan.headers.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(on_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = response.text().await.map_err(on_error)?;
        if body.trim().is_empty() {
            return Err(ScraperError::EmptyBody { url });
        }

        Ok(Document {
            url: final_url,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
