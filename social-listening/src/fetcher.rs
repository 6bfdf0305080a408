use crate::parser::ListingParser;
use crate::traits::PostSource;
use crate::types::{Credentials, FetchConfig, FetchError, ListenerError, Page, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

/// Refresh tokens this long before the server says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Listing client for the forum API. Requests are serialized through a
/// minimum-interval clock and retried with bounded exponential backoff.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    credentials: Option<Credentials>,
    parser: ListingParser,
    last_request: Mutex<Option<Instant>>,
    token: Mutex<Option<AccessToken>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig, credentials: Option<Credentials>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        let parser = ListingParser::new(config.api_base.clone());

        Ok(Self {
            client,
            config,
            credentials,
            parser,
            last_request: Mutex::new(None),
            token: Mutex::new(None),
        })
    }

    fn listing_url(&self, topic: &str, cursor: Option<&str>) -> std::result::Result<Url, url::ParseError> {
        let base = if self.credentials.is_some() {
            format!("{}/r/{}/new", self.config.oauth_base.trim_end_matches('/'), topic)
        } else {
            format!("{}/r/{}/new.json", self.config.api_base.trim_end_matches('/'), topic)
        };

        let mut url = Url::parse(&base)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.config.page_size.to_string());
            query.append_pair("raw_json", "1");
            if let Some(after) = cursor {
                query.append_pair("after", after);
            }
        }
        Ok(url)
    }

    fn retry_backoff(&self) -> ExponentialBackoff<backoff::SystemClock> {
        let base = Duration::from_millis(self.config.backoff_base_ms);
        ExponentialBackoff {
            current_interval: base,
            initial_interval: base,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: Duration::from_millis(self.config.backoff_max_ms),
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    async fn apply_rate_limit(&self) {
        let min_interval = Duration::from_millis(self.config.min_request_interval_ms);
        let mut last_request = self.last_request.lock().await;

        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                let wait_time = min_interval - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    async fn request_token(&self, credentials: &Credentials) -> Result<AccessToken> {
        self.apply_rate_limit().await;

        let response = self
            .client
            .post(&self.config.token_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ListenerError::Auth(format!("credentials rejected (HTTP {})", status)));
        }
        if !status.is_success() {
            return Err(ListenerError::Auth(format!("token endpoint returned HTTP {}", status)));
        }

        let token: TokenResponse = response.json().await?;
        match token.access_token {
            Some(value) => {
                let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
                Ok(AccessToken {
                    value,
                    expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
                })
            }
            None => Err(ListenerError::Auth(
                token.error.unwrap_or_else(|| "token response had no access_token".to_string()),
            )),
        }
    }

    /// Current bearer token, refreshed when expired. `None` in public mode.
    async fn bearer_token(&self) -> Result<Option<String>> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };

        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref() {
            if Instant::now() < current.expires_at {
                return Ok(Some(current.value.clone()));
            }
            info!("Access token expired, requesting a new one");
        }

        let fresh = self.request_token(credentials).await?;
        let value = fresh.value.clone();
        *token = Some(fresh);
        Ok(Some(value))
    }

    async fn send_listing_request(&self, url: &Url, bearer: Option<&str>) -> std::result::Result<Response, reqwest::Error> {
        let mut request = self.client.get(url.clone());
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request.send().await
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl PostSource for Fetcher {
    fn source_name(&self) -> String {
        match &self.credentials {
            Some(_) => format!("{} (oauth)", self.config.oauth_base),
            None => self.config.api_base.clone(),
        }
    }

    async fn authenticate(&self) -> Result<()> {
        let Some(credentials) = &self.credentials else {
            info!("No credentials configured, using the public listing endpoint");
            return Ok(());
        };

        let fresh = self.request_token(credentials).await.map_err(|e| match e {
            ListenerError::Auth(message) => ListenerError::Auth(message),
            other => ListenerError::Auth(other.to_string()),
        })?;
        *self.token.lock().await = Some(fresh);

        info!("Authenticated as application {}", credentials.client_id);
        Ok(())
    }

    async fn fetch_page(
        &self,
        topic: &str,
        cursor: Option<&str>,
    ) -> std::result::Result<Page, FetchError> {
        let fail = |status: Option<u16>, message: String| FetchError {
            topic: topic.to_string(),
            page_token: cursor.map(str::to_string),
            status,
            message,
        };

        if topic.trim().is_empty() {
            return Err(fail(None, "topic name is empty".to_string()));
        }

        let url = self
            .listing_url(topic, cursor)
            .map_err(|e| fail(None, format!("invalid listing url: {}", e)))?;

        let mut backoff = self.retry_backoff();
        let max_delay = Duration::from_millis(self.config.backoff_max_ms);
        let mut last_status = None;
        let mut last_error = String::from("no attempt made");

        for attempt in 0..=self.config.max_retries {
            let bearer = self
                .bearer_token()
                .await
                .map_err(|e| fail(None, format!("could not refresh access token: {}", e)))?;

            self.apply_rate_limit().await;
            debug!("Fetching {} (attempt {})", url, attempt + 1);

            let server_delay = match self.send_listing_request(&url, bearer.as_deref()).await {
                Ok(response) => {
                    let status = response.status();
                    last_status = Some(status.as_u16());

                    if status.is_success() {
                        match response.bytes().await {
                            Ok(body) => {
                                return self
                                    .parser
                                    .parse_listing(topic, &body)
                                    .map_err(|e| fail(last_status, e.to_string()));
                            }
                            Err(e) => {
                                last_error = format!("failed to read response body: {}", e);
                                None
                            }
                        }
                    } else if is_retryable(status) {
                        last_error = format!(
                            "HTTP {}: {}",
                            status.as_u16(),
                            status.canonical_reason().unwrap_or("Unknown")
                        );
                        retry_after(&response)
                    } else {
                        return Err(fail(
                            last_status,
                            format!(
                                "HTTP {}: {}",
                                status.as_u16(),
                                status.canonical_reason().unwrap_or("Unknown")
                            ),
                        ));
                    }
                }
                Err(e) => {
                    // keep the last HTTP status seen when the transport fails
                    if let Some(status) = e.status() {
                        last_status = Some(status.as_u16());
                    }
                    last_error = e.to_string();
                    None
                }
            };

            if attempt == self.config.max_retries {
                break;
            }

            let computed = backoff.next_backoff().unwrap_or(max_delay);
            let delay = server_delay.unwrap_or(computed).min(max_delay);
            warn!(
                "Attempt {} failed for r/{}, retrying in {:?}: {}",
                attempt + 1,
                topic,
                delay,
                last_error
            );
            tokio::time::sleep(delay).await;
        }

        error!(
            "Failed to fetch r/{} after {} attempts",
            topic,
            self.config.max_retries + 1
        );
        Err(fail(
            last_status,
            format!(
                "gave up after {} attempts: {}",
                self.config.max_retries + 1,
                last_error
            ),
        ))
    }
}
