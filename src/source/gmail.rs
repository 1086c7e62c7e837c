//! Gmail REST API source.
//!
//! Threads matching the criteria are listed page by page, each thread's
//! messages are enumerated with their metadata headers, and every message
//! is then downloaded in `raw` (RFC 822) form.

use std::collections::HashMap;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::auth::Credentials;
use super::{Criteria, FetchError, FetchedMessage, MessageRef, MessageSource};
use crate::config::GmailConfig;
use crate::model::headers::HeaderMap;
use crate::parser::header;

/// Headers requested with each thread's metadata.
const METADATA_HEADERS: [&str; 4] = ["Subject", "Date", "From", "To"];

/// Gmail caps `maxResults` at 500.
const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadList {
    #[serde(default)]
    threads: Vec<ThreadStub>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadStub {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Thread {
    id: String,
    #[serde(default)]
    messages: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadMessage {
    id: String,
    payload: Option<Payload>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<ApiHeader>,
}

#[derive(Debug, Deserialize)]
struct ApiHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    raw: String,
}

/// Reads a Gmail mailbox through the REST API.
pub struct GmailSource {
    client: Client,
    credentials: Credentials,
    settings: GmailConfig,
    criteria: Criteria,
    page_size: u32,
    /// Metadata headers gathered while listing, keyed by message id.
    metadata: HashMap<String, HeaderMap>,
}

impl GmailSource {
    pub fn new(
        settings: GmailConfig,
        criteria: Criteria,
        page_size: u32,
    ) -> Result<Self, FetchError> {
        let credentials = Credentials::load(&settings.token_path)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("threadscribe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            credentials,
            settings,
            criteria,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            metadata: HashMap::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/users/{}/{path}",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.user_id
        )
    }

    /// GET a JSON resource, retrying transient failures with exponential backoff.
    fn get_json<T: DeserializeOwned>(
        &mut self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let mut attempt: u32 = 0;
        let mut refreshed = false;

        loop {
            let token = self.credentials.access_token(&self.client)?.to_string();
            let result = self
                .client
                .get(url)
                .bearer_auth(token)
                .query(query)
                .send();

            let response = match result {
                Ok(response) => response,
                Err(e) if is_transient(&e) && attempt < self.settings.max_retries => {
                    attempt += 1;
                    let wait = self.backoff(attempt, None);
                    warn!(url, attempt, error = %e, wait_ms = wait.as_millis() as u64, "Transport error, retrying");
                    std::thread::sleep(wait);
                    continue;
                }
                Err(e) => return Err(FetchError::Network(e)),
            };

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<T>()
                    .map_err(|e| FetchError::Decode(format!("{url}: {e}")));
            }

            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let message = response.text().unwrap_or_default();

            if status == StatusCode::UNAUTHORIZED {
                if refreshed || !self.credentials.can_refresh() {
                    return Err(FetchError::Auth(format!("{url} rejected the access token")));
                }
                info!("Access token rejected, refreshing");
                self.credentials.force_refresh(&self.client)?;
                refreshed = true;
                continue;
            }

            let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
                || (status == StatusCode::FORBIDDEN
                    && (message.contains("rateLimitExceeded")
                        || message.contains("userRateLimitExceeded")));
            if rate_limited || status.is_server_error() {
                if attempt >= self.settings.max_retries {
                    if rate_limited {
                        return Err(FetchError::Quota {
                            attempts: attempt + 1,
                        });
                    }
                    return Err(status_error(status, url, &message));
                }
                attempt += 1;
                let wait = self.backoff(attempt, retry_after);
                warn!(url, status = status.as_u16(), attempt, wait_ms = wait.as_millis() as u64, "Retrying request");
                std::thread::sleep(wait);
                continue;
            }

            return Err(status_error(status, url, &message));
        }
    }

    /// `backoff_ms * 2^(attempt-1)`, or the server's `Retry-After` when larger.
    fn backoff(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        let exponential = self
            .settings
            .backoff_ms
            .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
        let hinted = retry_after_secs.unwrap_or(0).saturating_mul(1000);
        Duration::from_millis(exponential.max(hinted))
    }

    fn list_thread_ids(&mut self) -> Result<Vec<String>, FetchError> {
        let query = self.criteria.gmail_query();
        let page_size = self.page_size.to_string();
        let url = self.url("threads");
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params: Vec<(&str, &str)> = vec![("maxResults", &page_size)];
            if !query.is_empty() {
                params.push(("q", &query));
            }
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let page: ThreadList = self.get_json(&url, &params)?;
            debug!(threads = page.threads.len(), "Fetched thread page");
            ids.extend(page.threads.into_iter().map(|t| t.id));

            if self.criteria.is_full(ids.len()) {
                break;
            }
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        info!(query = %query, threads = ids.len(), "Listed threads");
        Ok(ids)
    }

    fn thread(&mut self, thread_id: &str) -> Result<Thread, FetchError> {
        let url = self.url(&format!("threads/{thread_id}"));
        let mut params = vec![("format", "metadata")];
        params.extend(METADATA_HEADERS.iter().map(|h| ("metadataHeaders", *h)));
        self.get_json(&url, &params)
    }
}

impl MessageSource for GmailSource {
    fn describe(&self) -> String {
        format!("Gmail ({})", self.settings.user_id)
    }

    fn list(&mut self) -> Result<Vec<MessageRef>, FetchError> {
        let mut refs = Vec::new();
        for thread_id in self.list_thread_ids()? {
            let thread = self.thread(&thread_id)?;
            for message in thread.messages {
                if let Some(payload) = message.payload {
                    let headers = payload
                        .headers
                        .into_iter()
                        .map(|h| (h.name, h.value))
                        .collect();
                    self.metadata.insert(message.id.clone(), headers);
                }
                refs.push(MessageRef {
                    thread_id: Some(thread.id.clone()),
                    message_id: message.id,
                });
                if self.criteria.is_full(refs.len()) {
                    return Ok(refs);
                }
            }
        }
        Ok(refs)
    }

    fn fetch(&mut self, message: &MessageRef) -> Result<FetchedMessage, FetchError> {
        let url = self.url(&format!("messages/{}", message.message_id));
        let response: RawMessage = self.get_json(&url, &[("format", "raw")])?;
        let raw = decode_raw(&response.raw)?;
        let headers = self
            .metadata
            .remove(&message.message_id)
            .unwrap_or_else(|| header::parse_headers(&raw));
        Ok(FetchedMessage { raw, headers })
    }
}

/// Gmail's `raw` field is base64url, padded or not.
pub fn decode_raw(encoded: &str) -> Result<Vec<u8>, FetchError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .collect();
    URL_SAFE_NO_PAD
        .decode(compact)
        .map_err(|e| FetchError::Decode(format!("raw message is not base64url: {e}")))
}

fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

fn status_error(status: StatusCode, url: &str, body: &str) -> FetchError {
    FetchError::Status {
        status: status.as_u16(),
        url: url.to_string(),
        message: api_error_message(body),
    }
}

/// The `error.message` of a Google API error body, or the trimmed body itself.
fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Inner,
    }
    #[derive(Deserialize)]
    struct Inner {
        message: String,
    }
    serde_json::from_str::<Envelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_raw_padded_and_unpadded() {
        let raw = b"Subject: Hi\r\n\r\nBody?>\r\n";
        let padded = base64::engine::general_purpose::URL_SAFE.encode(raw);
        let unpadded = URL_SAFE_NO_PAD.encode(raw);
        assert_eq!(decode_raw(&padded).unwrap(), raw);
        assert_eq!(decode_raw(&unpadded).unwrap(), raw);
        assert!(matches!(decode_raw("***"), Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_thread_list_deserializes() {
        let json = r#"{"threads":[{"id":"t1","snippet":"hi","historyId":"9"}],"nextPageToken":"p2","resultSizeEstimate":1}"#;
        let page: ThreadList = serde_json::from_str(json).unwrap();
        assert_eq!(page.threads[0].id, "t1");
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));

        let empty: ThreadList = serde_json::from_str(r#"{"resultSizeEstimate":0}"#).unwrap();
        assert!(empty.threads.is_empty());
        assert!(empty.next_page_token.is_none());
    }

    #[test]
    fn test_thread_metadata_deserializes() {
        let json = r#"{"id":"t1","messages":[{"id":"m1","threadId":"t1","payload":{"mimeType":"multipart/alternative","headers":[{"name":"Subject","value":"Hello"},{"name":"From","value":"a@example.com"}]}}]}"#;
        let thread: Thread = serde_json::from_str(json).unwrap();
        assert_eq!(thread.messages.len(), 1);
        let headers = &thread.messages[0].payload.as_ref().unwrap().headers;
        assert_eq!(headers[0].name, "Subject");
        assert_eq!(headers[1].value, "a@example.com");
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        assert_eq!(api_error_message(body), "Requested entity was not found.");
        assert_eq!(api_error_message("  plain failure \n"), "plain failure");
    }
}
