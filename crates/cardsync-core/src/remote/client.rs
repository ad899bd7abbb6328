//! Mochi HTTP client
//!
//! Blocking JSON API over HTTPS with basic auth (token as user name, empty
//! password). Listing is paged with bookmarks. A listing ends at an empty
//! page, or when the server hands back no bookmark or the one just sent.

use reqwest::blocking::{multipart, Client, RequestBuilder};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, trace};

use super::{CardStore, CardUpdate, RemoteCard, TransportError};
use crate::attachments::Attachment;

/// Default API endpoint
pub const DEFAULT_API_URL: &str = "https://app.mochi.cards/api/";

/// Cards requested per page
const PAGE_LIMIT: usize = 100;

/// Request timeout in seconds
const REQUEST_TIMEOUT: u64 = 30;

/// One page of a listing
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default)]
    pub bookmark: Option<String>,
    pub docs: Vec<T>,
}

/// HTTP implementation of [`CardStore`]
pub struct MochiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for MochiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MochiClient")
            .field("base_url", &self.base_url)
            .field("token", &"[redacted]")
            .finish()
    }
}

impl MochiClient {
    /// Create a client for `base_url` (see [`DEFAULT_API_URL`])
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, TransportError> {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT))
            .user_agent(concat!("cardsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| TransportError::Request {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.token, Some(""))
    }

    /// Send a request and return the body of a successful response
    fn send(&self, method: Method, url: &str, request: RequestBuilder) -> Result<String, TransportError> {
        trace!(%method, url, "Sending request");
        let response = request.send().map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let body = response.text().map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        let body = self.send(method, url, request)?;
        serde_json::from_str(&body).map_err(|source| TransportError::Decode {
            url: url.to_string(),
            source,
        })
    }

    fn get_page<T: DeserializeOwned>(
        &self,
        deck_id: Option<&str>,
        bookmark: Option<&str>,
    ) -> Result<Page<T>, TransportError> {
        let url = self.url("cards");
        let mut query = vec![("limit", PAGE_LIMIT.to_string())];
        if let Some(deck_id) = deck_id {
            query.push(("deck-id", deck_id.to_string()));
        }
        if let Some(bookmark) = bookmark {
            query.push(("bookmark", bookmark.to_string()));
        }

        let request = self.request(Method::GET, &url).query(&query);
        self.send_json(Method::GET, &url, request)
    }

    /// Every card as raw JSON, optionally restricted to one deck
    pub fn list_raw(&self, deck_id: Option<&str>) -> Result<Vec<Value>, TransportError> {
        collect_pages(|bookmark| self.get_page(deck_id, bookmark))
    }

    /// One card as raw JSON
    pub fn retrieve_raw(&self, id: &str) -> Result<Value, TransportError> {
        let url = self.url(&format!("cards/{}", id));
        let request = self.request(Method::GET, &url);
        self.send_json(Method::GET, &url, request)
    }
}

/// Fetch pages until one comes back empty or the bookmark stops advancing
pub(crate) fn collect_pages<T, E>(
    mut fetch: impl FnMut(Option<&str>) -> Result<Page<T>, E>,
) -> Result<Vec<T>, E> {
    let mut all = Vec::new();
    let mut bookmark: Option<String> = None;

    loop {
        let page = fetch(bookmark.as_deref())?;
        if page.docs.is_empty() {
            break;
        }
        all.extend(page.docs);
        match page.bookmark {
            Some(next) if bookmark.as_deref() != Some(next.as_str()) => bookmark = Some(next),
            _ => break,
        }
    }

    Ok(all)
}

impl CardStore for MochiClient {
    fn list_cards(&self, deck_id: Option<&str>) -> Result<Vec<RemoteCard>, TransportError> {
        let cards = collect_pages(|bookmark| self.get_page::<RemoteCard>(deck_id, bookmark))?;
        debug!(deck_id = deck_id.unwrap_or("all"), count = cards.len(), "Listed remote cards");
        Ok(cards)
    }

    fn retrieve_card(&self, id: &str) -> Result<RemoteCard, TransportError> {
        let url = self.url(&format!("cards/{}", id));
        let request = self.request(Method::GET, &url);
        self.send_json(Method::GET, &url, request)
    }

    fn create_card(&self, deck_id: &str, content: &str) -> Result<RemoteCard, TransportError> {
        let url = self.url("cards");
        let request = self
            .request(Method::POST, &url)
            .json(&json!({ "deck-id": deck_id, "content": content }));
        self.send_json(Method::POST, &url, request)
    }

    fn update_card(&self, id: &str, update: &CardUpdate) -> Result<RemoteCard, TransportError> {
        let url = self.url(&format!("cards/{}", id));
        let request = self.request(Method::POST, &url).json(update);
        self.send_json(Method::POST, &url, request)
    }

    fn delete_card(&self, id: &str) -> Result<(), TransportError> {
        let url = self.url(&format!("cards/{}", id));
        let request = self.request(Method::DELETE, &url);
        self.send(Method::DELETE, &url, request)?;
        Ok(())
    }

    fn upload_attachment(&self, card_id: &str, attachment: &Attachment) -> Result<(), TransportError> {
        let url = self.url(&format!("cards/{}/attachments/{}", card_id, attachment.name));
        let part = multipart::Part::bytes(attachment.bytes.clone()).file_name(attachment.name.clone());
        let form = multipart::Form::new().part("file", part);
        let request = self.request(Method::POST, &url).multipart(form);
        self.send(Method::POST, &url, request)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(bookmark: &str, docs: &[u32]) -> Page<u32> {
        Page {
            bookmark: Some(bookmark.to_string()),
            docs: docs.to_vec(),
        }
    }

    #[test]
    fn test_collect_pages_follows_bookmarks_until_empty() {
        let mut requested = Vec::new();
        let pages = [page("b1", &[1, 2]), page("b2", &[3]), page("b3", &[])];

        let all = collect_pages::<u32, ()>(|bookmark| {
            requested.push(bookmark.map(str::to_string));
            Ok(pages[requested.len() - 1].clone())
        })
        .unwrap();

        assert_eq!(all, vec![1, 2, 3]);
        assert_eq!(
            requested,
            vec![None, Some("b1".to_string()), Some("b2".to_string())]
        );
    }

    #[test]
    fn test_collect_pages_stops_without_bookmark() {
        let mut calls = 0;
        let all = collect_pages::<u32, ()>(|_| {
            calls += 1;
            Ok(Page {
                bookmark: None,
                docs: vec![1],
            })
        })
        .unwrap();

        assert_eq!(all, vec![1]);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_collect_pages_stops_on_repeated_bookmark() {
        let mut requested = Vec::new();
        let all = collect_pages::<u32, ()>(|bookmark| {
            requested.push(bookmark.map(str::to_string));
            Ok(page("same", &[7]))
        })
        .unwrap();

        assert_eq!(all, vec![7, 7]);
        assert_eq!(requested, vec![None, Some("same".to_string())]);
    }

    #[test]
    fn test_collect_pages_propagates_errors() {
        let result = collect_pages::<u32, &str>(|_| Err("boom"));
        assert_eq!(result, Err("boom"));
    }

    #[test]
    fn test_page_decodes_without_bookmark() {
        let page: Page<RemoteCard> = serde_json::from_str(r#"{"docs": []}"#).unwrap();
        assert!(page.bookmark.is_none());
        assert!(page.docs.is_empty());
    }

    #[test]
    fn test_url_joining() {
        let client = MochiClient::new("https://example.com/api", "token").unwrap();
        assert_eq!(client.url("cards/x"), "https://example.com/api/cards/x");
        assert!(!format!("{:?}", client).contains("token\""));
    }
}
