//! Subgraph client for maker/trader account discovery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Largest page the graph node accepts for `first:`.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Account category exposed by the protocol subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountCategory {
    /// Accounts acting as liquidity providers.
    Makers,
    /// Accounts holding directional positions.
    Traders,
}

impl AccountCategory {
    /// Entity collection name in the subgraph schema.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Makers => "makers",
            Self::Traders => "traders",
        }
    }
}

impl fmt::Display for AccountCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Opaque account identifier as stored by the index (a hex address).
///
/// Ordering is lexicographic and only meaningful as a pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport-level failure talking to the index.
///
/// GraphQL `errors` payloads are not represented here: they end pagination
/// for the current listing instead of failing it.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("subgraph request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("subgraph returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed subgraph response: {0}")]
    Decode(String),
}

/// Source of candidate accounts.
#[async_trait]
pub trait AccountIndex: Send + Sync {
    /// List every account of `category`, paging until the index is exhausted.
    async fn list_all(&self, category: AccountCategory) -> Result<Vec<AccountId>, IndexError>;
}

/// Single page outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// Records returned for the requested cursor (possibly empty).
    Records(Vec<AccountId>),
    /// The service answered with a GraphQL `errors` object.
    QueryError(String),
}

#[derive(Debug, Serialize)]
struct GraphQuery {
    query: String,
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct IdRecord {
    id: AccountId,
}

/// GraphQL subgraph client paging by ascending `id`.
#[derive(Debug, Clone)]
pub struct SubgraphClient {
    client: reqwest::Client,
    endpoint: String,
    page_size: usize,
}

impl SubgraphClient {
    /// Create a client for `endpoint` with the default timeout and page size.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, IndexError> {
        Self::with_timeout(endpoint, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client whose every request is bounded by `timeout`.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            page_size: MAX_PAGE_SIZE,
        })
    }

    /// Override the page size (clamped to `1..=1000`).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the GraphQL query for one page.
    pub fn build_query(category: AccountCategory, first: usize, cursor: &str) -> String {
        format!(
            "{{ {}(first: {}, where: {{id_gt: \"{}\"}}) {{ id }} }}",
            category.collection(),
            first,
            cursor
        )
    }

    /// Fetch one page of ids strictly greater than `cursor`.
    pub async fn query_page(
        &self,
        category: AccountCategory,
        cursor: &str,
    ) -> Result<Page, IndexError> {
        let body = GraphQuery {
            query: Self::build_query(category, self.page_size, cursor),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Status { status, body });
        }

        let text = response.text().await?;
        let parsed: GraphResponse =
            serde_json::from_str(&text).map_err(|e| IndexError::Decode(e.to_string()))?;

        if let Some(errors) = parsed.errors {
            return Ok(Page::QueryError(errors.to_string()));
        }

        let records = parsed
            .data
            .as_ref()
            .and_then(|data| data.get(category.collection()))
            .cloned()
            .ok_or_else(|| {
                IndexError::Decode(format!("missing data.{} in response", category.collection()))
            })?;

        let records: Vec<IdRecord> =
            serde_json::from_value(records).map_err(|e| IndexError::Decode(e.to_string()))?;

        Ok(Page::Records(records.into_iter().map(|r| r.id).collect()))
    }
}

#[async_trait]
impl AccountIndex for SubgraphClient {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn list_all(&self, category: AccountCategory) -> Result<Vec<AccountId>, IndexError> {
        let mut accounts: Vec<AccountId> = Vec::new();
        let mut seen: HashSet<AccountId> = HashSet::new();
        let mut cursor = String::new();
        let mut pages = 0usize;

        loop {
            let records = match self.query_page(category, &cursor).await? {
                Page::Records(records) => records,
                Page::QueryError(errors) => {
                    warn!(
                        category = %category,
                        cursor = %cursor,
                        errors = %errors,
                        "Subgraph query error, ending listing"
                    );
                    break;
                }
            };
            pages += 1;

            if records.is_empty() {
                break;
            }

            let fetched = records.len();
            let before = accounts.len();
            for id in records {
                // A well-behaved index never returns ids <= cursor; drop them if it does.
                if id.as_str() > cursor.as_str() && seen.insert(id.clone()) {
                    accounts.push(id);
                }
            }

            debug!(
                category = %category,
                page = pages,
                fetched = fetched,
                total_so_far = accounts.len(),
                "Fetched subgraph page"
            );

            if accounts.len() == before {
                warn!(category = %category, cursor = %cursor, "Page yielded no new ids, ending listing");
                break;
            }

            cursor = accounts
                .iter()
                .skip(before)
                .map(AccountId::as_str)
                .max()
                .unwrap_or(cursor.as_str())
                .to_string();
        }

        info!(category = %category, pages = pages, total = accounts.len(), "Listed accounts");
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn page_body(collection: &str, ids: &[&str]) -> String {
        let records: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
        json!({ "data": { collection: records } }).to_string()
    }

    #[test]
    fn test_build_query() {
        let query = SubgraphClient::build_query(AccountCategory::Traders, 1000, "0xabc");
        assert_eq!(
            query,
            "{ traders(first: 1000, where: {id_gt: \"0xabc\"}) { id } }"
        );
    }

    #[test]
    fn test_page_size_clamped() {
        let client = SubgraphClient::new("http://localhost").unwrap().with_page_size(5000);
        assert_eq!(client.page_size(), MAX_PAGE_SIZE);
        let client = client.with_page_size(0);
        assert_eq!(client.page_size(), 1);
    }

    #[tokio::test]
    async fn test_pages_until_empty() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#"id_gt: \\"\\""#.to_string()))
            .with_body(page_body("makers", &["0x01", "0x02"]))
            .create_async()
            .await;
        let second = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#"id_gt: \\"0x02\\""#.to_string()))
            .with_body(page_body("makers", &["0x03"]))
            .create_async()
            .await;
        let last = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#"id_gt: \\"0x03\\""#.to_string()))
            .with_body(page_body("makers", &[]))
            .create_async()
            .await;

        let client = SubgraphClient::new(server.url()).unwrap().with_page_size(2);
        let accounts = client.list_all(AccountCategory::Makers).await.unwrap();

        assert_eq!(
            accounts,
            vec![AccountId::new("0x01"), AccountId::new("0x02"), AccountId::new("0x03")]
        );
        first.assert_async().await;
        second.assert_async().await;
        last.assert_async().await;
    }

    #[tokio::test]
    async fn test_graphql_errors_end_listing() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#"id_gt: \\"\\""#.to_string()))
            .with_body(page_body("traders", &["0x0a"]))
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#"id_gt: \\"0x0a\\""#.to_string()))
            .with_body(json!({ "errors": [{ "message": "indexing error" }] }).to_string())
            .create_async()
            .await;

        let client = SubgraphClient::new(server.url()).unwrap();
        let accounts = client.list_all(AccountCategory::Traders).await.unwrap();
        assert_eq!(accounts, vec![AccountId::new("0x0a")]);
    }

    #[tokio::test]
    async fn test_repeated_ids_never_returned_twice() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#"id_gt: \\"\\""#.to_string()))
            .with_body(page_body("makers", &["0x01", "0x02"]))
            .create_async()
            .await;
        // Misbehaving index: ignores the cursor and repeats the tail of the previous page.
        server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#"id_gt: \\"0x02\\""#.to_string()))
            .with_body(page_body("makers", &["0x02", "0x03"]))
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#"id_gt: \\"0x03\\""#.to_string()))
            .with_body(page_body("makers", &["0x03"]))
            .create_async()
            .await;

        let client = SubgraphClient::new(server.url()).unwrap().with_page_size(2);
        let accounts = client.list_all(AccountCategory::Makers).await.unwrap();
        assert_eq!(
            accounts,
            vec![AccountId::new("0x01"), AccountId::new("0x02"), AccountId::new("0x03")]
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_failure() {
        // Nothing listens on port 1, so the connection is refused.
        let client =
            SubgraphClient::with_timeout("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = client.list_all(AccountCategory::Makers).await.unwrap_err();
        assert!(matches!(err, IndexError::Transport(_)));
    }

    #[tokio::test]
    async fn test_http_error_is_status_failure() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = SubgraphClient::new(server.url()).unwrap();
        let err = client.list_all(AccountCategory::Makers).await.unwrap_err();
        assert!(matches!(err, IndexError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_body(json!({ "data": { "somethingElse": [] } }).to_string())
            .create_async()
            .await;

        let client = SubgraphClient::new(server.url()).unwrap();
        let err = client.list_all(AccountCategory::Traders).await.unwrap_err();
        assert!(matches!(err, IndexError::Decode(_)));
    }
}
