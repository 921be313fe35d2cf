//! # xAPI LRS
//!
//! Statement types and a Learning Record Store client.
//!
//! The relay writes one statement per SMS reply and later asks the store for
//! the most recent statement matching a verb/activity pair. [`RecordStore`] is
//! the seam; [`LrsClient`] is the HTTP implementation speaking the xAPI
//! `statements` resource with Basic auth.
//!
//! ```rust,ignore
//! use xapi_lrs::{LrsClient, RecordStore, StatementQuery};
//!
//! let lrs = LrsClient::new("https://lrs.example/xapi", "key", "secret");
//! let latest = lrs
//!     .latest_statement(&StatementQuery::latest("http://adlnet.gov/expapi/verbs/answered"))
//!     .await?;
//! ```

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info};

pub mod statement;

pub use statement::*;

/// Default `X-Experience-API-Version` sent with every request.
pub const XAPI_VERSION: &str = "1.0.3";

const VERSION_HEADER: &str = "X-Experience-API-Version";

/// Errors talking to a record store
#[derive(Debug, thiserror::Error)]
pub enum LrsError {
    /// Transport-level failure
    #[error("http error: {0}")]
    Http(String),
    /// The store answered with a non-success status
    #[error("record store returned HTTP {status}: {body}")]
    Store { status: u16, body: String },
    /// The store's response could not be decoded
    #[error("malformed record store response: {0}")]
    Decode(String),
}

/// Filters for `GET /statements`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatementQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Oldest first when true; stores default to newest first.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ascending: bool,
}

impl StatementQuery {
    /// Newest statement with the given verb.
    pub fn latest(verb: impl Into<String>) -> Self {
        Self {
            verb: Some(verb.into()),
            limit: Some(1),
            ..Self::default()
        }
    }

    pub fn for_activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = Some(activity.into());
        self
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist one statement, returning the id the store assigned.
    async fn save_statement(&self, statement: &Statement) -> Result<String, LrsError>;

    /// Run a statement query, newest first unless `ascending` is set.
    async fn query_statements(&self, query: &StatementQuery) -> Result<Vec<Statement>, LrsError>;

    /// The single most recent statement matching `query`, if any.
    async fn latest_statement(
        &self,
        query: &StatementQuery,
    ) -> Result<Option<Statement>, LrsError> {
        let query = StatementQuery {
            limit: Some(1),
            ascending: false,
            ..query.clone()
        };
        Ok(self.query_statements(&query).await?.into_iter().next())
    }
}

/// HTTP client for an xAPI Learning Record Store.
#[derive(Clone, Debug)]
pub struct LrsClient {
    /// Base xAPI endpoint, e.g. `https://lrs.example/xapi`.
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Value for `X-Experience-API-Version`.
    pub version: String,
    http: reqwest::Client,
}

impl LrsClient {
    pub fn new<S: Into<String>>(endpoint: S, username: S, password: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            version: XAPI_VERSION.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    fn statements_url(&self) -> String {
        format!("{}/statements", self.endpoint.trim_end_matches('/'))
    }

    async fn check(res: reqwest::Response) -> Result<String, LrsError> {
        let status = res.status();
        let body = res.text().await.map_err(|e| LrsError::Http(e.to_string()))?;
        if !status.is_success() {
            error!("Record store returned HTTP {}: {}", status, body);
            return Err(LrsError::Store {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl RecordStore for LrsClient {
    async fn save_statement(&self, statement: &Statement) -> Result<String, LrsError> {
        let res = self
            .http
            .post(self.statements_url())
            .basic_auth(&self.username, Some(&self.password))
            .header(VERSION_HEADER, &self.version)
            .json(statement)
            .send()
            .await
            .map_err(|e| {
                error!("Record store write failed: {}", e);
                LrsError::Http(e.to_string())
            })?;
        let body = Self::check(res).await?;

        // The store answers with the list of stored ids.
        let id = serde_json::from_str::<Vec<String>>(&body)
            .ok()
            .and_then(|ids| ids.into_iter().next())
            .or_else(|| statement.id.map(|id| id.to_string()))
            .unwrap_or_default();
        info!("Statement stored with id {}", id);
        Ok(id)
    }

    async fn query_statements(&self, query: &StatementQuery) -> Result<Vec<Statement>, LrsError> {
        debug!("Querying record store: {:?}", query);
        let res = self
            .http
            .get(self.statements_url())
            .basic_auth(&self.username, Some(&self.password))
            .header(VERSION_HEADER, &self.version)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                error!("Record store query failed: {}", e);
                LrsError::Http(e.to_string())
            })?;
        let body = Self::check(res).await?;
        let page: StatementPage =
            serde_json::from_str(&body).map_err(|e| LrsError::Decode(e.to_string()))?;
        debug!("Record store returned {} statement(s)", page.statements.len());
        Ok(page.statements)
    }
}
