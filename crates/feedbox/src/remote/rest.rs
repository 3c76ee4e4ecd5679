//! PostgREST-style HTTP client for the remote store.
//!
//! Speaks the query dialect used by hosted Postgres services: rows live at
//! `{base}/rest/v1/{table}`, filters are query parameters (`id=eq.42`) and
//! `Prefer: return=representation` asks inserts to echo the stored row.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

use super::{RemoteError, RemoteStore, Result};
use crate::feedback::{rfc3339, FeedbackRecord, FeedbackValues};

/// Connection settings for [`RestRemoteStore`].
#[derive(Debug, Clone)]
pub struct RestSettings {
    /// Base URL of the service, e.g. `https://project.supabase.co`.
    pub base_url: Url,
    /// API key sent as `apikey` and as a bearer token.
    pub api_key: Option<String>,
    /// Table holding feedback rows.
    pub table: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Remote store backed by a PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct RestRemoteStore {
    http: Client,
    endpoint: Url,
    api_key: Option<String>,
}

/// Row shape on the wire.
#[derive(Debug, Deserialize)]
struct FeedbackRow {
    id: RowId,
    name: String,
    email: String,
    message: String,
    created_at: String,
}

/// Ids may be serial integers or UUIDs depending on the table definition.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RowId {
    Text(String),
    Number(i64),
}

#[derive(Debug, Serialize)]
struct NewRow<'a> {
    name: &'a str,
    email: &'a str,
    message: &'a str,
}

impl FeedbackRow {
    fn into_record(self) -> Result<FeedbackRecord> {
        let created_at = rfc3339::parse(&self.created_at).map_err(|e| {
            RemoteError::Decode(format!("bad created_at '{}': {e}", self.created_at))
        })?;
        let id = match self.id {
            RowId::Text(id) => id,
            RowId::Number(id) => id.to_string(),
        };
        Ok(FeedbackRecord {
            id,
            name: self.name,
            email: self.email,
            message: self.message,
            created_at,
        })
    }
}

impl RestRemoteStore {
    /// Build a client for the given settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed or the
    /// table name does not form a valid URL path.
    pub fn new(settings: RestSettings) -> Result<Self> {
        let http = Client::builder().timeout(settings.timeout).build()?;
        let endpoint = endpoint_url(&settings.base_url, &settings.table)?;
        Ok(Self {
            http,
            endpoint,
            api_key: settings.api_key,
        })
    }

    /// The table endpoint requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    fn list_request(&self) -> RequestBuilder {
        self.authorize(
            self.http
                .get(self.endpoint.clone())
                .query(&[("select", "*"), ("order", "created_at.desc")]),
        )
    }

    fn create_request(&self, values: &FeedbackValues) -> RequestBuilder {
        let body = [NewRow {
            name: &values.name,
            email: &values.email,
            message: &values.message,
        }];
        self.authorize(
            self.http
                .post(self.endpoint.clone())
                .query(&[("select", "*")])
                .header("Prefer", "return=representation")
                .json(&body),
        )
    }

    fn delete_request(&self, id: &str) -> RequestBuilder {
        self.authorize(
            self.http
                .delete(self.endpoint.clone())
                .query(&[("id", format!("eq.{id}"))]),
        )
    }
}

fn endpoint_url(base: &Url, table: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("rest/v1/{table}"))
        .map_err(|e| RemoteError::Decode(format!("invalid endpoint for table '{table}': {e}")))
}

/// Turn a non-success status into [`RemoteError::Status`].
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode_rows(response: Response) -> Result<Vec<FeedbackRecord>> {
    let bytes = response.bytes().await?;
    trace!(len = bytes.len(), "Decoding feedback rows");
    let rows: Vec<FeedbackRow> =
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))?;
    rows.into_iter().map(FeedbackRow::into_record).collect()
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>> {
        let response = check_status(self.list_request().send().await?).await?;
        let records = decode_rows(response).await?;
        debug!(count = records.len(), "Fetched feedback from remote store");
        Ok(records)
    }

    async fn create_feedback(&self, values: &FeedbackValues) -> Result<FeedbackRecord> {
        let response = check_status(self.create_request(values).send().await?).await?;
        let record = decode_rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or(RemoteError::EmptyResponse)?;
        debug!(id = %record.id, "Created feedback in remote store");
        Ok(record)
    }

    async fn delete_feedback(&self, id: &str) -> Result<()> {
        check_status(self.delete_request(id).send().await?).await?;
        debug!(id, "Deleted feedback from remote store");
        Ok(())
    }
}
