//! PostgREST-style HTTP backend.
//!
//! Rows are addressed as `{base}/rest/v1/{table}?id=eq.{id}`. Every request
//! carries the project `apikey` header and, when configured, a bearer token.

use async_trait::async_trait;
use fabricsync_core::{record_from_value, Record, RecordId, TableName};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;

use super::{RemoteBackend, RemoteError};

/// HTTP client for a PostgREST-compatible backend.
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    token: Option<String>,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn table_url(&self, table: &TableName) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header("apikey", &self.api_key);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req.bearer_auth(&self.api_key),
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, RemoteError> {
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let message = resp.text().await.unwrap_or_default();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::Network(format!("{status}: {message}")));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound);
        }
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    /// PostgREST returns matched rows as an array; take the first.
    async fn first_row(resp: Response) -> Result<Option<Record>, RemoteError> {
        let rows: Vec<Value> = resp
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        match rows.into_iter().next() {
            Some(row) => record_from_value(row)
                .map(Some)
                .map_err(|e| RemoteError::Parse(e.to_string())),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RemoteBackend for RestBackend {
    async fn ping(&self) -> bool {
        let url = format!("{}/rest/v1/", self.base_url);
        match self.authorize(self.client.get(&url)).send().await {
            Ok(resp) => !resp.status().is_server_error(),
            Err(err) => {
                tracing::debug!("backend ping failed: {err}");
                false
            }
        }
    }

    async fn fetch(&self, table: &TableName, id: RecordId) -> Result<Option<Record>, RemoteError> {
        let req = self
            .client
            .get(self.table_url(table))
            .query(&[("id", format!("eq.{id}")), ("select", "*".to_string())]);
        let resp = self.send(req).await?;
        Self::first_row(resp).await
    }

    async fn insert(&self, table: &TableName, id: RecordId, data: &Record) -> Result<Record, RemoteError> {
        let mut row = data.clone();
        row.insert("id".into(), Value::String(id.to_string()));

        let req = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        let resp = self.send(req).await?;
        Self::first_row(resp)
            .await?
            .ok_or_else(|| RemoteError::Parse("insert returned no row".into()))
    }

    async fn update(&self, table: &TableName, id: RecordId, fields: &Record) -> Result<Record, RemoteError> {
        let req = self
            .client
            .patch(self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(fields);
        let resp = self.send(req).await?;
        Self::first_row(resp).await?.ok_or(RemoteError::NotFound)
    }

    async fn delete(&self, table: &TableName, id: RecordId) -> Result<(), RemoteError> {
        let req = self
            .client
            .delete(self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation");
        let resp = self.send(req).await?;
        match Self::first_row(resp).await? {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let backend = RestBackend::new("https://example.test/", "anon");
        let table = TableName::new("lots").unwrap();
        assert_eq!(backend.table_url(&table), "https://example.test/rest/v1/lots");
    }
}
