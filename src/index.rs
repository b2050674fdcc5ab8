use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::domain::UnifiedRecord;
use crate::error::GideError;

pub const DEFAULT_INDEX_URL: &str = "http://localhost:9200";
pub const DEFAULT_INDEX_NAME: &str = "gide-datasets";

const BULK_CHUNK: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub indexed: usize,
    pub errors: usize,
}

impl BulkSummary {
    fn absorb(&mut self, other: BulkSummary) {
        self.indexed += other.indexed;
        self.errors += other.errors;
    }
}

pub trait SearchIndex: Send + Sync {
    fn health(&self) -> Result<(), GideError>;
    fn bulk_upsert(&self, records: &[UnifiedRecord]) -> Result<BulkSummary, GideError>;
    fn count(&self) -> Result<u64, GideError>;
}

#[derive(Clone)]
pub struct ElasticHttpClient {
    client: Client,
    base_url: String,
    index: String,
}

impl ElasticHttpClient {
    pub fn new(base_url: &str, index: &str, api_key: Option<&str>) -> Result<Self, GideError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("gide-search/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GideError::IndexHttp(err.to_string()))?,
        );
        if let Some(key) = api_key.filter(|key| !key.trim().is_empty()) {
            let mut value = HeaderValue::from_str(&format!("ApiKey {}", key.trim()))
                .map_err(|err| GideError::IndexHttp(err.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| GideError::IndexHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, GideError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "search index request failed".to_string());
        Err(GideError::IndexStatus { status, message })
    }

    fn send_bulk(&self, records: &[UnifiedRecord]) -> Result<BulkSummary, GideError> {
        let body = bulk_body(&self.index, records)?;
        let response = self
            .client
            .post(format!("{}/_bulk", self.base_url))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .map_err(|err| GideError::IndexHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let result: Value = response
            .json()
            .map_err(|err| GideError::IndexHttp(err.to_string()))?;
        Ok(bulk_summary(&result))
    }
}

impl SearchIndex for ElasticHttpClient {
    fn health(&self) -> Result<(), GideError> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .send()
            .map_err(|err| {
                debug!(error = %err, "search index probe failed");
                GideError::IndexUnavailable(self.base_url.clone())
            })?;
        if !response.status().is_success() {
            return Err(GideError::IndexUnavailable(self.base_url.clone()));
        }
        Ok(())
    }

    fn bulk_upsert(&self, records: &[UnifiedRecord]) -> Result<BulkSummary, GideError> {
        let mut summary = BulkSummary::default();
        for chunk in records.chunks(BULK_CHUNK) {
            summary.absorb(self.send_bulk(chunk)?);
        }
        if summary.errors > 0 {
            warn!(errors = summary.errors, index = %self.index, "bulk upsert had item errors");
        }
        Ok(summary)
    }

    fn count(&self) -> Result<u64, GideError> {
        let response = self
            .client
            .post(format!("{}/{}/_refresh", self.base_url, self.index))
            .send()
            .map_err(|err| GideError::IndexHttp(err.to_string()))?;
        Self::handle_status(response)?;

        let response = self
            .client
            .get(format!("{}/{}/_count", self.base_url, self.index))
            .send()
            .map_err(|err| GideError::IndexHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| GideError::IndexHttp(err.to_string()))?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| GideError::IndexHttp("count response without count".to_string()))
    }
}

pub fn bulk_body(index: &str, records: &[UnifiedRecord]) -> Result<String, GideError> {
    let mut body = String::new();
    for record in records {
        let action = json!({"index": {"_index": index, "_id": record.id.as_str()}});
        body.push_str(&action.to_string());
        body.push('\n');
        let document =
            serde_json::to_string(record).map_err(|err| GideError::IndexHttp(err.to_string()))?;
        body.push_str(&document);
        body.push('\n');
    }
    Ok(body)
}

pub fn bulk_summary(response: &Value) -> BulkSummary {
    let items = response
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let errors = items
        .iter()
        .filter(|item| {
            item.as_object()
                .and_then(|actions| actions.values().next())
                .is_some_and(|result| result.get("error").is_some())
        })
        .count();
    BulkSummary {
        indexed: items.len() - errors,
        errors,
    }
}
