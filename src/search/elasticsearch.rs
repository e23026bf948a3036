//! Elasticsearch index over HTTP
//!
//! One Elasticsearch index per entity type, named `{prefix}{entity_type}`.
//! Document ids are the record ids.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};

use super::{check_page, page_offset, SearchFields, SearchIndex, SearchPage};
use crate::error::SearchError;

/// Longest error body kept in a `Rejected` message
const MAX_ERROR_BODY: usize = 512;

pub struct ElasticsearchIndex {
    client: Client,
    base_url: String,
    prefix: String,
}

impl ElasticsearchIndex {
    pub fn new(base_url: &str, prefix: &str, timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Unreachable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            prefix: prefix.to_string(),
        })
    }

    fn index_url(&self, entity_type: &str) -> String {
        format!("{}/{}{}", self.base_url, self.prefix, entity_type)
    }

    fn doc_url(&self, entity_type: &str, id: i64) -> String {
        format!("{}/_doc/{}", self.index_url(entity_type), id)
    }
}

fn transport_error(e: reqwest::Error) -> SearchError {
    SearchError::Unreachable(e.to_string())
}

/// Turn a non-success response into `Rejected`
async fn rejected(response: Response) -> SearchError {
    let status = response.status().as_u16();
    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    SearchError::Rejected { status, message }
}

/// Request body for a phrase query across every indexed field
pub fn build_query_body(phrase: &str, page: u32, per_page: u32) -> Value {
    json!({
        "query": {
            "multi_match": {
                "query": phrase,
                "fields": ["*"],
                "fuzziness": "AUTO"
            }
        },
        "from": page_offset(page, per_page),
        "size": per_page
    })
}

/// Extract ranked ids and total from a `_search` response.
///
/// `hits.total` is an object (`{"value": n}`) on 7.x and later and a bare
/// number on 6.x; both are accepted.
pub fn parse_search_response(body: &Value) -> Result<SearchPage, SearchError> {
    let hits = body
        .get("hits")
        .ok_or_else(|| SearchError::MalformedResponse("missing hits".to_string()))?;

    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::Object(obj)) => obj.get("value").and_then(Value::as_u64),
        _ => None,
    }
    .ok_or_else(|| SearchError::MalformedResponse("missing hits.total".to_string()))?;

    let ids = hits
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::MalformedResponse("missing hits.hits".to_string()))?
        .iter()
        .map(|hit| {
            let raw = hit.get("_id").and_then(Value::as_str).unwrap_or_default();
            raw.parse::<i64>()
                .map_err(|_| SearchError::MalformedResponse(format!("non-numeric document id '{}'", raw)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SearchPage { ids, total })
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn upsert(&self, entity_type: &str, id: i64, fields: &SearchFields) -> Result<(), SearchError> {
        let response = self
            .client
            .put(self.doc_url(entity_type, id))
            .json(fields)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        tracing::debug!("Indexed {} {} in elasticsearch", entity_type, id);
        Ok(())
    }

    async fn delete(&self, entity_type: &str, id: i64) -> Result<(), SearchError> {
        let response = self
            .client
            .delete(self.doc_url(entity_type, id))
            .send()
            .await
            .map_err(transport_error)?;

        // Missing document or missing index: already gone
        if response.status() == StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }

        Err(rejected(response).await)
    }

    async fn query(
        &self,
        entity_type: &str,
        phrase: &str,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, SearchError> {
        check_page(page, per_page)?;

        if phrase.trim().is_empty() {
            return Ok(SearchPage::empty());
        }

        let response = self
            .client
            .post(format!("{}/_search", self.index_url(entity_type)))
            .json(&build_query_body(phrase, page, per_page))
            .send()
            .await
            .map_err(transport_error)?;

        // Nothing indexed yet for this type
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(SearchPage::empty());
        }

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::MalformedResponse(e.to_string()))?;

        parse_search_response(&body)
    }
}
