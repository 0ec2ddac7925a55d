//! Hybrid text + vector search against an Azure AI Search index.

use std::time::Instant;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::UpstreamError;
use crate::pipeline::Retriever;

const API_VERSION: &str = "2023-11-01";
const NEIGHBOURS: usize = 48;
const VECTOR_FIELD: &str = "descriptionVector";
const SELECT: &str = "description,chunkindex,filename,fileUrl";

/// Concatenated snippets of the top-ranked chunks and where they came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub content: String,
    pub filename: Option<String>,
    pub file_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    search: &'a str,
    select: &'static str,
    top: usize,
    vector_queries: [VectorQuery<'a>; 1],
}

#[derive(Serialize)]
struct VectorQuery<'a> {
    kind: &'static str,
    vector: &'a [f32],
    fields: &'static str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<Chunk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Chunk {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    file_url: Option<String>,
}

pub struct SearchClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl SearchClient {
    pub fn new(http: reqwest::Client, config: &SearchConfig) -> Self {
        let url = format!(
            "{}/indexes/{}/docs/search?api-version={API_VERSION}",
            config.endpoint.trim_end_matches('/'),
            config.index_name
        );
        Self {
            http,
            url,
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Retriever for SearchClient {
    async fn retrieve(&self, query: &str, vector: &[f32]) -> Result<SearchHits, UpstreamError> {
        let body = SearchRequest {
            search: query,
            select: SELECT,
            top: NEIGHBOURS,
            vector_queries: [VectorQuery {
                kind: "vector",
                vector,
                fields: VECTOR_FIELD,
                k: NEIGHBOURS,
            }],
        };

        let started = Instant::now();
        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response: SearchResponse = UpstreamError::check(response).await?.json().await?;
        let hits = collect_hits(response.value);
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            content_chars = hits.content.len();
            "hybrid search finished"
        );
        Ok(hits)
    }
}

fn collect_hits(chunks: Vec<Chunk>) -> SearchHits {
    let mut hits = SearchHits::default();
    let mut snippets = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if let Some(description) = chunk.description.filter(|d| !d.is_empty()) {
            snippets.push(description);
        }
        if hits.filename.is_none() {
            hits.filename = chunk.filename.filter(|f| !f.is_empty());
        }
        if hits.file_url.is_none() {
            hits.file_url = chunk.file_url.filter(|u| !u.is_empty());
        }
    }
    hits.content = snippets.join(" ");
    hits
}
