use std::time::Instant;

use async_trait::async_trait;
use log::info;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use lanechart_core::package::Package;

use crate::config::LucidConfig;
use crate::error::UpstreamError;
use crate::pipeline::DiagramHost;

const API_VERSION: &str = "1";
const IMPORT_FILE_NAME: &str = "chart.lucid";
const IMPORT_CONTENT_TYPE: &str = "x-application/vnd.lucid.standardImport";
const PRODUCT: &str = "lucidchart";

/// Links to a document created on the diagram host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedChart {
    pub edit_url: String,
    pub view_url: String,
}

pub struct LucidClient {
    http: reqwest::Client,
    config: LucidConfig,
}

impl LucidClient {
    pub fn new(http: reqwest::Client, config: LucidConfig) -> Self {
        Self { http, config }
    }

    fn documents_url(&self) -> String {
        format!("{}/documents", self.config.base_url.trim_end_matches('/'))
    }

    fn form(&self, package: &Package) -> Result<Form, UpstreamError> {
        let file = Part::bytes(package.bytes.clone())
            .file_name(IMPORT_FILE_NAME)
            .mime_str(IMPORT_CONTENT_TYPE)?;
        Ok(Form::new()
            .part("file", file)
            .text("title", self.config.document_title.clone())
            .text("product", PRODUCT))
    }
}

#[async_trait]
impl DiagramHost for LucidClient {
    async fn submit(&self, package: &Package) -> Result<HostedChart, UpstreamError> {
        let started = Instant::now();
        let response = self
            .http
            .post(self.documents_url())
            .bearer_auth(&self.config.api_key)
            .header("Lucid-Api-Version", API_VERSION)
            .header("Lucid-User", &self.config.user)
            .multipart(self.form(package)?)
            .send()
            .await?;

        let body = UpstreamError::check(response).await?.text().await?;
        let chart = parse_created(&body)?;
        info!(
            edit_url = chart.edit_url.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64;
            "chart submitted to host"
        );
        Ok(chart)
    }
}

fn parse_created(body: &str) -> Result<HostedChart, UpstreamError> {
    serde_json::from_str(body)
        .map_err(|e| UpstreamError::Response(format!("document creation response: {e}")))
}
