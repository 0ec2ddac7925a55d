//! Prompt-to-chart orchestration.
//!
//! Each step depends on the previous one, so the collaborators are called
//! strictly in sequence and the first failure ends the request.

use async_trait::async_trait;
use log::info;

use lanechart_core::package::{self, Package};
use lanechart_core::{Document, LayoutPolicy};
use lanechart_generate::{GenerateError, Generator};

use crate::error::{PipelineError, UpstreamError};
use crate::hosting::HostedChart;
use crate::search::SearchHits;

// --- Collaborators ---

#[async_trait]
pub trait Completer: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, GenerateError>;

    async fn describe_process(&self, prompt: &str, context: &str) -> Result<String, GenerateError>;

    async fn generate_diagram(
        &self,
        prompt: &str,
        description: &str,
        context: &str,
    ) -> Result<Document, GenerateError>;
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, vector: &[f32]) -> Result<SearchHits, UpstreamError>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store the package and return where it was stored.
    async fn upload(&self, package: &Package) -> Result<String, UpstreamError>;
}

#[async_trait]
pub trait DiagramHost: Send + Sync {
    async fn submit(&self, package: &Package) -> Result<HostedChart, UpstreamError>;
}

#[async_trait]
impl Completer for Generator {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, GenerateError> {
        Generator::embed(self, text).await
    }

    async fn describe_process(&self, prompt: &str, context: &str) -> Result<String, GenerateError> {
        Generator::describe_process(self, prompt, context).await
    }

    async fn generate_diagram(
        &self,
        prompt: &str,
        description: &str,
        context: &str,
    ) -> Result<Document, GenerateError> {
        Generator::generate_diagram(self, prompt, description, context).await
    }
}

// --- Pipeline ---

#[derive(Debug, Clone, PartialEq)]
pub struct ChartOutcome {
    pub edit_url: String,
    pub view_url: String,
    pub source_document: Option<String>,
    pub source_url: Option<String>,
}

pub struct Pipeline {
    completer: Box<dyn Completer>,
    retriever: Box<dyn Retriever>,
    store: Box<dyn FileStore>,
    host: Box<dyn DiagramHost>,
    policy: LayoutPolicy,
}

impl Pipeline {
    pub fn new(
        completer: Box<dyn Completer>,
        retriever: Box<dyn Retriever>,
        store: Box<dyn FileStore>,
        host: Box<dyn DiagramHost>,
    ) -> Self {
        Self {
            completer,
            retriever,
            store,
            host,
            policy: LayoutPolicy::default(),
        }
    }

    pub async fn run(&self, prompt: &str) -> Result<ChartOutcome, PipelineError> {
        let vector = self
            .completer
            .embed(prompt)
            .await
            .map_err(PipelineError::Embedding)?;

        let hits = self
            .retriever
            .retrieve(prompt, &vector)
            .await
            .map_err(PipelineError::Retrieval)?;
        info!(
            source = hits.filename.as_deref().unwrap_or("none"),
            context_chars = hits.content.len();
            "retrieved context"
        );

        let description = self
            .completer
            .describe_process(prompt, &hits.content)
            .await
            .map_err(PipelineError::Description)?;

        let document = self
            .completer
            .generate_diagram(prompt, &description, &hits.content)
            .await
            .map_err(PipelineError::Generation)?;

        let document = lanechart_core::repair(document, &self.policy);
        let package = package::package(&document)?;

        let stored_at = self
            .store
            .upload(&package)
            .await
            .map_err(PipelineError::Upload)?;
        info!(url = stored_at.as_str(); "chart package stored");

        let chart = self
            .host
            .submit(&package)
            .await
            .map_err(PipelineError::Hosting)?;

        Ok(ChartOutcome {
            edit_url: chart.edit_url,
            view_url: chart.view_url,
            source_document: hits.filename,
            source_url: hits.file_url,
        })
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::io::{Cursor, Read};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Ordered record of collaborator calls, shared by all fakes of one test.
    pub type Calls = Arc<Mutex<Vec<String>>>;

    pub const RAW_DOCUMENT: &str = r#"{
        "version": 1,
        "pages": [{
            "id": "mainPage",
            "title": "Go-live",
            "shapes": [
                {"id": "lanes", "type": "swimlane", "boundingBox": {"x": 0, "y": 0, "w": 900, "h": 200},
                 "titleBar": {"height": 40, "verticalText": true},
                 "lanes": [{"id": "pm", "title": "PM", "width": 150}, {"id": "basis", "title": "Basis", "width": 150}]},
                {"id": "plan", "type": "Rect", "boundingBox": {"x": 0, "y": 0, "w": 120, "h": 60}, "laneId": "pm", "text": "[1] Plan cutover"},
                {"id": "run", "type": "rectangle", "boundingBox": {"x": 0, "y": 0, "w": 120, "h": 60}, "laneId": "basis", "text": "[2] Run cutover"}
            ],
            "lines": [
                {"id": "l1", "endpoint1": {"shapeId": "plan"}, "endpoint2": {"shapeId": "run"}},
                {"id": "l2", "endpoint1": {"shapeId": "plan"}, "endpoint2": {"shapeId": "missing"}}
            ]
        }]
    }"#;

    pub struct FakeCompleter {
        pub calls: Calls,
        pub fail_generation: Option<fn() -> GenerateError>,
    }

    #[async_trait]
    impl Completer for FakeCompleter {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, GenerateError> {
            self.calls.lock().unwrap().push(format!("embed:{text}"));
            Ok(vec![0.1, 0.2, 0.3])
        }

        async fn describe_process(&self, prompt: &str, context: &str) -> Result<String, GenerateError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("describe:{prompt}|{context}"));
            Ok("Lanes: PM, Basis".to_string())
        }

        async fn generate_diagram(
            &self,
            _prompt: &str,
            description: &str,
            _context: &str,
        ) -> Result<Document, GenerateError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("generate:{description}"));
            if let Some(fail) = self.fail_generation {
                return Err(fail());
            }
            Ok(serde_json::from_str(RAW_DOCUMENT).unwrap())
        }
    }

    pub struct FakeRetriever {
        pub calls: Calls,
    }

    #[async_trait]
    impl Retriever for FakeRetriever {
        async fn retrieve(&self, query: &str, vector: &[f32]) -> Result<SearchHits, UpstreamError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("retrieve:{query}:{}", vector.len()));
            Ok(SearchHits {
                content: "Cutover happens in the deploy phase.".to_string(),
                filename: Some("activate.pdf".to_string()),
                file_url: Some("https://docs.example.com/activate.pdf".to_string()),
            })
        }
    }

    pub struct FakeStore {
        pub calls: Calls,
        pub uploaded: Arc<Mutex<Option<Package>>>,
    }

    #[async_trait]
    impl FileStore for FakeStore {
        async fn upload(&self, package: &Package) -> Result<String, UpstreamError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("upload:{}", package.file_name));
            *self.uploaded.lock().unwrap() = Some(package.clone());
            Ok(format!("https://files.example.com/{}", package.file_name))
        }
    }

    pub struct FakeHost {
        pub calls: Calls,
        pub status: Option<u16>,
    }

    #[async_trait]
    impl DiagramHost for FakeHost {
        async fn submit(&self, package: &Package) -> Result<HostedChart, UpstreamError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("submit:{}", !package.bytes.is_empty()));
            if let Some(status) = self.status {
                return Err(UpstreamError::Status {
                    status,
                    body: "denied".to_string(),
                });
            }
            Ok(HostedChart {
                edit_url: "https://lucid.app/edit/1".to_string(),
                view_url: "https://lucid.app/view/1".to_string(),
            })
        }
    }

    pub struct Harness {
        pub calls: Calls,
        pub uploaded: Arc<Mutex<Option<Package>>>,
        pub pipeline: Pipeline,
    }

    pub fn harness(fail_generation: Option<fn() -> GenerateError>, host_status: Option<u16>) -> Harness {
        let calls = Calls::default();
        let uploaded = Arc::new(Mutex::new(None));
        let pipeline = Pipeline::new(
            Box::new(FakeCompleter {
                calls: calls.clone(),
                fail_generation,
            }),
            Box::new(FakeRetriever {
                calls: calls.clone(),
            }),
            Box::new(FakeStore {
                calls: calls.clone(),
                uploaded: uploaded.clone(),
            }),
            Box::new(FakeHost {
                calls: calls.clone(),
                status: host_status,
            }),
        );
        Harness {
            calls,
            uploaded,
            pipeline,
        }
    }

    /// The document inside an uploaded package.
    pub fn unpack(package: &Package) -> Document {
        let mut archive = zip::ZipArchive::new(Cursor::new(package.bytes.as_slice())).unwrap();
        let mut json = String::new();
        archive
            .by_name(package::DOCUMENT_ENTRY)
            .unwrap()
            .read_to_string(&mut json)
            .unwrap();
        serde_json::from_str(&json).unwrap()
    }
}
