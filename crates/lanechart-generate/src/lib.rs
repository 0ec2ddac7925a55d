pub mod engine;
pub mod parse;
mod prompt;

use llm::chat::{ChatMessage, StructuredOutputFormat};
use log::{debug, info};

use lanechart_core::Document;

pub use engine::{AzureSettings, Engine};

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("failed to build model client: {0}")]
    Build(String),
    #[error("chat request failed: {0}")]
    Chat(String),
    #[error("embedding request failed: {0}")]
    Embed(String),
    #[error("model returned an empty response")]
    Empty,
    #[error("model returned malformed output: {0}")]
    Malformed(String),
}

impl GenerateError {
    /// True when the model answered but its answer could not be used.
    pub fn is_malformed(&self) -> bool {
        matches!(self, GenerateError::Empty | GenerateError::Malformed(_))
    }
}

fn document_format() -> StructuredOutputFormat {
    StructuredOutputFormat {
        name: "swimlane_document".to_string(),
        description: Some("A swimlane process chart in diagram-host import format".to_string()),
        schema: Some(lanechart_core::document_schema()),
        strict: None,
    }
}

/// Process description and chart generation on top of an [`Engine`].
pub struct Generator {
    engine: Engine,
}

impl Generator {
    pub fn new(settings: &AzureSettings) -> Result<Self, GenerateError> {
        let engine = Engine::new(settings, prompt::system_prompt(), document_format())?;
        Ok(Self { engine })
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, GenerateError> {
        self.engine.embed(text).await
    }

    /// Free-text list of lanes, steps and connectors for the request.
    pub async fn describe_process(
        &self,
        user_prompt: &str,
        context: &str,
    ) -> Result<String, GenerateError> {
        let messages = vec![
            ChatMessage::assistant()
                .content(prompt::context_message(context))
                .build(),
            ChatMessage::user()
                .content(prompt::structure_request(user_prompt))
                .build(),
        ];

        let raw = self.engine.complete(&messages).await?;
        let description = parse::description(parse::translate(raw)?)?;
        debug!(chars = description.len(); "process description generated");
        Ok(description)
    }

    /// Chart document built from a process description. The document is
    /// returned as the model produced it; repair happens downstream.
    pub async fn generate_diagram(
        &self,
        user_prompt: &str,
        description: &str,
        context: &str,
    ) -> Result<Document, GenerateError> {
        let messages = vec![
            ChatMessage::user().content(user_prompt).build(),
            ChatMessage::assistant()
                .content(prompt::context_message(context))
                .build(),
            ChatMessage::user()
                .content(prompt::diagram_request(description))
                .build(),
        ];

        let raw = self.engine.complete_structured(&messages).await?;
        let document = parse::document(parse::translate(raw)?)?;
        info!(
            pages = document.pages.len(),
            shapes = document.pages.iter().map(|p| p.shapes.len()).sum::<usize>();
            "chart document generated"
        );
        Ok(document)
    }
}
