use std::time::Instant;

use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, StructuredOutputFormat};
use llm::LLMProvider;
use log::info;

use crate::parse::RawCompletion;
use crate::GenerateError;

/// Connection settings for an Azure OpenAI resource.
#[derive(Debug, Clone)]
pub struct AzureSettings {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub completions_deployment: String,
    pub embedding_deployment: String,
}

/// Model handles built once from settings and reused for every request.
pub struct Engine {
    chat: Box<dyn LLMProvider>,
    structured: Box<dyn LLMProvider>,
    embedding: Box<dyn LLMProvider>,
}

fn builder(settings: &AzureSettings, deployment: &str) -> LLMBuilder {
    LLMBuilder::new()
        .backend(LLMBackend::AzureOpenAI)
        .base_url(&settings.endpoint)
        .api_key(&settings.api_key)
        .api_version(&settings.api_version)
        .deployment_id(deployment)
        .model(deployment)
}

impl Engine {
    pub fn new(
        settings: &AzureSettings,
        system: &str,
        schema: StructuredOutputFormat,
    ) -> Result<Self, GenerateError> {
        let build = |b: LLMBuilder| b.build().map_err(|e| GenerateError::Build(e.to_string()));

        let chat = build(builder(settings, &settings.completions_deployment).system(system))?;
        let structured = build(
            builder(settings, &settings.completions_deployment)
                .system(system)
                .schema(schema),
        )?;
        let embedding = build(builder(settings, &settings.embedding_deployment))?;

        Ok(Self {
            chat,
            structured,
            embedding,
        })
    }

    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<RawCompletion, GenerateError> {
        send(self.chat.as_ref(), messages, "completion").await
    }

    /// Completion constrained to the schema the engine was built with.
    pub async fn complete_structured(
        &self,
        messages: &[ChatMessage],
    ) -> Result<RawCompletion, GenerateError> {
        send(self.structured.as_ref(), messages, "structured completion").await
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, GenerateError> {
        let started = Instant::now();
        let mut vectors = self
            .embedding
            .embed(vec![text.to_string()])
            .await
            .map_err(|e| GenerateError::Embed(e.to_string()))?;
        info!(elapsed_ms = started.elapsed().as_millis() as u64; "embedding generated");

        if vectors.is_empty() {
            return Err(GenerateError::Embed("no embedding returned".to_string()));
        }
        Ok(vectors.swap_remove(0))
    }
}

async fn send(
    provider: &dyn LLMProvider,
    messages: &[ChatMessage],
    call: &str,
) -> Result<RawCompletion, GenerateError> {
    let started = Instant::now();
    let response = provider
        .chat(messages)
        .await
        .map_err(|e| GenerateError::Chat(e.to_string()))?;
    info!(call, elapsed_ms = started.elapsed().as_millis() as u64; "model call finished");

    let function_arguments = response
        .tool_calls()
        .and_then(|calls| calls.into_iter().next())
        .map(|call| call.function.arguments);

    Ok(RawCompletion {
        text: response.text(),
        function_arguments,
    })
}
