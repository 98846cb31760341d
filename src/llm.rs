use anyhow::anyhow;
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, request::ChatMessageRequest},
    models::ModelOptions,
};

/// Common interface for the completion service: one prompt in, one block of
/// generated text out.
///
/// # Examples
/// ```
/// use async_trait::async_trait;
/// use reflectd::CompletionClient;
/// struct Echo;
/// #[async_trait]
/// impl CompletionClient for Echo {
///     async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
///         Ok(prompt.to_string())
///     }
/// }
/// # tokio_test::block_on(async {
/// assert_eq!(Echo.complete("hi").await.unwrap(), "hi");
/// # });
/// ```
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// [`CompletionClient`] backed by [`Ollama`].
///
/// Unlike an interactive agent, the pipeline wants reproducible output for
/// identical prompts, so the temperature is fixed and low rather than
/// sampled per request.
#[derive(Clone)]
pub struct OllamaClient {
    client: Ollama,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(client: Ollama, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let req = ChatMessageRequest::new(
            self.model.clone(),
            vec![ChatMessage::user(prompt.to_string())],
        )
        .options(ModelOptions::default().temperature(self.temperature));
        let resp = self
            .client
            .send_chat_messages(req)
            .await
            .map_err(|e| anyhow!("completion request failed: {e}"))?;
        tracing::debug!(len = resp.message.content.len(), "completion received");
        Ok(resp.message.content)
    }
}
