use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

use crate::{CompletionRequest, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// Handle to a loaded model.  Inference itself happens behind this trait.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Framework the model was loaded through (`bedrock`, `ollama`, ...).
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return a streaming response.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;
}

/// Drain a response stream into its concatenated text.
///
/// `ResponseEvent::Error` aborts with that message; tool calls are ignored.
pub async fn collect_text(mut stream: ResponseStream) -> anyhow::Result<String> {
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            ResponseEvent::TextDelta(delta) => text.push_str(&delta),
            ResponseEvent::Error(msg) => anyhow::bail!("model error: {msg}"),
            ResponseEvent::Done => break,
            ResponseEvent::ToolCall { .. } | ResponseEvent::Usage { .. } => {}
        }
    }
    Ok(text)
}
