use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::provider::{
    GenerationError, GenerationProvider, GenerationRequest, GenerationResponse,
};

/// Scripted generation backend for tests. Outcomes are consumed in
/// order; once the script is exhausted the fallback reply is returned.
pub struct MockGenerationProvider {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    fallback: String,
    requests: Mutex<Vec<GenerationRequest>>,
    call_count: AtomicUsize,
}

impl MockGenerationProvider {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: text.into(),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_script(outcomes: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            fallback: "scripted reply".to_string(),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request the pipeline sent, in order. Lets tests assert on
    /// what actually crossed the boundary.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(Ok(content)) => Ok(GenerationResponse {
                content,
                model: "mock-model".to_string(),
            }),
            Some(Err(error)) => Err(error),
            None => Ok(GenerationResponse {
                content: self.fallback.clone(),
                model: "mock-model".to_string(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            system_instruction: "instructions".to_string(),
            payload: "payload".to_string(),
            temperature: 0.2,
            top_p: 0.95,
        }
    }

    #[tokio::test]
    async fn fallback_reply_and_call_counting() {
        let provider = MockGenerationProvider::replying("posture report");
        assert_eq!(provider.call_count(), 0);

        let response = provider.generate(request()).await.unwrap();
        assert_eq!(response.content, "posture report");
        assert_eq!(provider.call_count(), 1);

        provider.generate(request()).await.unwrap();
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn script_is_consumed_in_order() {
        let provider = MockGenerationProvider::with_script(vec![
            Err(GenerationError::RateLimited),
            Ok("second try".to_string()),
        ]);

        assert!(provider.generate(request()).await.is_err());
        let response = provider.generate(request()).await.unwrap();
        assert_eq!(response.content, "second try");
        // Script exhausted; fallback takes over.
        let response = provider.generate(request()).await.unwrap();
        assert_eq!(response.content, "scripted reply");
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let provider = MockGenerationProvider::replying("ok");
        provider.generate(request()).await.unwrap();
        let seen = provider.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].payload, "payload");
    }
}
