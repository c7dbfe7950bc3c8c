mod mock_provider;
mod provider;
mod retry;

pub use mock_provider::MockGenerationProvider;
pub use provider::{
    GenerationError, GenerationProvider, GenerationRequest, GenerationResponse, OpenAIProvider,
};
pub use retry::{with_retries, RetryPolicy};
