mod compiler;
mod config;

pub use compiler::{CompiledPrompt, PolicyCompiler};
pub use config::{
    ApiConfiguration, ConfigError, EvidencePolicy, PolicyConfig, ProfileSpec,
    RecommendationPolicy, StrategicMetrics, EXAMPLE_CONFIG,
};
