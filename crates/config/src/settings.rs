//! Application settings
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `KNOWLEDGE_AGENT_*` environment variables (double underscore as the
//! nesting separator, e.g. `KNOWLEDGE_AGENT_RETRIEVAL__FINAL_TOP_K=10`).

use serde::{Deserialize, Serialize};

use crate::constants::{agent, endpoints, fusion, timeouts};
use crate::ConfigError;

/// Root settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub retrieval: RetrievalSettings,

    #[serde(default)]
    pub router: RouterSettings,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub agent: AgentSettings,
}

/// Result fusion algorithm selection.
///
/// RRF is the default: raw scores from sparse and dense retrieval are not
/// on comparable scales, while ranks always are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    #[default]
    ReciprocalRank,
    WeightedSum,
}

/// One retrieval strategy as configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,

    /// Fusion weight for this strategy's ranked list
    #[serde(default = "default_weight")]
    pub weight: f32,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Candidate count requested from this strategy before fusion
    #[serde(default = "default_strategy_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyConfig>,

    #[serde(default)]
    pub fusion_mode: FusionMode,

    /// RRF smoothing constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Locator overlap fraction above which candidates are duplicates
    #[serde(default = "default_dedup_overlap")]
    pub dedup_overlap: f32,

    /// Final top-K after fusion
    #[serde(default = "default_final_top_k")]
    pub final_top_k: usize,

    /// Per-strategy timeout (ms)
    #[serde(default = "default_strategy_timeout_ms")]
    pub strategy_timeout_ms: u64,

    /// Maximum strategies in flight for one retrieval call
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_strategies: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            fusion_mode: FusionMode::default(),
            rrf_k: default_rrf_k(),
            dedup_overlap: default_dedup_overlap(),
            final_top_k: default_final_top_k(),
            strategy_timeout_ms: default_strategy_timeout_ms(),
            max_concurrent_strategies: default_max_concurrent(),
        }
    }
}

impl RetrievalSettings {
    /// Weight for a strategy by name; 1.0 when unconfigured.
    pub fn weight_of(&self, name: &str) -> f32 {
        self.strategies
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.weight)
            .unwrap_or(1.0)
    }

    pub fn enabled_strategies(&self) -> Vec<&StrategyConfig> {
        self.strategies.iter().filter(|s| s.enabled).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    /// When false every query takes the chunk/multi-strategy default
    #[serde(default = "default_true")]
    pub heuristics_enabled: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            heuristics_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Optional stages; disabling one means its process is never invoked
    #[serde(default = "default_true")]
    pub rerank_enabled: bool,

    #[serde(default = "default_true")]
    pub format_enabled: bool,

    #[serde(default = "default_true")]
    pub evaluate_enabled: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            rerank_enabled: true,
            format_enabled: true,
            evaluate_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_generation_timeout_ms")]
    pub timeout_ms: u64,

    /// Retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_generation_endpoint(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_ms: default_generation_timeout_ms(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// When false the engine goes straight to the pipeline (Level 1)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Hard wall-clock deadline for the agent worker (ms)
    #[serde(default = "default_agent_deadline_ms")]
    pub deadline_ms: u64,

    /// Reasoning iteration cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Soft cap on generation calls per query
    #[serde(default = "default_max_generation_calls")]
    pub max_generation_calls: usize,

    /// Per-tool execution timeout (ms)
    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            deadline_ms: default_agent_deadline_ms(),
            max_iterations: default_max_iterations(),
            max_generation_calls: default_max_generation_calls(),
            tool_timeout_ms: default_tool_timeout_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f32 {
    1.0
}

fn default_strategy_top_k() -> usize {
    fusion::STRATEGY_TOP_K
}

fn default_strategies() -> Vec<StrategyConfig> {
    ["vector", "keyword", "pattern"]
        .into_iter()
        .map(|name| StrategyConfig {
            name: name.to_string(),
            weight: default_weight(),
            enabled: true,
            top_k: default_strategy_top_k(),
        })
        .collect()
}

fn default_rrf_k() -> f32 {
    fusion::RRF_K
}

fn default_dedup_overlap() -> f32 {
    fusion::DEDUP_OVERLAP
}

fn default_final_top_k() -> usize {
    fusion::DEFAULT_TOP_K
}

fn default_strategy_timeout_ms() -> u64 {
    timeouts::STRATEGY_MS
}

fn default_max_concurrent() -> usize {
    timeouts::MAX_CONCURRENT_STRATEGIES
}

fn default_model() -> String {
    "qwen3:4b-instruct".to_string()
}

fn default_generation_endpoint() -> String {
    endpoints::OLLAMA_DEFAULT.to_string()
}

fn default_max_tokens() -> usize {
    1024
}

fn default_temperature() -> f32 {
    0.2
}

fn default_generation_timeout_ms() -> u64 {
    timeouts::GENERATION_MS
}

fn default_max_retries() -> u32 {
    3
}

fn default_agent_deadline_ms() -> u64 {
    timeouts::AGENT_DEADLINE_MS
}

fn default_max_iterations() -> usize {
    agent::MAX_ITERATIONS
}

fn default_max_generation_calls() -> usize {
    agent::MAX_GENERATION_CALLS
}

fn default_tool_timeout_ms() -> u64 {
    timeouts::TOOL_DEFAULT_MS
}

/// Load settings from an optional file plus environment overrides.
pub fn load_settings(path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if !std::path::Path::new(path).exists() {
            return Err(ConfigError::FileNotFound(path.to_string()));
        }
        builder = builder.add_source(config::File::with_name(path));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("KNOWLEDGE_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let settings: Settings = builder.build()?.try_deserialize()?;
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.retrieval.final_top_k == 0 {
        return Err(ConfigError::InvalidValue {
            field: "retrieval.final_top_k".into(),
            message: "must be at least 1".into(),
        });
    }
    if !(0.0..=1.0).contains(&settings.retrieval.dedup_overlap) {
        return Err(ConfigError::InvalidValue {
            field: "retrieval.dedup_overlap".into(),
            message: "must be within 0.0..=1.0".into(),
        });
    }
    if settings.agent.max_iterations == 0 {
        return Err(ConfigError::InvalidValue {
            field: "agent.max_iterations".into(),
            message: "must be at least 1".into(),
        });
    }
    for strategy in &settings.retrieval.strategies {
        if strategy.weight < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: format!("retrieval.strategies.{}.weight", strategy.name),
                message: "must be non-negative".into(),
            });
        }
    }
    Ok(())
}
