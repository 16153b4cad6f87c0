use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat completion endpoint and credentials.
    pub model: ModelConfig,
    /// SQLite store for saved analyses.
    pub database: DatabaseConfig,
    /// Tracing subscriber settings.
    pub logging: LoggingConfig,
    /// Per-attempt timeout and retry policy.
    pub request: RequestConfig,
    /// Stage deadlines and generation settings.
    pub stages: StageConfig,
    /// Monitoring plan heuristics.
    pub plan: PlanPolicyConfig,
}

/// LLM endpoint configuration
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Missing credentials are not fatal: calls fail fast and fallbacks run.
    pub api_key: Option<String>,
    /// Endpoint root, without a trailing `/chat/completions`.
    pub base_url: String,
    /// Model name, or the deployment name on Azure.
    pub model: String,
    /// Wire dialect used to build the request URL and auth header.
    pub provider: ModelProvider,
    /// `api-version` query parameter, Azure only.
    pub api_version: String,
}

/// Wire dialect of the chat completion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    /// `{base}/chat/completions` with a bearer token.
    OpenAi,
    /// `{base}/openai/deployments/{model}/chat/completions` with an `api-key` header.
    Azure,
}

impl FromStr for ModelProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" => Ok(ModelProvider::OpenAi),
            "azure" | "azure_openai" => Ok(ModelProvider::Azure),
            _ => Err(format!("Unknown model provider: {}", s)),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite file, created along with its parent directory if missing.
    pub path: PathBuf,
    /// Pool size.
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Human-readable or JSON lines.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Bound on every single network attempt.
    pub timeout_ms: u64,
    /// Extra attempts after the first one, transient failures only.
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `retry_delay_ms * 2^(n-1)`.
    pub retry_delay_ms: u64,
}

/// Per-stage wall-clock budgets and generation settings
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Deadline for the core claim stage, retries included.
    pub core_claim_timeout_ms: u64,
    /// Deadline for the signals stage.
    pub signals_timeout_ms: u64,
    /// Deadline for the monitoring plan stage.
    pub monitoring_timeout_ms: u64,
    /// Completion token cap for the core claim stage.
    pub core_claim_max_tokens: u32,
    /// Completion token cap for the signals stage.
    pub signals_max_tokens: u32,
    /// Completion token cap for the monitoring plan stage.
    pub monitoring_max_tokens: u32,
    /// Sampling temperature shared by all stages.
    pub temperature: f32,
}

impl StageConfig {
    /// Sum of all stage budgets, the upper bound on one pipeline run.
    pub fn total_budget(&self) -> Duration {
        Duration::from_millis(
            self.core_claim_timeout_ms + self.signals_timeout_ms + self.monitoring_timeout_ms,
        )
    }
}

/// Fixed heuristics used when deriving a monitoring plan.
///
/// These are placeholders rather than domain-calibrated values and are kept
/// configurable for that reason.
#[derive(Debug, Clone)]
pub struct PlanPolicyConfig {
    /// `failure_threshold = success_threshold * failure_ratio`.
    pub failure_ratio: f64,
    /// Alert rules for the first N signals get `high` severity.
    pub high_severity_count: usize,
    /// How many priority signals the classifier flags.
    pub priority_signal_limit: usize,
    /// Upper bound on core-claim validators.
    pub max_validators: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let model = ModelConfig {
            api_key: env::var("MODEL_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: env::var("MODEL_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("MODEL_NAME").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            provider: match env::var("MODEL_PROVIDER") {
                Ok(p) => p
                    .parse()
                    .map_err(|message| AppError::Config { message })?,
                Err(_) => ModelProvider::OpenAi,
            },
            api_version: env::var("MODEL_API_VERSION")
                .unwrap_or_else(|_| "2024-12-01-preview".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/analyses.db".to_string()),
            ),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_env("REQUEST_TIMEOUT_MS", 30000),
            max_retries: parse_env("MAX_RETRIES", 3),
            retry_delay_ms: parse_env("RETRY_DELAY_MS", 1000),
        };
        if request.timeout_ms == 0 {
            return Err(AppError::Config {
                message: "REQUEST_TIMEOUT_MS must be greater than zero".to_string(),
            });
        }

        let defaults = StageConfig::default();
        let stages = StageConfig {
            core_claim_timeout_ms: parse_env(
                "STAGE_CORE_CLAIM_TIMEOUT_MS",
                defaults.core_claim_timeout_ms,
            ),
            signals_timeout_ms: parse_env("STAGE_SIGNALS_TIMEOUT_MS", defaults.signals_timeout_ms),
            monitoring_timeout_ms: parse_env(
                "STAGE_MONITORING_TIMEOUT_MS",
                defaults.monitoring_timeout_ms,
            ),
            temperature: parse_env("STAGE_TEMPERATURE", defaults.temperature),
            ..defaults
        };

        for (name, value) in [
            ("STAGE_CORE_CLAIM_TIMEOUT_MS", stages.core_claim_timeout_ms),
            ("STAGE_SIGNALS_TIMEOUT_MS", stages.signals_timeout_ms),
            ("STAGE_MONITORING_TIMEOUT_MS", stages.monitoring_timeout_ms),
        ] {
            if value == 0 {
                return Err(AppError::Config {
                    message: format!("{} must be greater than zero", name),
                });
            }
        }

        let plan_defaults = PlanPolicyConfig::default();
        let plan = PlanPolicyConfig {
            failure_ratio: parse_env("PLAN_FAILURE_RATIO", plan_defaults.failure_ratio),
            high_severity_count: parse_env(
                "PLAN_HIGH_SEVERITY_COUNT",
                plan_defaults.high_severity_count,
            ),
            priority_signal_limit: parse_env(
                "PLAN_PRIORITY_SIGNAL_LIMIT",
                plan_defaults.priority_signal_limit,
            ),
            ..plan_defaults
        };
        if !plan.failure_ratio.is_finite() || !(0.0..=1.0).contains(&plan.failure_ratio) {
            return Err(AppError::Config {
                message: format!(
                    "PLAN_FAILURE_RATIO must be between 0 and 1, got {}",
                    plan.failure_ratio
                ),
            });
        }

        Ok(Config {
            model,
            database,
            logging,
            request,
            stages,
            plan,
        })
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            core_claim_timeout_ms: 90000,
            signals_timeout_ms: 60000,
            monitoring_timeout_ms: 60000,
            core_claim_max_tokens: 2500,
            signals_max_tokens: 2000,
            monitoring_max_tokens: 2500,
            temperature: 0.3,
        }
    }
}

impl Default for PlanPolicyConfig {
    fn default() -> Self {
        Self {
            failure_ratio: 0.5,
            high_severity_count: 2,
            priority_signal_limit: 10,
            max_validators: 3,
        }
    }
}
