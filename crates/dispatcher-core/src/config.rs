//! Environment-derived runtime configuration.
//!
//! Every tunable here is read once from the process environment with a
//! sensible default, following the chained-fallback pattern of the original
//! agent's config layer: a feature-specific variable name is tried first,
//! then a more generic one, before falling back to a hardcoded default.

use std::env;
use std::time::Duration;

fn env_str(names: &[&str]) -> Option<String> {
    for name in names {
        if let Ok(v) = env::var(name) {
            if !v.is_empty() {
                return Some(v);
            }
        }
    }
    None
}

fn env_f64(names: &[&str], default: f64) -> f64 {
    env_str(names)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(names: &[&str], default: u64) -> u64 {
    env_str(names)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(names: &[&str], default: bool) -> bool {
    match env_str(names) {
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

fn env_list(names: &[&str], default: &[&str]) -> Vec<String> {
    match env_str(names) {
        Some(v) => v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Deterministic invocation profile for a single local-model call site.
///
/// Temperature 0, top_k 1 and a fixed seed keep the fast-check and
/// classifier prompts reproducible across runs; callers that need
/// creative output (workflow generation) use their own profile instead.
#[derive(Debug, Clone)]
pub struct LlmProfile {
    pub model: String,
    pub timeout: Duration,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub seed: u32,
    pub repeat_penalty: f64,
}

impl LlmProfile {
    /// Options map as sent to `ollama run --options` / the HTTP `options` field.
    pub fn to_ollama_options(&self) -> serde_json::Value {
        serde_json::json!({
            "temperature": self.temperature,
            "top_p": self.top_p,
            "top_k": self.top_k,
            "seed": self.seed,
            "repeat_penalty": self.repeat_penalty,
        })
    }

    fn from_env(
        model_names: &[&str],
        timeout_names: &[&str],
        seed_names: &[&str],
        default_model: &str,
        default_timeout_secs: u64,
    ) -> Self {
        Self {
            model: env_str(model_names).unwrap_or_else(|| default_model.to_string()),
            timeout: Duration::from_secs(env_u64(timeout_names, default_timeout_secs)),
            temperature: env_f64(&["CLAI_LOCAL_TEMPERATURE"], 0.0),
            top_p: env_f64(&["CLAI_LOCAL_TOP_P"], 1.0),
            top_k: env_u64(&["CLAI_LOCAL_TOP_K"], 1) as u32,
            seed: env_u64(seed_names, 42) as u32,
            repeat_penalty: env_f64(&["CLAI_LOCAL_REPEAT_PENALTY"], 1.0),
        }
    }
}

/// Full runtime configuration, assembled once at process start and threaded
/// through the registry, planner and generation manager by reference.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub local_command_classifier: LlmProfile,
    pub local_planner: LlmProfile,

    pub remote_generator_model: String,
    pub remote_generator_temperature: f64,
    pub remote_generator_max_tokens: u32,
    pub remote_generator_max_attempts: u32,
    pub remote_generator_endpoint: Option<String>,
    pub remote_generator_api_key: Option<String>,

    pub generated_dir: std::path::PathBuf,
    pub max_expansion_depth: u32,

    pub legacy_command_prefixes: Vec<String>,

    /// Mirrors `LOCAL_MODEL_HTTP_ENABLE` (spec §6.4): routes local generation
    /// via the HTTP transport instead of the `ollama run` subprocess.
    pub local_model_http_enable: bool,
    /// Mirrors `LOCAL_MODEL_URL` (spec §6.4): endpoint for the HTTP local model.
    pub local_model_url: String,
    /// Mirrors `DEBUG` (spec §6.4): enables verbose diagnostic logging.
    pub debug: bool,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let generated_dir = env_str(&["GENERATED_DIR", "CLAI_GENERATED_DIR"])
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| std::path::PathBuf::from("."))
                    .join(".clai")
                    .join("workflows")
                    .join("custom")
            });

        Self {
            local_command_classifier: LlmProfile::from_env(
                &["CLASSIFIER_MODEL", "CLAI_CLASSIFIER_MODEL", "CLAI_LOCAL_MODEL"],
                &["CLASSIFIER_TIMEOUT", "CLAI_CLASSIFIER_TIMEOUT", "CLAI_LOCAL_TIMEOUT"],
                &["CLASSIFIER_SEED", "CLAI_LOCAL_SEED"],
                "llama3.1",
                60,
            ),
            local_planner: LlmProfile::from_env(
                &["PLANNER_MODEL", "CLAI_PLANNER_MODEL", "CLAI_LOCAL_MODEL"],
                &["PLANNER_TIMEOUT", "CLAI_PLANNER_TIMEOUT", "CLAI_LOCAL_TIMEOUT"],
                &["PLANNER_SEED", "CLAI_LOCAL_SEED"],
                "llama3.1",
                60,
            ),
            remote_generator_model: env_str(&["REMOTE_MODEL", "CLAI_REMOTE_GENERATOR_MODEL"])
                .unwrap_or_else(|| "gpt-4.1".to_string()),
            remote_generator_temperature: env_f64(&["CLAI_REMOTE_GENERATOR_TEMPERATURE"], 0.2),
            remote_generator_max_tokens: env_u64(&["CLAI_REMOTE_GENERATOR_MAX_TOKENS"], 4096) as u32,
            remote_generator_max_attempts: env_u64(
                &["REMOTE_MAX_ATTEMPTS", "CLAI_REMOTE_GENERATOR_MAX_ATTEMPTS"],
                3,
            ) as u32,
            remote_generator_endpoint: env_str(&["CLAI_REMOTE_GENERATOR_ENDPOINT"]),
            remote_generator_api_key: env_str(&["REMOTE_API_KEY", "CLAI_REMOTE_GENERATOR_API_KEY", "OPENAI_API_KEY"]),
            generated_dir,
            max_expansion_depth: env_u64(&["CLAI_MAX_EXPANSION_DEPTH"], 6) as u32,
            legacy_command_prefixes: env_list(
                &["CLAI_LEGACY_COMMAND_PREFIXES"],
                &["mail:", "calendar:", "doc:"],
            ),
            local_model_http_enable: env_bool(&["LOCAL_MODEL_HTTP_ENABLE", "CLAI_OLLAMA_USE_HTTP"], false),
            local_model_url: env_str(&["LOCAL_MODEL_URL"])
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            debug: env_bool(&["DEBUG"], false),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_deterministic() {
        let cfg = RuntimeConfig::from_env();
        assert_eq!(cfg.local_planner.temperature, 0.0);
        assert_eq!(cfg.local_planner.top_k, 1);
        assert_eq!(cfg.local_planner.seed, 42);
    }

    #[test]
    fn legacy_prefixes_default_when_unset() {
        let cfg = RuntimeConfig::from_env();
        assert!(cfg.legacy_command_prefixes.contains(&"mail:".to_string()));
    }
}
