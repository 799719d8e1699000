//! Local model client — invokes an `ollama`-served model either by spawning
//! the `ollama run` CLI as a subprocess, or over its HTTP API, depending on
//! `LOCAL_MODEL_HTTP_ENABLE`.
//!
//! The subprocess path is the default and the one guaranteed to work with a
//! bare `ollama` install; the HTTP path is opportunistic and falls back to
//! the subprocess on any failure (connection refused, non-200, malformed
//! stream) rather than surfacing a transport error to the caller.

use std::collections::HashSet;
use std::process::Stdio;
use std::sync::{Arc, Mutex, OnceLock};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::LlmProfile;
use crate::error::{AgentError, AgentResult};

static OPTIONS_SUPPORT: OnceLock<bool> = OnceLock::new();

/// Probes `ollama run --help` once per process and caches whether the
/// installed CLI accepts an `--options` flag. Any failure to run the probe
/// at all is treated as support being present, since the flag is simply
/// dropped by newer CLIs that ignore unknown args less gracefully than we'd
/// like to assume — better to attempt it once than silently never try.
async fn detect_options_support() -> bool {
    if let Some(v) = OPTIONS_SUPPORT.get() {
        return *v;
    }
    let supported = match Command::new("ollama").arg("run").arg("--help").output().await {
        Ok(output) => {
            let text = String::from_utf8_lossy(&output.stdout);
            text.contains("--options")
        }
        Err(_) => true,
    };
    let _ = OPTIONS_SUPPORT.set(supported);
    supported
}

#[derive(Clone, Default)]
struct WarmModels(Arc<Mutex<HashSet<String>>>);

/// A handle to the local inference backend. Cheap to clone; all state
/// (warmed-model tracking) is shared behind an `Arc`.
#[derive(Clone)]
pub struct LocalModelClient {
    warmed: WarmModels,
    http: Option<reqwest::Client>,
    use_http: bool,
    base_url: String,
}

impl Default for LocalModelClient {
    fn default() -> Self {
        Self {
            warmed: WarmModels::default(),
            http: Some(reqwest::Client::new()),
            use_http: false,
            base_url: "http://localhost:11434".to_string(),
        }
    }
}

impl LocalModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a client honoring `RuntimeConfig`'s `local_model_http_enable`
    /// and `local_model_url` (spec §6.4: `LOCAL_MODEL_HTTP_ENABLE` /
    /// `LOCAL_MODEL_URL`).
    pub fn with_config(config: &crate::config::RuntimeConfig) -> Self {
        Self {
            warmed: WarmModels::default(),
            http: Some(reqwest::Client::new()),
            use_http: config.local_model_http_enable,
            base_url: config.local_model_url.trim_end_matches('/').to_string(),
        }
    }

    fn generate_endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    /// Fires off a detached warm-up request for `model` if one hasn't
    /// already been started this process. Never awaited by the caller —
    /// the first real `run` call pays the cold-start cost if warm-up hasn't
    /// finished yet, but subsequent calls benefit from `keep_alive`.
    pub fn warmup(&self, model: &str) {
        let already_warmed = {
            let mut set = self.warmed.0.lock().expect("warm set poisoned");
            if set.contains(model) {
                true
            } else {
                set.insert(model.to_string());
                false
            }
        };
        if already_warmed {
            return;
        }
        let model = model.to_string();
        let http = self.http.clone();
        let endpoint = self.generate_endpoint();
        tokio::spawn(async move {
            if let Some(client) = http {
                let _ = client
                    .post(endpoint)
                    .json(&serde_json::json!({
                        "model": model,
                        "prompt": "",
                        "keep_alive": "10m",
                    }))
                    .send()
                    .await;
            }
        });
    }

    /// Runs `prompt` against `profile.model` and returns the raw text
    /// response. Tries HTTP first when configured for it, falling back to
    /// the subprocess path on any HTTP failure.
    pub async fn run(&self, prompt: &str, profile: &LlmProfile) -> AgentResult<String> {
        if self.use_http {
            if let Some(client) = &self.http {
                if let Ok(text) = self.run_via_http(client, prompt, profile).await {
                    return Ok(text);
                }
            }
        }
        self.run_via_subprocess(prompt, profile).await
    }

    async fn run_via_subprocess(&self, prompt: &str, profile: &LlmProfile) -> AgentResult<String> {
        let mut command = Command::new("ollama");
        command.arg("run").arg(&profile.model);
        if detect_options_support().await {
            let options = profile.to_ollama_options().to_string();
            command.arg("--options").arg(options);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| AgentError::Transport(format!("failed to spawn ollama: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| AgentError::Transport(format!("failed to write prompt: {e}")))?;
        }

        let output = timeout(profile.timeout, child.wait_with_output())
            .await
            .map_err(|_| AgentError::Transport("ollama subprocess timed out".to_string()))?
            .map_err(|e| AgentError::Transport(format!("ollama subprocess failed: {e}")))?;

        if !output.status.success() {
            return Err(AgentError::Transport(format!(
                "ollama exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_via_http(
        &self,
        client: &reqwest::Client,
        prompt: &str,
        profile: &LlmProfile,
    ) -> AgentResult<String> {
        let response = timeout(
            profile.timeout,
            client
                .post(self.generate_endpoint())
                .json(&serde_json::json!({
                    "model": profile.model,
                    "prompt": prompt,
                    "stream": true,
                    "options": profile.to_ollama_options(),
                }))
                .send(),
        )
        .await
        .map_err(|_| AgentError::Transport("ollama HTTP request timed out".to_string()))?
        .map_err(|e| AgentError::Transport(format!("ollama HTTP request failed: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| AgentError::Transport(format!("ollama stream read failed: {e}")))?;

        let mut accumulated = String::new();
        for line in body.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let chunk: serde_json::Value = serde_json::from_str(line)
                .map_err(|e| AgentError::Transport(format!("malformed ollama stream chunk: {e}")))?;
            if let Some(piece) = chunk.get("response").and_then(|v| v.as_str()) {
                accumulated.push_str(piece);
            }
            if chunk.get("done").and_then(|v| v.as_bool()).unwrap_or(false) {
                break;
            }
        }
        Ok(accumulated.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_marks_model_as_started() {
        let client = LocalModelClient::default();
        client.warmup("llama3.1");
        assert!(client.warmed.0.lock().unwrap().contains("llama3.1"));
    }

    #[test]
    fn with_config_honors_http_enable_and_url() {
        let mut config = crate::config::RuntimeConfig::default();
        config.local_model_http_enable = true;
        config.local_model_url = "http://example.internal:9999/".to_string();
        let client = LocalModelClient::with_config(&config);
        assert!(client.use_http);
        assert_eq!(client.generate_endpoint(), "http://example.internal:9999/api/generate");
    }
}
