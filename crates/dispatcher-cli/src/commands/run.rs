//! `dispatcher run "<request>"` — the main entry point: classify, plan, and
//! execute a natural-language request end to end.

use dispatcher_core::config::RuntimeConfig;
use dispatcher_core::execution::ExecutionLoop;

use super::{build_registry, remote_client};

pub async fn run(request: &str) -> Result<(), String> {
    let config = RuntimeConfig::from_env();
    let registry = build_registry()?;
    let loop_ = ExecutionLoop::new(registry, config.clone(), remote_client(&config));

    let output = loop_.run_request(request).await.map_err(|e| e.to_string())?;
    println!("{output}");
    Ok(())
}
