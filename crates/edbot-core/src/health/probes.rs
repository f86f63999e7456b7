//! LLM backend probes

use super::{ComponentHealthCheck, ComponentType};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// Supported inference servers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Ollama,
    Vllm,
}

impl LlmBackend {
    /// Path probed on the backend
    pub fn health_path(&self) -> &'static str {
        match self {
            LlmBackend::Ollama => "/api/tags",
            LlmBackend::Vllm => "/health",
        }
    }
}

impl fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmBackend::Ollama => f.write_str("ollama"),
            LlmBackend::Vllm => f.write_str("vllm"),
        }
    }
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(LlmBackend::Ollama),
            "vllm" => Ok(LlmBackend::Vllm),
            other => Err(format!("Unsupported LLM backend: {}", other)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

/// Probe an LLM backend by name
///
/// Unrecognized or missing backends report `unknown` without any I/O.
pub async fn probe_llm_backend(
    http: &reqwest::Client,
    backend: Option<&str>,
    base_url: Option<&str>,
) -> ComponentHealthCheck {
    let component = ComponentType::LlmBackend;

    let (backend, base_url) = match (backend, base_url) {
        (Some(backend), Some(base_url)) => (backend, base_url),
        _ => return ComponentHealthCheck::unknown(component, "LLM backend not configured"),
    };

    let backend = match backend.parse::<LlmBackend>() {
        Ok(backend) => backend,
        Err(_) => {
            return ComponentHealthCheck::unknown(
                component,
                format!("Unknown LLM backend '{}'", backend),
            )
        }
    };

    let url = format!("{}{}", base_url.trim_end_matches('/'), backend.health_path());
    let start = Instant::now();

    let response = match http.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            return ComponentHealthCheck::unhealthy(
                component,
                elapsed_ms(start),
                format!("{} unreachable: {}", backend, e),
            )
        }
    };

    let status = response.status();
    if status.is_server_error() {
        return ComponentHealthCheck::unhealthy(
            component,
            elapsed_ms(start),
            format!("{} returned HTTP {}", backend, status.as_u16()),
        );
    }
    if !status.is_success() {
        return ComponentHealthCheck::degraded(
            component,
            elapsed_ms(start),
            format!("{} returned HTTP {}", backend, status.as_u16()),
        );
    }

    let mut details = BTreeMap::new();
    details.insert("backend".to_string(), serde_json::json!(backend.to_string()));

    match backend {
        LlmBackend::Ollama => match response.json::<OllamaTags>().await {
            Ok(tags) => {
                let models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
                details.insert("model_count".to_string(), serde_json::json!(models.len()));
                details.insert("models".to_string(), serde_json::json!(models));
                ComponentHealthCheck::healthy(component, elapsed_ms(start), "Ollama responding")
                    .with_details(details)
            }
            Err(e) => ComponentHealthCheck::degraded(
                component,
                elapsed_ms(start),
                format!("Ollama returned an unreadable model list: {}", e),
            )
            .with_details(details),
        },
        LlmBackend::Vllm => {
            ComponentHealthCheck::healthy(component, elapsed_ms(start), "vLLM responding")
                .with_details(details)
        }
    }
}

pub(super) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
