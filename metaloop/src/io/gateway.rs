//! Model gateway: sends a role prompt to a language-model endpoint.
//!
//! The [`ModelGateway`] trait keeps the cycle controller independent of the
//! HTTP backend. [`OllamaGateway`] talks to an Ollama-compatible
//! `/api/generate` endpoint with streaming disabled. Failures propagate: the
//! loop is not resilient to gateway outages and expects an external process
//! manager to restart it.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Environment variable selecting the gateway base address.
pub const GATEWAY_ENV: &str = "OLLAMA_HOST";
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:11434";

/// One model invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub model: String,
    pub system_prompt: String,
    pub prompt: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl ModelRequest {
    pub fn new(
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// System prompt and prompt joined the way the endpoint receives them.
    pub fn full_prompt(&self) -> String {
        format!("{}\n\n{}", self.system_prompt, self.prompt)
    }
}

/// Abstraction over model backends. Returns raw text; content is not parsed.
pub trait ModelGateway {
    fn generate(&self, request: &ModelRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    response: String,
}

/// Gateway for Ollama's HTTP API.
#[derive(Debug, Clone)]
pub struct OllamaGateway {
    base_url: String,
    client: Client,
}

impl OllamaGateway {
    /// Create a client for `base_url`. Timeouts are set per request.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: normalize_base_url(&base_url.into()),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ModelGateway for OllamaGateway {
    #[instrument(skip_all, fields(model = %request.model))]
    fn generate(&self, request: &ModelRequest) -> Result<String> {
        let endpoint = format!("{}/api/generate", self.base_url);
        let prompt = request.full_prompt();
        info!(model = %request.model, "calling model");
        debug!(prompt_len = prompt.len(), endpoint = %endpoint, "sending generate request");

        let mut builder = self.client.post(&endpoint);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        let reply: GenerateReply = builder
            .json(&GenerateBody {
                model: &request.model,
                prompt: &prompt,
                stream: false,
            })
            .send()
            .with_context(|| format!("send request to {endpoint}"))?
            .error_for_status()
            .with_context(|| format!("model '{}' request failed", request.model))?
            .json()
            .context("decode generate response")?;

        debug!(response_len = reply.response.len(), "model replied");
        Ok(reply.response)
    }
}

/// Resolve the gateway address from an `OLLAMA_HOST`-style value, falling back to the local default.
pub fn resolve_base_url(env_value: Option<String>) -> String {
    env_value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(|value| normalize_base_url(&value))
        .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string())
}

/// Add a scheme when missing (`OLLAMA_HOST=0.0.0.0:11434`) and drop trailing slashes.
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}
