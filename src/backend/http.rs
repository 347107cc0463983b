//! JSON-over-HTTP generation transport.
//!
//! Wire contract: a single POST per attempt carrying the description, docs,
//! labeled dependency interfaces, and backend params; the response carries
//! the generated text. HTTP status and transport failures are classified
//! into the [`GenerationError`] taxonomy here, nowhere else.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{GenerationError, usage_synthesis_instructions};
use crate::context::GenerationBundle;
use crate::manifest::BackendConfig;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_output_tokens: u32,
    instructions: String,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

/// Backend adapter speaking JSON to a generation service.
#[derive(Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl HttpBackend {
    /// Build an adapter from manifest configuration.
    ///
    /// Fails when no endpoint is configured or the API key environment
    /// variable is unset; both are required before the first request.
    pub fn from_config(config: &BackendConfig) -> anyhow::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no backend endpoint configured in [backend]"))?;
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("environment variable {} is not set", config.api_key_env)
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone().unwrap_or_else(|| "default".to_string()),
            timeout_secs: config.timeout_secs,
        })
    }

    pub async fn generate(&self, bundle: &GenerationBundle) -> Result<String, GenerationError> {
        debug!(component = %bundle.component_id, model = %bundle.params.model, "sending generation request");
        let request = GenerateRequest {
            model: &bundle.params.model,
            temperature: bundle.params.temperature,
            max_output_tokens: bundle.params.max_output_tokens,
            instructions: bundle.render_instructions(),
            input: &bundle.description,
        };
        self.post(&request).await
    }

    pub async fn describe_usage(
        &self,
        component_id: &str,
        source: &str,
        _skeleton: &str,
    ) -> Result<String, GenerationError> {
        debug!(component = %component_id, "sending usage-synthesis request");
        let request = GenerateRequest {
            model: &self.model,
            temperature: 0.2,
            max_output_tokens: 2048,
            instructions: usage_synthesis_instructions(source),
            input: "Generate a usage description for the provided source code.",
        };
        self.post(&request).await
    }

    async fn post(&self, request: &GenerateRequest<'_>) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            GenerationError::PermanentRejection {
                reason: format!("malformed backend response: {e}"),
            }
        })?;
        Ok(parsed.text)
    }

    fn classify_transport_error(&self, error: &reqwest::Error) -> GenerationError {
        if error.is_timeout() {
            GenerationError::Timeout { seconds: self.timeout_secs }
        } else {
            // Connection resets and DNS hiccups are worth another attempt.
            GenerationError::Transient { reason: error.to_string() }
        }
    }
}

fn classify_status(status: StatusCode, body: &str) -> GenerationError {
    let reason = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };
    match status {
        StatusCode::TOO_MANY_REQUESTS => GenerationError::QuotaExceeded { reason },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            GenerationError::Timeout { seconds: 0 }
        }
        s if s.is_client_error() => GenerationError::PermanentRejection { reason },
        _ => GenerationError::Transient { reason },
    }
}
