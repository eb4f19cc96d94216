//! Reqwest-backed client for the CDN purge API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::application::purge::{PurgeBackend, PurgeError, PurgeLimits};
use crate::domain::url::PurgePath;
use crate::infra::error::InfraError;

const ERROR_BODY_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct CdnPurgeConfig {
    pub endpoint: Url,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub limits: PurgeLimits,
}

/// The reference purge backend: one POST per batch, bearer-authenticated,
/// with the aggregate result in the response body.
pub struct CdnPurgeClient {
    http: Client,
    config: CdnPurgeConfig,
}

#[derive(Serialize)]
struct PurgeRequestBody<'a> {
    paths: Vec<&'a str>,
}

#[derive(Deserialize)]
struct PurgeResponseBody {
    ok: bool,
}

impl CdnPurgeClient {
    pub fn new(config: CdnPurgeConfig) -> Result<Self, InfraError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build purge http client: {err}"))
            })?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl PurgeBackend for CdnPurgeClient {
    async fn purge(&self, paths: &[PurgePath]) -> Result<bool, PurgeError> {
        if paths.is_empty() {
            return Ok(true);
        }
        self.config.limits.check(paths)?;

        let body = PurgeRequestBody {
            paths: paths.iter().map(PurgePath::as_str).collect(),
        };

        let mut request = self.http.post(self.config.endpoint.clone()).json(&body);
        if let Some(token) = self.config.api_token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| PurgeError::backend(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let snippet: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(ERROR_BODY_SNIPPET_CHARS)
                .collect();
            return Err(PurgeError::backend(format!(
                "purge endpoint returned {status}: {snippet}"
            )));
        }

        let parsed: PurgeResponseBody = response.json().await.map_err(|err| {
            PurgeError::backend(format!("purge endpoint returned an unreadable body: {err}"))
        })?;

        debug!(
            target = "infra::purge",
            paths = paths.len(),
            ok = parsed.ok,
            "purge request completed"
        );

        Ok(parsed.ok)
    }
}
