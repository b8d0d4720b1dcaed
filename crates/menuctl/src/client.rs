//! HTTP client for the menud API.

use anyhow::{anyhow, Result};
use menu_common::{
    ExplainRequest, ExplainResponse, HealthResponse, SearchRequest, SearchResponse,
};

/// Source and processing-time metadata returned alongside an explanation.
pub struct ExplainMeta {
    pub source: Option<String>,
    pub match_score: Option<String>,
    pub processing_ms: Option<String>,
}

pub struct MenuClient {
    http: reqwest::Client,
    server: String,
    token: Option<String>,
}

impl MenuClient {
    pub fn new(server: String, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            server: server.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.post(format!("{}{}", self.server, path));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    pub async fn explain(&self, req: &ExplainRequest) -> Result<(ExplainResponse, ExplainMeta)> {
        let response = self.post("/explain").json(req).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{}: {}", status, response.text().await?));
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };
        let meta = ExplainMeta {
            source: header("x-wtm-source"),
            match_score: header("x-wtm-match-score"),
            processing_ms: header("x-wtm-processing-ms"),
        };

        Ok((response.json().await?, meta))
    }

    pub async fn search(&self, req: &SearchRequest) -> Result<SearchResponse> {
        let response = self.post("/corpus/search").json(req).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{}: {}", status, response.text().await?));
        }
        Ok(response.json().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .http
            .get(format!("{}/v1/health", self.server))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("daemon unhealthy: {status}"));
        }
        Ok(response.json().await?)
    }
}
