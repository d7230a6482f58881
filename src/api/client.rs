use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::api::TestBackend;
use crate::config::Config;
use crate::dto::test_dto::{
    AttemptDetailResponse, SubmitAnswerRequest, SubmitAnswerResponse, TestDetailResponse,
};
use crate::error::{Error, Result};
use crate::models::test_attempt::AnswerValue;
use crate::models::violation::Violation;

/// Typed client for the assessment REST API. Every request carries the
/// student's bearer token and a hard timeout, so no caller can hang in a
/// loading state indefinitely.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid API base URL: {}", e)))?;
        // Url::join treats a missing trailing slash as a file component.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.api_base_url,
            config.api_token.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid API path {}: {}", path, e)))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| {
                body.get("error")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| default_message(status));
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        debug!(%url, "GET");
        Ok(self.send(self.http.get(url)).await?.json().await?)
    }

    async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let url = self.url(path)?;
        debug!(%url, "POST");
        let mut request = self.http.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(self.send(request).await?.json().await?)
    }

    async fn post_ack<B: serde::Serialize>(&self, path: &str, body: Option<&B>) -> Result<()> {
        let url = self.url(path)?;
        debug!(%url, "POST");
        let mut request = self.http.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request).await?;
        Ok(())
    }
}

fn default_message(status: StatusCode) -> String {
    format!("request failed with status {}", status.as_u16())
}

impl TestBackend for ApiClient {
    async fn fetch_test(&self, slug: &str) -> Result<TestDetailResponse> {
        self.get_json(&format!("api/tests/{}", slug)).await
    }

    async fn fetch_attempt(&self, slug: &str, attempt_id: Uuid) -> Result<AttemptDetailResponse> {
        self.get_json(&format!("api/tests/{}/attempts/{}", slug, attempt_id))
            .await
    }

    async fn start_attempt(&self, slug: &str) -> Result<AttemptDetailResponse> {
        self.post_json::<_, ()>(&format!("api/tests/{}/attempts", slug), None)
            .await
    }

    async fn save_answer(
        &self,
        slug: &str,
        attempt_id: Uuid,
        item_id: i64,
        answer: &AnswerValue,
    ) -> Result<()> {
        let request = SubmitAnswerRequest {
            item_id,
            answer: answer.clone(),
        };
        let ack: SubmitAnswerResponse = self
            .post_json(
                &format!("api/tests/{}/attempts/{}/answers", slug, attempt_id),
                Some(&request),
            )
            .await?;
        debug!(item_id = ack.item_id, saved = ack.saved, "answer persisted");
        Ok(())
    }

    async fn submit_attempt(&self, slug: &str, attempt_id: Uuid) -> Result<AttemptDetailResponse> {
        self.post_json::<_, ()>(
            &format!("api/tests/{}/attempts/{}/submit", slug, attempt_id),
            None,
        )
        .await
    }

    async fn report_violation(
        &self,
        slug: &str,
        attempt_id: Uuid,
        violation: &Violation,
    ) -> Result<()> {
        self.post_ack(
            &format!("api/tests/{}/attempts/{}/violations", slug, attempt_id),
            Some(violation),
        )
        .await
    }

    async fn heartbeat(&self, slug: &str, attempt_id: Uuid) -> Result<()> {
        self.post_ack::<()>(
            &format!("api/tests/{}/attempts/{}/heartbeat", slug, attempt_id),
            None,
        )
        .await
    }
}
