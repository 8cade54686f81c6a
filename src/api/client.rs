use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, error, info};

use super::messages::{FollowUpRequest, FollowUpResponse, TranscriptionResponse};
use crate::audio::AudioSegment;
use crate::config::ApiConfig;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Remote side of the interview flow
#[async_trait::async_trait]
pub trait InterviewApi: Send + Sync {
    /// Upload one segment and return its transcribed text
    async fn transcribe(&self, session_id: &str, segment: &AudioSegment) -> Result<String, ApiError>;

    /// Ask whether the just-answered question warrants a follow-up
    async fn check_follow_up(
        &self,
        session_id: &str,
        request: &FollowUpRequest,
    ) -> Result<FollowUpResponse, ApiError>;
}

/// `InterviewApi` over HTTP with bearer authentication
pub struct HttpInterviewApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpInterviewApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        info!("Interview API client for {}", config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.trim().to_string(),
        })
    }

    fn endpoint(&self, session_id: &str, path: &str) -> String {
        format!("{}/interview/{}/{}", self.base_url, session_id, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<String, ApiError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("API request failed with status {}: {}", status, body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait::async_trait]
impl InterviewApi for HttpInterviewApi {
    async fn transcribe(&self, session_id: &str, segment: &AudioSegment) -> Result<String, ApiError> {
        let url = self.endpoint(session_id, "transcribe");
        debug!(
            "Uploading segment {} to {} ({} bytes, {})",
            segment.index,
            url,
            segment.payload.len(),
            segment.mime_type
        );

        let part = Part::bytes(segment.payload.clone())
            .file_name(segment.file_name())
            .mime_str(&segment.mime_type)?;

        let form = Form::new()
            .part("audio", part)
            .text("sessionId", session_id.to_string());

        let response = self
            .authorize(self.client.post(&url).multipart(form))
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let parsed: TranscriptionResponse = serde_json::from_str(&body)?;

        Ok(parsed.text.trim().to_string())
    }

    async fn check_follow_up(
        &self,
        session_id: &str,
        request: &FollowUpRequest,
    ) -> Result<FollowUpResponse, ApiError> {
        let url = self.endpoint(session_id, "follow-up");
        debug!(
            "Checking follow-up for question {} (index {})",
            request.question_id, request.current_question_index
        );

        let response = self
            .authorize(self.client.post(&url).json(request))
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }
}
