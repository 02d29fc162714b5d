use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::ComparisonApi;
use crate::config::ApiConfig;
use crate::error::{ApiError, LabCompareError};
use crate::models::{
    Comparison, ComparisonStats, ComparisonSummary, ListFilter, Page, SubmitResponse,
};
use crate::submit::SubmissionRequest;

const COLLECTION: &str = "test-report-comparisons";

/// Longest error body kept in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_error_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    }
}

/// Every response body is wrapped as `{ success, data, message }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::Backend(
                self.message
                    .unwrap_or_else(|| "request was not successful".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| ApiError::Decode("response has no data".to_string()))
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    envelope.into_data()
}

fn list_query(filter: &ListFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(status) = filter.status {
        query.push(("status", status.to_string()));
    }
    if let Some(patient_id) = &filter.patient_id {
        query.push(("patient_id", patient_id.clone()));
    }
    if let Some(doctor_id) = &filter.doctor_id {
        query.push(("doctor_id", doctor_id.clone()));
    }
    if let Some(from) = filter.from_date {
        query.push(("from_date", from.to_rfc3339()));
    }
    if let Some(to) = filter.to_date {
        query.push(("to_date", to.to_rfc3339()));
    }
    query.push(("page", filter.page().to_string()));
    query.push(("limit", filter.limit().to_string()));
    query
}

/// Talks to the comparison REST API.
pub struct HttpComparisonApi {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpComparisonApi {
    pub fn new(config: &ApiConfig, token: Option<SecretString>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build a client from config, resolving the bearer token if one is configured.
    pub fn from_config(config: &ApiConfig) -> Result<Self, LabCompareError> {
        let token = config.token_source().resolve_optional()?;
        if token.is_none() {
            log::debug!("No API token configured; requests are unauthenticated");
        }
        Ok(Self::new(config, token)?)
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            format!("{}/{}", self.base_url, COLLECTION)
        } else {
            format!("{}/{}/{}", self.base_url, COLLECTION, path)
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn read(response: Response, id: Option<&str>) -> Result<String, ApiError> {
        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(ApiError::NotFound(id.to_string()));
            }
        }
        if !status.is_success() {
            let body = truncate_error_body(&body);
            log::debug!("API returned {}: {}", status, body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl ComparisonApi for HttpComparisonApi {
    async fn submit(&self, request: SubmissionRequest) -> Result<SubmitResponse, ApiError> {
        let mut form = Form::new()
            .text("patient_id", request.patient_id)
            .text("comparison_name", request.comparison_name);
        if let Some(prompt) = request.custom_prompt {
            form = form.text("custom_prompt", prompt);
        }
        if let Some(doctor_id) = request.doctor_id {
            form = form.text("doctor_id", doctor_id);
        }
        for file in request.files {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.mime_type)?;
            form = form.part("test_reports", part);
        }

        let response = self
            .authorize(self.client.post(self.url("")))
            .multipart(form)
            .send()
            .await?;
        decode(&Self::read(response, None).await?)
    }

    async fn get(&self, id: &str) -> Result<Comparison, ApiError> {
        let response = self
            .authorize(self.client.get(self.url(id)))
            .send()
            .await?;
        decode(&Self::read(response, Some(id)).await?)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Page<ComparisonSummary>, ApiError> {
        let response = self
            .authorize(self.client.get(self.url("")))
            .query(&list_query(filter))
            .send()
            .await?;
        decode(&Self::read(response, None).await?)
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let response = self
            .authorize(self.client.delete(self.url(id)))
            .send()
            .await?;
        match Self::read(response, Some(id)).await {
            Ok(_) => Ok(()),
            Err(ApiError::NotFound(_)) => {
                log::debug!("Comparison {} already gone", id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn stats(&self) -> Result<ComparisonStats, ApiError> {
        let response = self
            .authorize(self.client.get(self.url("stats")))
            .send()
            .await?;
        decode(&Self::read(response, None).await?)
    }
}
