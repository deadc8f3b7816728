//! REST adapter for the Suno gateway API (primary vendor).
//!
//! Wraps the gateway's cover-generation endpoints (submission, task
//! polling) using [`reqwest`]. Responses arrive in a `{code, msg, data}`
//! envelope; a 2xx HTTP status with a non-200 business code is still a
//! vendor rejection.

use serde::{Deserialize, Serialize};
use songforge_core::generation::variant_label;

use crate::{
    GenerateRequest, MusicProvider, ProviderError, ProviderVariant, SubmitResponse, TaskResult,
    TaskStatus,
};

/// Stable name used for task routing and variant provenance.
pub const PROVIDER_NAME: &str = "suno";

/// HTTP client for the Suno gateway.
pub struct SunoApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

// ---- wire types ----

/// Response envelope shared by all gateway endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    audio_url: &'a str,
    style: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    lyrics: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_gender: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    exclude_styles: &'a Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trim_start_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trim_end_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitData {
    task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    items: Vec<SunoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SunoItem {
    audio_url: String,
    image_url: Option<String>,
    image_large_url: Option<String>,
    duration: Option<f64>,
}

impl SunoApi {
    /// Create a new adapter.
    ///
    /// * `base_url` - Gateway base, e.g. `https://api.sunoapi.org`.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Create an adapter reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across adapters).
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the response
    /// unchanged on success, or a [`ProviderError::Api`] containing the
    /// status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful response, unwrapping the gateway envelope and
    /// surfacing business-level error codes.
    async fn parse_envelope<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let response = Self::ensure_success(response).await?;
        let envelope = response.json::<Envelope<T>>().await?;
        if envelope.code != 200 {
            return Err(ProviderError::Vendor {
                code: envelope.code,
                message: envelope.msg.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        envelope.data.ok_or(ProviderError::Vendor {
            code: envelope.code,
            message: "response envelope missing data".to_string(),
        })
    }

    fn map_status(raw: &str) -> TaskStatus {
        match raw {
            "PENDING" | "SUBMITTED" => TaskStatus::Pending,
            "SUCCESS" => TaskStatus::Completed,
            "CREATE_TASK_FAILED" | "GENERATE_AUDIO_FAILED" | "SENSITIVE_WORD_ERROR"
            | "FAILED" => TaskStatus::Failed,
            // TEXT_SUCCESS / FIRST_SUCCESS are partial-completion states.
            _ => TaskStatus::Processing,
        }
    }
}

#[async_trait::async_trait]
impl MusicProvider for SunoApi {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn submit_generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<SubmitResponse, ProviderError> {
        let body = SubmitBody {
            audio_url: &request.audio_url,
            style: &request.style,
            lyrics: request.lyrics.as_deref(),
            title: request.title.as_deref(),
            voice_gender: request.voice_gender.as_deref(),
            exclude_styles: &request.exclude_styles,
            trim_start_ms: request.trim_start_ms,
            trim_end_ms: request.trim_end_ms,
        };

        let response = self
            .client
            .post(format!("{}/api/v1/generate/upload-cover", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let data: SubmitData = Self::parse_envelope(response).await?;
        Ok(SubmitResponse {
            task_id: data.task_id,
        })
    }

    async fn query_task(&self, task_id: &str) -> Result<TaskResult, ProviderError> {
        let response = self
            .client
            .get(format!("{}/api/v1/generate/record-info", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("taskId", task_id)])
            .send()
            .await?;

        let data: QueryData = Self::parse_envelope(response).await?;
        let status = Self::map_status(&data.status);

        let variants = data
            .items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| {
                variant_label(i).map(|label| ProviderVariant {
                    variant: label.to_string(),
                    audio_url: item.audio_url,
                    image_url: item.image_url,
                    image_large_url: item.image_large_url,
                    duration_secs: item.duration,
                })
            })
            .collect();

        Ok(TaskResult {
            status,
            variants,
            error: data.error_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(SunoApi::map_status("PENDING"), TaskStatus::Pending);
        assert_eq!(SunoApi::map_status("SUBMITTED"), TaskStatus::Pending);
        assert_eq!(SunoApi::map_status("TEXT_SUCCESS"), TaskStatus::Processing);
        assert_eq!(SunoApi::map_status("FIRST_SUCCESS"), TaskStatus::Processing);
        assert_eq!(SunoApi::map_status("SUCCESS"), TaskStatus::Completed);
        assert_eq!(SunoApi::map_status("FAILED"), TaskStatus::Failed);
        assert_eq!(
            SunoApi::map_status("SENSITIVE_WORD_ERROR"),
            TaskStatus::Failed
        );
    }

    #[test]
    fn submit_body_omits_absent_fields() {
        let request = GenerateRequest {
            audio_url: "https://cdn.example.com/in.mp3".into(),
            style: "lofi".into(),
            ..Default::default()
        };
        let body = SubmitBody {
            audio_url: &request.audio_url,
            style: &request.style,
            lyrics: request.lyrics.as_deref(),
            title: request.title.as_deref(),
            voice_gender: request.voice_gender.as_deref(),
            exclude_styles: &request.exclude_styles,
            trim_start_ms: request.trim_start_ms,
            trim_end_ms: request.trim_end_ms,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["audioUrl"], "https://cdn.example.com/in.mp3");
        assert!(json.get("lyrics").is_none());
        assert!(json.get("voiceGender").is_none());
        assert!(json.get("excludeStyles").is_none());
    }
}
