//! REST adapter for the Mureka API (legacy vendor).
//!
//! Kept as the fallback in the provider chain. Unlike the Suno gateway,
//! Mureka has no response envelope: errors surface as non-2xx statuses
//! with a JSON error body, and task state lives in a `status` string on
//! the song resource.

use serde::{Deserialize, Serialize};
use songforge_core::generation::variant_label;

use crate::{
    GenerateRequest, MusicProvider, ProviderError, ProviderVariant, SubmitResponse, TaskResult,
    TaskStatus,
};

/// Stable name used for task routing and variant provenance.
pub const PROVIDER_NAME: &str = "mureka";

/// HTTP client for the Mureka API.
pub struct MurekaApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

// ---- wire types ----

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    reference_audio_url: &'a str,
    style: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    lyrics: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vocal_gender: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    excluded_styles: &'a Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    clip_start_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    clip_end_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    status: String,
    #[serde(default)]
    failed_reason: Option<String>,
    #[serde(default)]
    choices: Vec<MurekaChoice>,
}

#[derive(Debug, Deserialize)]
struct MurekaChoice {
    mp3_url: String,
    cover_image_url: Option<String>,
    cover_image_hd_url: Option<String>,
    duration_ms: Option<i64>,
}

impl MurekaApi {
    /// Create a new adapter.
    ///
    /// * `base_url` - API base, e.g. `https://api.mureka.ai`.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Create an adapter reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    // ---- private helpers ----

    /// Parse a JSON response body, converting non-2xx statuses into
    /// [`ProviderError::Api`].
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
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
        Ok(response.json::<T>().await?)
    }

    fn map_status(raw: &str) -> TaskStatus {
        match raw {
            "preparing" | "queued" => TaskStatus::Pending,
            "running" | "streaming" => TaskStatus::Processing,
            "succeeded" => TaskStatus::Completed,
            _ => TaskStatus::Failed,
        }
    }
}

#[async_trait::async_trait]
impl MusicProvider for MurekaApi {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn submit_generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<SubmitResponse, ProviderError> {
        let body = SubmitBody {
            reference_audio_url: &request.audio_url,
            style: &request.style,
            lyrics: request.lyrics.as_deref(),
            title: request.title.as_deref(),
            vocal_gender: request.voice_gender.as_deref(),
            excluded_styles: &request.exclude_styles,
            clip_start_ms: request.trim_start_ms,
            clip_end_ms: request.trim_end_ms,
        };

        let response = self
            .client
            .post(format!("{}/v1/song/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let data: SubmitData = Self::parse_response(response).await?;
        Ok(SubmitResponse { task_id: data.id })
    }

    async fn query_task(&self, task_id: &str) -> Result<TaskResult, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/song/query/{task_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let data: QueryData = Self::parse_response(response).await?;
        let status = Self::map_status(&data.status);

        let variants = data
            .choices
            .into_iter()
            .enumerate()
            .filter_map(|(i, choice)| {
                variant_label(i).map(|label| ProviderVariant {
                    variant: label.to_string(),
                    audio_url: choice.mp3_url,
                    image_url: choice.cover_image_url,
                    image_large_url: choice.cover_image_hd_url,
                    duration_secs: choice.duration_ms.map(|ms| ms as f64 / 1000.0),
                })
            })
            .collect();

        Ok(TaskResult {
            status,
            variants,
            error: data.failed_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(MurekaApi::map_status("preparing"), TaskStatus::Pending);
        assert_eq!(MurekaApi::map_status("queued"), TaskStatus::Pending);
        assert_eq!(MurekaApi::map_status("running"), TaskStatus::Processing);
        assert_eq!(MurekaApi::map_status("streaming"), TaskStatus::Processing);
        assert_eq!(MurekaApi::map_status("succeeded"), TaskStatus::Completed);
        assert_eq!(MurekaApi::map_status("failed"), TaskStatus::Failed);
        assert_eq!(MurekaApi::map_status("timeouted"), TaskStatus::Failed);
        assert_eq!(MurekaApi::map_status("cancelled"), TaskStatus::Failed);
    }

    #[test]
    fn choices_map_to_labelled_variants() {
        let data = QueryData {
            status: "succeeded".to_string(),
            failed_reason: None,
            choices: vec![
                MurekaChoice {
                    mp3_url: "https://m.example.com/1.mp3".into(),
                    cover_image_url: Some("https://m.example.com/1.jpg".into()),
                    cover_image_hd_url: None,
                    duration_ms: Some(31_500),
                },
                MurekaChoice {
                    mp3_url: "https://m.example.com/2.mp3".into(),
                    cover_image_url: None,
                    cover_image_hd_url: None,
                    duration_ms: None,
                },
                MurekaChoice {
                    mp3_url: "https://m.example.com/3.mp3".into(),
                    cover_image_url: None,
                    cover_image_hd_url: None,
                    duration_ms: None,
                },
            ],
        };

        let variants: Vec<ProviderVariant> = data
            .choices
            .into_iter()
            .enumerate()
            .filter_map(|(i, choice)| {
                variant_label(i).map(|label| ProviderVariant {
                    variant: label.to_string(),
                    audio_url: choice.mp3_url,
                    image_url: choice.cover_image_url,
                    image_large_url: choice.cover_image_hd_url,
                    duration_secs: choice.duration_ms.map(|ms| ms as f64 / 1000.0),
                })
            })
            .collect();

        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].variant, "A");
        assert_eq!(variants[0].duration_secs, Some(31.5));
        assert_eq!(variants[1].variant, "B");
    }
}
