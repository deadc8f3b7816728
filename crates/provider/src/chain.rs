//! Ordered fallback over provider adapters with bounded per-adapter retry.
//!
//! Submission walks the adapter list in order, giving each adapter its
//! retry budget before falling through to the next; the whole chain fails
//! only when every adapter is exhausted. Task polling is routed back to
//! the adapter that accepted the submission by provider name, because a
//! task id from one vendor is meaningless to another.

use std::sync::Arc;
use std::time::Duration;

use crate::{GenerateRequest, MusicProvider, ProviderError, TaskResult};

/// A submission accepted by one adapter in the chain.
#[derive(Debug, Clone)]
pub struct ChainSubmit {
    pub task_id: String,
    /// Which adapter served the request; required later to route
    /// [`ProviderChain::query_task`].
    pub provider_name: String,
}

/// Retry/fallback wrapper over one or more [`MusicProvider`]s.
pub struct ProviderChain {
    providers: Vec<Arc<dyn MusicProvider>>,
    max_retries: u32,
    base_delay: Duration,
}

impl ProviderChain {
    /// Build a chain over ordered adapters.
    ///
    /// Each adapter gets up to `max_retries` submission attempts with a
    /// `base_delay × attempt` sleep between attempts before the chain
    /// falls through to the next adapter.
    pub fn new(
        providers: Vec<Arc<dyn MusicProvider>>,
        max_retries: u32,
        base_delay: Duration,
    ) -> Self {
        Self {
            providers,
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    /// Build a degenerate chain around a single fixed adapter, used when
    /// fallback is disabled by configuration: one attempt, no backoff.
    pub fn single(provider: Arc<dyn MusicProvider>) -> Self {
        Self::new(vec![provider], 1, Duration::ZERO)
    }

    /// Look up an adapter by name, for routing `query_task`.
    pub fn provider(&self, name: &str) -> Option<&Arc<dyn MusicProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Submit through the chain, returning the accepted task id and the
    /// name of the adapter that served it.
    pub async fn submit_generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<ChainSubmit, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for provider in &self.providers {
            for attempt in 1..=self.max_retries {
                match provider.submit_generate(request).await {
                    Ok(response) => {
                        if attempt > 1 || last_error.is_some() {
                            tracing::info!(
                                provider = provider.name(),
                                attempt,
                                "Provider accepted submission after earlier failures",
                            );
                        }
                        return Ok(ChainSubmit {
                            task_id: response.task_id,
                            provider_name: provider.name().to_string(),
                        });
                    }
                    Err(e) => {
                        tracing::warn!(
                            provider = provider.name(),
                            attempt,
                            max_retries = self.max_retries,
                            error = %e,
                            "Provider submission attempt failed",
                        );
                        last_error = Some(e);
                        if attempt < self.max_retries {
                            tokio::time::sleep(self.base_delay * attempt).await;
                        }
                    }
                }
            }
        }

        Err(ProviderError::Exhausted(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no providers configured".to_string()),
        ))
    }

    /// Poll a task on the adapter that accepted it.
    pub async fn query_task(
        &self,
        provider_name: &str,
        task_id: &str,
    ) -> Result<TaskResult, ProviderError> {
        let provider = self
            .provider(provider_name)
            .ok_or_else(|| ProviderError::UnknownProvider(provider_name.to_string()))?;
        provider.query_task(task_id).await
    }
}
