//! Timeout-bounded attempts with exponential backoff on one chain entry.

use crate::agent::{AgentError, AnalysisAgent};
use crate::config::OrchestratorConfig;
use crate::prompt::PromptPayload;
use crate::tier::BackendConfig;
use crate::types::AnalysisResult;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    config: OrchestratorConfig,
}

impl RetryPolicy {
    pub(crate) fn new(config: &OrchestratorConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Call `agent` until it succeeds, fails permanently or retries run out.
    ///
    /// The attempt and all of its retries share one deadline. Hitting it
    /// ends the attempt with `Timeout`; the in-flight call is dropped, so a
    /// late answer can never be observed.
    pub(crate) async fn call(
        &self,
        agent: &dyn AnalysisAgent,
        prompt: &PromptPayload,
        backend: &BackendConfig,
    ) -> Result<AnalysisResult, AgentError> {
        let budget = self.config.attempt_timeout();
        let deadline = Instant::now() + budget;
        let timed_out = || AgentError::Timeout(budget.as_millis() as u64);

        let mut retry = 0;
        loop {
            let outcome = tokio::time::timeout_at(deadline, agent.generate(prompt, backend))
                .await
                .map_err(|_| timed_out())?;

            match outcome {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && retry < self.config.max_retries => {
                    let delay = self.config.backoff_delay(retry);
                    if Instant::now() + delay >= deadline {
                        tracing::debug!(
                            provider = %backend.provider,
                            model = %backend.model,
                            retries = retry,
                            error_class = e.class(),
                            "Attempt deadline leaves no room for another retry"
                        );
                        return Err(e);
                    }
                    tracing::debug!(
                        provider = %backend.provider,
                        model = %backend.model,
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        error_class = e.class(),
                        "Retrying transient backend failure"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
