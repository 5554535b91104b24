//! Control-endpoint client
//!
//! Speaks the out-of-band protocol to the backend agent. Intent rides in the
//! `gci` request header: `ch` asks the agent to report heap usage (decimal
//! bytes in the body), `gc` asks it to collect.

use std::time::Duration;

use crate::{
    error::{ProxyError, Result},
    upstream::build_client,
};

/// Header naming the control protocol.
pub const GCI_HEADER: &str = "gci";
/// Command asking the agent to report heap usage.
pub const CHECK_HEAP_COMMAND: &str = "ch";
/// Command asking the agent to collect.
pub const COLLECT_COMMAND: &str = "gc";

/// Client for the agent's control endpoint.
///
/// Holds its own connection pool so control calls never queue behind
/// proxied traffic.
pub struct AgentClient {
    client: reqwest::Client,
    endpoint: String,
}

impl AgentClient {
    /// Create a client for the control endpoint at `endpoint`.
    ///
    /// # Errors
    /// Returns [`ProxyError::InvalidConfig`] if the transport cannot be
    /// built.
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint,
        })
    }

    /// Ask the agent for current heap usage in bytes.
    ///
    /// # Errors
    /// Fails fast on transport errors, non-2xx statuses and bodies that are
    /// not a decimal integer; the caller aborts the cycle and retries at the
    /// next tick.
    pub async fn check_heap(&self) -> Result<i64> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(GCI_HEADER, CHECK_HEAP_COMMAND)
            .send()
            .await
            .map_err(|e| ProxyError::Agent {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::AgentStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| ProxyError::Agent {
            reason: format!("failed to read heap report: {e}"),
        })?;
        body.trim()
            .parse::<i64>()
            .map_err(|_| ProxyError::MalformedHeapReport { body })
    }

    /// Ask the agent to collect. The call returns once the collection is
    /// acknowledged with a 2xx status.
    ///
    /// # Errors
    /// Fails on transport errors and non-2xx statuses.
    pub async fn collect(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(GCI_HEADER, COLLECT_COMMAND)
            .send()
            .await
            .map_err(|e| ProxyError::Agent {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::AgentStatus {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_heap_reports_transport_failure() {
        let agent =
            AgentClient::new("http://127.0.0.1:1".to_string(), Duration::from_secs(1))
                .expect("client");
        let err = agent.check_heap().await.err().expect("unreachable agent answered");
        assert!(matches!(err, ProxyError::Agent { .. }));
    }

    #[tokio::test]
    async fn test_collect_reports_transport_failure() {
        let agent =
            AgentClient::new("http://127.0.0.1:1".to_string(), Duration::from_secs(1))
                .expect("client");
        let err = agent.collect().await.err().expect("unreachable agent answered");
        assert!(matches!(err, ProxyError::Agent { .. }));
    }
}
