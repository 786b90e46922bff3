//! Named registry over provider clients, with aggregated shutdown and
//! concurrent health checking. Retry/backoff and health-check polling
//! are configuration shapes only: the looping itself is left to the
//! caller (or a higher-level scheduler), matching how this family keeps
//! policy and mechanism separate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use conduit_core::Context;
use futures::future::join_all;
use tokio::sync::RwLock;

use crate::client::Client;
use crate::error::ClientError;

/// Backoff policy a caller should apply around retried calls to a
/// registered client. `ClientManager` stores this alongside the client
/// but does not itself retry anything.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Health-check cadence a caller should apply when polling a registered
/// client in the background.
#[derive(Debug, Clone, Copy)]
pub struct HealthCheckConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
        }
    }
}

struct Registration {
    client: Arc<dyn Client>,
    #[allow(dead_code)]
    retry: RetryConfig,
    health: HealthCheckConfig,
}

/// Keeps named provider clients reachable by callers that only know a
/// logical name (`"primary"`, `"fallback"`), and offers aggregated
/// lifecycle operations across all of them.
#[derive(Default)]
pub struct ClientManager {
    clients: RwLock<HashMap<String, Registration>>,
}

impl ClientManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) a client under `name`.
    pub async fn register_client(
        &self,
        name: impl Into<String>,
        client: Arc<dyn Client>,
        retry: RetryConfig,
        health: HealthCheckConfig,
    ) {
        self.clients.write().await.insert(
            name.into(),
            Registration {
                client,
                retry,
                health,
            },
        );
    }

    /// Look up a registered client by name.
    pub async fn get_client(&self, name: &str) -> Option<Arc<dyn Client>> {
        self.clients.read().await.get(name).map(|r| r.client.clone())
    }

    /// The configured retry policy for a registered client, if any.
    pub async fn retry_config(&self, name: &str) -> Option<RetryConfig> {
        self.clients.read().await.get(name).map(|r| r.retry)
    }

    /// The configured health-check cadence for a registered client, if
    /// any.
    pub async fn health_check_config(&self, name: &str) -> Option<HealthCheckConfig> {
        self.clients.read().await.get(name).map(|r| r.health)
    }

    /// Close every registered client, collecting every failure rather
    /// than stopping at the first one.
    pub async fn close_all(&self) -> Result<(), ClientError> {
        let clients: Vec<_> = self
            .clients
            .read()
            .await
            .values()
            .map(|r| r.client.clone())
            .collect();

        let results = join_all(clients.iter().map(|c| c.close())).await;
        let errors: Vec<String> = results
            .into_iter()
            .filter_map(Result::err)
            .map(|e| e.to_string())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Other(errors.join("; ").into()))
        }
    }

    /// Run every registered client's health check concurrently, each
    /// bounded by its own configured timeout, and return the outcome
    /// per name. A missing entry means the check succeeded; an entry
    /// present means that client's check failed or timed out.
    pub async fn health_check(&self, ctx: &Context) -> HashMap<String, Option<ClientError>> {
        let entries: Vec<(String, Arc<dyn Client>, Duration)> = self
            .clients
            .read()
            .await
            .iter()
            .map(|(name, reg)| (name.clone(), reg.client.clone(), reg.health.timeout))
            .collect();

        let checks = entries.into_iter().map(|(name, client, timeout)| {
            let ctx = ctx.child();
            async move {
                let result = tokio::time::timeout(timeout, client.health_check(&ctx)).await;
                let outcome = match result {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e),
                    Err(_) => Some(ClientError::Timeout(timeout)),
                };
                (name, outcome)
            }
        });

        join_all(checks).await.into_iter().collect()
    }
}
