//! Endpoint selection with scoped connection lifetime.
//!
//! The pool holds no live connections between calls: every acquisition
//! connects, hands the endpoints to the caller's closure, then closes them
//! again whatever the closure returned.

use crate::storage::config::{ConnectPolicy, StorageConfig};
use crate::storage::endpoint::{Endpoint, EndpointConfig};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::transport::{Connector, FtpConnector};
use futures::future::{join_all, BoxFuture};
use std::sync::Arc;
use tracing::debug;

/// Supplies the server list, re-evaluated on every acquisition.
pub trait EndpointSource: Send + Sync {
    fn endpoint_configs(&self) -> Vec<EndpointConfig>;
}

impl EndpointSource for Vec<EndpointConfig> {
    fn endpoint_configs(&self) -> Vec<EndpointConfig> {
        self.clone()
    }
}

impl EndpointSource for StorageConfig {
    fn endpoint_configs(&self) -> Vec<EndpointConfig> {
        StorageConfig::endpoint_configs(self)
    }
}

/// Server list computed by a closure, e.g. per-record credentials.
pub struct EndpointFn<F>(pub F);

impl<F> EndpointSource for EndpointFn<F>
where
    F: Fn() -> Vec<EndpointConfig> + Send + Sync,
{
    fn endpoint_configs(&self) -> Vec<EndpointConfig> {
        (self.0)()
    }
}

/// Builds and connects endpoints from a source.
#[derive(Clone)]
pub struct EndpointPool {
    source: Arc<dyn EndpointSource>,
    connector: Arc<dyn Connector>,
    policy: ConnectPolicy,
}

impl EndpointPool {
    /// Pool over `source`; `policy` overrides the connect settings of every
    /// server it yields.
    pub fn new(source: impl EndpointSource + 'static, policy: ConnectPolicy) -> Self {
        Self {
            source: Arc::new(source),
            connector: Arc::new(FtpConnector),
            policy,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.clone(), config.policy())
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn policy(&self) -> ConnectPolicy {
        self.policy
    }

    /// Current server list with the pool policy applied.
    pub fn endpoint_configs(&self) -> Vec<EndpointConfig> {
        self.source
            .endpoint_configs()
            .into_iter()
            .map(|mut cfg| {
                self.policy.apply(&mut cfg);
                cfg
            })
            .collect()
    }

    /// Build an endpoint for `config` and establish its connection.
    pub async fn build_and_connect(&self, config: EndpointConfig) -> StorageResult<Endpoint> {
        let mut endpoint = Endpoint::new(config, Arc::clone(&self.connector));
        endpoint.establish().await?;
        Ok(endpoint)
    }

    /// First server, in configured order, that accepts a connection.
    pub async fn primary_endpoint(&self) -> StorageResult<Endpoint> {
        for config in self.endpoint_configs() {
            let endpoint = self.build_and_connect(config).await?;
            if endpoint.connected() {
                return Ok(endpoint);
            }
            debug!(endpoint = %endpoint.label(), "skipping unreachable primary candidate");
        }
        Err(StorageError::NoEndpointAvailable)
    }

    /// Every server that accepts a connection, in configured order.
    ///
    /// All servers are attempted concurrently, each exactly once. If any
    /// attempt fails with a surfaced error, the connections already made are
    /// closed and the first such error (in configured order) is returned.
    pub async fn all_reachable_endpoints(&self) -> StorageResult<Vec<Endpoint>> {
        let attempts = join_all(self.endpoint_configs().into_iter().map(|config| async move {
            let mut endpoint = Endpoint::new(config, Arc::clone(&self.connector));
            let result = endpoint.establish().await;
            (endpoint, result)
        }))
        .await;

        let mut reachable = Vec::with_capacity(attempts.len());
        let mut first_error = None;
        for (endpoint, result) in attempts {
            match result {
                Ok(()) if endpoint.connected() => reachable.push(endpoint),
                Ok(()) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(err) = first_error {
            close_all(&mut reachable).await;
            return Err(err);
        }
        if reachable.is_empty() {
            return Err(StorageError::NoEndpointAvailable);
        }
        Ok(reachable)
    }

    /// Run `f` against the primary endpoint, then close it.
    pub async fn with_primary<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: for<'a> FnOnce(&'a mut Endpoint) -> BoxFuture<'a, StorageResult<T>>,
    {
        let mut endpoint = self.primary_endpoint().await?;
        let result = f(&mut endpoint).await;
        endpoint.close().await;
        result
    }

    /// Run `f` against all reachable endpoints, then close every endpoint
    /// still in the vector. An endpoint `f` removed (one lost to a panicked
    /// replication task, say) gets no QUIT; its socket is just dropped.
    pub async fn with_all<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: for<'a> FnOnce(&'a mut Vec<Endpoint>) -> BoxFuture<'a, StorageResult<T>>,
    {
        let mut endpoints = self.all_reachable_endpoints().await?;
        let result = f(&mut endpoints).await;
        close_all(&mut endpoints).await;
        result
    }
}

async fn close_all(endpoints: &mut [Endpoint]) {
    join_all(endpoints.iter_mut().map(Endpoint::close)).await;
}
