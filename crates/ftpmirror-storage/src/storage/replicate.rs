//! Replays write and delete batches on every reachable server.
//!
//! One tokio task per endpoint, all joined before returning. Inside a task
//! the batch is applied sequentially in queue order and the first failure
//! ends that endpoint's run; other endpoints are unaffected. The batch is
//! cleared once every task has finished. If no endpoint could be acquired
//! the batch is left untouched.

use crate::storage::batch::{DeleteBatch, WriteBatch};
use crate::storage::endpoint::{Endpoint, EndpointLabel};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::hooks::{FlushHooks, PathResolver};
use crate::storage::pool::EndpointPool;
use futures::future::join_all;
use futures::FutureExt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one endpoint's replay.
#[derive(Debug)]
pub struct EndpointOutcome {
    pub endpoint: EndpointLabel,
    pub result: StorageResult<()>,
}

/// Per-endpoint outcomes of one flush, in pool order.
#[derive(Debug, Default)]
pub struct ReplicationReport {
    pub outcomes: Vec<EndpointOutcome>,
}

impl ReplicationReport {
    /// True when every endpoint succeeded (vacuously for an empty flush).
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointLabel> {
        self.outcomes.iter().map(|o| &o.endpoint)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&EndpointLabel, &StorageError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.endpoint, e)))
    }

    /// The first failure, as `StorageError::Replica` naming its endpoint.
    pub fn into_result(self) -> StorageResult<()> {
        match self.outcomes.into_iter().find(|o| o.result.is_err()) {
            Some(EndpointOutcome {
                endpoint,
                result: Err(err),
            }) => Err(StorageError::Replica {
                endpoint,
                message: err.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Upload every queued file to every reachable server.
///
/// An empty batch opens no connection but still runs the hook.
pub async fn flush_writes(
    pool: &EndpointPool,
    batch: &mut WriteBatch,
    resolver: &dyn PathResolver,
    hooks: &dyn FlushHooks,
) -> StorageResult<ReplicationReport> {
    if batch.is_empty() {
        hooks.after_flush_writes();
        return Ok(ReplicationReport::default());
    }

    let pairs: Arc<Vec<(PathBuf, String)>> = Arc::new(
        batch
            .iter()
            .map(|(style, file)| (file.path().to_path_buf(), resolver.resolve(style)))
            .collect(),
    );
    info!(files = pairs.len(), "flushing writes");

    let report = pool
        .with_all(move |endpoints| {
            fan_out(endpoints, move |mut endpoint| {
                let pairs = Arc::clone(&pairs);
                async move {
                    let result = endpoint.put_files(&pairs).await;
                    (endpoint, result)
                }
            })
            .map(Ok)
            .boxed()
        })
        .await?;

    hooks.after_flush_writes();
    batch.clear();
    Ok(report)
}

/// Delete every queued path on every reachable server, pruning emptied
/// parent directories unless `keep_empty_directories`.
pub async fn flush_deletes(
    pool: &EndpointPool,
    batch: &mut DeleteBatch,
    keep_empty_directories: bool,
) -> StorageResult<ReplicationReport> {
    if batch.is_empty() {
        return Ok(ReplicationReport::default());
    }

    let paths: Arc<Vec<String>> = Arc::new(batch.as_slice().to_vec());
    info!(files = paths.len(), "flushing deletes");

    let report = pool
        .with_all(move |endpoints| {
            fan_out(endpoints, move |mut endpoint| {
                let paths = Arc::clone(&paths);
                async move {
                    let result = endpoint.delete_files(&paths, keep_empty_directories).await;
                    (endpoint, result)
                }
            })
            .map(Ok)
            .boxed()
        })
        .await?;

    batch.clear();
    Ok(report)
}

/// Move each endpoint into its own task running `job`, wait for all of them
/// and put the endpoints back. An endpoint whose task panicked is lost: it
/// is not returned to the caller, so it is never sent QUIT and its
/// connection only closes when the socket is dropped.
async fn fan_out<F, Fut>(endpoints: &mut Vec<Endpoint>, job: F) -> ReplicationReport
where
    F: Fn(Endpoint) -> Fut,
    Fut: Future<Output = (Endpoint, StorageResult<()>)> + Send + 'static,
{
    let labels: Vec<EndpointLabel> = endpoints.iter().map(|e| e.label().clone()).collect();
    let handles: Vec<_> = endpoints.drain(..).map(|e| tokio::spawn(job(e))).collect();

    let mut outcomes = Vec::with_capacity(labels.len());
    for (endpoint, joined) in labels.into_iter().zip(join_all(handles).await) {
        let result = match joined {
            Ok((returned, result)) => {
                endpoints.push(returned);
                result
            }
            Err(e) => Err(StorageError::Replica {
                endpoint: endpoint.clone(),
                message: format!("replication task aborted: {}", e),
            }),
        };
        if let Err(err) = &result {
            warn!(endpoint = %endpoint, error = %err, "replication failed");
        }
        outcomes.push(EndpointOutcome { endpoint, result });
    }
    ReplicationReport { outcomes }
}
