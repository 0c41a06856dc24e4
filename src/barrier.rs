//! Join barrier over in-flight subagent runs.
//!
//! Awaits a fixed set of independent `agent.wait` calls, each bounded by its
//! own client-side timeout, without letting a slow member block fast ones.
//! Output order always matches input order, so callers zip outcomes back to
//! their originating question or node by position rather than arrival time.

use crate::gateway::{reply_text, wait_params, Gateway, METHOD_AGENT_WAIT};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Handle to one in-flight subagent run.
#[derive(Debug, Clone)]
pub struct BarrierEntry {
    pub run_id: String,
    pub session_key: String,
    pub label: String,
}

/// How one barrier member resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Completed,
    TimedOut,
    Failed,
}

/// One barrier member's resolution, positionally aligned with the input.
#[derive(Debug, Clone)]
pub struct BarrierOutcome {
    pub entry: BarrierEntry,
    pub status: WaitStatus,
    pub reply: Option<String>,
}

/// Await every entry concurrently.
///
/// A member that times out or errors resolves to `TimedOut`/`Failed` without
/// affecting its siblings. The returned vector has the same length and order
/// as `entries`. A timeout is client-side only: the remote worker may still
/// be running after the member resolves.
pub async fn join_entries(
    gateway: &Arc<dyn Gateway>,
    entries: Vec<BarrierEntry>,
    timeout: Duration,
) -> Vec<BarrierOutcome> {
    let waits = entries.into_iter().map(|entry| {
        let gateway = Arc::clone(gateway);
        async move {
            let params = wait_params(&entry.run_id, timeout);
            let call = gateway.call(METHOD_AGENT_WAIT, params, Some(timeout));
            match tokio::time::timeout(timeout, call).await {
                Ok(Ok(value)) => BarrierOutcome {
                    reply: reply_text(&value),
                    status: WaitStatus::Completed,
                    entry,
                },
                Ok(Err(err)) => {
                    tracing::warn!(
                        "wait failed for '{}' (run {}): {err:#}",
                        entry.label,
                        entry.run_id
                    );
                    BarrierOutcome {
                        entry,
                        status: WaitStatus::Failed,
                        reply: None,
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        "wait timed out for '{}' (run {}) after {:?}",
                        entry.label,
                        entry.run_id,
                        timeout
                    );
                    BarrierOutcome {
                        entry,
                        status: WaitStatus::TimedOut,
                        reply: None,
                    }
                }
            }
        }
    });
    join_all(waits).await
}
