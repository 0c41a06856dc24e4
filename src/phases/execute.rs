//! Execute phase: strictly sequential, dependency-ordered task execution.
//!
//! Nodes never run in parallel: each node's prompt is seeded with a rolling
//! window of the last completed nodes' summaries, and that carryover only
//! makes sense under sequential ordering. The loop visits every node
//! regardless of prior failures and returns a final tally; deciding what a
//! non-zero `failed_nodes` means is the caller's job.

use crate::dag::{flatten, ExecutionDag, FlatNode};
use crate::gateway::{
    delete_session_detached, reply_text, wait_params, AgentSpawnParams, Gateway, SessionScope,
    METHOD_AGENT, METHOD_AGENT_WAIT, SPAWN_TIMEOUT,
};
use crate::phases::prompts::{build_node_prompt, EXECUTE_SYSTEM_PROMPT};
use crate::report::parse_report;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(300);

/// How many completed-node summaries are carried into the next prompt.
pub const PRIOR_CONTEXT_WINDOW: usize = 5;

#[derive(Debug, Clone)]
pub struct ExecuteConfig {
    pub thinking: Option<String>,
    /// Client-side bound on one node's worker session.
    pub session_timeout: Duration,
}

impl Default for ExecuteConfig {
    fn default() -> Self {
        Self {
            thinking: None,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }
}

impl ExecuteConfig {
    pub fn with_thinking(mut self, thinking: String) -> Self {
        self.thinking = Some(thinking);
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }
}

/// Running tally of one execute-phase pass, updated in place and surfaced
/// through the progress callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionProgress {
    pub total_nodes: usize,
    pub completed_nodes: usize,
    pub failed_nodes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<String>,
}

/// Progress observer. Fired once per node with `current_node_id` set, and
/// once more at the end with it cleared.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(&ExecutionProgress) + Send);

enum NodeOutcome {
    Completed(Option<String>),
    Failed,
}

/// Execute the DAG one node at a time. Never fails: per-node failure only
/// increments `failed_nodes`, and the loop always visits every node.
pub async fn run_execute_phase(
    gateway: Arc<dyn Gateway>,
    scope: &SessionScope,
    dag: &ExecutionDag,
    config: &ExecuteConfig,
    mut on_progress: Option<ProgressFn<'_>>,
) -> ExecutionProgress {
    let nodes = flatten(dag);
    let mut progress = ExecutionProgress {
        total_nodes: nodes.len(),
        ..Default::default()
    };
    let mut prior_context: Vec<String> = Vec::new();

    for node in &nodes {
        progress.current_node_id = Some(node.id.clone());
        if let Some(callback) = on_progress.as_mut() {
            callback(&progress);
        }

        match run_node(&gateway, scope, node, &prior_context, config).await {
            NodeOutcome::Completed(summary) => {
                progress.completed_nodes += 1;
                if let Some(summary) = summary {
                    if prior_context.len() == PRIOR_CONTEXT_WINDOW {
                        prior_context.remove(0);
                    }
                    prior_context.push(summary);
                }
            }
            NodeOutcome::Failed => progress.failed_nodes += 1,
        }
    }

    progress.current_node_id = None;
    if let Some(callback) = on_progress.as_mut() {
        callback(&progress);
    }
    progress
}

async fn run_node(
    gateway: &Arc<dyn Gateway>,
    scope: &SessionScope,
    node: &FlatNode,
    prior_context: &[String],
    config: &ExecuteConfig,
) -> NodeOutcome {
    let run_id = scope.new_run_id("execute");
    let session_key = scope.node_key(&node.id);

    let mut spawn = AgentSpawnParams::new(
        build_node_prompt(node, prior_context),
        session_key.clone(),
        run_id.clone(),
    )
    .with_lane("execute")
    .with_extra_system_prompt(EXECUTE_SYSTEM_PROMPT)
    .with_label(node.name.clone())
    .with_spawned_by(scope.agent_id.clone())
    .with_timeout(config.session_timeout);
    if let Some(thinking) = &config.thinking {
        spawn = spawn.with_thinking(thinking.clone());
    }

    let params = match serde_json::to_value(&spawn) {
        Ok(params) => params,
        Err(err) => {
            tracing::warn!("node '{}' spawn params failed to serialize: {err}", node.id);
            return NodeOutcome::Failed;
        }
    };
    if let Err(err) = gateway.call(METHOD_AGENT, params, Some(SPAWN_TIMEOUT)).await {
        tracing::warn!("node '{}' spawn failed: {err:#}", node.id);
        return NodeOutcome::Failed;
    }

    let wait = gateway.call(
        METHOD_AGENT_WAIT,
        wait_params(&run_id, config.session_timeout),
        Some(config.session_timeout),
    );
    let outcome = match tokio::time::timeout(config.session_timeout, wait).await {
        Ok(Ok(value)) => {
            let reply = match reply_text(&value) {
                Some(text) => Some(text),
                // Best-effort transcript read; a failure here is swallowed.
                None => gateway
                    .read_latest_assistant_reply(&session_key)
                    .await
                    .ok()
                    .flatten(),
            };
            let summary = reply.map(|text| parse_report(&text, &node.name).summary);
            NodeOutcome::Completed(summary)
        }
        Ok(Err(err)) => {
            tracing::warn!("node '{}' wait failed: {err:#}", node.id);
            NodeOutcome::Failed
        }
        Err(_) => {
            tracing::warn!(
                "node '{}' timed out after {:?}; remote worker may still be running",
                node.id,
                config.session_timeout
            );
            NodeOutcome::Failed
        }
    };

    delete_session_detached(Arc::clone(gateway), session_key);
    outcome
}

#[cfg(test)]
#[path = "tests/execute_tests.rs"]
mod tests;
