//! RPC boundary to the subagent gateway.
//!
//! The orchestrator never runs a model itself. It spawns ephemeral subagent
//! sessions through an abstract gateway, awaits their completion, and cleans
//! them up best-effort. The transport behind the trait (HTTP, IPC,
//! in-process) is out of scope.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Spawn one subagent turn. Non-blocking: resolves once the gateway accepts
/// the spawn, not when the turn completes.
pub const METHOD_AGENT: &str = "agent";

/// Block until a run completes or the gateway-side timeout fires.
pub const METHOD_AGENT_WAIT: &str = "agent.wait";

/// Best-effort session cleanup.
pub const METHOD_SESSIONS_DELETE: &str = "sessions.delete";

/// Client-side bound on spawn acceptance.
pub const SPAWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Client-side bound on detached cleanup calls.
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Abstract RPC boundary for spawning and awaiting subagent sessions.
///
/// A timeout elapsing bounds the client-side wait only; the remote worker is
/// not guaranteed to halt when the client gives up.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Issue one gateway RPC and return its JSON result.
    async fn call(&self, method: &str, params: Value, timeout: Option<Duration>) -> Result<Value>;

    /// Read the most recent assistant reply in a session, if any.
    async fn read_latest_assistant_reply(&self, session_key: &str) -> Result<Option<String>>;
}

/// Parameters for an `"agent"` spawn call.
///
/// Spawns carry an idempotency key so a retried spawn is deduplicated by the
/// gateway, not by this subsystem.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpawnParams {
    pub message: String,
    pub session_key: String,
    pub idempotency_key: String,
    /// Always false: replies are collected by the orchestrator, never
    /// delivered to a channel.
    pub deliver: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Worker-side turn budget in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawned_by: Option<String>,
}

impl AgentSpawnParams {
    pub fn new(message: String, session_key: String, idempotency_key: String) -> Self {
        Self {
            message,
            session_key,
            idempotency_key,
            deliver: false,
            lane: None,
            extra_system_prompt: None,
            thinking: None,
            model: None,
            timeout: None,
            label: None,
            spawned_by: None,
        }
    }

    pub fn with_lane(mut self, lane: &str) -> Self {
        self.lane = Some(lane.to_string());
        self
    }

    pub fn with_extra_system_prompt(mut self, prompt: &str) -> Self {
        self.extra_system_prompt = Some(prompt.to_string());
        self
    }

    pub fn with_thinking(mut self, thinking: String) -> Self {
        self.thinking = Some(thinking);
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.as_secs());
        self
    }

    pub fn with_label(mut self, label: String) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_spawned_by(mut self, spawned_by: String) -> Self {
        self.spawned_by = Some(spawned_by);
        self
    }
}

/// Namespaces every run and session identifier minted for one workflow run.
///
/// Keys embed workflow, agent, and phase so concurrent workflows never
/// collide without needing a shared registry or lock.
#[derive(Debug, Clone)]
pub struct SessionScope {
    pub workflow_id: String,
    pub agent_id: String,
}

impl SessionScope {
    pub fn new(workflow_id: String, agent_id: String) -> Self {
        Self {
            workflow_id,
            agent_id,
        }
    }

    /// Scope for a brand-new workflow run.
    pub fn fresh(agent_id: &str) -> Self {
        Self {
            workflow_id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
        }
    }

    pub fn review_key(&self, iteration: u32) -> String {
        format!(
            "agent:{}:workflow:{}:review:{}",
            self.agent_id, self.workflow_id, iteration
        )
    }

    pub fn discovery_key(&self, question_index: usize) -> String {
        format!(
            "agent:{}:workflow:{}:discovery:{}",
            self.agent_id, self.workflow_id, question_index
        )
    }

    pub fn node_key(&self, node_id: &str) -> String {
        format!(
            "agent:{}:workflow:{}:node:{}",
            self.agent_id, self.workflow_id, node_id
        )
    }

    /// Fresh run id, also used as the spawn's idempotency key.
    pub fn new_run_id(&self, phase: &str) -> String {
        format!("{}-{}-{}", phase, self.workflow_id, Uuid::new_v4())
    }
}

/// Parameters for an `"agent.wait"` call.
pub fn wait_params(run_id: &str, timeout: Duration) -> Value {
    json!({
        "runId": run_id,
        "timeoutMs": timeout.as_millis() as u64,
    })
}

/// Extract the assistant text from an `agent.wait` result.
///
/// The gateway resolves waits with either a bare string or an object whose
/// `reply` (or `text`) field carries the assistant output.
pub fn reply_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map
            .get("reply")
            .or_else(|| map.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Delete a session without blocking the workflow.
///
/// The cleanup task is detached and never joined; its outcome is logged only,
/// so a failed delete cannot affect returned results.
pub fn delete_session_detached(gateway: Arc<dyn Gateway>, session_key: String) {
    tokio::spawn(async move {
        let params = json!({
            "sessionKey": &session_key,
            "deleteTranscript": true,
        });
        if let Err(err) = gateway
            .call(METHOD_SESSIONS_DELETE, params, Some(CLEANUP_TIMEOUT))
            .await
        {
            tracing::debug!("session cleanup failed for {session_key}: {err:#}");
        }
    });
}
