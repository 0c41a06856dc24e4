//! Plan review loop.
//!
//! Submits the current plan to a reviewer subagent and merges revisions until
//! a structured approval arrives or the iteration budget runs out. The loop
//! fails open: a silent, erroring, or free-form reviewer is recorded as an
//! auto-approved round and can never block the workflow.

use crate::gateway::{
    delete_session_detached, reply_text, wait_params, AgentSpawnParams, Gateway, SessionScope,
    METHOD_AGENT, METHOD_AGENT_WAIT, SPAWN_TIMEOUT,
};
use crate::phases::prompts::{build_review_prompt, REVIEW_SYSTEM_PROMPT};
use crate::phases::review_schema::{classify_review_reply, ReviewParse};
use crate::plan::{apply_revision, ReviewIteration, WorkflowPlan};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_ITERATIONS: u32 = 2;
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Distinct agent to review under; defaults to the workflow's own agent.
    pub reviewer_agent_id: Option<String>,
    pub max_iterations: u32,
    pub thinking: Option<String>,
    /// Client-side bound on one reviewer turn.
    pub turn_timeout: Duration,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            reviewer_agent_id: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            thinking: None,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
        }
    }
}

impl ReviewConfig {
    pub fn with_reviewer_agent_id(mut self, agent_id: String) -> Self {
        self.reviewer_agent_id = Some(agent_id);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_thinking(mut self, thinking: String) -> Self {
        self.thinking = Some(thinking);
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }
}

/// Reviewed plan plus the append-only iteration log.
#[derive(Debug, Clone)]
pub struct PlanReviewOutcome {
    pub plan: WorkflowPlan,
    pub iterations: Vec<ReviewIteration>,
}

/// Run the review loop. Never fails: every failure mode auto-approves.
///
/// Each iteration gets a fresh session key; no context is reused across
/// rounds. A reviewer's `revisedPlan` merges into the
/// plan regardless of approval; only a structured `approved: true` reply ends
/// the loop early.
pub async fn run_review_phase(
    gateway: Arc<dyn Gateway>,
    scope: &SessionScope,
    mut plan: WorkflowPlan,
    config: &ReviewConfig,
) -> PlanReviewOutcome {
    let reviewer_scope = SessionScope::new(
        scope.workflow_id.clone(),
        config
            .reviewer_agent_id
            .clone()
            .unwrap_or_else(|| scope.agent_id.clone()),
    );

    let mut iterations = Vec::new();
    let mut structured_approval = false;

    for iteration in 1..=config.max_iterations {
        let session_key = reviewer_scope.review_key(iteration);
        let run_id = reviewer_scope.new_run_id("review");

        let mut spawn = AgentSpawnParams::new(
            build_review_prompt(&plan, iteration, config.max_iterations),
            session_key.clone(),
            run_id.clone(),
        )
        .with_lane("review")
        .with_extra_system_prompt(REVIEW_SYSTEM_PROMPT)
        .with_label(format!("plan review #{iteration}"))
        .with_spawned_by(scope.agent_id.clone())
        .with_timeout(config.turn_timeout);
        if let Some(thinking) = &config.thinking {
            spawn = spawn.with_thinking(thinking.clone());
        }

        let reply = run_review_turn(&gateway, &run_id, &session_key, spawn, config.turn_timeout)
            .await
            .unwrap_or_default();
        delete_session_detached(Arc::clone(&gateway), session_key);

        match classify_review_reply(&reply) {
            ReviewParse::Structured(review) => {
                if let Some(revision) = &review.revised_plan {
                    apply_revision(&mut plan, revision);
                }
                let approved = review.approved;
                iterations.push(ReviewIteration {
                    iteration,
                    approved,
                    feedback: review.feedback,
                    suggested_changes: review.suggested_changes,
                    revised_plan: review.revised_plan,
                });
                if approved {
                    structured_approval = true;
                    break;
                }
            }
            ReviewParse::RawText(text) => {
                tracing::debug!("review round {iteration} returned non-JSON, auto-approving");
                iterations.push(ReviewIteration {
                    iteration,
                    approved: true,
                    feedback: text,
                    suggested_changes: Vec::new(),
                    revised_plan: None,
                });
            }
            ReviewParse::Empty => {
                tracing::debug!("review round {iteration} returned no output, auto-approving");
                iterations.push(ReviewIteration {
                    iteration,
                    approved: true,
                    feedback: "auto-approved: reviewer returned no output".to_string(),
                    suggested_changes: Vec::new(),
                    revised_plan: None,
                });
            }
        }
    }

    if !structured_approval {
        tracing::warn!(
            "review budget exhausted after {} iteration(s) without structured approval, \
             proceeding with current plan",
            iterations.len()
        );
    }

    PlanReviewOutcome { plan, iterations }
}

/// One isolated reviewer turn: spawn, wait, collect the reply.
///
/// Any failure along the way resolves to `None` and is handled by the
/// caller's fail-open path.
async fn run_review_turn(
    gateway: &Arc<dyn Gateway>,
    run_id: &str,
    session_key: &str,
    spawn: AgentSpawnParams,
    timeout: Duration,
) -> Option<String> {
    let params = serde_json::to_value(&spawn).ok()?;
    if let Err(err) = gateway.call(METHOD_AGENT, params, Some(SPAWN_TIMEOUT)).await {
        tracing::warn!("review spawn failed (run {run_id}): {err:#}");
        return None;
    }

    let wait = gateway.call(METHOD_AGENT_WAIT, wait_params(run_id, timeout), Some(timeout));
    match tokio::time::timeout(timeout, wait).await {
        Ok(Ok(value)) => match reply_text(&value) {
            Some(text) => Some(text),
            // Wait resolved without inline text; fall back to the transcript.
            None => gateway
                .read_latest_assistant_reply(session_key)
                .await
                .ok()
                .flatten(),
        },
        Ok(Err(err)) => {
            tracing::warn!("review wait failed (run {run_id}): {err:#}");
            None
        }
        Err(_) => {
            tracing::warn!("review turn timed out (run {run_id}) after {timeout:?}");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/review_tests.rs"]
mod tests;
