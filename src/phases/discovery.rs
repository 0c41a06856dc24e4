//! Discovery phase: bounded-parallel investigation of open questions.
//!
//! Questions run in sequential batches of at most `max_parallel` workers; a
//! batch's join barrier must fully resolve before the next batch spawns.
//! Every worker is disposable: its session is created just before the spawn
//! and deleted best-effort after its barrier resolves.

use crate::barrier::{join_entries, BarrierEntry, BarrierOutcome, WaitStatus};
use crate::gateway::{
    delete_session_detached, AgentSpawnParams, Gateway, SessionScope, METHOD_AGENT, SPAWN_TIMEOUT,
};
use crate::phases::prompts::{build_discovery_prompt, short_label, DISCOVERY_SYSTEM_PROMPT};
use crate::plan::WorkflowPlan;
use crate::report::parse_report;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_PARALLEL: usize = 3;
pub const DEFAULT_QUESTION_TIMEOUT: Duration = Duration::from_secs(120);

/// Cap on `key_insights` carried into the final result.
pub const MAX_KEY_INSIGHTS: usize = 10;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Strict per-batch concurrency bound.
    pub max_parallel: usize,
    /// Client-side bound on each worker.
    pub question_timeout: Duration,
    pub model: Option<String>,
    pub thinking: Option<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            question_timeout: DEFAULT_QUESTION_TIMEOUT,
            model: None,
            thinking: None,
        }
    }
}

impl DiscoveryConfig {
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_question_timeout(mut self, timeout: Duration) -> Self {
        self.question_timeout = timeout;
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_thinking(mut self, thinking: String) -> Self {
        self.thinking = Some(thinking);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStatus {
    Ok,
    Timeout,
    Error,
}

/// Outcome of one investigated question. Append-only; results preserve
/// question order regardless of worker completion order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    pub question: String,
    pub run_id: String,
    pub session_key: String,
    pub status: DiscoveryStatus,
    pub findings: String,
    pub key_insights: Vec<String>,
}

/// One question's spawn attempt within a batch.
enum Slot {
    /// Spawn accepted; awaiting the barrier.
    InFlight(BarrierEntry),
    /// Spawn failed synchronously; never entered the barrier.
    SpawnFailed(DiscoveryResult),
}

/// Investigate every open question in the plan. Never fails: per-question
/// failure surfaces as an `error`/`timeout` status in the returned results.
pub async fn run_discovery_phase(
    gateway: Arc<dyn Gateway>,
    scope: &SessionScope,
    plan: &WorkflowPlan,
    config: &DiscoveryConfig,
) -> Vec<DiscoveryResult> {
    if plan.discovery_questions.is_empty() {
        return Vec::new();
    }
    let max_parallel = config.max_parallel.max(1);
    let questions: Vec<(usize, &String)> = plan.discovery_questions.iter().enumerate().collect();
    let mut results = Vec::with_capacity(questions.len());

    for batch in questions.chunks(max_parallel) {
        let mut slots = Vec::with_capacity(batch.len());
        for (question_index, question) in batch {
            slots.push(spawn_question(&gateway, scope, plan, config, *question_index, question).await);
        }

        let entries: Vec<BarrierEntry> = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::InFlight(entry) => Some(entry.clone()),
                Slot::SpawnFailed(_) => None,
            })
            .collect();
        let mut outcomes = join_entries(&gateway, entries, config.question_timeout)
            .await
            .into_iter();

        for slot in slots {
            match slot {
                Slot::SpawnFailed(result) => results.push(result),
                Slot::InFlight(entry) => {
                    let outcome = outcomes.next().unwrap_or_else(|| BarrierOutcome {
                        entry: entry.clone(),
                        status: WaitStatus::Failed,
                        reply: None,
                    });
                    delete_session_detached(
                        Arc::clone(&gateway),
                        outcome.entry.session_key.clone(),
                    );
                    results.push(result_from_outcome(outcome));
                }
            }
        }
    }

    results
}

async fn spawn_question(
    gateway: &Arc<dyn Gateway>,
    scope: &SessionScope,
    plan: &WorkflowPlan,
    config: &DiscoveryConfig,
    question_index: usize,
    question: &str,
) -> Slot {
    let run_id = scope.new_run_id("discovery");
    let session_key = scope.discovery_key(question_index);

    let mut spawn = AgentSpawnParams::new(
        build_discovery_prompt(question, plan),
        session_key.clone(),
        run_id.clone(),
    )
    .with_lane("discovery")
    .with_extra_system_prompt(DISCOVERY_SYSTEM_PROMPT)
    .with_label(short_label(question))
    .with_spawned_by(scope.agent_id.clone())
    .with_timeout(config.question_timeout);
    if let Some(model) = &config.model {
        spawn = spawn.with_model(model.clone());
    }
    if let Some(thinking) = &config.thinking {
        spawn = spawn.with_thinking(thinking.clone());
    }

    let params = match serde_json::to_value(&spawn) {
        Ok(params) => params,
        Err(err) => {
            return Slot::SpawnFailed(DiscoveryResult {
                question: question.to_string(),
                run_id,
                session_key,
                status: DiscoveryStatus::Error,
                findings: format!("spawn params failed to serialize: {err}"),
                key_insights: Vec::new(),
            })
        }
    };

    match gateway.call(METHOD_AGENT, params, Some(SPAWN_TIMEOUT)).await {
        Ok(_) => Slot::InFlight(BarrierEntry {
            run_id,
            session_key,
            label: question.to_string(),
        }),
        Err(err) => {
            tracing::warn!("discovery spawn failed for '{}': {err:#}", short_label(question));
            Slot::SpawnFailed(DiscoveryResult {
                question: question.to_string(),
                run_id,
                session_key,
                status: DiscoveryStatus::Error,
                findings: format!("spawn failed: {err:#}"),
                key_insights: Vec::new(),
            })
        }
    }
}

fn result_from_outcome(outcome: BarrierOutcome) -> DiscoveryResult {
    let status = match outcome.status {
        WaitStatus::Completed => DiscoveryStatus::Ok,
        WaitStatus::TimedOut => DiscoveryStatus::Timeout,
        WaitStatus::Failed => DiscoveryStatus::Error,
    };
    let report = parse_report(outcome.reply.as_deref().unwrap_or(""), &outcome.entry.label);
    let mut key_insights = report.findings;
    key_insights.truncate(MAX_KEY_INSIGHTS);
    DiscoveryResult {
        question: outcome.entry.label,
        run_id: outcome.entry.run_id,
        session_key: outcome.entry.session_key,
        status,
        findings: report.summary,
        key_insights,
    }
}

#[cfg(test)]
#[path = "tests/discovery_tests.rs"]
mod tests;
