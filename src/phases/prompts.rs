//! System prompts and prompt builders for the three workflow phases.

use crate::dag::FlatNode;
use crate::plan::WorkflowPlan;

pub const REVIEW_SYSTEM_PROMPT: &str = "You are a plan reviewer. Respond with a single JSON object \
and nothing else: {\"approved\": bool, \"feedback\": string, \"suggestedChanges\": [string], \
\"revisedPlan\": {partial plan with only the fields you want to change}}. \
Omit suggestedChanges and revisedPlan when you have none.";

pub const DISCOVERY_SYSTEM_PROMPT: &str = "You are an investigator answering one question before an \
execution plan is finalized. Be concrete and cite what you inspected. End your reply with a fenced \
```json block: {\"summary\": string, \"findings\": [string], \"decisions\": [string], \
\"blockers\": [string], \"artifacts\": [string]}.";

pub const EXECUTE_SYSTEM_PROMPT: &str = "You are executing one task from a larger plan. Do the work, \
then end your reply with a fenced ```json block: {\"summary\": string, \"findings\": [string], \
\"decisions\": [string], \"blockers\": [string], \"artifacts\": [string]}. The summary is carried \
forward as context for later tasks, so state what you did and anything a successor must know.";

/// Labels are free-form LLM text; keep them short for gateway dashboards.
pub(crate) fn short_label(text: &str) -> String {
    const MAX_CHARS: usize = 80;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{head}…")
    }
}

pub fn build_review_prompt(plan: &WorkflowPlan, iteration: u32, max_iterations: u32) -> String {
    format!(
        "Review this workflow plan (round {iteration} of {max_iterations}).\n\n\
         Check that the intent is actionable, the scope is bounded, the discovery questions \
         cover the real unknowns, and the success criteria are verifiable.\n\n\
         Current plan:\n```json\n{}\n```",
        plan.to_prompt_json()
    )
}

pub fn build_discovery_prompt(question: &str, plan: &WorkflowPlan) -> String {
    format!(
        "Investigate the following open question and report back.\n\n\
         Question: {question}\n\n\
         Workflow intent: {}\nScope: {}\n",
        plan.intent, plan.scope
    )
}

pub fn build_node_prompt(node: &FlatNode, prior_context: &[String]) -> String {
    let mut prompt = format!(
        "Execute this task.\n\nPhase: {}\nTask: {}\nStep: {} ({})\n",
        node.phase_name, node.task_name, node.name, node.id
    );
    if let Some(objective) = &node.objective {
        prompt.push_str(&format!("Objective: {objective}\n"));
    }
    if let Some(criteria) = &node.acceptance_criteria {
        prompt.push_str(&format!("Acceptance criteria: {criteria}\n"));
    }
    if !prior_context.is_empty() {
        prompt.push_str("\nContext from recently completed steps:\n");
        for (i, summary) in prior_context.iter().enumerate() {
            prompt.push_str(&format!("{}. {summary}\n", i + 1));
        }
    }
    prompt
}

#[cfg(test)]
#[path = "tests/prompts_tests.rs"]
mod tests;
