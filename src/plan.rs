//! Workflow plan types and revision merging.
//!
//! A plan arrives from an upstream planner or human, gets refined across
//! review iterations, and then drives discovery. Revisions are merged
//! field-wise and never reverted: a field absent from a revision keeps its
//! current value, and array fields are replaced wholesale.

use serde::{Deserialize, Serialize};

/// Structured intent subject to iterative review before execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPlan {
    pub intent: String,
    pub scope: String,
    #[serde(default)]
    pub discovery_questions: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    /// Free-form complexity estimate (LLM-authored, deliberately untyped).
    #[serde(default)]
    pub estimated_complexity: String,
}

impl WorkflowPlan {
    /// Plan as pretty JSON for embedding in prompts.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Partial plan carried inside a reviewer reply.
///
/// Every field is optional; only present fields overwrite the current plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlanRevision {
    pub intent: Option<String>,
    pub scope: Option<String>,
    pub discovery_questions: Option<Vec<String>>,
    pub constraints: Option<Vec<String>>,
    pub success_criteria: Option<Vec<String>>,
    pub estimated_complexity: Option<String>,
}

/// Merge a revision into the plan in place.
///
/// Array fields replace wholesale, never element-wise.
pub fn apply_revision(plan: &mut WorkflowPlan, revision: &PlanRevision) {
    if let Some(intent) = &revision.intent {
        plan.intent = intent.clone();
    }
    if let Some(scope) = &revision.scope {
        plan.scope = scope.clone();
    }
    if let Some(questions) = &revision.discovery_questions {
        plan.discovery_questions = questions.clone();
    }
    if let Some(constraints) = &revision.constraints {
        plan.constraints = constraints.clone();
    }
    if let Some(criteria) = &revision.success_criteria {
        plan.success_criteria = criteria.clone();
    }
    if let Some(complexity) = &revision.estimated_complexity {
        plan.estimated_complexity = complexity.clone();
    }
}

/// Append-only record of one review loop round.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewIteration {
    pub iteration: u32,
    pub approved: bool,
    pub feedback: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggested_changes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_plan: Option<PlanRevision>,
}
