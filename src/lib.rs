//! Workflow orchestration over ephemeral LLM subagent sessions.
//!
//! Turns a high-level goal into executed work through three sequential
//! phases: plan **review** (validate and refine a plan with a reviewer
//! worker), **discovery** (bounded-parallel investigation of open
//! questions), and **execute** (strictly sequential, dependency-ordered task
//! execution with rolling context carryover).
//!
//! Workers are spawned through the abstract [`gateway::Gateway`] boundary and
//! their output is treated as unreliable by construction: every phase fails
//! open, and failure surfaces only through returned status fields, never as
//! errors to the caller.

pub mod barrier;
pub mod dag;
pub mod gateway;
pub mod phases;
pub mod plan;
pub mod report;

pub use barrier::{join_entries, BarrierEntry, BarrierOutcome, WaitStatus};
pub use dag::{flatten, DagPhase, DagSubtask, DagTask, ExecutionDag, FlatNode};
pub use gateway::{delete_session_detached, AgentSpawnParams, Gateway, SessionScope};
pub use phases::discovery::{
    run_discovery_phase, DiscoveryConfig, DiscoveryResult, DiscoveryStatus,
};
pub use phases::execute::{run_execute_phase, ExecuteConfig, ExecutionProgress};
pub use phases::review::{run_review_phase, PlanReviewOutcome, ReviewConfig};
pub use phases::review_schema::{classify_review_reply, ReviewParse, ReviewReply};
pub use plan::{apply_revision, PlanRevision, ReviewIteration, WorkflowPlan};
pub use report::{classify_reply, parse_report, ParsedReply, ReportPayload, SubagentReport};
