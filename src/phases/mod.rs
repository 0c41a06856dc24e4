pub mod discovery;
pub mod execute;
pub mod prompts;
pub mod review;
pub mod review_schema;

pub use discovery::run_discovery_phase;
pub use execute::run_execute_phase;
pub use review::run_review_phase;
