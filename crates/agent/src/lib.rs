//! The orchestration core of Tessera.
//!
//! Each agent follows a **Send → Act → Observe** cycle:
//!
//! 1. **Prune** the agent's history to the provider's context budget
//! 2. **Send** the user turn with the full tool set
//! 3. **If tool calls**: execute them against the workspace, send the
//!    results back, loop to step 3
//! 4. **If text**: the run is done
//!
//! Several agents can run concurrently for one user request, optionally
//! coordinated by a planner that splits the request per agent.

pub mod context;
pub mod json_recovery;
pub mod orchestrator;
pub mod planning;
pub mod session;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{apply_history_depth, prune, prune_for};
pub use json_recovery::{first_json_object, recover_json_values};
pub use orchestrator::{
    DEFAULT_MAX_TURNS, LoopState, MAX_TURNS_SENTINEL, Orchestrator, RunOutcome, RunReport,
};
pub use planning::{AgentTask, Plan, generate_plan, parse_plan, run_multi_agent};
pub use session::Session;
pub use workspace::Workspace;
