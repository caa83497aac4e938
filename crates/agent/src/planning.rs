//! Multi-agent planning and fan-out.
//!
//! A planner model splits a user request into one instruction per agent.
//! Each agent then runs its own tool loop, all of them concurrently on the
//! current task:
//!
//! ```text
//! User message
//!       │
//!       ▼
//! ┌───────────┐
//! │  Planner  │  ← JSON {agent_id: instruction}
//! └──┬─────┬──┘
//!    │     │
//!    ▼     ▼
//! ┌─────┐ ┌─────┐
//! │ A-1 │ │ A-2 │  ← one Orchestrator::run each, joined
//! └─────┘ └─────┘
//! ```
//!
//! Without a usable plan every agent receives the raw user message.

use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::agent::Agent;
use tessera_core::message::{ContentPart, ConversationMessage};
use tessera_core::provider::{GenerateRequest, Provider};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::json_recovery::recover_json_values;
use crate::orchestrator::{Orchestrator, RunReport};

/// Agent id → instruction.
pub type Plan = HashMap<String, String>;

const PLANNER_INSTRUCTION: &str = "You coordinate a team of AI agents working in one code \
workspace. Split the user's request into one focused instruction per agent that should act. \
Answer with a single JSON object mapping agent ids to instructions and nothing else. Omit \
agents that have nothing to do.";

fn planning_prompt(agents: &[Agent], user_message: &str) -> String {
    let mut prompt = String::from("Agents:\n");
    for agent in agents {
        let role = agent
            .system_instruction
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("general assistant");
        prompt.push_str(&format!("- id: {} | name: {} | role: {}\n", agent.id, agent.name, role.trim()));
    }
    prompt.push_str("\nUser request:\n");
    prompt.push_str(user_message);
    prompt.push_str("\n\nRespond with JSON like {\"<agent id>\": \"<instruction>\"}.");
    prompt
}

/// Extract a plan from planner output: the first JSON object with at least
/// one known agent id. Unknown ids and non-string values are dropped.
pub fn parse_plan(text: &str, agents: &[Agent]) -> Option<Plan> {
    recover_json_values(text).into_iter().find_map(|value| {
        let Value::Object(map) = value else {
            return None;
        };
        let plan: Plan = map
            .into_iter()
            .filter(|(id, _)| agents.iter().any(|a| &a.id == id))
            .filter_map(|(id, v)| match v {
                Value::String(s) if !s.trim().is_empty() => Some((id, s)),
                _ => None,
            })
            .collect();
        (!plan.is_empty()).then_some(plan)
    })
}

/// Ask `provider` for a plan. Any provider failure or unusable answer is
/// `None`.
pub async fn generate_plan(
    provider: &dyn Provider,
    model: &str,
    agents: &[Agent],
    user_message: &str,
) -> Option<Plan> {
    if agents.is_empty() {
        return None;
    }

    let mut request = GenerateRequest::new(model, planning_prompt(agents, user_message));
    request.system_instruction = Some(PLANNER_INSTRUCTION.to_string());
    request.json_output = true;
    request.temperature = 0.2;

    let content = match provider.generate(request).await {
        Ok(content) => content,
        Err(e) => {
            warn!(provider = %provider.kind(), error = %e, "Planning request failed");
            return None;
        }
    };

    let plan = parse_plan(&content.text, agents);
    match &plan {
        Some(plan) => info!(agents = plan.len(), "Plan generated"),
        None => debug!(reply_len = content.text.len(), "Planner reply held no usable plan"),
    }
    plan
}

/// One agent taking part in a multi-agent run.
pub struct AgentTask {
    pub agent: Agent,
    pub provider: Arc<dyn Provider>,
    pub history: Vec<ConversationMessage>,
}

/// Run every task concurrently. With a plan, agents receive their planned
/// instruction and agents the plan leaves out are skipped; without one,
/// every agent receives `user_message`. Reports come back in task order.
pub async fn run_multi_agent(
    orchestrator: &Orchestrator,
    tasks: &[AgentTask],
    user_message: &str,
    images: &[ContentPart],
    plan: Option<&Plan>,
    cancel: &CancellationToken,
) -> Vec<RunReport> {
    let runs = tasks.iter().filter_map(|task| {
        let message = match plan {
            Some(plan) => plan.get(&task.agent.id)?.clone(),
            None => user_message.to_string(),
        };
        Some(async move {
            orchestrator
                .run(
                    &task.agent,
                    task.provider.as_ref(),
                    &task.history,
                    &message,
                    images.to_vec(),
                    cancel,
                )
                .await
        })
    });

    let reports = join_all(runs).await;
    info!(
        agents = reports.len(),
        done = reports.iter().filter(|r| r.outcome.is_done()).count(),
        "Multi-agent run finished"
    );
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::RunOutcome;
    use crate::test_helpers::*;
    use tessera_core::error::ProviderError;
    use tessera_index::CodeIndex;
    use tessera_tools::ToolExecutor;
    use tessera_vfs::VirtualFileSystem;

    fn agents() -> Vec<Agent> {
        let mut coder = Agent::new("coder", "default", "m");
        coder.system_instruction = "Writes the code.\nBe terse.".into();
        let reviewer = Agent::new("reviewer", "default", "m");
        vec![coder, reviewer]
    }

    fn orchestrator() -> Orchestrator {
        let vfs = Arc::new(VirtualFileSystem::in_memory());
        Orchestrator::new(ToolExecutor::new(vfs, Arc::new(CodeIndex::new())))
    }

    #[test]
    fn prompt_lists_roster() {
        let prompt = planning_prompt(&agents(), "build a todo app");
        assert!(prompt.contains("- id: coder | name: coder | role: Writes the code."));
        assert!(prompt.contains("role: general assistant"));
        assert!(prompt.contains("build a todo app"));
    }

    #[test]
    fn parse_plan_filters_ids_and_values() {
        let text = r#"Sure! ```json
{"coder": "Write app.js", "reviewer": 42, "ghost": "haunt"}
```"#;
        let plan = parse_plan(text, &agents()).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan["coder"], "Write app.js");
    }

    #[test]
    fn parse_plan_skips_objects_without_known_ids() {
        let text = r#"{"note": "thinking"} {"reviewer": "Check style"}"#;
        let plan = parse_plan(text, &agents()).unwrap();
        assert_eq!(plan["reviewer"], "Check style");
        assert!(parse_plan("no json here", &agents()).is_none());
        assert!(parse_plan(r#"{"ghost": "x"}"#, &agents()).is_none());
    }

    #[tokio::test]
    async fn generate_plan_requests_json() {
        let provider = ScriptedProvider::new(vec![])
            .with_generated(vec![Ok(generated(r#"{"coder":"Do it","reviewer":"Check it"}"#))]);
        let plan = generate_plan(&provider, "planner-model", &agents(), "ship it")
            .await
            .unwrap();
        assert_eq!(plan.len(), 2);

        let request = &provider.generate_requests()[0];
        assert!(request.json_output);
        assert_eq!(request.model, "planner-model");
    }

    #[tokio::test]
    async fn generate_plan_failure_is_none() {
        let provider = ScriptedProvider::new(vec![])
            .with_generated(vec![Err(ProviderError::Network("down".into()))]);
        assert!(generate_plan(&provider, "m", &agents(), "x").await.is_none());
        assert!(generate_plan(&provider, "m", &[], "x").await.is_none());
    }

    #[tokio::test]
    async fn agents_run_independently() {
        let ok: Arc<dyn Provider> = Arc::new(ScriptedProvider::single_text("all good"));
        let failing: Arc<dyn Provider> = Arc::new(ScriptedProvider::new(vec![Err(
            ProviderError::AuthenticationFailed("bad key".into()),
        )]));
        let agents = agents();
        let tasks = vec![
            AgentTask {
                agent: agents[0].clone(),
                provider: ok,
                history: vec![],
            },
            AgentTask {
                agent: agents[1].clone(),
                provider: failing,
                history: vec![],
            },
        ];

        let reports = run_multi_agent(
            &orchestrator(),
            &tasks,
            "hello",
            &[],
            None,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].outcome, RunOutcome::Done("all good".into()));
        assert!(matches!(reports[1].outcome, RunOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn plan_routes_instructions() {
        let coder = ScriptedProvider::single_text("coded");
        let agents = agents();
        let tasks = vec![
            AgentTask {
                agent: agents[0].clone(),
                provider: Arc::new(coder.clone()),
                history: vec![],
            },
            AgentTask {
                agent: agents[1].clone(),
                provider: Arc::new(ScriptedProvider::single_text("unused")),
                history: vec![],
            },
        ];
        let plan: Plan = [("coder".to_string(), "Write main.js".to_string())].into();

        let reports = run_multi_agent(
            &orchestrator(),
            &tasks,
            "original",
            &[],
            Some(&plan),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].agent_id, "coder");
        assert_eq!(reports[0].transcript[0].text(), "Write main.js");
        assert_eq!(coder.call_count(), 1);
    }
}
