//! The per-agent tool loop.
//!
//! One run takes a user message through repeated provider round-trips:
//!
//! 1. **Send** the user turn (text and images) on a fresh chat session
//! 2. **If tool calls**: dispatch them, correlate results by call id, send
//!    them back and go to 2 with the new reply
//! 3. **If text only**: done
//!
//! The loop is bounded by `max_turns` round-trips and checks its
//! cancellation token at every suspension point. Provider failures end the
//! run as `Failed`; they never panic and never touch sibling runs.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tessera_config::{OrchestratorConfig, ToolConcurrency};
use tessera_core::agent::Agent;
use tessera_core::event::{AgentEvent, EventBus, ToolObserver};
use tessera_core::message::{ContentPart, ConversationMessage};
use tessera_core::provider::{ChatRequest, GenerateRequest, Provider, ToolOutcome, TurnInput};
use tessera_core::tool::ToolCall;
use tessera_tools::{ToolExecutor, definitions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::prune_for;

/// Result text when the turn ceiling is hit while the model still wants tools.
pub const MAX_TURNS_SENTINEL: &str = "[max turns reached]";

pub const DEFAULT_MAX_TURNS: u32 = 5;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    AwaitingResponse,
    ExecutingTools,
    Done,
    Aborted,
    Failed,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Final text (or `MAX_TURNS_SENTINEL`)
    Done(String),
    /// Cancelled; not an error
    Aborted,
    /// Provider/transport failure, scoped to this agent
    Failed(String),
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Done(_) => "done",
            Self::Aborted => "aborted",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn state(&self) -> LoopState {
        match self {
            Self::Done(_) => LoopState::Done,
            Self::Aborted => LoopState::Aborted,
            Self::Failed(_) => LoopState::Failed,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub agent_id: String,
    pub outcome: RunOutcome,
    /// Provider round-trips made
    pub turns: u32,
    /// User message, model replies and tool output of this run, in order
    pub transcript: Vec<ConversationMessage>,
    /// Inline media from the final reply
    pub media: Vec<ContentPart>,
}

impl RunReport {
    fn new(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            outcome: RunOutcome::Aborted,
            turns: 0,
            transcript: Vec::new(),
            media: Vec::new(),
        }
    }
}

/// Runs agents against providers with a shared tool executor.
pub struct Orchestrator {
    tools: ToolExecutor,
    max_turns: u32,
    concurrency: ToolConcurrency,
    context_budget: Option<usize>,
    max_tokens: Option<u32>,
    events: Option<Arc<EventBus>>,
    observer: Option<Arc<dyn ToolObserver>>,
}

impl Orchestrator {
    pub fn new(tools: ToolExecutor) -> Self {
        Self {
            tools,
            max_turns: DEFAULT_MAX_TURNS,
            concurrency: ToolConcurrency::Parallel,
            context_budget: None,
            max_tokens: None,
            events: None,
            observer: None,
        }
    }

    /// Apply the `[orchestrator]` settings.
    pub fn with_config(mut self, config: &OrchestratorConfig) -> Self {
        self.max_turns = config.max_turns.max(1);
        self.concurrency = config.tool_concurrency;
        self.context_budget = config.context_budget_chars;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: ToolConcurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ToolObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn tools(&self) -> &ToolExecutor {
        &self.tools
    }

    /// Run the tool loop for one agent and one user message.
    pub async fn run(
        &self,
        agent: &Agent,
        provider: &dyn Provider,
        history: &[ConversationMessage],
        user_message: &str,
        images: Vec<ContentPart>,
        cancel: &CancellationToken,
    ) -> RunReport {
        let mut report = RunReport::new(&agent.id);
        let user = ConversationMessage::user_with_images(user_message, images);
        let mut input = TurnInput::User(user.parts.clone());
        report.transcript.push(user);

        let tools = match self.tools.scoped_to(&agent.workspace_root) {
            Ok(tools) => tools,
            Err(e) => return self.finish(report, RunOutcome::Failed(e.to_string())),
        };

        info!(
            agent = %agent.id,
            provider = %provider.kind(),
            model = %agent.model,
            history = history.len(),
            "Starting agent run"
        );

        let request = ChatRequest {
            model: agent.model.clone(),
            system_instruction: non_empty(&agent.system_instruction),
            history: prune_for(history, agent.history_depth, provider.kind(), self.context_budget),
            tools: definitions(),
            temperature: agent.temperature,
            max_tokens: self.max_tokens,
        };
        let mut state = LoopState::Idle;
        debug!(agent = %agent.id, ?state, history = request.history.len(), "Opening chat session");
        let mut session = provider.open_chat(request);

        loop {
            if cancel.is_cancelled() {
                return self.finish(report, RunOutcome::Aborted);
            }

            state = LoopState::AwaitingResponse;
            debug!(agent = %agent.id, turn = report.turns + 1, ?state, "Awaiting model reply");
            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.finish(report, RunOutcome::Aborted),
                reply = session.send(input) => reply,
            };
            report.turns += 1;

            let reply = match reply {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(agent = %agent.id, turn = report.turns, error = %e, "Provider call failed");
                    return self.finish(report, RunOutcome::Failed(e.to_string()));
                }
            };

            self.publish(AgentEvent::TurnCompleted {
                agent_id: agent.id.clone(),
                turn: report.turns,
                tool_calls: reply.tool_calls.len(),
                timestamp: Utc::now(),
            });

            if !reply.wants_tools() {
                let mut message = ConversationMessage::model(&reply.text);
                message.parts.extend(reply.media.iter().cloned());
                report.transcript.push(message);
                report.media = reply.media;
                return self.finish(report, RunOutcome::Done(reply.text));
            }

            if !reply.text.is_empty() {
                report.transcript.push(ConversationMessage::model(&reply.text));
            }

            if report.turns >= self.max_turns {
                warn!(
                    agent = %agent.id,
                    turns = report.turns,
                    "Max turns reached with tool calls pending"
                );
                return self.finish(report, RunOutcome::Done(MAX_TURNS_SENTINEL.to_string()));
            }

            if cancel.is_cancelled() {
                return self.finish(report, RunOutcome::Aborted);
            }

            state = LoopState::ExecutingTools;
            debug!(agent = %agent.id, tools = reply.tool_calls.len(), ?state, "Dispatching tool calls");
            // Dropping the dispatch drops in-flight commands and fetches with it
            let outcomes = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.finish(report, RunOutcome::Aborted),
                outcomes = self.dispatch(&agent.id, &tools, reply.tool_calls) => outcomes,
            };

            for outcome in &outcomes {
                report.transcript.push(ConversationMessage::tool_output(format!(
                    "{} → {}",
                    outcome.call.name,
                    outcome.result.to_json()
                )));
            }

            if cancel.is_cancelled() {
                return self.finish(report, RunOutcome::Aborted);
            }

            input = TurnInput::ToolResults(outcomes);
        }
    }

    /// Single-shot generation without tools, returning text and any inline
    /// media the model produced.
    pub async fn run_creative(
        &self,
        agent: &Agent,
        provider: &dyn Provider,
        history: &[ConversationMessage],
        user_message: &str,
        images: Vec<ContentPart>,
        cancel: &CancellationToken,
    ) -> RunReport {
        let mut report = RunReport::new(&agent.id);
        let user = ConversationMessage::user_with_images(user_message, images);

        let mut request = GenerateRequest::new(&agent.model, "");
        request.prompt = user.parts.clone();
        request.system_instruction = non_empty(&agent.system_instruction);
        request.history = prune_for(history, agent.history_depth, provider.kind(), self.context_budget);
        request.temperature = agent.temperature;
        request.max_tokens = self.max_tokens;
        request.allow_media = true;
        report.transcript.push(user);

        if cancel.is_cancelled() {
            return self.finish(report, RunOutcome::Aborted);
        }

        info!(agent = %agent.id, provider = %provider.kind(), "Starting creative run");
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.finish(report, RunOutcome::Aborted),
            result = provider.generate(request) => result,
        };
        report.turns = 1;

        match result {
            Ok(content) => {
                let mut message = ConversationMessage::model(&content.text);
                message.parts.extend(content.media.iter().cloned());
                report.transcript.push(message);
                report.media = content.media;
                self.finish(report, RunOutcome::Done(content.text))
            }
            Err(e) => {
                warn!(agent = %agent.id, error = %e, "Creative generation failed");
                self.finish(report, RunOutcome::Failed(e.to_string()))
            }
        }
    }

    async fn dispatch(
        &self,
        agent_id: &str,
        tools: &ToolExecutor,
        calls: Vec<ToolCall>,
    ) -> Vec<ToolOutcome> {
        match self.concurrency {
            ToolConcurrency::Parallel => {
                join_all(calls.into_iter().map(|call| self.execute_one(agent_id, tools, call))).await
            }
            ToolConcurrency::Sequential => {
                let mut outcomes = Vec::with_capacity(calls.len());
                for call in calls {
                    outcomes.push(self.execute_one(agent_id, tools, call).await);
                }
                outcomes
            }
        }
    }

    async fn execute_one(&self, agent_id: &str, tools: &ToolExecutor, call: ToolCall) -> ToolOutcome {
        if let Some(observer) = &self.observer {
            observer.on_tool_start(agent_id, &call.name, &call.arguments);
        }
        self.publish(AgentEvent::ToolStarted {
            agent_id: agent_id.to_string(),
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            timestamp: Utc::now(),
        });

        let start = Instant::now();
        let result = tools.execute(&call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Some(observer) = &self.observer {
            observer.on_tool_end(agent_id, &call.name, &result);
        }
        self.publish(AgentEvent::ToolFinished {
            agent_id: agent_id.to_string(),
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result: result.clone(),
            duration_ms,
            timestamp: Utc::now(),
        });

        ToolOutcome { call, result }
    }

    fn finish(&self, mut report: RunReport, outcome: RunOutcome) -> RunReport {
        info!(
            agent = %report.agent_id,
            outcome = outcome.label(),
            turns = report.turns,
            "Agent run finished"
        );
        self.publish(AgentEvent::Finished {
            agent_id: report.agent_id.clone(),
            outcome: outcome.label().to_string(),
            turns: report.turns,
            timestamp: Utc::now(),
        });
        report.outcome = outcome;
        report
    }

    fn publish(&self, event: AgentEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
