//! Session facade: the entry points a UI or CLI drives.
//!
//! A session owns the configured agents, their conversation histories and
//! the provider router. Every user action starts with a fresh cancellation
//! token and cancels the previous one, so a new message implicitly aborts
//! whatever the session was still doing.

use std::collections::HashMap;
use std::sync::Mutex;
use tessera_config::AppConfig;
use tessera_core::agent::Agent;
use tessera_core::error::{Error, ProviderError};
use tessera_core::message::{ContentPart, ConversationMessage, merge_by_timestamp};
use tessera_core::provider::Provider;
use tessera_providers::ProviderRouter;
use tessera_providers::build_from_config;
use tessera_providers::catalog::models_or_defaults;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::orchestrator::{Orchestrator, RunOutcome, RunReport};
use crate::planning::{AgentTask, Plan, generate_plan, run_multi_agent};

pub struct Session {
    orchestrator: Orchestrator,
    router: ProviderRouter,
    agents: Vec<Agent>,
    planner: Option<String>,
    histories: tokio::sync::Mutex<HashMap<String, Vec<ConversationMessage>>>,
    active: Mutex<CancellationToken>,
}

impl Session {
    pub fn new(orchestrator: Orchestrator, router: ProviderRouter, agents: Vec<Agent>) -> Self {
        Self {
            orchestrator,
            router,
            agents,
            planner: None,
            histories: tokio::sync::Mutex::new(HashMap::new()),
            active: Mutex::new(CancellationToken::new()),
        }
    }

    /// Agents, credentials and planner from config.
    pub fn from_config(config: &AppConfig, orchestrator: Orchestrator) -> Self {
        Self::new(orchestrator, build_from_config(config), config.resolve_agents())
            .with_planner(config.planner_id())
    }

    pub fn with_planner(mut self, planner: Option<String>) -> Self {
        self.planner = planner;
        self
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Agents that do the work: everyone but the planner, unless the
    /// planner is the only agent.
    pub fn workers(&self) -> Vec<&Agent> {
        let workers: Vec<&Agent> = self
            .agents
            .iter()
            .filter(|a| Some(&a.id) != self.planner.as_ref())
            .collect();
        if workers.is_empty() {
            self.agents.iter().collect()
        } else {
            workers
        }
    }

    /// Cancel whatever the session is doing.
    pub fn cancel(&self) {
        self.lock_active().cancel();
    }

    /// Token of the current action.
    pub fn cancel_token(&self) -> CancellationToken {
        self.lock_active().clone()
    }

    fn begin_action(&self) -> CancellationToken {
        let mut active = self.lock_active();
        active.cancel();
        *active = CancellationToken::new();
        active.clone()
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn provider_for(&self, agent: &Agent) -> Result<std::sync::Arc<dyn Provider>, Error> {
        self.router
            .get(&agent.credential_id)
            .ok_or_else(|| ProviderError::NotConfigured(agent.credential_id.clone()).into())
    }

    fn require_agent(&self, id: &str) -> Result<&Agent, Error> {
        self.agent(id).ok_or_else(|| Error::Config {
            message: format!("Unknown agent: {id}"),
        })
    }

    /// Send one message to one agent. `creative` skips the tool loop.
    pub async fn send_message(
        &self,
        agent_id: &str,
        message: &str,
        images: Vec<ContentPart>,
        creative: bool,
    ) -> Result<RunReport, Error> {
        let agent = self.require_agent(agent_id)?;
        let provider = self.provider_for(agent)?;
        let cancel = self.begin_action();
        let history = self.history(agent_id).await;

        let report = if creative {
            self.orchestrator
                .run_creative(agent, provider.as_ref(), &history, message, images, &cancel)
                .await
        } else {
            self.orchestrator
                .run(agent, provider.as_ref(), &history, message, images, &cancel)
                .await
        };
        self.record(&report).await;
        Ok(report)
    }

    /// Send one message to several agents. With more than one target and a
    /// planner available, the planner splits the request first.
    pub async fn send_to_agents(
        &self,
        agent_ids: &[String],
        message: &str,
        images: Vec<ContentPart>,
    ) -> Result<Vec<RunReport>, Error> {
        let targets: Vec<&Agent> = if agent_ids.is_empty() {
            self.workers()
        } else {
            agent_ids
                .iter()
                .map(|id| self.require_agent(id))
                .collect::<Result<_, _>>()?
        };

        let mut tasks = Vec::with_capacity(targets.len());
        for agent in &targets {
            tasks.push(AgentTask {
                agent: (*agent).clone(),
                provider: self.provider_for(agent)?,
                history: self.history(&agent.id).await,
            });
        }

        let cancel = self.begin_action();
        let plan = if targets.len() > 1 {
            let roster: Vec<Agent> = targets.iter().map(|a| (*a).clone()).collect();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                plan = self.plan_for(&roster, message) => plan,
            }
        } else {
            None
        };
        if cancel.is_cancelled() {
            info!("Session action cancelled during planning");
        }

        let reports = run_multi_agent(
            &self.orchestrator,
            &tasks,
            message,
            &images,
            plan.as_ref(),
            &cancel,
        )
        .await;
        for report in &reports {
            self.record(report).await;
        }
        Ok(reports)
    }

    /// Ask the planner to split `message` across the worker agents.
    pub async fn generate_plan(&self, message: &str) -> Option<Plan> {
        let cancel = self.begin_action();
        let roster: Vec<Agent> = self.workers().into_iter().cloned().collect();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            plan = self.plan_for(&roster, message) => plan,
        }
    }

    async fn plan_for(&self, roster: &[Agent], message: &str) -> Option<Plan> {
        let planner = self.agent(self.planner.as_deref()?)?;
        let provider = match self.provider_for(planner) {
            Ok(p) => p,
            Err(e) => {
                warn!(agent = %planner.id, error = %e, "Planner has no provider");
                return None;
            }
        };
        debug!(planner = %planner.id, agents = roster.len(), "Requesting plan");
        generate_plan(provider.as_ref(), &planner.model, roster, message).await
    }

    /// Models available to a credential, falling back to the provider's
    /// defaults. Unknown credentials list nothing.
    pub async fn fetch_available_models(&self, credential_id: &str) -> Vec<String> {
        match self.router.get(credential_id) {
            Some(provider) => models_or_defaults(provider.as_ref()).await,
            None => {
                warn!(credential = %credential_id, "No provider for credential");
                Vec::new()
            }
        }
    }

    pub async fn history(&self, agent_id: &str) -> Vec<ConversationMessage> {
        self.histories
            .lock()
            .await
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }

    /// All agents' histories merged by timestamp.
    pub async fn timeline(&self) -> Vec<ConversationMessage> {
        let histories = self.histories.lock().await;
        let all: Vec<Vec<ConversationMessage>> = self
            .agents
            .iter()
            .filter_map(|a| histories.get(&a.id).cloned())
            .collect();
        merge_by_timestamp(&all)
    }

    /// Completed runs keep their transcript; failed runs keep the user
    /// message and an error message; aborted runs leave no trace.
    async fn record(&self, report: &RunReport) {
        let mut histories = self.histories.lock().await;
        let history = histories.entry(report.agent_id.clone()).or_default();
        match &report.outcome {
            RunOutcome::Done(_) => history.extend(report.transcript.iter().cloned()),
            RunOutcome::Failed(message) => {
                history.extend(report.transcript.first().cloned());
                history.push(ConversationMessage::model(format!("Error: {message}")));
            }
            RunOutcome::Aborted => {}
        }
    }
}
