//! End-to-end tests: a session over a real on-disk workspace, driven by
//! scripted providers.
//!
//! These exercise the whole path from user message to files on disk:
//! provider turns, tool dispatch, syntax validation, the code index,
//! planning and cancellation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tessera_agent::{Orchestrator, RunOutcome, Session, Workspace};
use tessera_config::WorkspaceConfig;
use tessera_core::agent::{Agent, ProviderKind};
use tessera_core::error::ProviderError;
use tessera_core::provider::{
    ChatRequest, ChatSession, GenerateRequest, GeneratedContent, ModelTurn, Provider, TurnInput,
};
use tessera_core::tool::{ToolArguments, ToolCall};
use tessera_providers::ProviderRouter;
use tokio::sync::Notify;

// ── Mock Provider ────────────────────────────────────────────────────────

#[derive(Default)]
struct Replay {
    turns: VecDeque<ModelTurn>,
    generated: VecDeque<String>,
    inputs: Vec<TurnInput>,
    requests: Vec<ChatRequest>,
}

/// Replays scripted model turns; `hang` makes every chat turn block until
/// the caller gives up.
#[derive(Clone, Default)]
struct ReplayProvider {
    replay: Arc<Mutex<Replay>>,
    hang: bool,
    started: Arc<Notify>,
}

impl ReplayProvider {
    fn new(turns: Vec<ModelTurn>) -> Self {
        let provider = Self::default();
        provider.replay.lock().unwrap().turns = turns.into();
        provider
    }

    fn planner(plan_json: &str) -> Self {
        let provider = Self::default();
        provider.replay.lock().unwrap().generated.push_back(plan_json.to_string());
        provider
    }

    fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    fn inputs(&self) -> Vec<TurnInput> {
        self.replay.lock().unwrap().inputs.clone()
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.replay.lock().unwrap().requests.clone()
    }
}

struct ReplaySession {
    provider: ReplayProvider,
}

#[async_trait::async_trait]
impl ChatSession for ReplaySession {
    async fn send(&mut self, input: TurnInput) -> Result<ModelTurn, ProviderError> {
        self.provider.replay.lock().unwrap().inputs.push(input);
        if self.provider.hang {
            self.provider.started.notify_one();
            std::future::pending::<()>().await;
        }
        self.provider
            .replay
            .lock()
            .unwrap()
            .turns
            .pop_front()
            .ok_or_else(|| ProviderError::MalformedResponse("no scripted turn left".into()))
    }
}

#[async_trait::async_trait]
impl Provider for ReplayProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn open_chat(&self, request: ChatRequest) -> Box<dyn ChatSession> {
        self.replay.lock().unwrap().requests.push(request);
        Box::new(ReplaySession {
            provider: self.clone(),
        })
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<GeneratedContent, ProviderError> {
        let text = self
            .replay
            .lock()
            .unwrap()
            .generated
            .pop_front()
            .ok_or_else(|| ProviderError::MalformedResponse("no scripted generation".into()))?;
        Ok(GeneratedContent {
            text,
            ..Default::default()
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn call(id: &str, name: &str, args: ToolArguments) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args,
    }
}

fn tools(calls: Vec<ToolCall>) -> ModelTurn {
    ModelTurn {
        tool_calls: calls,
        ..Default::default()
    }
}

fn text(reply: &str) -> ModelTurn {
    ModelTurn {
        text: reply.into(),
        ..Default::default()
    }
}

async fn disk_workspace(dir: &std::path::Path) -> Workspace {
    Workspace::open(&WorkspaceConfig {
        root: Some(dir.to_path_buf()),
        ..Default::default()
    })
    .await
}

fn session(workspace: &Workspace, providers: Vec<(&str, ReplayProvider)>, agents: Vec<Agent>) -> Session {
    let mut router = ProviderRouter::new();
    for (credential, provider) in providers {
        router.register(credential, Arc::new(provider));
    }
    Session::new(Orchestrator::new(workspace.executor(10)), router, agents)
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn agent_writes_and_finds_code_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.md"), "# demo\n").unwrap();
    let workspace = disk_workspace(dir.path()).await;

    let provider = ReplayProvider::new(vec![
        tools(vec![call(
            "c1",
            "write_file",
            ToolArguments::new()
                .with("path", "src/greet.js")
                .with("content", "export function greet(name) {\n  return `hi ${name}`;\n}\n"),
        )]),
        tools(vec![call("c2", "search_code", ToolArguments::new().with("query", "greet"))]),
        text("Added src/greet.js"),
    ]);
    let session = session(
        &workspace,
        vec![("default", provider.clone())],
        vec![Agent::new("coder", "default", "mock-model")],
    );

    let report = session
        .send_message("coder", "add a greet helper", vec![], false)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Done("Added src/greet.js".into()));
    assert_eq!(report.turns, 3);

    let on_disk = std::fs::read_to_string(dir.path().join("src/greet.js")).unwrap();
    assert!(on_disk.contains("function greet"));
    assert!(workspace.index().get("src/greet.js").is_some());

    // The search result fed back to the model names the new file
    let inputs = provider.inputs();
    assert_eq!(inputs.len(), 3);
    let TurnInput::ToolResults(outcomes) = &inputs[2] else {
        panic!("expected tool results, got {:?}", inputs[2]);
    };
    assert!(outcomes[0].result.to_json().to_string().contains("src/greet.js"));

    // The whole exchange is remembered for the next message
    let history = session.history("coder").await;
    assert_eq!(history.first().unwrap().text(), "add a greet helper");
    assert_eq!(history.last().unwrap().text(), "Added src/greet.js");

    // And tools were advertised to the provider
    assert!(!provider.requests()[0].tools.is_empty());
}

#[tokio::test]
async fn broken_script_never_reaches_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("app.js"), "const ok = 1;\n").unwrap();
    let workspace = disk_workspace(dir.path()).await;

    let provider = ReplayProvider::new(vec![
        tools(vec![call(
            "c1",
            "write_file",
            ToolArguments::new()
                .with("path", "app.js")
                .with("content", "function broken( {\n"),
        )]),
        text("I could not fix it"),
    ]);
    let session = session(
        &workspace,
        vec![("default", provider.clone())],
        vec![Agent::new("coder", "default", "mock-model")],
    );

    let report = session.send_message("coder", "rewrite app.js", vec![], false).await.unwrap();
    assert!(report.outcome.is_done());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("app.js")).unwrap(),
        "const ok = 1;\n"
    );

    let inputs = provider.inputs();
    let TurnInput::ToolResults(outcomes) = &inputs[1] else {
        panic!("expected tool results");
    };
    assert!(outcomes[0].result.is_error());
}

#[tokio::test]
async fn planner_splits_work_between_agents() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = disk_workspace(dir.path()).await;

    let planner = ReplayProvider::planner(
        r#"Here is the plan: {"coder": "Create index.html", "writer": "Draft README.md"}"#,
    );
    let coder = ReplayProvider::new(vec![
        tools(vec![call(
            "c1",
            "write_file",
            ToolArguments::new()
                .with("path", "index.html")
                .with("content", "<h1>hello</h1>"),
        )]),
        text("page ready"),
    ]);
    let writer = ReplayProvider::new(vec![
        tools(vec![call(
            "w1",
            "write_file",
            ToolArguments::new()
                .with("path", "README.md")
                .with("content", "# Hello"),
        )]),
        text("docs ready"),
    ]);

    let agents = vec![
        Agent::new("lead", "plan", "mock-model"),
        Agent::new("coder", "code", "mock-model"),
        Agent::new("writer", "docs", "mock-model"),
    ];
    let session = session(
        &workspace,
        vec![("plan", planner), ("code", coder.clone()), ("docs", writer.clone())],
        agents,
    )
    .with_planner(Some("lead".into()));

    let reports = session.send_to_agents(&[], "build a landing page", vec![]).await.unwrap();

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.outcome.is_done()));
    assert_eq!(reports[0].transcript[0].text(), "Create index.html");
    assert_eq!(reports[1].transcript[0].text(), "Draft README.md");
    assert!(dir.path().join("index.html").exists());
    assert!(dir.path().join("README.md").exists());

    let timeline = session.timeline().await;
    assert_eq!(timeline.len(), reports.iter().map(|r| r.transcript.len()).sum::<usize>());
}

#[tokio::test]
async fn cancel_aborts_the_running_message() {
    let workspace = Workspace::in_memory().await;
    let provider = ReplayProvider::hanging();
    let started = provider.started.clone();
    let session = Arc::new(session(
        &workspace,
        vec![("default", provider)],
        vec![Agent::new("coder", "default", "mock-model")],
    ));

    let running = {
        let session = session.clone();
        tokio::spawn(async move { session.send_message("coder", "loop forever", vec![], false).await })
    };

    started.notified().await;
    session.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("run should stop after cancel")
        .unwrap()
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::Aborted);
    assert!(session.history("coder").await.is_empty());
}

#[tokio::test]
async fn unknown_agent_is_an_error() {
    let workspace = Workspace::in_memory().await;
    let session = session(&workspace, vec![], vec![Agent::new("coder", "default", "m")]);

    assert!(session.send_message("ghost", "hi", vec![], false).await.is_err());
    // Known agent whose credential has no provider
    assert!(session.send_message("coder", "hi", vec![], false).await.is_err());
}
