//! Shared test helpers: scripted providers and sessions.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tessera_core::agent::ProviderKind;
use tessera_core::error::ProviderError;
use tessera_core::provider::*;
use tessera_core::tool::{ToolArguments, ToolCall};

#[derive(Default)]
struct Script {
    turns: VecDeque<Result<ModelTurn, ProviderError>>,
    generated: VecDeque<Result<GeneratedContent, ProviderError>>,
    // Reply used once `turns` runs out
    repeat: Option<ModelTurn>,
    hang: bool,
    requests: Vec<ChatRequest>,
    generate_requests: Vec<GenerateRequest>,
    inputs: Vec<TurnInput>,
}

/// A provider that answers from a fixed script and counts calls.
///
/// Every chat session it opens shares the same script, so a multi-agent
/// test can hand one provider to several agents.
#[derive(Clone)]
pub struct ScriptedProvider {
    kind: ProviderKind,
    script: Arc<Mutex<Script>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<Result<ModelTurn, ProviderError>>) -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            script: Arc::new(Mutex::new(Script {
                turns: turns.into(),
                ..Default::default()
            })),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replies with plain text once.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![Ok(text_turn(text))])
    }

    /// Requests the same tool call on every turn, forever.
    pub fn always_tools(call: ToolCall) -> Self {
        let provider = Self::new(vec![]);
        provider.lock().repeat = Some(tool_turn(vec![call]));
        provider
    }

    /// Never answers a chat turn.
    pub fn hanging() -> Self {
        let provider = Self::new(vec![]);
        provider.lock().hang = true;
        provider
    }

    /// Queue single-shot generation results.
    pub fn with_generated(self, generated: Vec<Result<GeneratedContent, ProviderError>>) -> Self {
        self.lock().generated = generated.into();
        self
    }

    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    /// Number of network-equivalent calls (chat turns plus generations).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.lock().requests.clone()
    }

    pub fn generate_requests(&self) -> Vec<GenerateRequest> {
        self.lock().generate_requests.clone()
    }

    pub fn inputs(&self) -> Vec<TurnInput> {
        self.lock().inputs.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }
}

struct ScriptedSession {
    provider: ScriptedProvider,
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn send(&mut self, input: TurnInput) -> Result<ModelTurn, ProviderError> {
        self.provider.calls.fetch_add(1, Ordering::SeqCst);
        let hang = {
            let mut script = self.provider.lock();
            script.inputs.push(input);
            script.hang
        };
        if hang {
            std::future::pending::<()>().await;
        }
        // Yield so concurrent runs interleave like real network calls
        tokio::task::yield_now().await;

        let mut script = self.provider.lock();
        match script.turns.pop_front() {
            Some(reply) => reply,
            None => script
                .repeat
                .clone()
                .ok_or_else(|| ProviderError::MalformedResponse("script exhausted".into())),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn open_chat(&self, request: ChatRequest) -> Box<dyn ChatSession> {
        self.lock().requests.push(request);
        Box::new(ScriptedSession {
            provider: self.clone(),
        })
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GeneratedContent, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.lock();
        script.generate_requests.push(request);
        script
            .generated
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::MalformedResponse("script exhausted".into())))
    }
}

pub fn text_turn(text: &str) -> ModelTurn {
    ModelTurn {
        text: text.into(),
        ..Default::default()
    }
}

pub fn tool_turn(calls: Vec<ToolCall>) -> ModelTurn {
    ModelTurn {
        tool_calls: calls,
        ..Default::default()
    }
}

pub fn generated(text: &str) -> GeneratedContent {
    GeneratedContent {
        text: text.into(),
        ..Default::default()
    }
}

pub fn make_tool_call(id: &str, name: &str, args: ToolArguments) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args,
    }
}
