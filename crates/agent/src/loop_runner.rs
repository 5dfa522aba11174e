//! The lane conversation loop: model call, tool execution, repeat until a
//! terminal response, then persist and stream.
//!
//! ```text
//! AWAIT_MODEL ──tool use──▶ TOOL_USE ──results──▶ AWAIT_MODEL
//!      │
//!      └──terminal──▶ persist history ──▶ stream text ──▶ done
//! ```
//!
//! History is saved before the first text event is sent, so a client that
//! disconnects mid-stream never loses the answer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use dispatch_core::error::ProviderError;
use dispatch_core::message::{ContentPart, Message, Role};
use dispatch_core::provider::{Provider, ProviderRequest, ProviderResponse};
use dispatch_core::{Category, DispatchEvent, KnowledgeStore, Lane, MemoryLedger};
use dispatch_tools::ToolDispatcher;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::{AssemblyInput, ContextAssembler};
use crate::conversation_store::ConversationStore;
use crate::draft::Draft;
use crate::lanes::LaneBook;
use crate::prompt;

/// Terminal text when the tool budget runs out before any text was produced.
pub const TOOL_LIMIT_FALLBACK: &str =
    "I ran out of tool steps before finishing. Ask again with a narrower request.";

/// Call the model, bounded by an optional timeout.
pub(crate) async fn complete_with_timeout(
    provider: &dyn Provider,
    request: ProviderRequest,
    timeout: Option<Duration>,
) -> Result<ProviderResponse, ProviderError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, provider.complete(request))
            .await
            .map_err(|_| ProviderError::Timeout(format!("no response within {}s", limit.as_secs())))?,
        None => provider.complete(request).await,
    }
}

/// Draft replies are whole notes and get a larger output budget than chat.
pub const DRAFT_MAX_TOKENS: u32 = 4096;

/// Split text into pieces of at most `size` characters.
pub(crate) fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size.max(1)).map(|c| c.iter().collect()).collect()
}

/// Drives one lane request from user message to streamed answer.
#[derive(Clone)]
pub struct ConversationLoop {
    /// The model service
    provider: Arc<dyn Provider>,

    /// Vault notes, reloaded before each assembly
    store: Arc<dyn KnowledgeStore>,

    /// Private per-lane memory
    ledger: Arc<dyn MemoryLedger>,

    tools: Arc<ToolDispatcher>,
    conversations: Arc<ConversationStore>,
    lanes: Arc<LaneBook>,
    assembler: ContextAssembler,

    model: String,
    max_tokens: u32,

    /// Messages sent to the model per call
    history_window: usize,

    /// Model calls per request before giving up on tools
    max_iterations: usize,

    chunk_chars: usize,
    chunk_delay: Duration,
    model_timeout: Option<Duration>,
}

impl ConversationLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn KnowledgeStore>,
        ledger: Arc<dyn MemoryLedger>,
        conversations: Arc<ConversationStore>,
        model: impl Into<String>,
    ) -> Self {
        let tools = Arc::new(ToolDispatcher::new(store.clone(), ledger.clone()));
        Self {
            provider,
            store,
            ledger,
            tools,
            conversations,
            lanes: Arc::new(LaneBook::default()),
            assembler: ContextAssembler::default(),
            model: model.into(),
            max_tokens: 2048,
            history_window: 8,
            max_iterations: 10,
            chunk_chars: 12,
            chunk_delay: Duration::from_millis(6),
            model_timeout: None,
        }
    }

    pub fn with_lanes(mut self, lanes: Arc<LaneBook>) -> Self {
        self.lanes = lanes;
        self
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Set the maximum number of model calls per request.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the streaming pace. A zero delay streams as fast as the client reads.
    pub fn with_chunking(mut self, chars: usize, delay: Duration) -> Self {
        self.chunk_chars = chars;
        self.chunk_delay = delay;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Start a request. Events arrive on the returned receiver; dropping it
    /// stops delivery but not the tool effects or history already committed.
    pub fn run_stream(&self, lane: Lane, message: impl Into<String>) -> mpsc::Receiver<DispatchEvent> {
        let (tx, rx) = mpsc::channel(128);
        let this = self.clone();
        let message = message.into();
        tokio::spawn(async move {
            this.drive(lane, message, tx).await;
        });
        rx
    }

    async fn system_prompt(&self, lane: Lane) -> String {
        if let Err(e) = self.store.reload().await {
            warn!(error = %e, "Vault reload failed, using previous snapshot");
        }
        let corpus = self.store.snapshot();
        let focus: Vec<Category> = lane.category().into_iter().collect();
        let today = Local::now().date_naive();
        let context = self.assembler.assemble(&AssemblyInput {
            corpus: &corpus,
            focus: &focus,
            now: Utc::now(),
            today,
        });
        debug!(
            lane = %lane,
            documents = context.document_count(),
            chars = context.metadata.body_chars,
            dropped = context.metadata.dropped,
            "Context assembled"
        );
        let memory = self.ledger.read(lane).await.unwrap_or_else(|e| {
            warn!(lane = %lane, error = %e, "Memory ledger unreadable");
            String::new()
        });
        prompt::chat_system(&self.lanes.prompt(lane), &memory, &context.text, today)
    }

    /// Ask the coordinator to draft a new note. One model call without tools;
    /// nothing is written and no history is kept.
    pub async fn draft(&self, request: &str) -> Result<Draft, ProviderError> {
        info!("Draft request");
        let system = self.system_prompt(Lane::Dispatch).await;
        let request = ProviderRequest::new(
            &self.model,
            system,
            vec![Message::user(prompt::draft_request(request))],
        )
        .with_max_tokens(DRAFT_MAX_TOKENS);
        let response = complete_with_timeout(self.provider.as_ref(), request, self.model_timeout).await?;
        Ok(Draft::parse(&response.message.text()))
    }

    async fn drive(&self, lane: Lane, message: String, tx: mpsc::Sender<DispatchEvent>) {
        let mut conversation = self.conversations.lock(lane).await;
        info!(lane = %lane, "Chat request");

        let system = self.system_prompt(lane).await;

        conversation.push(Message::user(message));
        self.conversations.persist(lane, &mut conversation).await;

        let mut messages: Vec<Message> = conversation.recent_window(self.history_window).to_vec();
        let mut new_turns: Vec<Message> = Vec::new();
        let mut partial = String::new();
        let mut terminal: Option<String> = None;

        for iteration in 0..self.max_iterations {
            let request = ProviderRequest::new(&self.model, system.clone(), messages.clone())
                .with_max_tokens(self.max_tokens)
                .with_tools(self.tools.definitions());

            let response =
                match complete_with_timeout(self.provider.as_ref(), request, self.model_timeout).await {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(lane = %lane, error = %e, "Model call failed");
                        let _ = tx.send(DispatchEvent::Error(e.to_string())).await;
                        return;
                    }
                };

            let invocations = response.tool_invocations();
            if invocations.is_empty() {
                terminal = Some(response.message.text());
                break;
            }

            debug!(lane = %lane, iteration, tools = invocations.len(), "Tool use requested");
            let text = response.message.text();
            if !text.trim().is_empty() {
                if !partial.is_empty() {
                    partial.push_str("\n\n");
                }
                partial.push_str(text.trim());
            }

            let mut results = Vec::with_capacity(invocations.len());
            for call in &invocations {
                let _ = tx
                    .send(DispatchEvent::ToolWorking {
                        name: call.name.clone(),
                        input: call.input.clone(),
                    })
                    .await;
                let result = self.tools.execute(&call.name, &call.input, lane).await;
                results.push(ContentPart::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: result.to_model_content(),
                });
                let _ = tx
                    .send(DispatchEvent::ToolDone {
                        name: call.name.clone(),
                        result,
                    })
                    .await;
            }

            let results_turn = Message::with_parts(Role::User, results);
            messages.push(response.message.clone());
            messages.push(results_turn.clone());
            new_turns.push(response.message);
            new_turns.push(results_turn);
        }

        let final_text = terminal.unwrap_or_else(|| {
            warn!(lane = %lane, max = self.max_iterations, "Tool iteration limit reached");
            if partial.is_empty() {
                TOOL_LIMIT_FALLBACK.to_string()
            } else {
                partial
            }
        });

        for turn in new_turns {
            conversation.push(turn);
        }
        conversation.push(Message::assistant(final_text.clone()));
        self.conversations.persist(lane, &mut conversation).await;

        for piece in chunk_text(&final_text, self.chunk_chars) {
            if tx.send(DispatchEvent::Text(piece)).await.is_err() {
                debug!(lane = %lane, "Client disconnected mid-stream");
                return;
            }
            if !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
        }
        let _ = tx.send(DispatchEvent::Done).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{Reply, ScriptedProvider};
    use dispatch_core::{HistoryStore, MessageContent};
    use dispatch_vault::{InMemoryHistory, InMemoryVault};
    use serde_json::json;

    struct Fixture {
        vault: Arc<InMemoryVault>,
        history: Arc<InMemoryHistory>,
        conversations: Arc<ConversationStore>,
        provider: Arc<ScriptedProvider>,
    }

    impl Fixture {
        fn new(provider: ScriptedProvider) -> Self {
            Self::with_vault(provider, InMemoryVault::new())
        }

        fn with_vault(provider: ScriptedProvider, vault: InMemoryVault) -> Self {
            let history = Arc::new(InMemoryHistory::new());
            Self {
                vault: Arc::new(vault),
                conversations: Arc::new(ConversationStore::new(history.clone(), 100)),
                history,
                provider: Arc::new(provider),
            }
        }

        fn runner(&self) -> ConversationLoop {
            ConversationLoop::new(
                self.provider.clone(),
                self.vault.clone(),
                self.vault.clone(),
                self.conversations.clone(),
                "test-model",
            )
            .with_chunking(12, Duration::ZERO)
        }
    }

    async fn collect(mut rx: mpsc::Receiver<DispatchEvent>) -> Vec<DispatchEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn streamed_text(events: &[DispatchEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                DispatchEvent::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn memory_call(note: &str) -> Reply {
        Reply::Tools(vec![("update_memory".into(), json!({"note": note}))])
    }

    #[test]
    fn chunks_respect_char_boundaries() {
        assert_eq!(chunk_text("héllo wörld!", 5), vec!["héllo", " wörl", "d!"]);
        assert!(chunk_text("", 12).is_empty());
    }

    #[tokio::test]
    async fn plain_answer_is_persisted_then_streamed() {
        let fx = Fixture::new(ScriptedProvider::text("Apply to two roles before lunch."));
        let events = collect(fx.runner().run_stream(Lane::Jobs, "What next?")).await;

        assert_eq!(streamed_text(&events), "Apply to two roles before lunch.");
        assert!(events.iter().filter(|e| matches!(e, DispatchEvent::Text(_))).all(|e| match e {
            DispatchEvent::Text(t) => t.chars().count() <= 12,
            _ => true,
        }));
        assert_eq!(events.last(), Some(&DispatchEvent::Done));

        let saved = fx.history.load(Lane::Jobs).await;
        assert_eq!(saved, vec![Message::user("What next?"), Message::assistant("Apply to two roles before lunch.")]);
        assert_eq!(fx.history.save_count(), 2);
    }

    #[tokio::test]
    async fn remember_request_writes_one_memory_row() {
        let fx = Fixture::new(ScriptedProvider::new(vec![
            memory_call("Prefers terse feedback"),
            Reply::Text("Noted: I'll keep feedback terse.".into()),
        ]));
        let events = collect(
            fx.runner()
                .run_stream(Lane::Write, "remember that I prefer terse feedback"),
        )
        .await;

        match &events[0] {
            DispatchEvent::ToolWorking { name, input } => {
                assert_eq!(name, "update_memory");
                assert_eq!(input["note"], "Prefers terse feedback");
            }
            other => panic!("expected tool_working, got {other:?}"),
        }
        match &events[1] {
            DispatchEvent::ToolDone { name, result } => {
                assert_eq!(name, "update_memory");
                assert!(result.success);
            }
            other => panic!("expected tool_done, got {other:?}"),
        }
        assert!(streamed_text(&events).contains("terse"));
        assert_eq!(events.last(), Some(&DispatchEvent::Done));

        let ledger = fx.vault.read(Lane::Write).await.unwrap();
        let rows: Vec<&str> = ledger
            .lines()
            .filter(|l| l.starts_with("| ") && !l.starts_with("| Date"))
            .collect();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].ends_with("| Prefers terse feedback |"));
        assert!(fx.vault.read(Lane::Jobs).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_gains_tool_turns_and_final_in_order() {
        let fx = Fixture::new(ScriptedProvider::new(vec![
            Reply::Tools(vec![("list_notes".into(), json!({"lane": "Build"}))]),
            memory_call("Ships on Fridays"),
            Reply::Text("Done.".into()),
        ]));
        let prior = vec![Message::user("earlier"), Message::assistant("reply")];
        fx.history.seed(Lane::Build, prior.clone()).await;
        let conversations = Arc::new(ConversationStore::restore(fx.history.clone(), 100).await);
        let runner = ConversationLoop::new(
            fx.provider.clone(),
            fx.vault.clone(),
            fx.vault.clone(),
            conversations,
            "test-model",
        )
        .with_chunking(64, Duration::ZERO);

        collect(runner.run_stream(Lane::Build, "plan my week")).await;

        let saved = fx.history.load(Lane::Build).await;
        assert_eq!(saved.len(), prior.len() + 1 + 4 + 1);
        assert_eq!(&saved[..2], &prior[..]);
        assert_eq!(saved[2], Message::user("plan my week"));
        assert_eq!(saved[3].tool_uses()[0].1, "list_notes");
        assert!(saved[4].has_tool_results());
        assert_eq!(saved[5].tool_uses()[0].1, "update_memory");
        assert!(saved[6].has_tool_results());
        assert_eq!(saved[7], Message::assistant("Done."));
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_to_the_model() {
        let fx = Fixture::with_vault(
            ScriptedProvider::new(vec![
                Reply::Tools(vec![("update_note".into(), json!({"path": "Jobs/missing.md", "content": "x"}))]),
                Reply::Text("That note does not exist.".into()),
            ]),
            InMemoryVault::new(),
        );
        let events = collect(fx.runner().run_stream(Lane::Jobs, "fix my note")).await;
        match &events[1] {
            DispatchEvent::ToolDone { result, .. } => assert!(!result.success),
            other => panic!("expected tool_done, got {other:?}"),
        }

        let requests = fx.provider.requests();
        assert_eq!(requests.len(), 2);
        let second = &requests[1].messages;
        let last = second.last().unwrap();
        match &last.content {
            MessageContent::Parts(parts) => match &parts[0] {
                ContentPart::ToolResult { tool_use_id, content } => {
                    assert_eq!(tool_use_id, "toolu_0");
                    assert!(content.contains("Note not found"));
                }
                other => panic!("expected tool result, got {other:?}"),
            },
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_becomes_failure_result() {
        let fx = Fixture::new(ScriptedProvider::new(vec![
            Reply::Tools(vec![("delete_vault".into(), json!({}))]),
            Reply::Text("I can't do that.".into()),
        ]));
        let events = collect(fx.runner().run_stream(Lane::Home, "wipe it")).await;
        match &events[1] {
            DispatchEvent::ToolDone { name, result } => {
                assert_eq!(name, "delete_vault");
                assert!(!result.success);
            }
            other => panic!("expected tool_done, got {other:?}"),
        }
        assert_eq!(events.last(), Some(&DispatchEvent::Done));
    }

    #[tokio::test]
    async fn upstream_failure_emits_error_without_done() {
        let fx = Fixture::new(ScriptedProvider::new(vec![Reply::Fail(ProviderError::Network(
            "connection reset".into(),
        ))]));
        let events = collect(fx.runner().run_stream(Lane::Learn, "quiz me")).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            DispatchEvent::Error(message) => assert!(message.contains("connection reset")),
            other => panic!("expected error, got {other:?}"),
        }
        // The question itself survives.
        assert_eq!(fx.history.load(Lane::Learn).await, vec![Message::user("quiz me")]);
    }

    #[tokio::test]
    async fn tool_limit_ends_with_fallback_text() {
        let fx = Fixture::new(ScriptedProvider::new(vec![
            memory_call("one"),
            memory_call("two"),
        ]));
        let events = collect(fx.runner().with_max_iterations(2).run_stream(Lane::Home, "loop")).await;
        assert_eq!(streamed_text(&events), TOOL_LIMIT_FALLBACK);
        assert_eq!(fx.provider.call_count(), 2);
        let saved = fx.history.load(Lane::Home).await;
        assert_eq!(saved.last(), Some(&Message::assistant(TOOL_LIMIT_FALLBACK)));
        assert_eq!(saved.len(), 1 + 4 + 1);
    }

    #[tokio::test]
    async fn disconnect_after_save_keeps_history() {
        let answer = "A long answer that needs several chunks to stream out.";
        let fx = Fixture::new(ScriptedProvider::text(answer));
        let mut rx = fx.runner().run_stream(Lane::SelfCare, "how am I doing?");

        let first = rx.recv().await;
        assert!(matches!(first, Some(DispatchEvent::Text(_))));
        drop(rx);

        // The lane lock is released once the request task has finished.
        drop(fx.conversations.lock(Lane::SelfCare).await);
        let saved = fx.history.load(Lane::SelfCare).await;
        assert_eq!(saved.last(), Some(&Message::assistant(answer)));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_model_call_times_out() {
        let fx = Fixture::new(ScriptedProvider::new(vec![Reply::Hang]));
        let runner = fx.runner().with_model_timeout(Some(Duration::from_secs(30)));
        let events = collect(runner.run_stream(Lane::Build, "status?")).await;
        match events.as_slice() {
            [DispatchEvent::Error(message)] => assert!(message.contains("timed out")),
            other => panic!("expected a single error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_carries_window_tools_and_context() {
        let vault = InMemoryVault::with_notes([
            ("Self/README.md", "# About Sam\nNight owl."),
            ("Jobs/acme.md", "# Acme\nFinal round on Tuesday."),
        ]);
        let fx = Fixture::with_vault(ScriptedProvider::text("ok"), vault);
        let mut seeded = Vec::new();
        for i in 0..12 {
            seeded.push(Message::user(format!("q{i}")));
            seeded.push(Message::assistant(format!("a{i}")));
        }
        fx.history.seed(Lane::Jobs, seeded).await;
        let conversations = Arc::new(ConversationStore::restore(fx.history.clone(), 100).await);
        let runner = ConversationLoop::new(
            fx.provider.clone(),
            fx.vault.clone(),
            fx.vault.clone(),
            conversations,
            "test-model",
        )
        .with_chunking(12, Duration::ZERO);

        collect(runner.run_stream(Lane::Jobs, "prep me")).await;

        let request = &fx.provider.requests()[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(request.max_tokens, 2048);
        assert_eq!(request.tools.len(), 4);
        assert!(request.messages.len() <= 8);
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(request.messages.last(), Some(&Message::user("prep me")));
        assert!(request.system.contains("# VAULT CONTEXT"));
        assert!(request.system.contains("Night owl."));
        assert!(request.system.contains("Final round on Tuesday."));
    }

    #[tokio::test]
    async fn draft_is_one_tool_free_call_and_writes_nothing() {
        let fx = Fixture::with_vault(
            ScriptedProvider::text("# Acme Corp\n\nApplied today.\n\nSAVE_AS: Jobs/Acme-Corp.md"),
            InMemoryVault::with_notes([("Jobs/Globex.md", "# Globex\nRecruiter call.")]),
        );
        let draft = fx.runner().draft("track my Acme application").await.unwrap();

        assert_eq!(draft.content, "# Acme Corp\n\nApplied today.");
        assert_eq!(draft.save_as.as_deref(), Some("Jobs/Acme-Corp.md"));
        let request = &fx.provider.requests()[0];
        assert!(request.tools.is_empty());
        assert_eq!(request.max_tokens, DRAFT_MAX_TOKENS);
        assert!(request.system.contains("Recruiter call."));
        assert!(request.messages[0].text().contains("\"track my Acme application\""));
        assert!(fx.history.load(Lane::Dispatch).await.is_empty());
        assert_eq!(fx.vault.snapshot().len(), 1);
    }
}
