//! The two-phase standup.
//!
//! Phase 1 asks every standup lane for a short report, all at once, and
//! emits each report the moment it arrives. Phase 2 streams one synthesis
//! over all reports from the coordinating lane. The combined minutes are
//! then written to `Daily/YYYY-MM-DD-standup.md`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use dispatch_core::error::ProviderError;
use dispatch_core::message::Message;
use dispatch_core::provider::{Provider, ProviderRequest};
use dispatch_core::{Corpus, DispatchEvent, KnowledgeStore, Lane, MemoryLedger};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::lane_context;
use crate::lanes::LaneBook;
use crate::loop_runner::complete_with_timeout;
use crate::prompt;

#[derive(Clone)]
pub struct StandupOrchestrator {
    provider: Arc<dyn Provider>,
    store: Arc<dyn KnowledgeStore>,
    ledger: Arc<dyn MemoryLedger>,
    lanes: Arc<LaneBook>,
    report_model: String,
    synthesis_model: String,
    report_max_tokens: u32,
    synthesis_max_tokens: u32,
    model_timeout: Option<Duration>,
}

impl StandupOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn KnowledgeStore>,
        ledger: Arc<dyn MemoryLedger>,
        report_model: impl Into<String>,
        synthesis_model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            store,
            ledger,
            lanes: Arc::new(LaneBook::default()),
            report_model: report_model.into(),
            synthesis_model: synthesis_model.into(),
            report_max_tokens: 400,
            synthesis_max_tokens: 4096,
            model_timeout: None,
        }
    }

    pub fn with_lanes(mut self, lanes: Arc<LaneBook>) -> Self {
        self.lanes = lanes;
        self
    }

    pub fn with_max_tokens(mut self, report: u32, synthesis: u32) -> Self {
        self.report_max_tokens = report;
        self.synthesis_max_tokens = synthesis;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Start a standup. The run continues to the saved note even if the
    /// receiver is dropped.
    pub fn run_stream(&self) -> mpsc::Receiver<DispatchEvent> {
        let (tx, rx) = mpsc::channel(128);
        let this = self.clone();
        tokio::spawn(async move {
            this.drive(tx).await;
        });
        rx
    }

    async fn memory(&self, lane: Lane) -> String {
        self.ledger.read(lane).await.unwrap_or_else(|e| {
            warn!(lane = %lane, error = %e, "Memory ledger unreadable");
            String::new()
        })
    }

    /// One lane's report. Failures become placeholder text.
    async fn lane_report(&self, lane: Lane, corpus: &Corpus) -> String {
        let notes = match lane.category() {
            Some(category) => lane_context(corpus, category),
            None => "No notes in this lane yet.".to_string(),
        };
        let system = prompt::lane_report_system(&self.lanes.prompt(lane), &self.memory(lane).await, &notes);
        let request = ProviderRequest::new(
            &self.report_model,
            system,
            vec![Message::user(prompt::STANDUP_PROMPT)],
        )
        .with_max_tokens(self.report_max_tokens);

        match complete_with_timeout(self.provider.as_ref(), request, self.model_timeout).await {
            Ok(response) => response.message.text(),
            Err(e) => {
                warn!(lane = %lane, error = %e, "Lane report failed");
                format!("[Unavailable: {e}]")
            }
        }
    }

    async fn stream_synthesis(
        &self,
        request: ProviderRequest,
        tx: &mpsc::Sender<DispatchEvent>,
        synthesis: &mut String,
    ) -> Result<(), ProviderError> {
        let mut chunks = self.provider.stream(request).await?;
        while let Some(chunk) = chunks.recv().await {
            let chunk = chunk?;
            if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                synthesis.push_str(&text);
                let _ = tx.send(DispatchEvent::Synthesis(text)).await;
            }
            if chunk.done {
                break;
            }
        }
        Ok(())
    }

    async fn synthesize(&self, reports: &[(String, String)], tx: &mpsc::Sender<DispatchEvent>) -> String {
        let coordinator = Lane::Dispatch;
        let system = prompt::synthesis_system(
            &self.lanes.prompt(coordinator),
            &self.memory(coordinator).await,
            reports,
        );
        let request = ProviderRequest::new(
            &self.synthesis_model,
            system,
            vec![Message::user(prompt::SYNTHESIS_PROMPT)],
        )
        .with_max_tokens(self.synthesis_max_tokens);

        let mut synthesis = String::new();
        let outcome = match self.model_timeout {
            Some(limit) => tokio::time::timeout(limit, self.stream_synthesis(request, tx, &mut synthesis))
                .await
                .unwrap_or_else(|_| Err(ProviderError::Timeout(format!("no response within {}s", limit.as_secs())))),
            None => self.stream_synthesis(request, tx, &mut synthesis).await,
        };
        if let Err(e) = outcome {
            warn!(error = %e, "Synthesis failed");
            synthesis = format!("Synthesis error: {e}");
            let _ = tx.send(DispatchEvent::Synthesis(synthesis.clone())).await;
        }
        synthesis
    }

    async fn drive(&self, tx: mpsc::Sender<DispatchEvent>) {
        info!(lanes = Lane::STANDUP.len(), "Standup started");
        if let Err(e) = self.store.reload().await {
            warn!(error = %e, "Vault reload failed, using previous snapshot");
        }
        let corpus = self.store.snapshot();

        // Phase 1: completion order.
        let mut pending: FuturesUnordered<_> = Lane::STANDUP
            .into_iter()
            .map(|lane| {
                let corpus = corpus.clone();
                async move { (lane, self.lane_report(lane, &corpus).await) }
            })
            .collect();
        let mut collected: HashMap<Lane, String> = HashMap::new();
        while let Some((lane, report)) = pending.next().await {
            debug!(lane = %lane, "Lane report received");
            let _ = tx
                .send(DispatchEvent::LaneReport {
                    lane,
                    report: report.clone(),
                })
                .await;
            collected.insert(lane, report);
        }

        // Phase 2 sees the reports in lane order, whatever order they came in.
        let reports: Vec<(String, String)> = Lane::STANDUP
            .into_iter()
            .filter_map(|lane| collected.remove(&lane).map(|r| (lane.id().to_string(), r)))
            .collect();
        let synthesis = self.synthesize(&reports, &tx).await;

        let today = Local::now().date_naive();
        let path = standup_note_path(today);
        let note = render_standup_note(&self.lanes, today, &reports, &synthesis);
        match self.store.write(&path, &note).await {
            Ok(()) => {
                info!(path = %path, "Standup saved");
                let _ = tx.send(DispatchEvent::Saved(path)).await;
            }
            Err(e) => {
                warn!(error = %e, "Standup save failed");
                let _ = tx
                    .send(DispatchEvent::Error(format!("Failed to save standup: {e}")))
                    .await;
            }
        }
        let _ = tx.send(DispatchEvent::Done).await;
    }
}

pub fn standup_note_path(date: NaiveDate) -> String {
    format!("Daily/{}-standup.md", date.format("%Y-%m-%d"))
}

fn callout(lane: Lane) -> &'static str {
    match lane {
        Lane::Jobs => "info",
        Lane::Build => "warning",
        Lane::Learn => "success",
        Lane::Home => "question",
        Lane::Write => "abstract",
        Lane::SelfCare => "danger",
        Lane::Dispatch => "note",
    }
}

/// The standup minutes: front matter, one callout per lane, the synthesis
/// and an empty action list.
pub fn render_standup_note(
    lanes: &LaneBook,
    date: NaiveDate,
    reports: &[(String, String)],
    synthesis: &str,
) -> String {
    let blocks: Vec<String> = reports
        .iter()
        .map(|(id, report)| {
            let (kind, title) = match Lane::parse(id) {
                Some(lane) => {
                    let profile = lanes.get(lane);
                    (callout(lane), format!("{} {}", profile.emoji, profile.name))
                }
                None => ("note", id.to_uppercase()),
            };
            let body: Vec<String> = report.trim().lines().map(|l| format!("> {l}")).collect();
            format!("> [!{kind}]+ {title}\n{}", body.join("\n"))
        })
        .collect();

    format!(
        "---\ndate: {iso}\ntype: standup\ntags:\n  - standup\n  - daily\n---\n\n\
         # Standup: {long}\n\n\
         ## Lane Reports\n\n{lanes}\n\n---\n\n\
         ## Dispatch Synthesis\n\n{synthesis}\n\n---\n\n\
         ## Action Items\n> Add tasks here during or after standup. Tag with lane + priority.\n\n- [ ]\n",
        iso = date.format("%Y-%m-%d"),
        long = date.format("%A, %B %-d %Y"),
        lanes = blocks.join("\n\n"),
        synthesis = synthesis.trim(),
    )
}
