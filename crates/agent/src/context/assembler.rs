//! Bounded context assembly: the vault corpus rendered into one size-capped
//! text block, filled in strict priority order.
//!
//! 1. **Anchor** (the Self README): always, in full
//! 2. **Today** (today's daily note): always, in full
//! 3. **Recent** (daily notes inside the lookback window): excerpts, newest first
//! 4. **Categories**: focused categories in full, the rest as excerpts
//!
//! The character budget covers the document blocks and their separators;
//! the observability header is not counted. Filling is first-fit: the first
//! candidate that does not fit ends assembly, so a larger budget only ever
//! adds documents. Anchor and today are the exception to skipping: while any
//! budget remains they are cut to fit rather than dropped.
//!
//! # Determinism
//!
//! Assembly is pure over its inputs. The clock is passed in.

use chrono::{DateTime, NaiveDate, Utc};
use dispatch_core::knowledge::truncate_chars;
use dispatch_core::{Category, Corpus, Document};
use serde::{Deserialize, Serialize};

/// Separator between rendered document blocks.
pub const BLOCK_SEPARATOR: &str = "\n---\n\n";

const CATEGORY_ORDER: [Category; 6] = [
    Category::Jobs,
    Category::Build,
    Category::Learn,
    Category::Home,
    Category::Write,
    Category::SelfCare,
];

// ── Types ─────────────────────────────────────────────────────────────────

/// All inputs for one assembly.
pub struct AssemblyInput<'a> {
    pub corpus: &'a Corpus,
    /// Categories rendered in full instead of excerpted.
    pub focus: &'a [Category],
    pub now: DateTime<Utc>,
    /// The calendar day that counts as "today" for the daily note.
    pub today: NaiveDate,
}

/// How much of a document made it into the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inclusion {
    Full,
    Excerpt,
    /// An anchor or today note cut short by the budget.
    Truncated,
}

/// One document that was rendered into the block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludedDoc {
    pub path: String,
    pub tier: String,
    pub inclusion: Inclusion,
    pub chars: usize,
}

/// Statistics for a single priority tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierStats {
    pub name: String,
    /// Characters consumed by this tier, separators included.
    pub chars: usize,
    pub items_included: usize,
    pub items_total: usize,
}

/// Details about the assembly, for logging and status output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    pub budget: usize,
    /// Characters of document blocks, separators included. Never above `budget`.
    pub body_chars: usize,
    pub per_tier: Vec<TierStats>,
    /// Candidates skipped once the budget ran out.
    pub dropped: usize,
}

/// The assembled context block.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// Header plus document blocks, ready to embed in a system prompt.
    pub text: String,
    pub documents: Vec<IncludedDoc>,
    pub metadata: AssemblyMetadata,
}

impl AssembledContext {
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Stateless apart from its limits; create one and reuse it.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_chars: usize,
    lookback_days: u32,
    excerpt_chars: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(60_000)
    }
}

impl ContextAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            lookback_days: 7,
            excerpt_chars: 400,
        }
    }

    pub fn from_config(config: &dispatch_config::ContextConfig) -> Self {
        Self::new(config.max_chars)
            .with_lookback_days(config.lookback_days)
            .with_excerpt_chars(config.excerpt_chars)
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars;
        self
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Assemble the context block for one model call.
    pub fn assemble(&self, input: &AssemblyInput<'_>) -> AssembledContext {
        let corpus = input.corpus;
        let mut fill = Fill::new(self.max_chars);

        let anchor = corpus.find_anchoring_doc();
        if let Some(doc) = anchor {
            fill.offer_required("anchor", doc, format!("## [Self] {}\n", doc.title), &doc.content);
        }
        fill.close_tier("anchor", usize::from(anchor.is_some()));

        let today = corpus.today_doc(input.today);
        if let Some(doc) = today {
            fill.offer_required(
                "today",
                doc,
                format!("## [Daily / Today] {}\n", doc.title),
                &doc.content,
            );
        }
        fill.close_tier("today", usize::from(today.is_some()));

        let recent: Vec<&Document> = corpus
            .most_recent(Category::Daily, self.lookback_days, input.now)
            .into_iter()
            .filter(|d| today.is_none_or(|t| t.path != d.path))
            .collect();
        for doc in &recent {
            let block = format!("## [Daily / Recent] {}\n{}\n", doc.title, doc.excerpt(self.excerpt_chars));
            fill.offer("recent", doc, block, Inclusion::Excerpt);
        }
        fill.close_tier("recent", recent.len());

        let order = CATEGORY_ORDER;
        let ordered = order
            .iter()
            .filter(|c| input.focus.contains(c))
            .chain(order.iter().filter(|c| !input.focus.contains(c)));
        for &category in ordered {
            let docs: Vec<&Document> = corpus
                .list_by_category(category)
                .into_iter()
                .filter(|d| anchor.is_none_or(|a| a.path != d.path))
                .collect();
            let focused = input.focus.contains(&category);
            for doc in &docs {
                let (body, inclusion) = if focused {
                    (doc.content.trim_end(), Inclusion::Full)
                } else {
                    (doc.excerpt(self.excerpt_chars), Inclusion::Excerpt)
                };
                let block = format!("## [{}] {}\n{}\n", category.dir_name(), doc.title, body);
                fill.offer(category.dir_name(), doc, block, inclusion);
            }
            fill.close_tier(category.dir_name(), docs.len());
        }

        fill.finish(input.now)
    }
}

/// Context for one standup lane: every document of the category, in full.
pub fn lane_context(corpus: &Corpus, category: Category) -> String {
    let docs = corpus.list_by_category(category);
    if docs.is_empty() {
        return "No notes in this lane yet.".to_string();
    }
    docs.iter()
        .map(|d| format!("### {}\n{}", d.title, d.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ── Budget tracking ───────────────────────────────────────────────────────

struct Fill {
    budget: usize,
    used: usize,
    body: String,
    documents: Vec<IncludedDoc>,
    per_tier: Vec<TierStats>,
    tier_chars: usize,
    tier_included: usize,
    exhausted: bool,
    dropped: usize,
}

impl Fill {
    fn new(budget: usize) -> Self {
        Self {
            budget,
            used: 0,
            body: String::new(),
            documents: Vec::new(),
            per_tier: Vec::new(),
            tier_chars: 0,
            tier_included: 0,
            exhausted: false,
            dropped: 0,
        }
    }

    fn separator_cost(&self) -> usize {
        if self.body.is_empty() { 0 } else { BLOCK_SEPARATOR.len() }
    }

    fn remaining(&self) -> usize {
        self.budget - self.used
    }

    /// First-fit: add the block whole or end assembly.
    fn offer(&mut self, tier: &str, doc: &Document, block: String, inclusion: Inclusion) {
        if self.exhausted {
            self.dropped += 1;
            return;
        }
        let cost = self.separator_cost() + block.chars().count();
        if cost > self.remaining() {
            self.exhausted = true;
            self.dropped += 1;
            return;
        }
        self.push(tier, doc, &block, inclusion);
    }

    /// Anchor and today: cut to the remaining budget instead of skipping.
    fn offer_required(&mut self, tier: &str, doc: &Document, heading: String, content: &str) {
        let block = format!("{heading}{}\n", content.trim_end());
        if self.exhausted {
            self.dropped += 1;
            return;
        }
        let separator = self.separator_cost();
        if separator + block.chars().count() <= self.remaining() {
            self.push(tier, doc, &block, Inclusion::Full);
            return;
        }
        self.exhausted = true;
        if self.remaining() == 0 {
            self.dropped += 1;
            return;
        }
        // Blocks end in a newline, so a cut block still starts on its own
        // line when there is no room left for the separator.
        let separator = if self.remaining() > separator { BLOCK_SEPARATOR } else { "" };
        let cut = truncate_chars(&block, self.remaining() - separator.len()).to_string();
        self.push_with(separator, tier, doc, &cut, Inclusion::Truncated);
    }

    fn push(&mut self, tier: &str, doc: &Document, block: &str, inclusion: Inclusion) {
        let separator = if self.body.is_empty() { "" } else { BLOCK_SEPARATOR };
        self.push_with(separator, tier, doc, block, inclusion);
    }

    fn push_with(&mut self, separator: &str, tier: &str, doc: &Document, block: &str, inclusion: Inclusion) {
        let separator = if self.body.is_empty() { "" } else { separator };
        let cost = separator.len() + block.chars().count();
        self.body.push_str(separator);
        self.body.push_str(block);
        self.used += cost;
        self.tier_chars += cost;
        self.tier_included += 1;
        self.documents.push(IncludedDoc {
            path: doc.path.clone(),
            tier: tier.to_string(),
            inclusion,
            chars: block.chars().count(),
        });
    }

    fn close_tier(&mut self, name: &str, total: usize) {
        self.per_tier.push(TierStats {
            name: name.to_string(),
            chars: self.tier_chars,
            items_included: self.tier_included,
            items_total: total,
        });
        self.tier_chars = 0;
        self.tier_included = 0;
    }

    fn finish(self, now: DateTime<Utc>) -> AssembledContext {
        let header = format!(
            "# Dispatch Vault Context\nGenerated: {}\nNotes loaded: {} | Characters: {}\n\n",
            now.format("%Y-%m-%d %H:%M UTC"),
            self.documents.len(),
            self.used
        );
        AssembledContext {
            text: header + &self.body,
            documents: self.documents,
            metadata: AssemblyMetadata {
                budget: self.budget,
                body_chars: self.used,
                per_tier: self.per_tier,
                dropped: self.dropped,
            },
        }
    }
}
