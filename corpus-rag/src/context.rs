//! Context assembly: ranked passages in, one bounded context block out.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::document::{Citation, RankedResult};

/// A citation for a passage included in an assembled context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextCitation {
    /// 1-based number of the context block holding the passage text.
    pub source: usize,
    /// Where the passage came from.
    pub citation: Citation,
    /// The passage's similarity score.
    pub score: f32,
}

/// Context text ready for generation, plus what it cites.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AssembledContext {
    /// The delimited, tagged passage texts.
    pub text: String,
    /// One citation per distinct passage included, in block order.
    pub citations: Vec<ContextCitation>,
    /// Whether the last included passage was cut to fit the budget.
    pub truncated: bool,
}

impl AssembledContext {
    /// Whether no passage made it into the context.
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

/// Passages sharing identical text, rendered once under a combined tag.
struct Block<'a> {
    text: &'a str,
    members: Vec<&'a RankedResult>,
}

/// Merges ranked passages into a single context block.
///
/// Each block is preceded by a tag naming its citations, e.g.
/// `[Source 1: home-loan#0]`, and blocks are separated by a blank line.
/// Passages with byte-identical text are rendered once; the block's tag
/// lists every passage that shares it, so each keeps its citation.
///
/// Lengths are counted in characters.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    separator: String,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self { separator: "\n\n".to_string() }
    }
}

impl ContextAssembler {
    /// Create an assembler using a blank line between blocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different delimiter between blocks.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Assemble `results` (in ranking order) into at most `max_context_chars` characters.
    ///
    /// Blocks are added in ranking order until the budget runs out. The block
    /// that crosses the budget has its text cut at the boundary and is still
    /// included; nothing follows it. A block is skipped only when not even its
    /// tag and one character of text fit.
    pub fn assemble(&self, results: &[RankedResult], max_context_chars: usize) -> AssembledContext {
        let mut context = AssembledContext::default();
        let mut used = 0;

        for (n, block) in group_identical(results).iter().enumerate() {
            let source = n + 1;
            let separator = if context.text.is_empty() { "" } else { self.separator.as_str() };
            let tag = render_tag(source, &block.members);
            let overhead = separator.chars().count() + tag.chars().count();

            let remaining = max_context_chars - used;
            if overhead >= remaining {
                break;
            }
            let budget = remaining - overhead;
            let (body, truncated) = truncate_chars(block.text, budget);

            context.text.push_str(separator);
            context.text.push_str(&tag);
            context.text.push_str(body);
            used += overhead + body.chars().count();

            context.citations.extend(block.members.iter().map(|r| ContextCitation {
                source,
                citation: r.citation.clone(),
                score: r.score,
            }));

            if truncated {
                context.truncated = true;
                break;
            }
        }

        context
    }
}

/// Group results by identical text, keeping first-appearance order.
/// A passage id seen twice is only counted once.
fn group_identical(results: &[RankedResult]) -> Vec<Block<'_>> {
    let mut blocks: Vec<Block<'_>> = Vec::new();
    let mut by_text: HashMap<&str, usize> = HashMap::new();
    let mut seen_ids = HashSet::new();

    for result in results {
        if !seen_ids.insert(&result.passage_id) {
            continue;
        }
        match by_text.get(result.text.as_str()) {
            Some(&i) => blocks[i].members.push(result),
            None => {
                by_text.insert(result.text.as_str(), blocks.len());
                blocks.push(Block { text: &result.text, members: vec![result] });
            }
        }
    }

    blocks
}

fn render_tag(source: usize, members: &[&RankedResult]) -> String {
    let ids: Vec<String> = members.iter().map(|r| r.passage_id.to_string()).collect();
    format!("[Source {source}: {}]\n", ids.join(", "))
}

/// Cut `text` to at most `max_chars` characters. Returns whether it was cut.
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_pos, _)) => (&text[..byte_pos], true),
        None => (text, false),
    }
}
